//! Typed view of the JSON lists that `unzbd` writes for a `gamez.zbd`: `nodes.json`,
//! `meshes.json` and `materials.json`, packed into one zip.
use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use log::debug;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use zip::ZipArchive;
use crate::error::Result;

pub const NODES_JSON: &str = "nodes.json";
pub const MESHES_JSON: &str = "meshes.json";
pub const MATERIALS_JSON: &str = "materials.json";


#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Vec3 {
        Vec3 { x, y, z }
    }
}

/// 8-bit color channels, stored as numbers in the 0-255 range.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub fn normalized(&self) -> [f32; 3] {
        [self.r / 255., self.g / 255., self.b / 255.]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Uv {
    pub u: f32,
    pub v: f32,
}


#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    World,
    Window,
    Camera,
    Display,
    Light,
    Lod,
    Object3d,
    Terrain,
}

impl NodeKind {
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::World => "World",
            NodeKind::Window => "Window",
            NodeKind::Camera => "Camera",
            NodeKind::Display => "Display",
            NodeKind::Light => "Light",
            NodeKind::Lod => "Lod",
            NodeKind::Object3d => "Object3d",
            NodeKind::Terrain => "Terrain",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    pub translation: Vec3,
    pub rotation: Vec3,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeData {
    pub name: String,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// `-1` (or absent) means no mesh.
    pub mesh_index: Option<i32>,
    pub transformation: Option<Transformation>,
}

impl NodeData {
    pub fn mesh_index(&self) -> Option<usize> {
        match self.mesh_index {
            Some(i) if i >= 0 => Some(i as usize),
            _ => None,
        }
    }
}

/// One entry of `nodes.json`.  Each entry is a single-key object whose key names the node type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Node {
    World(NodeData),
    Window(NodeData),
    Camera(NodeData),
    Display(NodeData),
    Light(NodeData),
    Lod(NodeData),
    Object3d(NodeData),
    Terrain(NodeData),
}

macro_rules! node_variants {
    ($self:expr, $d:ident => $e:expr) => {
        match $self {
            Node::World($d) | Node::Window($d) | Node::Camera($d) | Node::Display($d) |
            Node::Light($d) | Node::Lod($d) | Node::Object3d($d) | Node::Terrain($d) => $e,
        }
    };
}

impl Node {
    pub fn new(kind: NodeKind, data: NodeData) -> Node {
        match kind {
            NodeKind::World => Node::World(data),
            NodeKind::Window => Node::Window(data),
            NodeKind::Camera => Node::Camera(data),
            NodeKind::Display => Node::Display(data),
            NodeKind::Light => Node::Light(data),
            NodeKind::Lod => Node::Lod(data),
            NodeKind::Object3d => Node::Object3d(data),
            NodeKind::Terrain => Node::Terrain(data),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::World(_) => NodeKind::World,
            Node::Window(_) => NodeKind::Window,
            Node::Camera(_) => NodeKind::Camera,
            Node::Display(_) => NodeKind::Display,
            Node::Light(_) => NodeKind::Light,
            Node::Lod(_) => NodeKind::Lod,
            Node::Object3d(_) => NodeKind::Object3d,
            Node::Terrain(_) => NodeKind::Terrain,
        }
    }

    pub fn data(&self) -> &NodeData {
        node_variants!(self, d => d)
    }

    pub fn data_mut(&mut self) -> &mut NodeData {
        node_variants!(self, d => d)
    }
}


/// Polygon flags.  `unzbd` has written these both as a list of names and as an object keyed by
/// name; either form is accepted and only the names are kept.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawFlags")]
pub struct PolygonFlags(pub Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlags {
    List(Vec<String>),
    Map(BTreeMap<String, serde_json::Value>),
}

impl From<RawFlags> for PolygonFlags {
    fn from(raw: RawFlags) -> PolygonFlags {
        match raw {
            RawFlags::List(v) => PolygonFlags(v),
            RawFlags::Map(m) => PolygonFlags(m.into_iter().map(|(k, _)| k).collect()),
        }
    }
}

impl PolygonFlags {
    pub fn contains(&self, flag: &str) -> bool {
        self.0.iter().any(|f| f.eq_ignore_ascii_case(flag))
    }
}

pub const TRIANGLE_STRIP: &str = "triangle_strip";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PolygonMaterial {
    pub material_index: usize,
    #[serde(default)]
    pub uv_coords: Vec<Uv>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub vertex_indices: Vec<u32>,
    #[serde(default)]
    pub vertex_colors: Vec<Color>,
    #[serde(default)]
    pub flags: PolygonFlags,
    #[serde(default)]
    pub materials: Vec<PolygonMaterial>,
}

impl Polygon {
    pub fn is_triangle_strip(&self) -> bool {
        self.flags.contains(TRIANGLE_STRIP)
    }

    /// The polygon's material and texture coordinates.  Only the first layer is used.
    pub fn material(&self) -> Option<&PolygonMaterial> {
        self.materials.first()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub polygons: Vec<Polygon>,
}


#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColoredMaterial {
    pub color: Color,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TexturedMaterial {
    pub texture: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Material {
    Colored(ColoredMaterial),
    Textured(TexturedMaterial),
}


/// The contents of one `unzbd` gamez zip.
#[derive(Clone, Debug, Default)]
pub struct GamezData {
    pub nodes: Vec<Node>,
    /// Entries may be `null` in the source list.
    pub meshes: Vec<Option<Mesh>>,
    pub materials: Vec<Material>,
}

impl GamezData {
    pub fn open(path: impl AsRef<Path>) -> Result<GamezData> {
        let path = path.as_ref();
        debug!("reading gamez data from {}", path.display());
        GamezData::read(BufReader::new(File::open(path)?))
    }

    pub fn read<R: Read + Seek>(r: R) -> Result<GamezData> {
        let mut zip = ZipArchive::new(r)?;
        let nodes = read_json(&mut zip, NODES_JSON)?;
        let meshes = read_json(&mut zip, MESHES_JSON)?;
        let materials = read_json(&mut zip, MATERIALS_JSON)?;
        let data = GamezData { nodes, meshes, materials };
        debug!("{} nodes, {} meshes, {} materials",
            data.nodes.len(), data.meshes.len(), data.materials.len());
        Ok(data)
    }

    /// Indices and declared names of all parent-less nodes, in list order.
    pub fn roots(&self) -> Vec<(usize, &str)> {
        self.nodes.iter().enumerate()
            .filter(|(_, n)| n.data().parent.is_none())
            .map(|(i, n)| (i, n.data().name.as_str()))
            .collect()
    }
}

fn read_json<R: Read + Seek, T: DeserializeOwned>(zip: &mut ZipArchive<R>, name: &str) -> Result<T> {
    let file = zip.by_name(name)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
