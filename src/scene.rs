//! Scene graph reconstruction from the flat `nodes.json` list.
//!
//! Nodes reference each other by list index.  The builder walks the declared `children` lists
//! from each root, creating one `SceneObject` per node it keeps, and sorts objects into the
//! world, terrain and misc collections.  The World node does not list its terrain pieces as
//! children even though they name it as their parent, so a second pass picks those up.
use std::collections::HashMap;
use std::fmt;
use log::{debug, info, warn};
use crate::error::{Error, Result};
use crate::gamez::{GamezData, Node, NodeKind, Transformation};
use crate::material::{MaterialCache, SceneMaterial};
use crate::mesh::{MeshCache, MeshId, SceneMesh};
use crate::modify::{self, WORLD_SCALE};
use crate::texture::TextureSource;

pub type ObjectId = usize;

/// Name given to the World object regardless of its declared name.
pub const WORLD_NAME: &str = "world";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    World,
    Terrain,
    Misc,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::World, Collection::Terrain, Collection::Misc];

    pub fn name(self) -> &'static str {
        match self {
            Collection::World => "world",
            Collection::Terrain => "terrain",
            Collection::Misc => "misc",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneObject {
    pub name: String,
    /// Position of the node in `nodes.json`.
    pub source_index: usize,
    /// The node's type, after any retyping by the terrain pass.
    pub kind: NodeKind,
    pub collection: Collection,
    pub parent: Option<ObjectId>,
    pub children: Vec<ObjectId>,
    /// Z-up translation.
    pub translation: [f32; 3],
    /// Z-up Euler rotation, XYZ order, radians.
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
    pub mesh: Option<MeshId>,
}

#[derive(Clone, Debug, Default)]
pub struct Scene {
    pub objects: Vec<SceneObject>,
    /// Parent-less objects, in build order.
    pub roots: Vec<ObjectId>,
    pub meshes: Vec<SceneMesh>,
    pub materials: Vec<SceneMaterial>,
}

impl Scene {
    pub fn object(&self, id: ObjectId) -> &SceneObject {
        &self.objects[id]
    }

    pub fn find(&self, name: &str) -> Option<ObjectId> {
        self.objects.iter().position(|o| o.name == name)
    }

    pub fn collection(&self, c: Collection) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter(move |o| o.collection == c)
    }
}


/// Object name for node `index`.  Declared names collide, so every name carries its index;
/// the World node is always `world`.
pub fn object_name(node: &Node, index: usize) -> String {
    match node.kind() {
        NodeKind::World => WORLD_NAME.to_owned(),
        _ => format!("{}_{:04}", node.data().name, index),
    }
}

/// One `(node index, scene name)` pair per parent-less node.  Names come from `object_name`,
/// so roots that share a declared name still get distinct scenes.
pub fn root_scene_names(data: &GamezData) -> Vec<(usize, String)> {
    data.roots().into_iter()
        .map(|(i, _)| (i, object_name(&data.nodes[i], i)))
        .collect()
}

/// Collection for a node, or `None` if the node type is not kept at all.
pub fn bucket(kind: NodeKind, has_parent: bool, inherited: Option<Collection>) -> Option<Collection> {
    match kind {
        NodeKind::World => Some(Collection::World),
        NodeKind::Terrain => Some(Collection::Terrain),
        NodeKind::Object3d | NodeKind::Lod if !has_parent => Some(Collection::Misc),
        NodeKind::Window | NodeKind::Display | NodeKind::Camera | NodeKind::Light => None,
        _ => Some(inherited.unwrap_or(Collection::Misc)),
    }
}


pub struct SceneBuilder<'a> {
    nodes: &'a [Node],
    /// Node types, overridden for orphaned terrain pieces.
    kinds: Vec<NodeKind>,
    /// Node indices grouped by declared `parent`.
    by_parent: Vec<Vec<usize>>,
    world: Option<usize>,
    meshes: MeshCache<'a>,
    materials: MaterialCache<'a>,
    objects: Vec<SceneObject>,
    roots: Vec<ObjectId>,
    visited: Vec<bool>,
    object_of: HashMap<usize, ObjectId>,
}

impl<'a> SceneBuilder<'a> {
    pub fn new(data: &'a GamezData, textures: &'a mut dyn TextureSource) -> SceneBuilder<'a> {
        let nodes = &data.nodes[..];
        let mut by_parent = vec![Vec::new(); nodes.len()];
        for (i, n) in nodes.iter().enumerate() {
            match n.data().parent {
                Some(p) if p < nodes.len() => by_parent[p].push(i),
                Some(p) => warn!("node {} names missing parent {}", i, p),
                None => {},
            }
        }

        let worlds = nodes.iter().enumerate()
            .filter(|(_, n)| n.kind() == NodeKind::World)
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        if worlds.len() > 1 {
            warn!("{} World nodes; only node {} gets its terrain reattached", worlds.len(), worlds[0]);
        }

        SceneBuilder {
            nodes,
            kinds: nodes.iter().map(|n| n.kind()).collect(),
            by_parent,
            world: worlds.first().cloned(),
            meshes: MeshCache::new(&data.meshes),
            materials: MaterialCache::new(&data.materials, textures),
            objects: Vec::new(),
            roots: Vec::new(),
            visited: vec![false; nodes.len()],
            object_of: HashMap::new(),
        }
    }

    /// Indices of all parent-less nodes, in list order.
    pub fn root_nodes(&self) -> Vec<usize> {
        (0 .. self.nodes.len())
            .filter(|&i| self.nodes[i].data().parent.is_none())
            .collect()
    }

    /// Build every root's tree, then reattach orphaned terrain.
    pub fn build_forest(mut self) -> Result<Scene> {
        for root in self.root_nodes() {
            self.build_top(root)?;
        }
        self.reconcile_terrain()?;
        Ok(self.finish())
    }

    /// Build only the tree under the node at `index`.
    pub fn build_root(mut self, index: usize) -> Result<Scene> {
        if index >= self.nodes.len() {
            return Err(Error::MissingNode(index));
        }
        self.build_top(index)?;
        self.reconcile_terrain()?;
        Ok(self.finish())
    }

    fn build_top(&mut self, index: usize) -> Result<()> {
        if let Some(id) = self.build_node(index, None)? {
            self.roots.push(id);
        }
        Ok(())
    }

    fn build_node(&mut self, index: usize, inherited: Option<Collection>) -> Result<Option<ObjectId>> {
        if self.visited[index] {
            warn!("node {} is reachable twice; keeping its first placement", index);
            return Ok(None);
        }
        self.visited[index] = true;

        let nodes = self.nodes;
        let node = &nodes[index];
        let data = node.data();
        let kind = self.kinds[index];
        let collection = match bucket(kind, data.parent.is_some(), inherited) {
            Some(c) => c,
            None => {
                debug!("skipping {} node {} and its subtree", kind, index);
                return Ok(None);
            },
        };

        let mesh = self.meshes.resolve(data.mesh_index(), &mut self.materials)?;
        let (translation, rotation) = match data.transformation {
            Some(Transformation { translation, rotation }) =>
                (modify::flip_axes(translation), modify::flip_axes(rotation)),
            None => ([0.0; 3], [0.0; 3]),
        };
        let scale =
            if kind == NodeKind::World { modify::scale([1.0; 3], WORLD_SCALE) }
            else { [1.0; 3] };

        let id = self.objects.len();
        self.objects.push(SceneObject {
            name: object_name(node, index),
            source_index: index,
            kind,
            collection,
            parent: None,
            children: Vec::new(),
            translation,
            rotation,
            scale,
            mesh,
        });
        self.object_of.insert(index, id);

        for &child in &data.children {
            if child >= nodes.len() {
                warn!("node {} lists missing child {}", index, child);
                continue;
            }
            if let Some(child_id) = self.build_node(child, Some(collection))? {
                self.attach(child_id, id);
            }
        }

        Ok(Some(id))
    }

    fn attach(&mut self, child: ObjectId, parent: ObjectId) {
        self.objects[child].parent = Some(parent);
        self.objects[parent].children.push(child);
    }

    /// Terrain pieces name the World as parent but are missing from its `children`.  Build each
    /// one that has no object yet as Terrain and hang it under the World object.  This includes
    /// nodes the main pass reached but dropped for their type.
    fn reconcile_terrain(&mut self) -> Result<()> {
        let world = match self.world {
            Some(w) => w,
            None => return Ok(()),
        };
        let world_id = match self.object_of.get(&world) {
            Some(&id) => id,
            None => return Ok(()),
        };

        let orphans = self.by_parent[world].iter()
            .cloned()
            .filter(|i| !self.object_of.contains_key(i))
            .collect::<Vec<_>>();
        let mut reattached = 0;
        for i in orphans {
            // An earlier orphan may have listed this one as a child.
            if self.object_of.contains_key(&i) {
                continue;
            }
            if self.kinds[i] != NodeKind::Terrain {
                debug!("retyping {} node {} as Terrain", self.kinds[i], i);
            }
            self.kinds[i] = NodeKind::Terrain;
            self.visited[i] = false;
            if let Some(id) = self.build_node(i, Some(Collection::World))? {
                self.attach(id, world_id);
                reattached += 1;
            }
        }
        if reattached > 0 {
            info!("reattached {} terrain nodes to the world", reattached);
        }
        Ok(())
    }

    fn finish(self) -> Scene {
        let scene = Scene {
            objects: self.objects,
            roots: self.roots,
            meshes: self.meshes.into_meshes(),
            materials: self.materials.into_materials(),
        };
        for c in Collection::ALL.iter() {
            debug!("collection {}: {} objects", c, scene.collection(*c).count());
        }
        scene
    }
}
