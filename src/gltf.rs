//! Binary glTF output for a built `Scene`.
use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;
use gltf_json::{Accessor, Buffer, Index, Mesh, Node, Root};
use gltf_json::accessor::{self, ComponentType, GenericComponentType};
use gltf_json::buffer::{self, View};
use gltf_json::image::{Image, MimeType};
use gltf_json::material::{AlphaMode, Material, PbrBaseColorFactor, StrengthFactor};
use gltf_json::mesh::{self, Primitive, Semantic};
use gltf_json::scene;
use gltf_json::texture::{self, Texture};
use gltf_json::validation::Checked;
use nalgebra::UnitQuaternion;
use serde_json::json;
use crate::error::Result;
use crate::material::SceneMaterial;
use crate::mesh::SceneMesh;
use crate::scene::{Scene, SceneObject};


pub struct GltfBuilder {
    root: Root,
    bin: Vec<u8>,
    bin_buffer: Index<Buffer>,
}

impl Default for GltfBuilder {
    fn default() -> GltfBuilder {
        let mut root = Root::default();
        root.buffers.push(Buffer {
            byte_length: 0,
            uri: None,
            name: None,
            extensions: None,
            extras: Default::default(),
        });
        GltfBuilder {
            root,
            bin: Vec::new(),
            bin_buffer: Index::new(0),
        }
    }
}

impl GltfBuilder {
    pub fn push_node(&mut self, node: Node) -> Index<Node> {
        let i = Index::new(self.root.nodes.len() as u32);
        self.root.nodes.push(node);
        i
    }

    pub fn push_mesh(&mut self, mesh: Mesh) -> Index<Mesh> {
        let i = Index::new(self.root.meshes.len() as u32);
        self.root.meshes.push(mesh);
        i
    }

    pub fn push_accessor(&mut self, accessor: Accessor) -> Index<Accessor> {
        let i = Index::new(self.root.accessors.len() as u32);
        self.root.accessors.push(accessor);
        i
    }

    pub fn push_view(&mut self, view: View) -> Index<View> {
        let i = Index::new(self.root.buffer_views.len() as u32);
        self.root.buffer_views.push(view);
        i
    }

    pub fn push_scene(&mut self, scene: scene::Scene) -> Index<scene::Scene> {
        let i = Index::new(self.root.scenes.len() as u32);
        self.root.scenes.push(scene);
        i
    }

    pub fn push_material(&mut self, material: Material) -> Index<Material> {
        let i = Index::new(self.root.materials.len() as u32);
        self.root.materials.push(material);
        i
    }

    pub fn push_image(&mut self, image: Image) -> Index<Image> {
        let i = Index::new(self.root.images.len() as u32);
        self.root.images.push(image);
        i
    }

    pub fn push_texture(&mut self, texture: Texture) -> Index<Texture> {
        let i = Index::new(self.root.textures.len() as u32);
        self.root.textures.push(texture);
        i
    }

    pub fn accessor_mut(&mut self, idx: Index<Accessor>) -> &mut Accessor {
        &mut self.root.accessors[idx.value()]
    }

    pub fn set_default_scene(&mut self, scene_idx: Index<scene::Scene>) {
        self.root.scene = Some(scene_idx);
    }

    pub fn push_bin_view(
        &mut self,
        data: &[u8],
        target: Option<buffer::Target>,
    ) -> Index<View> {
        let offset = self.bin.len();
        self.bin.extend_from_slice(data);
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }

        self.push_view(View {
            buffer: self.bin_buffer,
            byte_length: data.len() as u32,
            byte_offset: Some(offset as u32),
            byte_stride: None,
            target: target.map(Checked::Valid),
            name: None,
            extensions: None,
            extras: Default::default(),
        })
    }

    pub fn push_prim_accessor<T: PrimType>(
        &mut self,
        data: &[T],
        buffer_target: buffer::Target,
        normalized: bool,
    ) -> Index<Accessor> {
        let mut bytes = Vec::with_capacity(data.len() * T::SIZE);
        for &x in data {
            x.push_bytes(&mut bytes);
        }
        let view_idx = self.push_bin_view(&bytes, Some(buffer_target));
        self.push_accessor(Accessor {
            buffer_view: Some(view_idx),
            byte_offset: 0,
            count: data.len() as u32,
            component_type: Checked::Valid(T::COMPONENT_TYPE),
            type_: Checked::Valid(T::TYPE),
            min: None,
            max: None,
            normalized,
            sparse: None,
            name: None,
            extensions: None,
            extras: Default::default(),
        })
    }

    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.root.buffers[self.bin_buffer.value()].byte_length = self.bin.len() as u32;

        let mut out = Vec::new();

        // File header
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2_u32.to_le_bytes());
        let file_len_pos = out.len();
        out.extend_from_slice(&0_u32.to_le_bytes());

        // JSON chunk header
        let json_len_pos = out.len();
        out.extend_from_slice(&0_u32.to_le_bytes());
        out.extend_from_slice(b"JSON");
        let start = out.len();
        self.root.to_writer(&mut out)?;
        while out.len() % 4 != 0 {
            out.push(b' ');
        }
        let len = out.len() - start;
        out[json_len_pos .. json_len_pos + 4].copy_from_slice(&(len as u32).to_le_bytes());

        // Binary chunk header
        let bin_len_pos = out.len();
        out.extend_from_slice(&0_u32.to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        let start = out.len();
        out.extend_from_slice(&self.bin);
        while out.len() % 4 != 0 {
            out.push(0);
        }
        let len = out.len() - start;
        out[bin_len_pos .. bin_len_pos + 4].copy_from_slice(&(len as u32).to_le_bytes());

        let len = out.len();
        out[file_len_pos .. file_len_pos + 4].copy_from_slice(&(len as u32).to_le_bytes());

        Ok(out)
    }
}


pub trait PrimType: Copy {
    const COMPONENT_TYPE: GenericComponentType;
    const TYPE: accessor::Type;
    const SIZE: usize;
    fn push_bytes(self, v: &mut Vec<u8>);
}

impl PrimType for f32 {
    const COMPONENT_TYPE: GenericComponentType = GenericComponentType(ComponentType::F32);
    const TYPE: accessor::Type = accessor::Type::Scalar;
    const SIZE: usize = 4;
    fn push_bytes(self, v: &mut Vec<u8>) {
        v.extend_from_slice(&self.to_le_bytes());
    }
}

impl<T: PrimType> PrimType for [T; 2] {
    const COMPONENT_TYPE: GenericComponentType = T::COMPONENT_TYPE;
    const TYPE: accessor::Type = accessor::Type::Vec2;
    const SIZE: usize = T::SIZE * 2;
    fn push_bytes(self, v: &mut Vec<u8>) {
        for &x in &self {
            x.push_bytes(v);
        }
    }
}

impl<T: PrimType> PrimType for [T; 3] {
    const COMPONENT_TYPE: GenericComponentType = T::COMPONENT_TYPE;
    const TYPE: accessor::Type = accessor::Type::Vec3;
    const SIZE: usize = T::SIZE * 3;
    fn push_bytes(self, v: &mut Vec<u8>) {
        for &x in &self {
            x.push_bytes(v);
        }
    }
}

impl<T: PrimType> PrimType for [T; 4] {
    const COMPONENT_TYPE: GenericComponentType = T::COMPONENT_TYPE;
    const TYPE: accessor::Type = accessor::Type::Vec4;
    const SIZE: usize = T::SIZE * 4;
    fn push_bytes(self, v: &mut Vec<u8>) {
        for &x in &self {
            x.push_bytes(v);
        }
    }
}


fn quaternion(q: UnitQuaternion<f32>) -> scene::UnitQuaternion {
    scene::UnitQuaternion([
        q.quaternion().vector()[0],
        q.quaternion().vector()[1],
        q.quaternion().vector()[2],
        q.quaternion().scalar(),
    ])
}

/// Rotation of an XYZ Euler triple, as used by `SceneObject::rotation`.
pub fn euler_to_quaternion(r: [f32; 3]) -> scene::UnitQuaternion {
    quaternion(UnitQuaternion::from_euler_angles(r[0], r[1], r[2]))
}

fn empty_node(name: Option<String>) -> Node {
    Node {
        camera: None,
        children: None,
        matrix: None,
        mesh: None,
        rotation: None,
        scale: None,
        translation: None,
        skin: None,
        weights: None,
        name,
        extensions: None,
        extras: Default::default(),
    }
}

fn push_scene_material(gltf: &mut GltfBuilder, m: &SceneMaterial) -> Index<Material> {
    let mut material = Material::default();
    material.name = Some(m.name.clone());
    material.pbr_metallic_roughness.base_color_factor = PbrBaseColorFactor(m.base_color);
    material.pbr_metallic_roughness.metallic_factor = StrengthFactor(0.0);
    material.pbr_metallic_roughness.roughness_factor = StrengthFactor(m.roughness);

    if let Some(tex) = &m.texture {
        let view = gltf.push_bin_view(&tex.png, None);
        let image = gltf.push_image(Image {
            buffer_view: Some(view),
            mime_type: Some(MimeType("image/png".to_owned())),
            name: Some(tex.file_name.clone()),
            uri: None,
            extensions: None,
            extras: Default::default(),
        });
        let texture = gltf.push_texture(Texture {
            name: Some(tex.file_name.clone()),
            sampler: None,
            source: image,
            extensions: None,
            extras: Default::default(),
        });
        material.pbr_metallic_roughness.base_color_texture = Some(texture::Info {
            index: texture,
            tex_coord: 0,
            extensions: None,
            extras: Default::default(),
        });
    }
    if m.blend {
        material.alpha_mode = Checked::Valid(AlphaMode::Blend);
    }

    gltf.push_material(material)
}

/// Corner attributes for every triangle of one material slot, with n-gons fanned out.
#[derive(Default)]
struct SlotTriangles {
    positions: Vec<[f32; 3]>,
    uvs: Vec<[f32; 2]>,
    colors: Vec<[f32; 4]>,
}

fn triangulate(m: &SceneMesh) -> Vec<SlotTriangles> {
    let mut slots = (0 .. m.materials.len()).map(|_| SlotTriangles::default()).collect::<Vec<_>>();
    for f in &m.faces {
        let out = &mut slots[f.material_slot];
        for i in 1 .. f.verts.len() - 1 {
            for &c in &[0, i, i + 1] {
                out.positions.push(m.positions[f.verts[c] as usize]);
                out.uvs.push(f.uvs[c]);
                out.colors.push(f.colors[c]);
            }
        }
    }
    slots
}

fn bounds(positions: &[[f32; 3]]) -> (serde_json::Value, serde_json::Value) {
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for p in positions {
        for i in 0 .. 3 {
            min[i] = min[i].min(p[i]);
            max[i] = max[i].max(p[i]);
        }
    }
    (json!(min), json!(max))
}

fn push_scene_mesh(
    gltf: &mut GltfBuilder,
    m: &SceneMesh,
    materials: &[Index<Material>],
) -> Index<Mesh> {
    let mut primitives = Vec::new();
    for (slot, tris) in triangulate(m).into_iter().enumerate() {
        if tris.positions.is_empty() {
            continue;
        }

        let mut attributes = HashMap::new();
        let pos_acc = gltf.push_prim_accessor(&tris.positions, buffer::Target::ArrayBuffer, false);
        let (min, max) = bounds(&tris.positions);
        gltf.accessor_mut(pos_acc).min = Some(min);
        gltf.accessor_mut(pos_acc).max = Some(max);
        attributes.insert(Checked::Valid(Semantic::Positions), pos_acc);
        attributes.insert(Checked::Valid(Semantic::TexCoords(0)),
            gltf.push_prim_accessor(&tris.uvs, buffer::Target::ArrayBuffer, false));
        attributes.insert(Checked::Valid(Semantic::Colors(0)),
            gltf.push_prim_accessor(&tris.colors, buffer::Target::ArrayBuffer, false));

        primitives.push(Primitive {
            indices: None,
            attributes,
            material: Some(materials[m.materials[slot]]),
            mode: Checked::Valid(mesh::Mode::Triangles),
            targets: None,
            extensions: None,
            extras: Default::default(),
        });
    }

    gltf.push_mesh(Mesh {
        primitives,
        weights: None,
        name: Some(m.name.clone()),
        extensions: None,
        extras: Default::default(),
    })
}

fn object_node(o: &SceneObject, meshes: &[Index<Mesh>]) -> Node {
    let mut node = empty_node(Some(o.name.clone()));
    node.mesh = o.mesh.map(|id| meshes[id]);
    node.translation = Some(o.translation);
    node.rotation = Some(euler_to_quaternion(o.rotation));
    node.scale = Some(o.scale);
    if !o.children.is_empty() {
        node.children = Some(o.children.iter().map(|&c| Index::new(c as u32)).collect());
    }
    node
}

/// File name for a scene called `name`.  Path separators and characters that Windows rejects
/// become `_`, so the file always lands directly in the output folder.
pub fn output_file_name(name: &str) -> String {
    let stem = name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>();
    format!("{}.glb", stem)
}

/// Encode `scene` as a `.glb`.  The scene is Z-up; a root node named `name` rotates it into
/// glTF's Y-up frame.
pub fn write_glb(scene: &Scene, name: &str) -> Result<Vec<u8>> {
    let mut gltf = GltfBuilder::default();

    let materials = scene.materials.iter()
        .map(|m| push_scene_material(&mut gltf, m))
        .collect::<Vec<_>>();
    let meshes = scene.meshes.iter()
        .map(|m| push_scene_mesh(&mut gltf, m, &materials))
        .collect::<Vec<_>>();

    // Node indices match `ObjectId`s.
    for o in &scene.objects {
        gltf.push_node(object_node(o, &meshes));
    }

    let mut root = empty_node(Some(name.to_owned()));
    root.rotation = Some(euler_to_quaternion([-FRAC_PI_2, 0.0, 0.0]));
    if !scene.roots.is_empty() {
        root.children = Some(scene.roots.iter().map(|&r| Index::new(r as u32)).collect());
    }
    let root_idx = gltf.push_node(root);

    let scene_idx = gltf.push_scene(scene::Scene {
        nodes: vec![root_idx],
        name: Some(name.to_owned()),
        extensions: None,
        extras: Default::default(),
    });
    gltf.set_default_scene(scene_idx);

    gltf.finish()
}


#[cfg(test)]
mod tests {
    use crate::gamez::NodeKind;
    use crate::material::{Texture as SceneTexture, ROUGHNESS};
    use crate::mesh::Face;
    use crate::scene::Collection;
    use super::*;

    fn u32_at(b: &[u8], i: usize) -> usize {
        u32::from_le_bytes([b[i], b[i + 1], b[i + 2], b[i + 3]]) as usize
    }

    fn json_chunk(glb: &[u8]) -> serde_json::Value {
        let len = u32_at(glb, 12);
        serde_json::from_slice(&glb[20 .. 20 + len]).unwrap()
    }

    fn object(name: &str, parent: Option<usize>, children: Vec<usize>, mesh: Option<usize>) -> SceneObject {
        SceneObject {
            name: name.into(),
            source_index: 0,
            kind: NodeKind::Object3d,
            collection: Collection::Misc,
            parent,
            children,
            translation: [1.0, 2.0, 3.0],
            rotation: [0.0; 3],
            scale: [1.0; 3],
            mesh,
        }
    }

    fn sample_scene() -> Scene {
        let quad = Face {
            verts: vec![0, 1, 2, 3],
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            colors: vec![[1.0; 4]; 4],
            material_slot: 0,
        };
        let tri = Face {
            verts: vec![0, 1, 2],
            uvs: vec![[0.0; 2]; 3],
            colors: vec![[1.0; 4]; 3],
            material_slot: 1,
        };
        Scene {
            objects: vec![
                object("body_0000", None, vec![1], Some(0)),
                object("prop_0001", Some(0), vec![], None),
            ],
            roots: vec![0],
            meshes: vec![SceneMesh {
                name: "mesh0000".into(),
                positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, -2.0], [0.0, 1.0, 0.0]],
                faces: vec![quad, tri],
                materials: vec![0, 1],
            }],
            materials: vec![
                SceneMaterial {
                    name: "material_0".into(),
                    base_color: [1.0, 0.0, 0.0, 1.0],
                    texture: None,
                    blend: false,
                    roughness: ROUGHNESS,
                },
                SceneMaterial {
                    name: "canopy.png".into(),
                    base_color: [1.0; 4],
                    texture: Some(SceneTexture {
                        file_name: "canopy.png".into(),
                        size: (1, 1),
                        png: vec![1, 2, 3, 4, 5],
                    }),
                    blend: true,
                    roughness: ROUGHNESS,
                },
            ],
        }
    }

    #[test]
    fn glb_layout() {
        let glb = write_glb(&sample_scene(), "fury").unwrap();
        assert_eq!(&glb[0 .. 4], b"glTF");
        assert_eq!(u32_at(&glb, 4), 2);
        assert_eq!(u32_at(&glb, 8), glb.len());
        assert_eq!(&glb[16 .. 20], b"JSON");
        let json_len = u32_at(&glb, 12);
        assert_eq!(json_len % 4, 0);
        assert_eq!(&glb[20 + json_len + 4 .. 20 + json_len + 8], b"BIN\0");
        assert_eq!(glb.len() % 4, 0);
    }

    #[test]
    fn nodes_mirror_the_scene() {
        let json = json_chunk(&write_glb(&sample_scene(), "fury").unwrap());
        let nodes = json["nodes"].as_array().unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0]["name"], "body_0000");
        assert_eq!(nodes[0]["children"], json!([1]));
        assert_eq!(nodes[0]["mesh"], 0);
        assert_eq!(nodes[0]["translation"], json!([1.0, 2.0, 3.0]));
        assert!(nodes[1].get("mesh").is_none());
        assert_eq!(nodes[2]["name"], "fury");
        assert_eq!(nodes[2]["children"], json!([0]));
        assert_eq!(json["scene"], 0);
        assert_eq!(json["scenes"][0]["nodes"], json!([2]));
    }

    #[test]
    fn meshes_split_by_material_slot() {
        let json = json_chunk(&write_glb(&sample_scene(), "fury").unwrap());
        let prims = json["meshes"][0]["primitives"].as_array().unwrap();
        assert_eq!(prims.len(), 2);
        let quad_pos = prims[0]["attributes"]["POSITION"].as_u64().unwrap() as usize;
        // Quad fans into two triangles.
        assert_eq!(json["accessors"][quad_pos]["count"], 6);
        assert_eq!(json["accessors"][quad_pos]["min"], json!([0.0, 0.0, -2.0]));
        assert_eq!(json["accessors"][quad_pos]["max"], json!([1.0, 1.0, 0.0]));
        assert_eq!(prims[1]["material"], 1);
    }

    #[test]
    fn textured_material_embeds_png() {
        let json = json_chunk(&write_glb(&sample_scene(), "fury").unwrap());
        let mats = json["materials"].as_array().unwrap();
        assert_eq!(mats[0]["pbrMetallicRoughness"]["baseColorFactor"], json!([1.0, 0.0, 0.0, 1.0]));
        let roughness = mats[0]["pbrMetallicRoughness"]["roughnessFactor"].as_f64().unwrap();
        assert!((roughness - ROUGHNESS as f64).abs() < 1e-6);
        assert_eq!(mats[0]["pbrMetallicRoughness"]["metallicFactor"], 0.0);
        assert!(mats[0].get("alphaMode").map_or(true, |m| m == "OPAQUE"));
        assert_eq!(mats[1]["alphaMode"], "BLEND");
        assert_eq!(mats[1]["pbrMetallicRoughness"]["baseColorTexture"]["index"], 0);
        assert_eq!(json["images"][0]["mimeType"], "image/png");
        let view = json["images"][0]["bufferView"].as_u64().unwrap() as usize;
        assert_eq!(json["bufferViews"][view]["byteLength"], 5);
    }

    #[test]
    fn empty_scene_root_has_no_children() {
        let json = json_chunk(&write_glb(&Scene::default(), "c9").unwrap());
        let nodes = json["nodes"].as_array().unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0]["name"], "c9");
        assert!(nodes[0].get("children").is_none());
    }

    #[test]
    fn output_names_stay_in_the_folder() {
        assert_eq!(output_file_name("c1"), "c1.glb");
        assert_eq!(output_file_name("fury_0000"), "fury_0000.glb");
        assert_eq!(output_file_name("../up/fury"), ".._up_fury.glb");
        assert_eq!(output_file_name(r"C:\temp\x"), "C__temp_x.glb");
        assert_eq!(output_file_name("a*b?"), "a_b_.glb");
    }

    #[test]
    fn z_up_root_rotation() {
        let q = euler_to_quaternion([-FRAC_PI_2, 0.0, 0.0]).0;
        let h = (0.5_f32).sqrt();
        assert!((q[0] + h).abs() < 1e-6);
        assert!(q[1].abs() < 1e-6 && q[2].abs() < 1e-6);
        assert!((q[3] - h).abs() < 1e-6);
    }
}
