use std::collections::{HashMap, HashSet};
use log::{debug, warn};
use crate::error::{Error, Result};
use crate::gamez::{Color, Mesh, Polygon, Uv};
use crate::material::{MaterialCache, MaterialId};
use crate::modify;

pub type MeshId = usize;

const WHITE: [f32; 4] = [1.0; 4];

#[derive(Clone, Debug, PartialEq)]
pub struct Face {
    /// Indices into `SceneMesh::positions`.
    pub verts: Vec<u32>,
    /// One entry per corner.
    pub uvs: Vec<[f32; 2]>,
    pub colors: Vec<[f32; 4]>,
    /// Index into `SceneMesh::materials`.
    pub material_slot: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub faces: Vec<Face>,
    /// Local material slots, in first-seen order over the mesh's polygons.
    pub materials: Vec<MaterialId>,
}

pub fn mesh_name(index: usize) -> String {
    format!("mesh{:04}", index)
}

/// Expand a triangle strip into its triangles.  Each item is the window's start position in the
/// strip and its three indices.  Windows that repeat an index are degenerate and dropped.
pub fn strip_triangles(indices: &[u32]) -> Vec<(usize, [u32; 3])> {
    indices.windows(3).enumerate()
        .filter(|(_, w)| w[0] != w[1] && w[1] != w[2] && w[0] != w[2])
        .map(|(i, w)| (i, [w[0], w[1], w[2]]))
        .collect()
}

/// Map the global material indices used by `polygons` to local slots, in first-seen order.
pub fn local_material_slots(polygons: &[Polygon]) -> Vec<usize> {
    let mut slots = Vec::new();
    for p in polygons {
        if let Some(m) = p.material() {
            if !slots.contains(&m.material_index) {
                slots.push(m.material_index);
            }
        }
    }
    slots
}


/// Accumulates faces for one mesh and rejects the ones that can't form a valid face.
struct FaceBuilder {
    vert_count: usize,
    faces: Vec<Face>,
    seen: HashSet<Vec<u32>>,
    skipped: usize,
}

impl FaceBuilder {
    fn new(vert_count: usize) -> FaceBuilder {
        FaceBuilder {
            vert_count,
            faces: Vec::new(),
            seen: HashSet::new(),
            skipped: 0,
        }
    }

    fn push(&mut self, verts: &[u32], uvs: &[Uv], colors: &[Color], material_slot: usize) {
        if verts.len() < 3 || verts.iter().any(|&v| v as usize >= self.vert_count) {
            self.skipped += 1;
            return;
        }
        let mut key = verts.to_vec();
        key.sort_unstable();
        key.dedup();
        if key.len() != verts.len() || !self.seen.insert(key) {
            self.skipped += 1;
            return;
        }

        let uvs = (0 .. verts.len())
            .map(|i| uvs.get(i).map_or([0.0, 0.0], |uv| [uv.u, 1.0 - uv.v]))
            .collect();
        let colors = (0 .. verts.len())
            .map(|i| colors.get(i).map_or(WHITE, |c| {
                let [r, g, b] = c.normalized();
                [r, g, b, 1.0]
            }))
            .collect();
        self.faces.push(Face {
            verts: verts.to_vec(),
            uvs,
            colors,
            material_slot,
        });
    }

    fn push_polygon(&mut self, poly: &Polygon, material_slot: usize) {
        let uvs = poly.material().map_or(&[][..], |m| &m.uv_coords[..]);
        let colors = &poly.vertex_colors[..];
        if poly.is_triangle_strip() {
            for (i, tri) in strip_triangles(&poly.vertex_indices) {
                self.push(&tri, window(uvs, i), window(colors, i), material_slot);
            }
        } else {
            self.push(&poly.vertex_indices, uvs, colors, material_slot);
        }
    }
}

fn window<T>(xs: &[T], start: usize) -> &[T] {
    let start = start.min(xs.len());
    let end = (start + 3).min(xs.len());
    &xs[start .. end]
}


/// Builds meshes on first use, keyed by `mesh_name`.  Scoped to one scene build.
pub struct MeshCache<'a> {
    meshes: &'a [Option<Mesh>],
    by_name: HashMap<String, MeshId>,
    built: Vec<SceneMesh>,
}

impl<'a> MeshCache<'a> {
    pub fn new(meshes: &'a [Option<Mesh>]) -> MeshCache<'a> {
        MeshCache {
            meshes,
            by_name: HashMap::new(),
            built: Vec::new(),
        }
    }

    /// `Ok(None)` for "no mesh": no index, a missing entry, or a mesh without polygons (the
    /// placeholders used by lights and cameras).
    pub fn resolve(
        &mut self,
        index: Option<usize>,
        materials: &mut MaterialCache,
    ) -> Result<Option<MeshId>> {
        let index = match index {
            Some(i) => i,
            None => return Ok(None),
        };
        let name = mesh_name(index);
        if let Some(&id) = self.by_name.get(&name) {
            return Ok(Some(id));
        }

        let mesh = match self.meshes.get(index) {
            Some(Some(m)) => m,
            _ => {
                warn!("no such mesh {}", index);
                return Ok(None);
            },
        };
        if mesh.polygons.is_empty() {
            return Ok(None);
        }

        let built = build_mesh(name.clone(), mesh, materials)?;
        let id = self.built.len();
        self.built.push(built);
        self.by_name.insert(name, id);
        Ok(Some(id))
    }

    pub fn get(&self, id: MeshId) -> &SceneMesh {
        &self.built[id]
    }

    pub fn into_meshes(self) -> Vec<SceneMesh> {
        self.built
    }
}

fn build_mesh(name: String, mesh: &Mesh, materials: &mut MaterialCache) -> Result<SceneMesh> {
    let global_slots = local_material_slots(&mesh.polygons);
    let mut slot_materials = Vec::with_capacity(global_slots.len());
    for &g in &global_slots {
        slot_materials.push(materials.resolve(g)?);
    }

    let mut faces = FaceBuilder::new(mesh.vertices.len());
    for poly in &mesh.polygons {
        let slot = match poly.material() {
            Some(m) => global_slots.iter().position(|&g| g == m.material_index),
            None => None,
        };
        match slot {
            Some(slot) => faces.push_polygon(poly, slot),
            None => faces.skipped += 1,
        }
    }

    if faces.faces.is_empty() {
        return Err(Error::EmptyMesh(name));
    }
    if faces.skipped > 0 {
        debug!("{}: skipped {} faces", name, faces.skipped);
    }

    Ok(SceneMesh {
        name,
        positions: mesh.vertices.iter().map(|&v| modify::flip_axes(v)).collect(),
        faces: faces.faces,
        materials: slot_materials,
    })
}
