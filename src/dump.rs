use std::io::{self, Write};
use crate::scene::{Collection, ObjectId, Scene};

/// Write an indented outline of `scene`: one line per object, followed by mesh and material
/// summaries.
pub fn dump_scene<W: Write>(w: &mut W, scene: &Scene) -> io::Result<()> {
    for &root in &scene.roots {
        dump_object(w, scene, root, 0)?;
    }

    for c in Collection::ALL.iter() {
        writeln!(w, "collection {}: {} objects", c, scene.collection(*c).count())?;
    }

    for (i, m) in scene.meshes.iter().enumerate() {
        writeln!(w, "mesh {} {}: {} verts, {} faces, materials {:?}",
            i, m.name, m.positions.len(), m.faces.len(), m.materials)?;
    }

    for (i, m) in scene.materials.iter().enumerate() {
        write!(w, "material {} {}: color {:?}", i, m.name, m.base_color)?;
        if let Some(t) = &m.texture {
            write!(w, ", texture {}x{}", t.size.0, t.size.1)?;
        }
        if m.blend {
            write!(w, ", blend")?;
        }
        writeln!(w)?;
    }

    Ok(())
}

fn dump_object<W: Write>(w: &mut W, scene: &Scene, id: ObjectId, depth: usize) -> io::Result<()> {
    let o = scene.object(id);
    write!(w, "{:indent$}{} [{} {}]", "", o.name, o.kind, o.collection, indent = depth * 2)?;
    if let Some(m) = o.mesh {
        write!(w, " mesh {}", m)?;
    }
    writeln!(w, " at {:?}", o.translation)?;
    for &child in &o.children {
        dump_object(w, scene, child, depth + 1)?;
    }
    Ok(())
}
