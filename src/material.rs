use std::collections::HashMap;
use log::{debug, warn};
use crate::error::Result;
use crate::gamez::Material;
use crate::image::Image;
use crate::texture::{self, TextureSource};

/// Placeholder color for textured materials whose texture could not be found.
pub const FALLBACK_COLOR: [f32; 4] = [1.0, 0.0, 0.5, 1.0];
pub const ROUGHNESS: f32 = 0.9;

pub type MaterialId = usize;

#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub file_name: String,
    pub size: (u32, u32),
    /// Encoded PNG, as found in the texture source.
    pub png: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneMaterial {
    pub name: String,
    pub base_color: [f32; 4],
    pub texture: Option<Texture>,
    /// Set when the texture has translucent pixels.
    pub blend: bool,
    pub roughness: f32,
}

impl SceneMaterial {
    fn flat(name: String, base_color: [f32; 4]) -> SceneMaterial {
        SceneMaterial {
            name,
            base_color,
            texture: None,
            blend: false,
            roughness: ROUGHNESS,
        }
    }
}


/// Builds materials on first use and hands out the same `MaterialId` for every later reference
/// with the same name.  Scoped to one scene build.
pub struct MaterialCache<'a> {
    materials: &'a [Material],
    textures: &'a mut dyn TextureSource,
    by_name: HashMap<String, MaterialId>,
    built: Vec<SceneMaterial>,
}

impl<'a> MaterialCache<'a> {
    pub fn new(materials: &'a [Material], textures: &'a mut dyn TextureSource) -> MaterialCache<'a> {
        MaterialCache {
            materials,
            textures,
            by_name: HashMap::new(),
            built: Vec::new(),
        }
    }

    /// Cache key for material `index`.  Textured materials are keyed by their final texture file
    /// name, so materials sharing a texture share one instance.
    pub fn material_name(&self, index: usize) -> String {
        match self.materials.get(index) {
            Some(Material::Textured(t)) => texture::texture_file_name(&t.texture),
            _ => format!("material_{}", index),
        }
    }

    pub fn resolve(&mut self, index: usize) -> Result<MaterialId> {
        let name = self.material_name(index);
        if let Some(&id) = self.by_name.get(&name) {
            return Ok(id);
        }

        let material = self.create(index, name.clone())?;
        let id = self.built.len();
        self.built.push(material);
        self.by_name.insert(name, id);
        Ok(id)
    }

    fn create(&mut self, index: usize, name: String) -> Result<SceneMaterial> {
        let materials = self.materials;
        let textured = match materials.get(index) {
            Some(Material::Colored(c)) => {
                let [r, g, b] = c.color.normalized();
                return Ok(SceneMaterial::flat(name, [r, g, b, 1.0]));
            },
            Some(Material::Textured(t)) => t,
            None => {
                warn!("no such material {}, using placeholder color", index);
                return Ok(SceneMaterial::flat(name, FALLBACK_COLOR));
            },
        };

        let png = match self.textures.read_texture(&name)? {
            Some(png) => png,
            None => {
                warn!("did not find texture {} (referenced as {})", name, textured.texture);
                return Ok(SceneMaterial::flat(name, FALLBACK_COLOR));
            },
        };

        let (size, blend) = match Image::read_png(&png[..]) {
            Ok(img) => (img.size, img.has_alpha()),
            Err(e) => {
                warn!("could not decode texture {}: {}; treating it as opaque", name, e);
                ((0, 0), false)
            },
        };
        debug!("material {}: texture {}x{}{}", name, size.0, size.1,
            if blend { ", blended" } else { "" });

        let mut material = SceneMaterial::flat(name.clone(), [1.0; 4]);
        material.texture = Some(Texture { file_name: name, size, png });
        material.blend = blend;
        Ok(material)
    }

    pub fn get(&self, id: MaterialId) -> &SceneMaterial {
        &self.built[id]
    }

    pub fn into_materials(self) -> Vec<SceneMaterial> {
        self.built
    }
}


#[cfg(test)]
mod tests {
    use png::ColorType;
    use crate::gamez::{Color, ColoredMaterial, TexturedMaterial};
    use crate::image::tests::encode_png;
    use crate::texture::NoTextures;
    use super::*;

    fn textured(name: &str) -> Material {
        Material::Textured(TexturedMaterial { texture: name.into() })
    }

    fn colored(r: f32, g: f32, b: f32) -> Material {
        Material::Colored(ColoredMaterial { color: Color { r, g, b } })
    }

    #[test]
    fn colored_material_is_normalized() {
        let mats = vec![colored(255., 0., 51.)];
        let mut tex = NoTextures;
        let mut cache = MaterialCache::new(&mats, &mut tex);
        let id = cache.resolve(0).unwrap();
        let m = cache.get(id);
        assert_eq!(m.name, "material_0");
        assert_eq!(m.base_color, [1.0, 0.0, 0.2, 1.0]);
        assert_eq!(m.roughness, ROUGHNESS);
        assert!(m.texture.is_none());
    }

    #[test]
    fn missing_texture_falls_back() {
        let mats = vec![textured("fury_body.tif")];
        let mut tex = NoTextures;
        let mut cache = MaterialCache::new(&mats, &mut tex);
        let id = cache.resolve(0).unwrap();
        let m = cache.get(id);
        assert_eq!(m.name, "fury_body.png");
        assert_eq!(m.base_color, FALLBACK_COLOR);
        assert!(m.texture.is_none());
        assert!(!m.blend);
    }

    #[test]
    fn out_of_range_material_falls_back() {
        let mut tex = NoTextures;
        let mut cache = MaterialCache::new(&[], &mut tex);
        let id = cache.resolve(7).unwrap();
        assert_eq!(cache.get(id).base_color, FALLBACK_COLOR);
    }

    #[test]
    fn shared_texture_shares_material() {
        let mats = vec![
            textured("bal_taillogo.tif"),
            textured("BRITISH_TAIL.tif"),
            colored(1., 2., 3.),
            textured("bal_taillogo.tif"),
        ];
        let mut tex: HashMap<String, Vec<u8>> = HashMap::new();
        tex.insert("british_tail.png".into(),
            encode_png(1, 1, ColorType::RGBA, &[10, 20, 30, 255]));
        let mut cache = MaterialCache::new(&mats, &mut tex);

        let a = cache.resolve(0).unwrap();
        let b = cache.resolve(1).unwrap();
        let c = cache.resolve(2).unwrap();
        let d = cache.resolve(3).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, d);
        assert_ne!(a, c);

        let m = cache.get(a);
        assert_eq!(m.texture.as_ref().map(|t| t.size), Some((1, 1)));
        assert!(!m.blend);
        assert_eq!(cache.into_materials().len(), 2);
    }

    #[test]
    fn translucent_texture_blends() {
        let mats = vec![textured("canopy.tif")];
        let mut tex: HashMap<String, Vec<u8>> = HashMap::new();
        tex.insert("canopy.png".into(),
            encode_png(2, 1, ColorType::RGBA, &[0, 0, 0, 255, 0, 0, 0, 10]));
        let mut cache = MaterialCache::new(&mats, &mut tex);
        let id = cache.resolve(0).unwrap();
        assert!(cache.get(id).blend);
    }

    #[test]
    fn undecodable_texture_is_kept_opaque() {
        let mats = vec![textured("broken.tif")];
        let mut tex: HashMap<String, Vec<u8>> = HashMap::new();
        tex.insert("broken.png".into(), b"junk".to_vec());
        let mut cache = MaterialCache::new(&mats, &mut tex);
        let id = cache.resolve(0).unwrap();
        let m = cache.get(id);
        assert!(!m.blend);
        assert_eq!(m.texture.as_ref().map(|t| t.png.len()), Some(4));
    }
}
