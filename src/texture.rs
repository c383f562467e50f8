//! Texture lookup: mapping material texture references to files in the unpacked texture zip.
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use zip::result::ZipError;
use zip::ZipArchive;
use crate::error::Result;

/// Replacement textures, keyed by the normalized file name.  The first group swaps in
/// higher-resolution logos; the second matches the nose art actually shown in-game.
const TEXTURE_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("agyro_taillogo.png", "12its_logo1.png"),
    ("agyro_winglogo.png", "12its_logo1.png"),
    ("bal_taillogo.png", "british_tail.png"),
    ("bal_winglogo.png", "04british_logo1.png"),
    ("blo_taillogo.png", "blake_logo1.png"),
    ("blo_winglogo.png", "blake_logo1.png"),
    ("bri_taillogo.png", "14medusa_logo1.png"),
    ("bri_winglogo.png", "14medusa_logo1.png"),
    ("dev_taillogo.png", "fhunter_logo2.png"),
    ("dev_winglogo.png", "fhunter_logo4_1.png"),
    ("fir_taillogo.png", "10hknights_logo2.png"),
    ("fir_winglogo.png", "hollywoodlogo.png"),
    ("fur_taillogo.png", "bswan_logo1.png"),
    ("fur_winglogo.png", "bswan_logo1.png"),
    ("hel_taillogo.png", "sacredtrust_logo1.png"),
    ("hel_winglogo.png", "sacredtrust_logo1.png"),
    ("kes_taillogo.png", "14medusa_logo1.png"),
    ("kes_winglogo.png", "14medusa_logo1.png"),
    ("pea_taillogo.png", "blake_logo1.png"),
    ("pea_winglogo.png", "blake_logo1.png"),
    ("war_taillogo.png", "blackhat_logo1.png"),
    ("war_winglogo.png", "blackhat_logo1.png"),

    ("bal_noselogo.png", "21ace_star.png"),
    ("blo_noselogo.png", "21ace_star.png"),
    ("bri_noselogo.png", "21ace_star.png"),
    ("dev_noselogo.png", "40ohsoblue.png"),
    ("fur_noselogo.png", "21ace_star.png"),
    ("hel_noselogo.png", "21ace_star.png"),
    ("kes_noselogo.png", "21ace_star.png"),
    ("pea_noselogo.png", "21ace_star.png"),
    ("war_noselogo.png", "21ace_star.png"),
];

/// Normalize a texture reference from `materials.json` to a `.png` file name: drop spurious
/// middle segments (`bldhwk_cowling.5.tif`), lowercase, swap the extension.
pub fn png_file_name(texture: &str) -> String {
    let parts = texture.split('.').collect::<Vec<_>>();
    let name =
        if parts.len() > 2 { format!("{}.{}", parts[0], parts[parts.len() - 1]) }
        else { texture.to_owned() };
    let name = name.to_lowercase();
    let stem = match name.rfind('.') {
        Some(i) if i > 0 => &name[.. i],
        _ => &name[..],
    };
    format!("{}.png", stem)
}

pub fn substitute(png_name: &str) -> &str {
    TEXTURE_SUBSTITUTIONS.iter()
        .find(|&&(from, _)| from == png_name)
        .map_or(png_name, |&(_, to)| to)
}

/// The file name a texture reference finally resolves to.
pub fn texture_file_name(texture: &str) -> String {
    let png_name = png_file_name(texture);
    substitute(&png_name).to_owned()
}


/// Source of texture file contents, keyed by file name.
pub trait TextureSource {
    /// `Ok(None)` if there is no such texture.
    fn read_texture(&mut self, name: &str) -> Result<Option<Vec<u8>>>;
}

impl TextureSource for HashMap<String, Vec<u8>> {
    fn read_texture(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.get(name).cloned())
    }
}

/// A source with no textures at all; every textured material falls back to a flat color.
pub struct NoTextures;

impl TextureSource for NoTextures {
    fn read_texture(&mut self, _name: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// The aggregated `textures.zip`.
pub struct ZipTextures<R> {
    zip: ZipArchive<R>,
}

impl ZipTextures<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        ZipTextures::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read + Seek> ZipTextures<R> {
    pub fn new(r: R) -> Result<ZipTextures<R>> {
        Ok(ZipTextures { zip: ZipArchive::new(r)? })
    }

    pub fn len(&self) -> usize {
        self.zip.len()
    }
}

impl<R: Read + Seek> TextureSource for ZipTextures<R> {
    fn read_texture(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut file = match self.zip.by_name(name) {
            Ok(f) => f,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)?;
        Ok(Some(buf))
    }
}
