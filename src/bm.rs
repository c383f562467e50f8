//! `.bm` paint bitmaps, as found in the extracted `.rof` tree.
//!
//! A `.bm` file is a `(height, width)` pair of little-endian `u16`s followed by five planes of
//! `width * height` pixels: an RGB base image, three 8-bit masks and an RGBA specular map.
//! Rows are stored bottom row first.
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use log::{debug, error, info};
use png::ColorType;
use walkdir::WalkDir;
use crate::error::{Error, Result};
use crate::image;
use crate::read_from::ReadExt;
use crate::rof::EntryFailure;

pub const BM_EXTENSION: &str = "bm";

/// `(file suffix, color type, bytes per pixel)` for each plane, in file order.
const LAYERS: [(&str, ColorType, usize); 5] = [
    ("base", ColorType::RGB, 3),
    ("color1", ColorType::Grayscale, 1),
    ("color2", ColorType::Grayscale, 1),
    ("color3", ColorType::Grayscale, 1),
    ("specular", ColorType::RGBA, 4),
];

#[derive(Debug)]
pub struct Layer {
    pub suffix: &'static str,
    pub color: ColorType,
    /// Pixel rows, top row first.
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct Bm {
    pub size: (u32, u32),
    pub layers: Vec<Layer>,
}

impl Bm {
    /// Output path of each layer: `<dir>/<stem>-<suffix>.png`.
    pub fn layer_paths(&self, dir: &Path, stem: &str) -> Vec<PathBuf> {
        self.layers.iter()
            .map(|l| dir.join(format!("{}-{}.png", stem, l.suffix)))
            .collect()
    }

    pub fn write_pngs(&self, dir: &Path, stem: &str) -> Result<Vec<PathBuf>> {
        let paths = self.layer_paths(dir, stem);
        for (layer, path) in self.layers.iter().zip(&paths) {
            let mut w = BufWriter::new(File::create(path)?);
            image::write_png(&mut w, self.size, layer.color, &layer.data)?;
            w.flush()?;
        }
        Ok(paths)
    }
}


pub struct BmFile<T> {
    file: T,
}

impl<T: Read> BmFile<T> {
    pub fn new(file: T) -> BmFile<T> {
        BmFile { file }
    }

    pub fn read_image(&mut self) -> Result<Bm> {
        let (height, width): (u16, u16) = self.file.read_one()
            .map_err(|e| truncated(e, "header"))?;
        let (w, h) = (width as usize, height as usize);

        let mut layers = Vec::with_capacity(LAYERS.len());
        for &(suffix, color, bpp) in LAYERS.iter() {
            // Bounded by what the file holds, not by the header.
            let len = w * h * bpp;
            let mut raw = Vec::new();
            (&mut self.file).take(len as u64).read_to_end(&mut raw)?;
            if raw.len() < len {
                return Err(Error::bitmap(format!("file ends inside the {}", suffix)));
            }
            layers.push(Layer { suffix, color, data: flip_rows(&raw, w * bpp) });
        }
        Ok(Bm { size: (width as u32, height as u32), layers })
    }
}

fn truncated(e: io::Error, what: &str) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::bitmap(format!("file ends inside the {}", what))
    } else {
        Error::Io(e)
    }
}

fn flip_rows(data: &[u8], stride: usize) -> Vec<u8> {
    if stride == 0 {
        return Vec::new();
    }
    data.chunks(stride).rev().flatten().cloned().collect()
}

/// Convert one `.bm` file into PNGs next to it.
pub fn convert_file(path: &Path) -> Result<Vec<PathBuf>> {
    let bm = BmFile::new(BufReader::new(File::open(path)?)).read_image()?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let stem = path.file_stem().map_or_else(String::new, |s| s.to_string_lossy().into_owned());
    debug!("{}: {}x{}", path.display(), bm.size.0, bm.size.1);
    bm.write_pngs(dir, &stem)
}


#[derive(Default)]
pub struct ConvertReport {
    pub converted: usize,
    pub pngs_written: usize,
    pub failures: Vec<EntryFailure>,
}

impl ConvertReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

fn is_bm(path: &Path) -> bool {
    path.extension().map_or(false, |e| e.eq_ignore_ascii_case(BM_EXTENSION))
}

/// Convert every `.bm` file under `dir`.  A file that fails to convert is recorded and the walk
/// continues.
pub fn convert_tree(dir: &Path) -> Result<ConvertReport> {
    let mut report = ConvertReport::default();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() || !is_bm(entry.path()) {
            continue;
        }
        match convert_file(entry.path()) {
            Ok(pngs) => {
                report.converted += 1;
                report.pngs_written += pngs.len();
            },
            Err(error) => {
                error!("{}: {}", entry.path().display(), error);
                report.failures.push(EntryFailure { path: entry.into_path(), error });
            },
        }
    }
    info!("converted {} bitmaps under {}", report.converted, dir.display());
    Ok(report)
}
