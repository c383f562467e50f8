//! Driving the external `unzbd` unpacker and collecting its output.
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use log::{debug, info};
use walkdir::WalkDir;
use zip::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};
use crate::error::{Error, Result};

pub const CHAPTERS: [&str; 8] = ["c1", "c1b", "c1c", "c2", "c2b", "c3", "c4", "c5"];

pub const UNZBD_EXE: &str = "unzbd.exe";
pub const TEXTURE_ZBD: &str = "texture.zbd";

/// `<install>/ZBD/PLANES.ZBD`
pub fn planes_zbd(cs_dir: &Path) -> PathBuf {
    cs_dir.join("ZBD").join("PLANES.ZBD")
}

/// `<install>/ZBD/<chapter>/gamez.zbd`
pub fn chapter_zbd(cs_dir: &Path, chapter: &str) -> PathBuf {
    cs_dir.join("ZBD").join(chapter).join("gamez.zbd")
}


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Gamez,
    Textures,
}

impl Mode {
    pub fn arg(self) -> &'static str {
        match self {
            Mode::Gamez => "gamez",
            Mode::Textures => "textures",
        }
    }
}

pub struct Unzbd {
    pub exe: PathBuf,
}

impl Unzbd {
    pub fn new(exe: impl Into<PathBuf>) -> Unzbd {
        Unzbd { exe: exe.into() }
    }

    pub fn command(&self, mode: Mode, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.exe);
        cmd.arg("cs").arg(mode.arg()).arg(input).arg(output);
        cmd
    }

    fn run(&self, mode: Mode, input: &Path, output: &Path) -> Result<()> {
        debug!("{} {} {} -> {}", self.exe.display(), mode.arg(), input.display(), output.display());
        let status = self.command(mode, input, output).status()?;
        if !status.success() {
            return Err(Error::Unpacker { status, input: input.to_owned() });
        }
        Ok(())
    }

    pub fn gamez(&self, input: &Path, output: &Path) -> Result<()> {
        self.run(Mode::Gamez, input, output)
    }

    pub fn textures(&self, input: &Path, output: &Path) -> Result<()> {
        self.run(Mode::Textures, input, output)
    }
}


/// Locate a previously unpacked `unzbd.exe` anywhere under `data_dir`.
pub fn find_unzbd(data_dir: &Path) -> Option<PathBuf> {
    WalkDir::new(data_dir).into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name() == UNZBD_EXE)
        .map(|e| e.into_path())
}

/// Every `texture.zbd` under the install folder, in a stable order.
pub fn find_texture_archives(cs_dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(cs_dir).sort_by_file_name().into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == TEXTURE_ZBD)
        .map(|e| e.into_path())
        .collect()
}

/// Name of the per-folder texture zip for `texture_zbd`: `<parent dir name>_textures.zip`.
pub fn texture_zip_name(texture_zbd: &Path) -> String {
    let parent = texture_zbd.parent()
        .and_then(|p| p.file_name())
        .map_or_else(|| "root".into(), |n| n.to_string_lossy());
    format!("{}_textures.zip", parent)
}

/// Merge several texture zips into `out`.  When a name occurs in more than one input, the
/// first one wins.  Returns the number of entries written.
pub fn aggregate_textures(zips: &[PathBuf], out: &Path) -> Result<usize> {
    let mut writer = ZipWriter::new(BufWriter::new(File::create(out)?));
    let mut seen: HashSet<String> = HashSet::new();
    let mut buf = Vec::new();

    for path in zips {
        let mut zip = ZipArchive::new(BufReader::new(File::open(path)?))?;
        let mut added = 0;
        for i in 0 .. zip.len() {
            let mut file = zip.by_index(i)?;
            if file.is_dir() || seen.contains(file.name()) {
                continue;
            }
            let name = file.name().to_owned();
            buf.clear();
            file.read_to_end(&mut buf)?;
            writer.start_file(name.as_str(), SimpleFileOptions::default())?;
            writer.write_all(&buf)?;
            seen.insert(name);
            added += 1;
        }
        debug!("{}: {} new textures", path.display(), added);
    }

    writer.finish()?;
    info!("aggregated {} textures into {}", seen.len(), out.display());
    Ok(seen.len())
}
