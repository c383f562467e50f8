//! `.rof` container support.  A `.rof` file is a tree of directories; each directory is a table
//! of fixed-size child records followed by a blob of the children's names.
use std::fs;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use flate2::read::ZlibDecoder;
use log::{debug, error, info, warn};
use crate::error::{Error, Result};
use crate::read_from::{ReadFrom, ReadExt};

pub const IS_DIR_FLAG: u32 = 0x1;
pub const IS_COMPRESSED_FLAG: u32 = 0x2;

/// Size of one child record in a directory table.
pub const RECORD_SIZE: u64 = 24;
/// Size of the `(count, names_length)` pair that starts each directory.
const DIR_HEADER_SIZE: u64 = 8;


#[derive(Clone, Debug, Default, PartialEq)]
pub struct RofEntry {
    pub name: String,
    pub offset: u32,
    pub length: u32,
    pub length_on_disk: u32,
    pub id: u32,
    pub is_dir: bool,
    pub is_compressed: bool,
    pub children: Vec<RofEntry>,
}

impl RofEntry {
    /// The synthetic root directory.  It has no record of its own in the archive; its table
    /// starts at `offset`.
    pub fn root(name: impl Into<String>, offset: u32) -> RofEntry {
        RofEntry {
            name: name.into(),
            offset,
            is_dir: true,
            ..RofEntry::default()
        }
    }

    fn from_record(rec: &Record, name: String) -> RofEntry {
        RofEntry {
            name,
            offset: rec.offset,
            length: rec.length,
            length_on_disk: rec.length_on_disk,
            id: rec.id,
            is_dir: rec.flags & IS_DIR_FLAG != 0,
            is_compressed: rec.flags & IS_COMPRESSED_FLAG != 0,
            children: Vec::new(),
        }
    }

    /// Look up a descendant by a `/`-separated path relative to this entry.
    pub fn find(&self, path: &str) -> Option<&RofEntry> {
        let mut cur = self;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            cur = cur.children.iter().find(|c| c.name.eq_ignore_ascii_case(part))?;
        }
        Some(cur)
    }

    /// All descendants in depth-first order, each with its path relative to this entry.
    pub fn walk(&self) -> Vec<(String, &RofEntry)> {
        let mut out = Vec::new();
        walk_into(self, "", &mut out);
        out
    }

    pub fn file_count(&self) -> usize {
        self.children.iter()
            .map(|c| if c.is_dir { c.file_count() } else { 1 })
            .sum()
    }
}

fn walk_into<'a>(entry: &'a RofEntry, prefix: &str, out: &mut Vec<(String, &'a RofEntry)>) {
    for c in &entry.children {
        let path =
            if prefix.is_empty() { c.name.clone() }
            else { format!("{}/{}", prefix, c.name) };
        out.push((path.clone(), c));
        if c.is_dir {
            walk_into(c, &path, out);
        }
    }
}


struct Record {
    offset: u32,
    length: u32,
    length_on_disk: u32,
    flags: u32,
    name_length: u32,
    id: u32,
}

impl ReadFrom for Record {
    fn read_from<R: Read + ?Sized>(r: &mut R) -> io::Result<Self> {
        let (offset, length, length_on_disk, flags, name_length, id) = r.read_one()?;
        Ok(Record { offset, length, length_on_disk, flags, name_length, id })
    }
}


pub struct EntryFailure {
    pub path: PathBuf,
    pub error: Error,
}

#[derive(Default)]
pub struct WriteReport {
    pub dirs_created: usize,
    pub files_written: usize,
    pub bytes_written: u64,
    pub failures: Vec<EntryFailure>,
}

impl WriteReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, path: PathBuf, error: Error) {
        error!("{}: {}", path.display(), error);
        self.failures.push(EntryFailure { path, error });
    }
}


pub struct RofFile<T> {
    file: T,
}

impl<T: Read + Seek> RofFile<T> {
    pub fn new(file: T) -> RofFile<T> {
        RofFile { file }
    }

    /// Parse the directory tree below `root`.  Every record and name of a directory is decoded
    /// before any of its subdirectories is visited.
    pub fn read_tree(&mut self, mut root: RofEntry) -> Result<RofEntry> {
        if !root.is_dir {
            return Err(Error::archive(format!("root entry {:?} is not a directory", root.name)));
        }
        let archive_len = self.file.seek(SeekFrom::End(0))?;
        let mut path = Vec::new();
        self.read_dir(&mut root, archive_len, &mut path)?;
        Ok(root)
    }

    fn read_dir(&mut self, dir: &mut RofEntry, archive_len: u64, path: &mut Vec<u32>) -> Result<()> {
        if path.contains(&dir.offset) {
            return Err(Error::archive(format!(
                "directory {:?} at offset {:#x} contains itself", dir.name, dir.offset)));
        }

        self.file.seek(SeekFrom::Start(dir.offset as u64))?;
        let (count, names_len): (u32, u32) = self.file.read_one()?;
        let table_end = dir.offset as u64
            + DIR_HEADER_SIZE
            + count as u64 * RECORD_SIZE
            + names_len as u64;
        if table_end > archive_len {
            return Err(Error::archive(format!(
                "directory {:?} at offset {:#x} ({} entries, {} name bytes) overruns archive of {} bytes",
                dir.name, dir.offset, count, names_len, archive_len)));
        }

        let records = self.file.read_many::<Record>(count as usize)?;
        let names = self.file.read_name_blob(names_len as usize)
            .map_err(|e| Error::archive(format!("directory {:?}: bad name table: {}", dir.name, e)))?;
        if names.len() < records.len() {
            return Err(Error::archive(format!(
                "directory {:?}: {} records but only {} names", dir.name, records.len(), names.len())));
        }

        dir.children = records.iter().zip(names.into_iter()).map(|(rec, name)| {
            if rec.name_length as usize != name.len() {
                debug!("{}: name length field {} does not match {}", name, rec.name_length, name.len());
            }
            RofEntry::from_record(rec, name)
        }).collect();

        path.push(dir.offset);
        for child in &mut dir.children {
            if child.is_dir {
                self.read_dir(child, archive_len, path)?;
            }
        }
        path.pop();
        Ok(())
    }

    /// Read the content of a file entry, inflating it if it is compressed.
    pub fn read_entry(&mut self, entry: &RofEntry) -> Result<Vec<u8>> {
        if entry.is_dir {
            return Err(Error::archive(format!("{:?} is a directory", entry.name)));
        }

        self.file.seek(SeekFrom::Start(entry.offset as u64))?;
        let mut buf = Vec::new();
        (&mut self.file).take(entry.length as u64).read_to_end(&mut buf)?;
        if buf.len() != entry.length as usize {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{}: expected {} bytes at {:#x}, but the archive ends after {}",
                    entry.name, entry.length, entry.offset, buf.len()),
            )));
        }

        if !entry.is_compressed {
            return Ok(buf);
        }

        let mut out = Vec::new();
        ZlibDecoder::new(&buf[..]).read_to_end(&mut out)
            .map_err(|source| Error::Decompress { name: entry.name.clone(), source })?;
        if entry.length_on_disk != 0 && entry.length_on_disk as usize != out.len() {
            warn!("{}: inflated to {} bytes, directory says {}",
                entry.name, out.len(), entry.length_on_disk);
        }
        Ok(out)
    }

    /// Materialize the children of `root` under `target`.  `target` is deleted first if it
    /// exists.  A failing entry is recorded in the report and its siblings are still written.
    pub fn write_tree(&mut self, root: &RofEntry, target: &Path) -> Result<WriteReport> {
        if target.exists() {
            warn!("removing existing output directory {}", target.display());
            fs::remove_dir_all(target)?;
        }
        fs::create_dir_all(target)?;

        let mut report = WriteReport::default();
        report.dirs_created += 1;
        for child in &root.children {
            self.write_entry(child, target, &mut report);
        }

        info!("wrote {} files ({} bytes) in {} directories to {}",
            report.files_written, report.bytes_written, report.dirs_created, target.display());
        if !report.is_clean() {
            warn!("{} entries could not be written", report.failures.len());
        }
        Ok(report)
    }

    fn write_entry(&mut self, entry: &RofEntry, parent: &Path, report: &mut WriteReport) {
        let path = parent.join(&entry.name);
        if let Err(e) = check_name(&entry.name) {
            report.fail(path, e);
            return;
        }

        if entry.is_dir {
            if let Err(e) = fs::create_dir(&path) {
                report.fail(path, e.into());
                return;
            }
            report.dirs_created += 1;
            for child in &entry.children {
                self.write_entry(child, &path, report);
            }
            return;
        }

        debug!("{} ({} bytes{})", path.display(), entry.length,
            if entry.is_compressed { ", compressed" } else { "" });
        let result = self.read_entry(entry)
            .and_then(|content| {
                fs::write(&path, &content)?;
                Ok(content.len())
            });
        match result {
            Ok(n) => {
                report.files_written += 1;
                report.bytes_written += n as u64;
            },
            Err(e) => report.fail(path, e),
        }
    }
}

/// Entry names become single path components on disk.
fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(|c: char| c == '/' || c == '\\') {
        return Err(Error::archive(format!("entry name {:?} is not a plain file name", name)));
    }
    Ok(())
}
