//! Builds small `.rof` archives for tests.  The root table always sits at offset 0.
#![allow(dead_code)]
use std::io::Write;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use crimson_convert::rof::{IS_COMPRESSED_FLAG, IS_DIR_FLAG};

pub enum Item {
    File { name: String, data: Vec<u8>, compress: bool },
    /// Flagged as compressed but stored as raw bytes, so inflating it fails.
    Corrupt { name: String, data: Vec<u8> },
    Dir { name: String, children: Vec<Item> },
}

impl Item {
    fn name(&self) -> &str {
        match self {
            Item::File { name, .. } | Item::Corrupt { name, .. } | Item::Dir { name, .. } => name,
        }
    }
}

pub fn file(name: &str, data: &[u8]) -> Item {
    Item::File { name: name.into(), data: data.to_vec(), compress: false }
}

pub fn compressed(name: &str, data: &[u8]) -> Item {
    Item::File { name: name.into(), data: data.to_vec(), compress: true }
}

pub fn corrupt(name: &str, data: &[u8]) -> Item {
    Item::Corrupt { name: name.into(), data: data.to_vec() }
}

pub fn dir(name: &str, children: Vec<Item>) -> Item {
    Item::Dir { name: name.into(), children }
}

pub fn zlib(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

pub fn build_rof(items: &[Item]) -> Vec<u8> {
    let mut out = Vec::new();
    write_dir(&mut out, items);
    out
}

fn write_dir(out: &mut Vec<u8>, items: &[Item]) -> u32 {
    let offset = out.len();
    let mut names = Vec::new();
    for item in items {
        names.extend_from_slice(item.name().as_bytes());
        names.push(0);
    }
    let table_len = 8 + 24 * items.len() + names.len();
    out.resize(offset + table_len, 0);

    let mut records = Vec::new();
    for (id, item) in items.iter().enumerate() {
        let name_len = item.name().len() as u32;
        let rec = match item {
            Item::File { data, compress, .. } => {
                let stored = if *compress { zlib(data) } else { data.clone() };
                let start = out.len() as u32;
                out.extend_from_slice(&stored);
                let flags = if *compress { IS_COMPRESSED_FLAG } else { 0 };
                [start, stored.len() as u32, data.len() as u32, flags, name_len, id as u32]
            },
            Item::Corrupt { data, .. } => {
                let start = out.len() as u32;
                out.extend_from_slice(data);
                let len = data.len() as u32;
                [start, len, len, IS_COMPRESSED_FLAG, name_len, id as u32]
            },
            Item::Dir { children, .. } => {
                let start = write_dir(out, children);
                [start, 0, 0, IS_DIR_FLAG, name_len, id as u32]
            },
        };
        records.push(rec);
    }

    let mut table = Vec::with_capacity(table_len);
    table.extend_from_slice(&(items.len() as u32).to_le_bytes());
    table.extend_from_slice(&(names.len() as u32).to_le_bytes());
    for rec in &records {
        for w in rec {
            table.extend_from_slice(&w.to_le_bytes());
        }
    }
    table.extend_from_slice(&names);
    out[offset .. offset + table_len].copy_from_slice(&table);
    offset as u32
}
