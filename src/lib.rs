pub mod error;
pub mod read_from;

pub mod bm;
pub mod dump;
pub mod gamez;
pub mod gltf;
pub mod image;
pub mod material;
pub mod mesh;
pub mod modify;
pub mod rof;
pub mod scene;
pub mod texture;
pub mod unzbd;

pub use crate::error::{Error, Result};

/// Set up `env_logger`.  `RUST_LOG` is honored; each `-v` raises the level one step above
/// the default of `info`.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_target(false)
        .init();
}
