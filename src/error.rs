use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    /// A required executable or folder is missing.  Reported before any work starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed `.rof` directory structure.
    #[error("malformed archive: {0}")]
    Archive(String),

    #[error("malformed bitmap: {0}")]
    Bitmap(String),

    #[error("failed to inflate {name}: {source}")]
    Decompress {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("unpacker exited with {status} while processing {}", input.display())]
    Unpacker {
        status: ExitStatus,
        input: PathBuf,
    },

    #[error("mesh {0} has no buildable faces")]
    EmptyMesh(String),

    #[error("no node with index {0}")]
    MissingNode(usize),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn archive(msg: impl Into<String>) -> Error {
        Error::Archive(msg.into())
    }

    pub fn bitmap(msg: impl Into<String>) -> Error {
        Error::Bitmap(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Error {
        Error::Config(msg.into())
    }
}
