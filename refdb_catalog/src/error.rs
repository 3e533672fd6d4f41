use refdb_chunk::ChunkId;
use std::path::PathBuf;
use thiserror::Error;

/// Malformed, truncated or unsupported binary input.
///
/// Any of these abandons the load in progress; a previously published catalog is not affected.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("chunk framing error: {0}")]
    Chunk(#[from] refdb_chunk::Error),

    #[error("not a catalog database, found chunk {found} where the database chunk was expected")]
    BadMagic { found: ChunkId },

    #[error("unsupported format version {version}")]
    UnsupportedVersion { version: u32 },

    #[error("mandatory table {0} is missing")]
    MissingTable(ChunkId),

    #[error("table {0} appears more than once")]
    DuplicateTable(ChunkId),

    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    #[error("invalid {kind} value {value}")]
    InvalidEnumerant { kind: &'static str, value: u32 },

    #[error("timestamp {value} is out of range")]
    InvalidTimestamp { value: i64 },
}

impl FormatError {
    pub(crate) fn truncated(needed: u64, available: u64) -> Self {
        Self::Chunk(refdb_chunk::Error::Truncated { needed, available })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("catalog format error: {0}")]
    Format(#[from] FormatError),

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot move catalog file into place at {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no catalog loaded")]
    NoCatalog,

    #[error("update state serialization error: {0}")]
    State(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
