//! Self-describing, nestable, size-prefixed binary chunks.
//!
//! Every chunk starts with a 16 byte header:
//!
//! | field     | width | notes                                          |
//! |-----------|-------|------------------------------------------------|
//! | `id`      | 4     | four 7-bit ASCII characters, see [`ChunkId`]   |
//! | `version` | 4     | format generation of this chunk's payload      |
//! | `size`    | 8     | payload length in bytes, header not included   |
//!
//! followed by `size` bytes of payload, which may itself contain child chunks. Byte order is a
//! type parameter of [`ChunkReader`] and [`ChunkWriter`] so a persisted file reads the same on
//! every host.
//!
//! A reader that does not understand a chunk (or does not care about the rest of it) calls
//! [`ChunkReader::end_chunk`] and lands on the next sibling, which is what keeps older readers
//! working against files written by newer ones.

use thiserror::Error;

mod reader;
mod writer;

pub use reader::ChunkReader;
pub use writer::ChunkWriter;

/// Length of a chunk header on the wire
pub const HEADER_SIZE: u64 = 16;

#[derive(Debug, Error)]
pub enum Error {
    #[error("truncated input: needed {needed} bytes but only {available} remain")]
    Truncated { needed: u64, available: u64 },

    #[error("chunk {id} declares {size} bytes but only {available} remain in the enclosing region")]
    ChunkOverrun {
        id: ChunkId,
        size: u64,
        available: u64,
    },

    #[error("end_chunk called without an open chunk")]
    NoOpenChunk,

    #[error("{0} chunk(s) still open when finishing the writer")]
    UnclosedChunks(usize),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Four printable ASCII characters packed into a `u32`, first character in the lowest byte.
///
/// The top bit of every byte is cleared, so any 4 byte value read from disk is a valid id.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(u32);

impl ChunkId {
    pub const fn new(tag: &[u8; 4]) -> Self {
        Self(
            ((tag[3] & 0x7f) as u32) << 24
                | ((tag[2] & 0x7f) as u32) << 16
                | ((tag[1] & 0x7f) as u32) << 8
                | (tag[0] & 0x7f) as u32,
        )
    }

    pub const fn from_u32(raw: u32) -> Self {
        Self(raw & 0x7f7f_7f7f)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for b in self.to_bytes() {
            let c = if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChunkId({self})")
    }
}

/// The header of a chunk as returned by [`ChunkReader::start_chunk`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: ChunkId,
    pub version: u32,
    /// Payload length in bytes
    pub size: u64,
}
