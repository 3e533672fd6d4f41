use crate::{ChunkId, Error, Result};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::{Seek, SeekFrom, Write};
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy)]
struct PendingChunk {
    id: ChunkId,
    /// Stream offset of the first payload byte
    payload_start: u64,
}

/// Writes chunks to a seekable byte stream, back-patching each chunk's size once it is closed.
#[derive(Debug)]
pub struct ChunkWriter<W, E = LittleEndian> {
    inner: W,
    chunks: Vec<PendingChunk>,
    _byte_order: PhantomData<E>,
}

impl<W: Write + Seek, E: ByteOrder> ChunkWriter<W, E> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            chunks: Vec::new(),
            _byte_order: PhantomData,
        }
    }

    pub fn depth(&self) -> usize {
        self.chunks.len()
    }

    /// Write a chunk header with a placeholder size and open the chunk
    pub fn start_chunk(&mut self, id: ChunkId, version: u32) -> Result<()> {
        self.inner.write_u32::<E>(id.as_u32())?;
        self.inner.write_u32::<E>(version)?;
        self.inner.write_u64::<E>(0)?;
        let payload_start = self.inner.stream_position()?;
        self.chunks.push(PendingChunk { id, payload_start });
        Ok(())
    }

    /// Close the innermost open chunk and write its final payload size into the header
    pub fn end_chunk(&mut self) -> Result<ChunkId> {
        let chunk = self.chunks.pop().ok_or(Error::NoOpenChunk)?;
        let end = self.inner.stream_position()?;
        let size = end - chunk.payload_start;
        self.inner.seek(SeekFrom::Start(chunk.payload_start - 8))?;
        self.inner.write_u64::<E>(size)?;
        self.inner.seek(SeekFrom::Start(end))?;
        Ok(chunk.id)
    }

    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        Ok(self.inner.write_u8(v)?)
    }

    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_u8(u8::from(v))
    }

    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        Ok(self.inner.write_u16::<E>(v)?)
    }

    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        Ok(self.inner.write_u32::<E>(v)?)
    }

    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        Ok(self.inner.write_i32::<E>(v)?)
    }

    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        Ok(self.inner.write_u64::<E>(v)?)
    }

    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        Ok(self.inner.write_i64::<E>(v)?)
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        Ok(self.inner.write_f32::<E>(v)?)
    }

    /// Raw bytes, no length prefix
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        Ok(self.inner.write_all(bytes)?)
    }

    /// A `u32` byte length followed by the UTF-8 bytes
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        let len = u32::try_from(s.len()).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "string exceeds 4 GiB")
        })?;
        self.write_u32(len)?;
        self.write_bytes(s.as_bytes())
    }

    /// Flush and hand back the stream. Every chunk must have been closed.
    pub fn finish(mut self) -> Result<W> {
        if !self.chunks.is_empty() {
            return Err(Error::UnclosedChunks(self.chunks.len()));
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}
