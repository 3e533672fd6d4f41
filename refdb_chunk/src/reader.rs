use crate::{ChunkHeader, ChunkId, Error, Result, HEADER_SIZE};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy)]
struct OpenChunk {
    header: ChunkHeader,
    /// Stream offset one past the last payload byte
    end: u64,
}

/// Reads chunks from a seekable byte stream.
///
/// Open chunks are tracked on an explicit stack, so nesting depth is not limited by recursion.
/// All primitive reads are bounded by the innermost open chunk (or the end of the stream when no
/// chunk is open).
#[derive(Debug)]
pub struct ChunkReader<R, E = LittleEndian> {
    inner: R,
    pos: u64,
    stream_len: u64,
    chunks: Vec<OpenChunk>,
    _byte_order: PhantomData<E>,
}

impl<R: Read + Seek, E: ByteOrder> ChunkReader<R, E> {
    /// Bind a reader to `inner`, starting at its current position
    pub fn new(mut inner: R) -> Result<Self> {
        let pos = inner.stream_position()?;
        let stream_len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(pos))?;
        Ok(Self {
            inner,
            pos,
            stream_len,
            chunks: Vec::new(),
            _byte_order: PhantomData,
        })
    }

    /// Number of currently open chunks
    pub fn depth(&self) -> usize {
        self.chunks.len()
    }

    /// Header of the innermost open chunk
    pub fn current(&self) -> Option<&ChunkHeader> {
        self.chunks.last().map(|c| &c.header)
    }

    /// Bytes left before the end of the innermost open chunk, or of the stream
    pub fn remaining(&self) -> u64 {
        self.limit().saturating_sub(self.pos)
    }

    /// Whether any bytes remain in the innermost open chunk, or the stream
    pub fn has_more(&self) -> bool {
        self.remaining() > 0
    }

    fn limit(&self) -> u64 {
        self.chunks.last().map_or(self.stream_len, |c| c.end)
    }

    fn ensure(&self, needed: u64) -> Result<()> {
        let available = self.remaining();
        if needed > available {
            return Err(Error::Truncated { needed, available });
        }
        Ok(())
    }

    /// Read the next chunk header and make it the innermost open chunk.
    ///
    /// The payload is not consumed. Fails if the header does not fit in the enclosing region or
    /// if the declared size would run past it.
    pub fn start_chunk(&mut self) -> Result<ChunkHeader> {
        self.ensure(HEADER_SIZE)?;
        let id = ChunkId::from_u32(self.inner.read_u32::<E>()?);
        let version = self.inner.read_u32::<E>()?;
        let size = self.inner.read_u64::<E>()?;
        self.pos += HEADER_SIZE;

        let available = self.remaining();
        if size > available {
            return Err(Error::ChunkOverrun {
                id,
                size,
                available,
            });
        }

        let header = ChunkHeader { id, version, size };
        self.chunks.push(OpenChunk {
            header,
            end: self.pos + size,
        });
        Ok(header)
    }

    /// Close the innermost open chunk, moving to its declared end no matter how much of the
    /// payload was consumed.
    pub fn end_chunk(&mut self) -> Result<ChunkHeader> {
        let chunk = self.chunks.pop().ok_or(Error::NoOpenChunk)?;
        if self.pos != chunk.end {
            self.inner.seek(SeekFrom::Start(chunk.end))?;
            self.pos = chunk.end;
        }
        Ok(chunk.header)
    }

    /// Step over the next chunk without looking at its payload
    pub fn skip_chunk(&mut self) -> Result<ChunkHeader> {
        self.start_chunk()?;
        self.end_chunk()
    }

    /// Advance `n` bytes within the innermost open chunk
    pub fn skip(&mut self, n: u64) -> Result<()> {
        self.ensure(n)?;
        self.pos += n;
        self.inner.seek(SeekFrom::Start(self.pos))?;
        Ok(())
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.ensure(buf.len() as u64)?;
        self.inner.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        let v = self.inner.read_u8()?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.ensure(2)?;
        let v = self.inner.read_u16::<E>()?;
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        let v = self.inner.read_u32::<E>()?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.ensure(4)?;
        let v = self.inner.read_i32::<E>()?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure(8)?;
        let v = self.inner.read_u64::<E>()?;
        self.pos += 8;
        Ok(v)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.ensure(8)?;
        let v = self.inner.read_i64::<E>()?;
        self.pos += 8;
        Ok(v)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.ensure(4)?;
        let v = self.inner.read_f32::<E>()?;
        self.pos += 4;
        Ok(v)
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
