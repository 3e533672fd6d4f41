use super::{
    read_str, write_str, Reader, Result, TableRecord, Writer, API_KEYS_CHUNK, API_QUIRKS_CHUNK,
};
use crate::error::FormatError;
use crate::keys::ApiQuirk;
use crate::records::ApiKey;
use crate::version::Version;
use refdb_arena::Arena;
use refdb_chunk::ChunkId;
use std::io::{Read, Seek, Write};

impl TableRecord for ApiKey {
    const CHUNK_ID: ChunkId = API_KEYS_CHUNK;
    const MIN_WIRE_SIZE: u64 = 8;

    fn decode<R: Read + Seek>(
        r: &mut Reader<R>,
        arena: &mut Arena,
        _version: Version,
    ) -> Result<Self> {
        Ok(Self {
            id: read_str(r, arena, "api key id")?,
            key: read_str(r, arena, "api key")?,
        })
    }

    fn encode<W: Write + Seek>(&self, w: &mut Writer<W>, arena: &Arena) -> Result<()> {
        write_str(w, arena, self.id)?;
        write_str(w, arena, self.key)
    }
}

impl TableRecord for ApiQuirk {
    const CHUNK_ID: ChunkId = API_QUIRKS_CHUNK;
    const MIN_WIRE_SIZE: u64 = 4;

    fn decode<R: Read + Seek>(
        r: &mut Reader<R>,
        _arena: &mut Arena,
        _version: Version,
    ) -> Result<Self> {
        let value = r.read_u32()?;
        Self::from_u32(value).ok_or(FormatError::InvalidEnumerant {
            kind: "api quirk",
            value,
        })
    }

    fn encode<W: Write + Seek>(&self, w: &mut Writer<W>, _arena: &Arena) -> Result<()> {
        Ok(w.write_u32(self.as_u32())?)
    }
}
