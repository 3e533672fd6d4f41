use super::{read_str, write_str, Reader, Result, TableRecord, Writer, CATEGORIES_CHUNK};
use crate::keys::CategoryId;
use crate::records::Category;
use crate::version::Version;
use refdb_arena::Arena;
use refdb_chunk::ChunkId;
use std::io::{Read, Seek, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Layout {
    V6,
    /// Year range
    V10,
}

impl Layout {
    fn for_version(version: Version) -> Self {
        match version {
            Version::V6 | Version::V7 | Version::V8 | Version::V9 => Self::V6,
            Version::V10 | Version::V11 | Version::V12 => Self::V10,
        }
    }
}

impl TableRecord for Category {
    const CHUNK_ID: ChunkId = CATEGORIES_CHUNK;
    const MIN_WIRE_SIZE: u64 = 8;

    fn decode<R: Read + Seek>(
        r: &mut Reader<R>,
        arena: &mut Arena,
        version: Version,
    ) -> Result<Self> {
        let mut category = Self::new(
            CategoryId::new(r.read_u32()?),
            read_str(r, arena, "category name")?,
        );
        if Layout::for_version(version) >= Layout::V10 {
            category.year_from = r.read_u16()?;
            category.year_to = r.read_u16()?;
        }
        Ok(category)
    }

    fn encode<W: Write + Seek>(&self, w: &mut Writer<W>, arena: &Arena) -> Result<()> {
        w.write_u32(self.id.as_u32())?;
        write_str(w, arena, self.name)?;
        w.write_u16(self.year_from)?;
        w.write_u16(self.year_to)?;
        Ok(())
    }
}
