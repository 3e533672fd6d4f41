use super::{
    read_date, read_item_type_ref, read_str, write_date, write_str, Reader, Result, TableRecord,
    Writer, COLOR_CHANGELOG_CHUNK, ITEM_CHANGELOG_CHUNK,
};
use crate::keys::ColorId;
use crate::records::{ColorChangeLogEntry, ItemChangeLogEntry};
use crate::version::Version;
use refdb_arena::Arena;
use refdb_chunk::ChunkId;
use std::io::{Read, Seek, Write};

// Both change logs only differ by the date encoding, see `read_date`.

impl TableRecord for ItemChangeLogEntry {
    const CHUNK_ID: ChunkId = ITEM_CHANGELOG_CHUNK;
    const MIN_WIRE_SIZE: u64 = 18;

    fn decode<R: Read + Seek>(
        r: &mut Reader<R>,
        arena: &mut Arena,
        version: Version,
    ) -> Result<Self> {
        Ok(Self {
            id: r.read_u32()?,
            date: read_date(r, version)?,
            from_type: read_item_type_ref(r, "item change source type")?,
            from_id: read_str(r, arena, "item change source id")?,
            to_type: read_item_type_ref(r, "item change target type")?,
            to_id: read_str(r, arena, "item change target id")?,
        })
    }

    fn encode<W: Write + Seek>(&self, w: &mut Writer<W>, arena: &Arena) -> Result<()> {
        w.write_u32(self.id)?;
        write_date(w, self.date)?;
        w.write_u8(self.from_type.as_u8())?;
        write_str(w, arena, self.from_id)?;
        w.write_u8(self.to_type.as_u8())?;
        write_str(w, arena, self.to_id)?;
        Ok(())
    }
}

impl TableRecord for ColorChangeLogEntry {
    const CHUNK_ID: ChunkId = COLOR_CHANGELOG_CHUNK;
    const MIN_WIRE_SIZE: u64 = 16;

    fn decode<R: Read + Seek>(
        r: &mut Reader<R>,
        _arena: &mut Arena,
        version: Version,
    ) -> Result<Self> {
        Ok(Self {
            id: r.read_u32()?,
            date: read_date(r, version)?,
            from_color: ColorId::new(r.read_u32()?),
            to_color: ColorId::new(r.read_u32()?),
        })
    }

    fn encode<W: Write + Seek>(&self, w: &mut Writer<W>, _arena: &Arena) -> Result<()> {
        w.write_u32(self.id)?;
        write_date(w, self.date)?;
        w.write_u32(self.from_color.as_u32())?;
        w.write_u32(self.to_color.as_u32())?;
        Ok(())
    }
}
