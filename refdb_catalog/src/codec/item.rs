use super::{
    read_array, read_item_type_ref, read_str, write_array, write_str, Reader, Result,
    TableRecord, WireValue, Writer, ITEMS_CHUNK,
};
use crate::keys::{CategoryId, ColorId};
use crate::records::{Dimensions, Item};
use crate::version::Version;
use refdb_arena::Arena;
use refdb_chunk::ChunkId;
use std::io::{Read, Seek, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Layout {
    /// Carries a last inventory update timestamp that is no longer used
    V6,
    /// Alternate ids
    V8,
    /// Relationship matches
    V9,
    /// Dimensions
    V10,
}

impl Layout {
    fn for_version(version: Version) -> Self {
        match version {
            Version::V6 | Version::V7 => Self::V6,
            Version::V8 => Self::V8,
            Version::V9 => Self::V9,
            Version::V10 | Version::V11 | Version::V12 => Self::V10,
        }
    }
}

impl WireValue for Dimensions {
    const WIRE_SIZE: u64 = 12;

    fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        Ok(Self {
            x: r.read_f32()?,
            y: r.read_f32()?,
            z: r.read_f32()?,
        })
    }

    fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        w.write_f32(self.x)?;
        w.write_f32(self.y)?;
        w.write_f32(self.z)?;
        Ok(())
    }
}

impl TableRecord for Item {
    const CHUNK_ID: ChunkId = ITEMS_CHUNK;
    const MIN_WIRE_SIZE: u64 = 33;

    fn decode<R: Read + Seek>(
        r: &mut Reader<R>,
        arena: &mut Arena,
        version: Version,
    ) -> Result<Self> {
        let layout = Layout::for_version(version);

        let id = read_str(r, arena, "item id")?;
        let name = read_str(r, arena, "item name")?;
        let item_type = read_item_type_ref(r, "item type")?;
        let mut item = Self::new(item_type, id, name);
        item.category = CategoryId::new(r.read_u32()?);
        item.default_color = ColorId::new(r.read_u32()?);
        item.weight = r.read_f32()?;
        item.year_from = r.read_u16()?;
        item.year_to = r.read_u16()?;
        if layout == Layout::V6 {
            // last inventory update
            r.skip(8)?;
        }
        item.known_colors = read_array(r, arena)?;
        if layout >= Layout::V8 {
            item.alternate_ids = read_str(r, arena, "item alternate ids")?;
        }
        if layout >= Layout::V9 {
            item.relationship_matches = read_array(r, arena)?;
        }
        if layout >= Layout::V10 {
            item.dimensions = read_array(r, arena)?;
        }
        Ok(item)
    }

    fn encode<W: Write + Seek>(&self, w: &mut Writer<W>, arena: &Arena) -> Result<()> {
        write_str(w, arena, self.id)?;
        write_str(w, arena, self.name)?;
        w.write_u8(self.item_type.as_u8())?;
        w.write_u32(self.category.as_u32())?;
        w.write_u32(self.default_color.as_u32())?;
        w.write_f32(self.weight)?;
        w.write_u16(self.year_from)?;
        w.write_u16(self.year_to)?;
        write_array(w, arena, self.known_colors)?;
        write_str(w, arena, self.alternate_ids)?;
        write_array(w, arena, self.relationship_matches)?;
        write_array(w, arena, self.dimensions)?;
        Ok(())
    }
}
