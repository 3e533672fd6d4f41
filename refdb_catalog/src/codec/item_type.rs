use super::{
    read_array, read_item_type, read_str, write_array, write_str, Reader, Result, TableRecord,
    Writer, ITEM_TYPES_CHUNK,
};
use crate::keys::ItemTypeFlags;
use crate::records::ItemType;
use crate::version::Version;
use refdb_arena::Arena;
use refdb_chunk::ChunkId;
use std::io::{Read, Seek, Write};

// The item type layout has not changed since V6.
impl TableRecord for ItemType {
    const CHUNK_ID: ChunkId = ITEM_TYPES_CHUNK;
    const MIN_WIRE_SIZE: u64 = 11;

    fn decode<R: Read + Seek>(
        r: &mut Reader<R>,
        arena: &mut Arena,
        _version: Version,
    ) -> Result<Self> {
        let id = read_item_type(r, "item type id")?;
        let picture_id = read_item_type(r, "item type picture id")?.as_u8();
        let flags = ItemTypeFlags::from_bits(r.read_u8()?);
        let name = read_str(r, arena, "item type name")?;
        let categories = read_array(r, arena)?;
        Ok(Self {
            id,
            picture_id,
            flags,
            name,
            categories,
        })
    }

    fn encode<W: Write + Seek>(&self, w: &mut Writer<W>, arena: &Arena) -> Result<()> {
        w.write_u8(self.id.as_u8())?;
        w.write_u8(self.picture_id)?;
        w.write_u8(self.flags.bits())?;
        write_str(w, arena, self.name)?;
        write_array(w, arena, self.categories)?;
        Ok(())
    }
}
