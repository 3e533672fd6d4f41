use super::{
    read_array, read_str, write_array, write_str, Reader, Result, TableRecord, Writer,
    RELATIONSHIPS_CHUNK, RELATIONSHIP_MATCHES_CHUNK,
};
use crate::keys::{RelationshipId, RelationshipMatchId};
use crate::records::{Relationship, RelationshipMatch};
use crate::version::Version;
use refdb_arena::Arena;
use refdb_chunk::ChunkId;
use std::io::{Read, Seek, Write};

impl TableRecord for Relationship {
    const CHUNK_ID: ChunkId = RELATIONSHIPS_CHUNK;
    const MIN_WIRE_SIZE: u64 = 8;

    fn decode<R: Read + Seek>(
        r: &mut Reader<R>,
        arena: &mut Arena,
        _version: Version,
    ) -> Result<Self> {
        Ok(Self {
            id: RelationshipId::new(r.read_u32()?),
            name: read_str(r, arena, "relationship name")?,
        })
    }

    fn encode<W: Write + Seek>(&self, w: &mut Writer<W>, arena: &Arena) -> Result<()> {
        w.write_u32(self.id.as_u32())?;
        write_str(w, arena, self.name)
    }
}

impl TableRecord for RelationshipMatch {
    const CHUNK_ID: ChunkId = RELATIONSHIP_MATCHES_CHUNK;
    const MIN_WIRE_SIZE: u64 = 10;

    fn decode<R: Read + Seek>(
        r: &mut Reader<R>,
        arena: &mut Arena,
        _version: Version,
    ) -> Result<Self> {
        Ok(Self {
            id: RelationshipMatchId::new(r.read_u16()?),
            relationship: RelationshipId::new(r.read_u32()?),
            items: read_array(r, arena)?,
        })
    }

    fn encode<W: Write + Seek>(&self, w: &mut Writer<W>, arena: &Arena) -> Result<()> {
        w.write_u16(self.id.as_u16())?;
        w.write_u32(self.relationship.as_u32())?;
        write_array(w, arena, self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::{decode_table, encode_one};
    use super::*;

    #[test]
    fn match_items() {
        let mut arena = Arena::new();
        let m = RelationshipMatch {
            id: RelationshipMatchId::new(9),
            relationship: RelationshipId::new(2),
            items: arena.alloc_slice(&[0u32, 4]),
        };
        let decoded: Vec<RelationshipMatch> =
            decode_table(encode_one(&m, &arena), &mut arena).unwrap();
        assert_eq!(decoded[0].id, m.id);
        assert_eq!(decoded[0].relationship, m.relationship);
        assert_eq!(decoded[0].items(&arena).collect::<Vec<_>>(), vec![0, 4]);
    }
}
