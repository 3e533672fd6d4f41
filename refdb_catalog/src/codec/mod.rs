//! Binary encoding of the catalog tables.
//!
//! Every table is a chunk whose version tag selects the record layout and whose payload is a
//! `u32` record count followed by the records. Records decode straight into the arena of the
//! generation being built; nothing is allocated for a count the chunk cannot hold.

use crate::error::FormatError;
use crate::keys::ItemTypeId;
use crate::version::Version;
use byteorder::LittleEndian;
use refdb_arena::{Arena, ArenaSlice, ArenaStr, ArenaValue};
use refdb_chunk::{ChunkId, ChunkReader, ChunkWriter};
use refdb_time::Time;
use std::io::{Read, Seek, Write};

mod api;
mod category;
mod changelog;
mod color;
mod container;
mod item;
mod item_type;
mod relationship;

pub(crate) use container::{decode_container, encode_container};

pub(crate) type Reader<R> = ChunkReader<R, LittleEndian>;
pub(crate) type Writer<W> = ChunkWriter<W, LittleEndian>;

type Result<T, E = FormatError> = std::result::Result<T, E>;

pub const DATABASE_CHUNK: ChunkId = ChunkId::new(b"RCAT");
pub const COLORS_CHUNK: ChunkId = ChunkId::new(b"COLR");
pub const CATEGORIES_CHUNK: ChunkId = ChunkId::new(b"CATG");
pub const ITEM_TYPES_CHUNK: ChunkId = ChunkId::new(b"ITYP");
pub const ITEMS_CHUNK: ChunkId = ChunkId::new(b"ITEM");
pub const ITEM_CHANGELOG_CHUNK: ChunkId = ChunkId::new(b"ICHG");
pub const COLOR_CHANGELOG_CHUNK: ChunkId = ChunkId::new(b"CCHG");
pub const RELATIONSHIPS_CHUNK: ChunkId = ChunkId::new(b"RELS");
pub const RELATIONSHIP_MATCHES_CHUNK: ChunkId = ChunkId::new(b"RMAT");
pub const API_KEYS_CHUNK: ChunkId = ChunkId::new(b"AKEY");
pub const API_QUIRKS_CHUNK: ChunkId = ChunkId::new(b"AQRK");

/// Julian day number of 1970-01-01
const JULIAN_DAY_UNIX_EPOCH: i64 = 2_440_588;
const MILLIS_PER_DAY: i64 = 86_400_000;

/// A record stored as one entry of a table chunk
pub(crate) trait TableRecord: Sized {
    const CHUNK_ID: ChunkId;

    /// Lower bound of the encoded size of one record, used to reject impossible counts
    const MIN_WIRE_SIZE: u64;

    fn decode<R: Read + Seek>(
        r: &mut Reader<R>,
        arena: &mut Arena,
        version: Version,
    ) -> Result<Self>;

    /// Encode in the [`Version::LATEST`] layout
    fn encode<W: Write + Seek>(&self, w: &mut Writer<W>, arena: &Arena) -> Result<()>;
}

/// Decode the payload of an already opened table chunk
pub(crate) fn read_table<T: TableRecord, R: Read + Seek>(
    r: &mut Reader<R>,
    arena: &mut Arena,
    version: Version,
) -> Result<Vec<T>> {
    let count = r.read_u32()?;
    check_count(r, count, T::MIN_WIRE_SIZE)?;
    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        records.push(T::decode(r, arena, version)?);
    }
    Ok(records)
}

pub(crate) fn write_table<T: TableRecord, W: Write + Seek>(
    w: &mut Writer<W>,
    arena: &Arena,
    records: &[T],
) -> Result<()> {
    let count = u32::try_from(records.len()).map_err(|_| FormatError::InvalidEnumerant {
        kind: "record count",
        value: u32::MAX,
    })?;
    w.start_chunk(T::CHUNK_ID, Version::LATEST.as_u32())?;
    w.write_u32(count)?;
    for record in records {
        record.encode(w, arena)?;
    }
    w.end_chunk()?;
    Ok(())
}

fn check_count<R: Read + Seek>(r: &Reader<R>, count: u32, element_size: u64) -> Result<()> {
    let needed = u64::from(count).saturating_mul(element_size);
    let available = r.remaining();
    if needed > available {
        return Err(FormatError::truncated(needed, available));
    }
    Ok(())
}

/// Fixed-size values that appear as array elements
pub(crate) trait WireValue: ArenaValue {
    const WIRE_SIZE: u64;

    fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self>;
    fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()>;
}

impl WireValue for u16 {
    const WIRE_SIZE: u64 = 2;

    fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        Ok(r.read_u16()?)
    }

    fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        Ok(w.write_u16(*self)?)
    }
}

impl WireValue for u32 {
    const WIRE_SIZE: u64 = 4;

    fn read<R: Read + Seek>(r: &mut Reader<R>) -> Result<Self> {
        Ok(r.read_u32()?)
    }

    fn write<W: Write + Seek>(&self, w: &mut Writer<W>) -> Result<()> {
        Ok(w.write_u32(*self)?)
    }
}

pub(crate) fn read_str<R: Read + Seek>(
    r: &mut Reader<R>,
    arena: &mut Arena,
    field: &'static str,
) -> Result<ArenaStr> {
    let len = r.read_u32()?;
    check_count(r, len, 1)?;
    let (range, buf) = arena.allocate(len as usize);
    r.read_exact(buf)?;
    arena
        .str_from_range(range)
        .ok_or(FormatError::InvalidUtf8 { field })
}

pub(crate) fn write_str<W: Write + Seek>(w: &mut Writer<W>, arena: &Arena, s: ArenaStr) -> Result<()> {
    Ok(w.write_str(arena.str(s))?)
}

pub(crate) fn read_array<T: WireValue, R: Read + Seek>(
    r: &mut Reader<R>,
    arena: &mut Arena,
) -> Result<ArenaSlice<T>> {
    let count = r.read_u32()?;
    check_count(r, count, T::WIRE_SIZE)?;
    let size = T::SIZE.max(1);
    let (range, buf) = arena.allocate(count as usize * T::SIZE);
    for out in buf.chunks_exact_mut(size) {
        T::read(r)?.store(out);
    }
    Ok(ArenaSlice::from_range(range))
}

pub(crate) fn write_array<T: WireValue, W: Write + Seek>(
    w: &mut Writer<W>,
    arena: &Arena,
    values: ArenaSlice<T>,
) -> Result<()> {
    w.write_u32(values.len() as u32)?;
    for v in arena.slice(values) {
        v.write(w)?;
    }
    Ok(())
}

/// Read an item type letter, rejecting anything that is not an upper-case ASCII letter
pub(crate) fn read_item_type<R: Read + Seek>(
    r: &mut Reader<R>,
    kind: &'static str,
) -> Result<ItemTypeId> {
    let value = r.read_u8()?;
    ItemTypeId::new(value).ok_or(FormatError::InvalidEnumerant {
        kind,
        value: u32::from(value),
    })
}

/// Like [`read_item_type`], but also accepts [`ItemTypeId::UNKNOWN`] as written for references
/// that were patched while building a generation
pub(crate) fn read_item_type_ref<R: Read + Seek>(
    r: &mut Reader<R>,
    kind: &'static str,
) -> Result<ItemTypeId> {
    let value = r.read_u8()?;
    if value == ItemTypeId::UNKNOWN.as_u8() {
        return Ok(ItemTypeId::UNKNOWN);
    }
    ItemTypeId::new(value).ok_or(FormatError::InvalidEnumerant {
        kind,
        value: u32::from(value),
    })
}

pub(crate) fn read_date<R: Read + Seek>(r: &mut Reader<R>, version: Version) -> Result<Time> {
    let millis = if version >= Version::V12 {
        r.read_i64()?
    } else {
        (i64::from(r.read_u32()?) - JULIAN_DAY_UNIX_EPOCH) * MILLIS_PER_DAY
    };
    Time::from_timestamp_millis(millis).ok_or(FormatError::InvalidTimestamp { value: millis })
}

pub(crate) fn write_date<W: Write + Seek>(w: &mut Writer<W>, date: Time) -> Result<()> {
    Ok(w.write_i64(date.timestamp_millis())?)
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use std::io::Cursor;

    /// Encode a single record in the latest layout, wrapped in its table chunk
    pub(crate) fn encode_one<T: TableRecord>(record: &T, arena: &Arena) -> Vec<u8> {
        let mut w = Writer::new(Cursor::new(Vec::new()));
        write_table(&mut w, arena, std::slice::from_ref(record)).unwrap();
        w.finish().unwrap().into_inner()
    }

    /// Decode a table chunk produced by [`encode_one`] or written by hand
    pub(crate) fn decode_table<T: TableRecord>(bytes: Vec<u8>, arena: &mut Arena) -> Result<Vec<T>> {
        let mut r = Reader::new(Cursor::new(bytes))?;
        let header = r.start_chunk()?;
        assert_eq!(header.id, T::CHUNK_ID);
        let version = Version::try_from(header.version)?;
        let records = read_table(&mut r, arena, version)?;
        r.end_chunk()?;
        Ok(records)
    }

    /// Start a hand-written table chunk of `count` records
    pub(crate) fn legacy_table(id: ChunkId, version: Version, count: u32) -> Writer<Cursor<Vec<u8>>> {
        let mut w = Writer::new(Cursor::new(Vec::new()));
        w.start_chunk(id, version.as_u32()).unwrap();
        w.write_u32(count).unwrap();
        w
    }

    pub(crate) fn finish(mut w: Writer<Cursor<Vec<u8>>>) -> Vec<u8> {
        w.end_chunk().unwrap();
        w.finish().unwrap().into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn julian_days_map_to_utc_midnight() {
        let mut w = Writer::new(Cursor::new(Vec::new()));
        w.write_u32(2_440_588).unwrap();
        w.write_u32(2_451_545).unwrap();
        let bytes = w.finish().unwrap().into_inner();

        let mut r = Reader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(read_date(&mut r, Version::V11).unwrap(), Time::UNIX_EPOCH);
        assert_eq!(
            read_date(&mut r, Version::V6).unwrap().to_rfc3339(),
            "2000-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn latest_dates_are_millis() {
        let mut w = Writer::new(Cursor::new(Vec::new()));
        let t = Time::from_timestamp_millis(1_650_000_000_042).unwrap();
        write_date(&mut w, t).unwrap();
        let bytes = w.finish().unwrap().into_inner();
        assert_eq!(bytes.len(), 8);

        let mut r = Reader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(read_date(&mut r, Version::V12).unwrap(), t);
    }

    #[test]
    fn oversized_array_count_fails_before_allocating() {
        let mut w = Writer::new(Cursor::new(Vec::new()));
        w.write_u32(u32::MAX).unwrap();
        w.write_u32(1).unwrap();
        let bytes = w.finish().unwrap().into_inner();

        let mut arena = Arena::new();
        let mut r = Reader::new(Cursor::new(bytes)).unwrap();
        let err = read_array::<u32, _>(&mut r, &mut arena).unwrap_err();
        assert!(matches!(
            err,
            FormatError::Chunk(refdb_chunk::Error::Truncated { available: 4, .. })
        ));
        assert_eq!(arena.allocated_bytes(), 0);
    }

    #[test]
    fn strings_must_be_utf8() {
        let mut w = Writer::new(Cursor::new(Vec::new()));
        w.write_u32(2).unwrap();
        w.write_bytes(&[0xc3, 0x28]).unwrap();
        let bytes = w.finish().unwrap().into_inner();

        let mut arena = Arena::new();
        let mut r = Reader::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            read_str(&mut r, &mut arena, "name"),
            Err(FormatError::InvalidUtf8 { field: "name" })
        ));
    }

    #[test]
    fn string_length_past_chunk_end() {
        let mut w = Writer::new(Cursor::new(Vec::new()));
        w.write_u32(100).unwrap();
        w.write_bytes(b"short").unwrap();
        let bytes = w.finish().unwrap().into_inner();

        let mut arena = Arena::new();
        let mut r = Reader::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            read_str(&mut r, &mut arena, "name"),
            Err(FormatError::Chunk(refdb_chunk::Error::Truncated {
                needed: 100,
                available: 5
            }))
        ));
    }
}
