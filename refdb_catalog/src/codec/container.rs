use super::{
    read_table, write_table, Reader, Result, Writer, API_KEYS_CHUNK, API_QUIRKS_CHUNK,
    CATEGORIES_CHUNK, COLORS_CHUNK, COLOR_CHANGELOG_CHUNK, DATABASE_CHUNK, ITEMS_CHUNK,
    ITEM_CHANGELOG_CHUNK, ITEM_TYPES_CHUNK, RELATIONSHIPS_CHUNK, RELATIONSHIP_MATCHES_CHUNK,
};
use crate::builder::CatalogBuilder;
use crate::catalog::Catalog;
use crate::error::FormatError;
use crate::version::Version;
use refdb_chunk::ChunkId;
use std::io::{Read, Seek, Write};
use tracing::debug;

const TABLE_CHUNKS: [ChunkId; 10] = [
    COLORS_CHUNK,
    CATEGORIES_CHUNK,
    ITEM_TYPES_CHUNK,
    ITEMS_CHUNK,
    ITEM_CHANGELOG_CHUNK,
    COLOR_CHANGELOG_CHUNK,
    RELATIONSHIPS_CHUNK,
    RELATIONSHIP_MATCHES_CHUNK,
    API_KEYS_CHUNK,
    API_QUIRKS_CHUNK,
];

const MANDATORY_TABLES: [ChunkId; 4] = [
    COLORS_CHUNK,
    CATEGORIES_CHUNK,
    ITEM_TYPES_CHUNK,
    ITEMS_CHUNK,
];

/// Decode a whole database container into a builder, returning the container's version tag.
///
/// Tables are decoded under their own chunk versions; unknown chunks at any level are skipped.
/// A container written by a newer release is accepted: its tables tagged with a version newer
/// than [`Version::LATEST`] are skipped like unknown chunks, so only a missing mandatory table
/// makes it unreadable.
pub(crate) fn decode_container<R: Read + Seek>(input: R) -> Result<(u32, CatalogBuilder)> {
    let mut r = Reader::new(input)?;

    let header = r.start_chunk()?;
    if header.id != DATABASE_CHUNK {
        return Err(FormatError::BadMagic { found: header.id });
    }
    let version = header.version;
    if version < Version::OLDEST_STILL_SUPPORTED.as_u32() {
        return Err(FormatError::UnsupportedVersion { version });
    }

    let mut builder = CatalogBuilder::new();
    let mut seen: Vec<ChunkId> = Vec::with_capacity(16);

    while r.has_more() {
        let table = r.start_chunk()?;
        if TABLE_CHUNKS.contains(&table.id) {
            if table.version > Version::LATEST.as_u32() {
                debug!(
                    chunk = %table.id,
                    version = table.version,
                    "skipping table written by a newer release"
                );
                r.end_chunk()?;
                continue;
            }
            if seen.contains(&table.id) {
                return Err(FormatError::DuplicateTable(table.id));
            }
            seen.push(table.id);
        }

        let v = || Version::try_from(table.version);
        let b = &mut builder;
        match table.id {
            COLORS_CHUNK => b.colors = read_table(&mut r, &mut b.arena, v()?)?,
            CATEGORIES_CHUNK => b.categories = read_table(&mut r, &mut b.arena, v()?)?,
            ITEM_TYPES_CHUNK => b.item_types = read_table(&mut r, &mut b.arena, v()?)?,
            ITEMS_CHUNK => b.items = read_table(&mut r, &mut b.arena, v()?)?,
            ITEM_CHANGELOG_CHUNK => b.item_changelog = read_table(&mut r, &mut b.arena, v()?)?,
            COLOR_CHANGELOG_CHUNK => {
                b.color_changelog = read_table(&mut r, &mut b.arena, v()?)?
            }
            RELATIONSHIPS_CHUNK => b.relationships = read_table(&mut r, &mut b.arena, v()?)?,
            RELATIONSHIP_MATCHES_CHUNK => {
                b.relationship_matches = read_table(&mut r, &mut b.arena, v()?)?
            }
            API_KEYS_CHUNK => b.api_keys = read_table(&mut r, &mut b.arena, v()?)?,
            API_QUIRKS_CHUNK => b.api_quirks = read_table(&mut r, &mut b.arena, v()?)?,
            _ => debug!(
                chunk = %table.id,
                version = table.version,
                size = table.size,
                "skipping unknown chunk"
            ),
        }
        r.end_chunk()?;
    }
    r.end_chunk()?;

    if let Some(missing) = MANDATORY_TABLES.into_iter().find(|id| !seen.contains(id)) {
        return Err(FormatError::MissingTable(missing));
    }

    Ok((version, builder))
}

/// Write `catalog` as a [`Version::LATEST`] container
pub(crate) fn encode_container<W: Write + Seek>(catalog: &Catalog, output: W) -> Result<W> {
    let arena = catalog.arena();
    let mut w = Writer::new(output);

    w.start_chunk(DATABASE_CHUNK, Version::LATEST.as_u32())?;
    write_table(&mut w, arena, catalog.colors())?;
    write_table(&mut w, arena, catalog.categories())?;
    write_table(&mut w, arena, catalog.item_types())?;
    write_table(&mut w, arena, catalog.items())?;
    write_table(&mut w, arena, catalog.item_changelog())?;
    write_table(&mut w, arena, catalog.color_changelog())?;
    write_table(&mut w, arena, catalog.relationships())?;
    write_table(&mut w, arena, catalog.relationship_matches())?;
    write_table(&mut w, arena, catalog.api_keys())?;
    write_table(&mut w, arena, catalog.api_quirks())?;
    w.end_chunk()?;

    Ok(w.finish()?)
}
