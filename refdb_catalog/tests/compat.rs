//! Hand-assembled containers in older layouts, as earlier releases wrote them.

use pretty_assertions::assert_eq;
use refdb_catalog::codec::{
    CATEGORIES_CHUNK, COLORS_CHUNK, COLOR_CHANGELOG_CHUNK, DATABASE_CHUNK, ITEMS_CHUNK,
    ITEM_CHANGELOG_CHUNK, ITEM_TYPES_CHUNK, RELATIONSHIPS_CHUNK, RELATIONSHIP_MATCHES_CHUNK,
};
use refdb_catalog::{
    Catalog, CategoryId, ColorId, FormatError, ItemTypeId, RelationshipId, RelationshipMatchId,
    Version,
};
use refdb_chunk::{ChunkId, ChunkWriter};
use std::io::Cursor;

const UNIX_EPOCH_JULIAN_DAY: u32 = 2_440_588;

type W = ChunkWriter<Cursor<Vec<u8>>>;

fn part() -> ItemTypeId {
    ItemTypeId::new(b'P').unwrap()
}

fn writer() -> W {
    ChunkWriter::new(Cursor::new(Vec::new()))
}

fn finish(w: W) -> Vec<u8> {
    w.finish().unwrap().into_inner()
}

fn u32_array(w: &mut W, values: &[u32]) {
    w.write_u32(values.len() as u32).unwrap();
    for v in values {
        w.write_u32(*v).unwrap();
    }
}

fn table(w: &mut W, id: ChunkId, version: Version, count: u32, body: impl FnOnce(&mut W)) {
    w.start_chunk(id, version.as_u32()).unwrap();
    w.write_u32(count).unwrap();
    body(w);
    w.end_chunk().unwrap();
}

fn color(w: &mut W, version: Version, id: u32, name: &str) {
    w.write_u32(id).unwrap();
    w.write_str(name).unwrap();
    w.write_i32(id as i32 + 100).unwrap();
    w.write_u32(0x00ff_ffff).unwrap();
    w.write_u32(1).unwrap();
    w.write_f32(0.5).unwrap();
    w.write_u16(1958).unwrap();
    w.write_u16(2024).unwrap();
    if version >= Version::V9 {
        w.write_u32(0x0033_3333).unwrap();
        w.write_u8(200).unwrap();
    }
}

fn colors(w: &mut W, version: Version) {
    table(w, COLORS_CHUNK, version, 2, |w| {
        color(w, version, 11, "Black");
        color(w, version, 1, "White");
    });
}

fn categories(w: &mut W, version: Version) {
    table(w, CATEGORIES_CHUNK, version, 1, |w| {
        w.write_u32(5).unwrap();
        w.write_str("Brick").unwrap();
        if version >= Version::V10 {
            w.write_u16(1949).unwrap();
            w.write_u16(2024).unwrap();
        }
    });
}

fn item_types(w: &mut W, version: Version) {
    table(w, ITEM_TYPES_CHUNK, version, 1, |w| {
        w.write_u8(b'P').unwrap();
        w.write_u8(b'P').unwrap();
        w.write_u8(0).unwrap();
        w.write_str("Part").unwrap();
        u32_array(w, &[5]);
    });
}

fn item(w: &mut W, version: Version, id: &str, name: &str, known_colors: &[u32], matches: &[u16]) {
    w.write_str(id).unwrap();
    w.write_str(name).unwrap();
    w.write_u8(b'P').unwrap();
    w.write_u32(5).unwrap();
    w.write_u32(1).unwrap();
    w.write_f32(2.32).unwrap();
    w.write_u16(1958).unwrap();
    w.write_u16(2024).unwrap();
    if version <= Version::V7 {
        // last inventory update, dropped in V8
        w.write_i64(1_234_567).unwrap();
    }
    u32_array(w, known_colors);
    if version >= Version::V8 {
        w.write_str("").unwrap();
    }
    if version >= Version::V9 {
        w.write_u32(matches.len() as u32).unwrap();
        for m in matches {
            w.write_u16(*m).unwrap();
        }
    }
    if version >= Version::V10 {
        // no dimensions
        w.write_u32(0).unwrap();
    }
}

fn items(w: &mut W, version: Version) {
    table(w, ITEMS_CHUNK, version, 2, |w| {
        // deliberately out of order
        item(w, version, "3003", "Brick 2 x 2", &[1], &[7]);
        item(w, version, "3001", "Brick 2 x 4", &[1, 11, 99], &[7]);
    });
}

fn changelogs(w: &mut W, version: Version) {
    table(w, ITEM_CHANGELOG_CHUNK, version, 1, |w| {
        w.write_u32(40).unwrap();
        w.write_u32(UNIX_EPOCH_JULIAN_DAY + 10).unwrap();
        w.write_u8(b'P').unwrap();
        w.write_str("3001old").unwrap();
        w.write_u8(b'P').unwrap();
        w.write_str("3001").unwrap();
    });
    table(w, COLOR_CHANGELOG_CHUNK, version, 1, |w| {
        w.write_u32(41).unwrap();
        w.write_u32(UNIX_EPOCH_JULIAN_DAY + 11).unwrap();
        w.write_u32(1).unwrap();
        w.write_u32(11).unwrap();
    });
}

fn v6_container() -> Vec<u8> {
    let v = Version::V6;
    let mut w = writer();
    w.start_chunk(DATABASE_CHUNK, v.as_u32()).unwrap();
    colors(&mut w, v);
    categories(&mut w, v);
    item_types(&mut w, v);
    items(&mut w, v);
    changelogs(&mut w, v);
    w.end_chunk().unwrap();
    // a trailing top-level chunk nobody knows about
    w.start_chunk(ChunkId::new(b"ZZZZ"), 1).unwrap();
    w.write_u64(0xdead_beef).unwrap();
    w.end_chunk().unwrap();
    finish(w)
}

fn v9_container() -> Vec<u8> {
    let v = Version::V9;
    let mut w = writer();
    w.start_chunk(DATABASE_CHUNK, v.as_u32()).unwrap();
    colors(&mut w, v);
    categories(&mut w, v);
    // unknown child chunk between tables
    w.start_chunk(ChunkId::new(b"XTRA"), 99).unwrap();
    w.write_str("from the future").unwrap();
    w.end_chunk().unwrap();
    item_types(&mut w, v);
    items(&mut w, v);
    changelogs(&mut w, v);
    table(&mut w, RELATIONSHIPS_CHUNK, v, 1, |w| {
        w.write_u32(3).unwrap();
        w.write_str("Pairs with").unwrap();
    });
    table(&mut w, RELATIONSHIP_MATCHES_CHUNK, v, 1, |w| {
        w.write_u16(7).unwrap();
        w.write_u32(3).unwrap();
        // item indices in file order: 3003, 3001
        u32_array(w, &[0, 1]);
    });
    w.end_chunk().unwrap();
    finish(w)
}

#[test]
fn v6_loads_with_defaults() {
    let catalog = Catalog::from_bytes(&v6_container()).unwrap();
    let arena = catalog.arena();

    let black = catalog.color(ColorId::new(11)).unwrap();
    assert_eq!(black.name(arena), "Black");
    assert_eq!(black.ldraw_id, 111);
    assert_eq!(black.ldraw_edge_rgb, 0);
    assert_eq!(black.luminance, 0);

    let ids: Vec<_> = catalog.items().iter().map(|i| i.id(arena)).collect();
    assert_eq!(ids, vec!["3001", "3003"]);
    let brick = catalog.item(part(), "3001").unwrap();
    assert_eq!(brick.category, CategoryId::new(5));
    // 99 is not a known color
    assert_eq!(
        brick.known_colors(arena).collect::<Vec<_>>(),
        vec![ColorId::new(1), ColorId::new(11)]
    );
    assert_eq!(brick.alternate_ids(arena), "");
    assert_eq!(brick.relationship_matches(arena).count(), 0);
    assert_eq!(brick.dimensions(arena).len(), 0);

    let entry = catalog.item_changelog()[0];
    assert_eq!(entry.date.timestamp_millis(), 10 * 86_400_000);
    assert_eq!(
        catalog.resolve_item_change(part(), "3001old"),
        Some((part(), "3001"))
    );
    assert_eq!(
        catalog.resolve_color_change(ColorId::new(1)),
        Some(ColorId::new(11))
    );

    assert!(catalog.relationships().is_empty());
    assert!(catalog.api_keys().is_empty());
    assert_eq!(catalog.consistency_report().total(), 1);
}

#[test]
fn v9_relationships_follow_item_order() {
    let catalog = Catalog::from_bytes(&v9_container()).unwrap();
    let arena = catalog.arena();

    let white = catalog.color(ColorId::new(1)).unwrap();
    assert_eq!(white.ldraw_edge_rgb, 0x0033_3333);
    assert_eq!(white.luminance, 200);

    let rel = catalog.relationship(RelationshipId::new(3)).unwrap();
    assert_eq!(rel.name(arena), "Pairs with");

    let matched: Vec<&str> = catalog
        .relationship_match_items(RelationshipMatchId::new(7))
        .map(|i| i.id(arena))
        .collect();
    let mut sorted = matched.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec!["3001", "3003"]);

    // indices were remapped to the sorted item table
    let m = catalog.relationship_match(RelationshipMatchId::new(7)).unwrap();
    for idx in m.items(arena) {
        let item = catalog.item_by_index(idx).unwrap();
        assert!(
            item.relationship_matches(arena)
                .any(|id| id == RelationshipMatchId::new(7))
        );
    }
}

#[test]
fn legacy_files_convert_to_latest() {
    for bytes in [v6_container(), v9_container()] {
        let legacy = Catalog::from_bytes(&bytes).unwrap();
        let latest = legacy.to_bytes().unwrap();
        assert_eq!(&latest[4..8], &Version::LATEST.as_u32().to_le_bytes());

        let reloaded = Catalog::from_bytes(&latest).unwrap();
        assert_eq!(reloaded.items().len(), legacy.items().len());
        assert_eq!(reloaded.colors().len(), legacy.colors().len());
        assert_eq!(
            reloaded.resolve_item_change(part(), "3001old"),
            Some((part(), "3001"))
        );
        assert_eq!(reloaded.to_bytes().unwrap(), latest);
    }
}

fn mandatory_only(skip: Option<ChunkId>, duplicate: Option<ChunkId>) -> Vec<u8> {
    let v = Version::V12;
    let mut w = writer();
    w.start_chunk(DATABASE_CHUNK, v.as_u32()).unwrap();
    let tables: [(ChunkId, fn(&mut W, Version)); 4] = [
        (COLORS_CHUNK, colors),
        (CATEGORIES_CHUNK, categories),
        (ITEM_TYPES_CHUNK, item_types),
        (ITEMS_CHUNK, items),
    ];
    for (id, write) in tables {
        if Some(id) == skip {
            continue;
        }
        write(&mut w, v);
        if Some(id) == duplicate {
            write(&mut w, v);
        }
    }
    w.end_chunk().unwrap();
    finish(w)
}

#[test]
fn mandatory_tables() {
    Catalog::from_bytes(&mandatory_only(None, None)).unwrap();

    let err = Catalog::from_bytes(&mandatory_only(Some(ITEMS_CHUNK), None)).unwrap_err();
    assert!(
        matches!(err, FormatError::MissingTable(id) if id == ITEMS_CHUNK),
        "got {err:?}"
    );

    let err = Catalog::from_bytes(&mandatory_only(None, Some(COLORS_CHUNK))).unwrap_err();
    assert!(
        matches!(err, FormatError::DuplicateTable(id) if id == COLORS_CHUNK),
        "got {err:?}"
    );
}

#[test]
fn rejects_foreign_and_unsupported_containers() {
    let mut w = writer();
    w.start_chunk(ChunkId::new(b"JUNK"), 12).unwrap();
    w.end_chunk().unwrap();
    let err = Catalog::from_bytes(&finish(w)).unwrap_err();
    assert!(matches!(err, FormatError::BadMagic { .. }), "got {err:?}");

    let mut bytes = mandatory_only(None, None);
    bytes[4..8].copy_from_slice(&5u32.to_le_bytes());
    let err = Catalog::from_bytes(&bytes).unwrap_err();
    assert!(
        matches!(err, FormatError::UnsupportedVersion { version: 5 }),
        "got {err:?}"
    );

    // a table tagged with a version older than anything supported
    let mut w = writer();
    w.start_chunk(DATABASE_CHUNK, 12).unwrap();
    table(&mut w, COLORS_CHUNK, Version::V12, 0, |_| {});
    w.end_chunk().unwrap();
    let mut bytes = finish(w);
    // COLR header starts right after the RCAT header
    bytes[20..24].copy_from_slice(&4u32.to_le_bytes());
    let err = Catalog::from_bytes(&bytes).unwrap_err();
    assert!(
        matches!(err, FormatError::UnsupportedVersion { version: 4 }),
        "got {err:?}"
    );

    assert!(Catalog::from_bytes(&[]).is_err());
}

#[test]
fn newer_containers_keep_their_known_tables() {
    let v = Version::V12;
    let mut w = writer();
    w.start_chunk(DATABASE_CHUNK, 13).unwrap();
    colors(&mut w, v);
    categories(&mut w, v);
    // a table this release has never heard of
    w.start_chunk(ChunkId::new(b"NEW!"), 13).unwrap();
    w.write_u32(0xdead_beef).unwrap();
    w.end_chunk().unwrap();
    item_types(&mut w, v);
    items(&mut w, v);
    // a known table in a layout from the future
    w.start_chunk(RELATIONSHIPS_CHUNK, 13).unwrap();
    w.write_u32(1).unwrap();
    w.write_u64(u64::MAX).unwrap();
    w.end_chunk().unwrap();
    w.end_chunk().unwrap();

    let catalog = Catalog::from_bytes(&finish(w)).unwrap();
    assert_eq!(catalog.colors().len(), 2);
    assert_eq!(catalog.items().len(), 2);
    assert!(catalog.relationships().is_empty());

    // without its item table a newer container is unusable
    let mut bytes = mandatory_only(Some(ITEMS_CHUNK), None);
    bytes[4..8].copy_from_slice(&13u32.to_le_bytes());
    let err = Catalog::from_bytes(&bytes).unwrap_err();
    assert!(
        matches!(err, FormatError::MissingTable(id) if id == ITEMS_CHUNK),
        "got {err:?}"
    );
}

#[test]
fn corrupt_sizes_are_errors() {
    // record count larger than the table
    let mut w = writer();
    w.start_chunk(DATABASE_CHUNK, 12).unwrap();
    table(&mut w, CATEGORIES_CHUNK, Version::V12, 1_000_000, |w| {
        w.write_u32(1).unwrap();
        w.write_str("only one").unwrap();
    });
    w.end_chunk().unwrap();
    let err = Catalog::from_bytes(&finish(w)).unwrap_err();
    assert!(
        matches!(err, FormatError::Chunk(refdb_chunk::Error::Truncated { .. })),
        "got {err:?}"
    );

    // container claims more bytes than the file has
    let mut bytes = mandatory_only(None, None);
    let len = bytes.len() as u64;
    bytes[8..16].copy_from_slice(&(len * 2).to_le_bytes());
    let err = Catalog::from_bytes(&bytes).unwrap_err();
    assert!(
        matches!(
            err,
            FormatError::Chunk(refdb_chunk::Error::ChunkOverrun { .. })
        ),
        "got {err:?}"
    );

    // every truncation of a valid file fails cleanly
    let bytes = v9_container();
    for len in (0..bytes.len()).step_by(7) {
        assert!(Catalog::from_bytes(&bytes[..len]).is_err(), "len {len}");
    }
}
