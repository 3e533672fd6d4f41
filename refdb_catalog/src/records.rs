//! In-memory records, one type per table.
//!
//! Records are small `Copy` values; every string and list they carry is a view into the arena of
//! the catalog generation that holds them and is resolved through that arena.

use crate::keys::{
    CategoryId, ColorId, ColorType, ItemTypeFlags, ItemTypeId, RelationshipId,
    RelationshipMatchId,
};
use refdb_arena::{Arena, ArenaIter, ArenaSlice, ArenaStr, ArenaValue};
use refdb_time::Time;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Color {
    pub id: ColorId,
    pub name: ArenaStr,
    /// `-1` if the color has no LDraw counterpart
    pub ldraw_id: i32,
    pub rgb: u32,
    pub type_flags: ColorType,
    pub popularity: f32,
    pub year_from: u16,
    pub year_to: u16,
    pub ldraw_edge_rgb: u32,
    pub luminance: u8,
}

impl Color {
    pub fn new(id: ColorId, name: ArenaStr) -> Self {
        Self {
            id,
            name,
            ldraw_id: -1,
            rgb: 0,
            type_flags: ColorType::default(),
            popularity: 0.0,
            year_from: 0,
            year_to: 0,
            ldraw_edge_rgb: 0,
            luminance: 0,
        }
    }

    pub fn name<'a>(&self, arena: &'a Arena) -> &'a str {
        arena.str(self.name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub name: ArenaStr,
    pub year_from: u16,
    pub year_to: u16,
}

impl Category {
    pub fn new(id: CategoryId, name: ArenaStr) -> Self {
        Self {
            id,
            name,
            year_from: 0,
            year_to: 0,
        }
    }

    pub fn name<'a>(&self, arena: &'a Arena) -> &'a str {
        arena.str(self.name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ItemType {
    pub id: ItemTypeId,
    /// Item type whose pictures are used for this one
    pub picture_id: u8,
    pub flags: ItemTypeFlags,
    pub name: ArenaStr,
    pub categories: ArenaSlice<u32>,
}

impl ItemType {
    pub fn new(id: ItemTypeId, name: ArenaStr) -> Self {
        Self {
            id,
            picture_id: id.as_u8(),
            flags: ItemTypeFlags::default(),
            name,
            categories: ArenaSlice::EMPTY,
        }
    }

    pub fn name<'a>(&self, arena: &'a Arena) -> &'a str {
        arena.str(self.name)
    }

    pub fn categories<'a>(&self, arena: &'a Arena) -> impl Iterator<Item = CategoryId> + 'a {
        arena.slice(self.categories).map(CategoryId::new)
    }
}

/// Bounding box of an item in studs
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Dimensions {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl ArenaValue for Dimensions {
    const SIZE: usize = 12;

    fn load(bytes: &[u8]) -> Self {
        Self {
            x: f32::load(&bytes[0..4]),
            y: f32::load(&bytes[4..8]),
            z: f32::load(&bytes[8..12]),
        }
    }

    fn store(&self, out: &mut [u8]) {
        self.x.store(&mut out[0..4]);
        self.y.store(&mut out[4..8]);
        self.z.store(&mut out[8..12]);
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Item {
    pub id: ArenaStr,
    pub name: ArenaStr,
    pub item_type: ItemTypeId,
    pub category: CategoryId,
    pub default_color: ColorId,
    /// Grams, `0.0` if unknown
    pub weight: f32,
    pub year_from: u16,
    pub year_to: u16,
    pub known_colors: ArenaSlice<u32>,
    /// Comma separated ids this item is also known as
    pub alternate_ids: ArenaStr,
    pub relationship_matches: ArenaSlice<u16>,
    pub dimensions: ArenaSlice<Dimensions>,
}

impl Item {
    pub fn new(item_type: ItemTypeId, id: ArenaStr, name: ArenaStr) -> Self {
        Self {
            id,
            name,
            item_type,
            category: CategoryId::UNKNOWN,
            default_color: ColorId::NONE,
            weight: 0.0,
            year_from: 0,
            year_to: 0,
            known_colors: ArenaSlice::EMPTY,
            alternate_ids: ArenaStr::EMPTY,
            relationship_matches: ArenaSlice::EMPTY,
            dimensions: ArenaSlice::EMPTY,
        }
    }

    pub fn id<'a>(&self, arena: &'a Arena) -> &'a str {
        arena.str(self.id)
    }

    pub fn name<'a>(&self, arena: &'a Arena) -> &'a str {
        arena.str(self.name)
    }

    pub fn alternate_ids<'a>(&self, arena: &'a Arena) -> &'a str {
        arena.str(self.alternate_ids)
    }

    pub fn known_colors<'a>(&self, arena: &'a Arena) -> impl Iterator<Item = ColorId> + 'a {
        arena.slice(self.known_colors).map(ColorId::new)
    }

    pub fn relationship_matches<'a>(
        &self,
        arena: &'a Arena,
    ) -> impl Iterator<Item = RelationshipMatchId> + 'a {
        arena
            .slice(self.relationship_matches)
            .map(RelationshipMatchId::new)
    }

    pub fn dimensions<'a>(&self, arena: &'a Arena) -> ArenaIter<'a, Dimensions> {
        arena.slice(self.dimensions)
    }
}

/// An item that was renamed, merged or moved to another item type
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ItemChangeLogEntry {
    pub id: u32,
    pub date: Time,
    pub from_type: ItemTypeId,
    pub from_id: ArenaStr,
    pub to_type: ItemTypeId,
    pub to_id: ArenaStr,
}

impl ItemChangeLogEntry {
    pub fn from_id<'a>(&self, arena: &'a Arena) -> &'a str {
        arena.str(self.from_id)
    }

    pub fn to_id<'a>(&self, arena: &'a Arena) -> &'a str {
        arena.str(self.to_id)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ColorChangeLogEntry {
    pub id: u32,
    pub date: Time,
    pub from_color: ColorId,
    pub to_color: ColorId,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: RelationshipId,
    pub name: ArenaStr,
}

impl Relationship {
    pub fn name<'a>(&self, arena: &'a Arena) -> &'a str {
        arena.str(self.name)
    }
}

/// A group of items that are related to each other through a [`Relationship`]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RelationshipMatch {
    pub id: RelationshipMatchId,
    pub relationship: RelationshipId,
    /// Indices into the item table of the owning generation
    pub items: ArenaSlice<u32>,
}

impl RelationshipMatch {
    pub fn items<'a>(&self, arena: &'a Arena) -> ArenaIter<'a, u32> {
        arena.slice(self.items)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub id: ArenaStr,
    pub key: ArenaStr,
}

impl ApiKey {
    pub fn id<'a>(&self, arena: &'a Arena) -> &'a str {
        arena.str(self.id)
    }

    pub fn key<'a>(&self, arena: &'a Arena) -> &'a str {
        arena.str(self.key)
    }
}
