use crate::catalog::Catalog;
use crate::consistency::{ConsistencyIssue, ConsistencyReport};
use crate::keys::{
    ApiQuirk, CategoryId, ColorId, ItemTypeId, RelationshipId, RelationshipMatchId,
};
use crate::records::{
    ApiKey, Category, Color, ColorChangeLogEntry, Item, ItemChangeLogEntry, ItemType,
    Relationship, RelationshipMatch,
};
use refdb_arena::{Arena, ArenaSlice, ArenaStr, ArenaValue};
use refdb_time::Time;
use std::fmt::Display;
use tracing::{debug, warn};

/// Collects the tables of one catalog generation and turns them into an immutable [`Catalog`].
///
/// Records can be added in any order and may reference each other freely; [`Self::finish`]
/// sorts every table, drops duplicate keys and repairs dangling references.
///
/// Relationship match item lists hold indices into the item table in the order items were
/// added (or decoded); they are remapped when sorting moves items around.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    pub(crate) arena: Arena,
    pub(crate) colors: Vec<Color>,
    pub(crate) categories: Vec<Category>,
    pub(crate) item_types: Vec<ItemType>,
    pub(crate) items: Vec<Item>,
    pub(crate) item_changelog: Vec<ItemChangeLogEntry>,
    pub(crate) color_changelog: Vec<ColorChangeLogEntry>,
    pub(crate) relationships: Vec<Relationship>,
    pub(crate) relationship_matches: Vec<RelationshipMatch>,
    pub(crate) api_keys: Vec<ApiKey>,
    pub(crate) api_quirks: Vec<ApiQuirk>,
}

fn push<T>(records: &mut Vec<T>, record: T) -> &mut T {
    let index = records.len();
    records.push(record);
    &mut records[index]
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build into an arena with non-default block size
    pub fn with_arena(arena: Arena) -> Self {
        Self {
            arena,
            ..Default::default()
        }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn alloc_str(&mut self, s: &str) -> ArenaStr {
        self.arena.alloc_str(s)
    }

    pub fn alloc_slice<T: ArenaValue>(&mut self, values: &[T]) -> ArenaSlice<T> {
        self.arena.alloc_slice(values)
    }

    pub fn add_color(&mut self, id: ColorId, name: &str) -> &mut Color {
        let name = self.arena.alloc_str(name);
        push(&mut self.colors, Color::new(id, name))
    }

    pub fn add_category(&mut self, id: CategoryId, name: &str) -> &mut Category {
        let name = self.arena.alloc_str(name);
        push(&mut self.categories, Category::new(id, name))
    }

    pub fn add_item_type(&mut self, id: ItemTypeId, name: &str) -> &mut ItemType {
        let name = self.arena.alloc_str(name);
        push(&mut self.item_types, ItemType::new(id, name))
    }

    /// Add an item. Its index for relationship matches is the number of items added before it.
    pub fn add_item(&mut self, item_type: ItemTypeId, id: &str, name: &str) -> &mut Item {
        let id = self.arena.alloc_str(id);
        let name = self.arena.alloc_str(name);
        push(&mut self.items, Item::new(item_type, id, name))
    }

    pub fn add_item_change(
        &mut self,
        id: u32,
        date: Time,
        from: (ItemTypeId, &str),
        to: (ItemTypeId, &str),
    ) -> &mut ItemChangeLogEntry {
        let from_id = self.arena.alloc_str(from.1);
        let to_id = self.arena.alloc_str(to.1);
        push(
            &mut self.item_changelog,
            ItemChangeLogEntry {
                id,
                date,
                from_type: from.0,
                from_id,
                to_type: to.0,
                to_id,
            },
        )
    }

    pub fn add_color_change(
        &mut self,
        id: u32,
        date: Time,
        from_color: ColorId,
        to_color: ColorId,
    ) -> &mut ColorChangeLogEntry {
        push(
            &mut self.color_changelog,
            ColorChangeLogEntry {
                id,
                date,
                from_color,
                to_color,
            },
        )
    }

    pub fn add_relationship(&mut self, id: RelationshipId, name: &str) -> &mut Relationship {
        let name = self.arena.alloc_str(name);
        push(&mut self.relationships, Relationship { id, name })
    }

    pub fn add_relationship_match(
        &mut self,
        id: RelationshipMatchId,
        relationship: RelationshipId,
        items: &[u32],
    ) -> &mut RelationshipMatch {
        let items = self.arena.alloc_slice(items);
        push(
            &mut self.relationship_matches,
            RelationshipMatch {
                id,
                relationship,
                items,
            },
        )
    }

    pub fn add_api_key(&mut self, id: &str, key: &str) -> &mut ApiKey {
        let id = self.arena.alloc_str(id);
        let key = self.arena.alloc_str(key);
        push(&mut self.api_keys, ApiKey { id, key })
    }

    pub fn add_api_quirk(&mut self, quirk: ApiQuirk) {
        self.api_quirks.push(quirk);
    }

    /// Sort, deduplicate and repair the tables, then build the lookup indices
    pub fn finish(self) -> Catalog {
        let Self {
            mut arena,
            mut colors,
            mut categories,
            mut item_types,
            mut items,
            mut item_changelog,
            mut color_changelog,
            mut relationships,
            mut relationship_matches,
            mut api_keys,
            mut api_quirks,
        } = self;
        let mut report = ConsistencyReport::default();

        sort_dedup(&mut colors, "colors", &mut report, |c| c.id);
        sort_dedup(&mut categories, "categories", &mut report, |c| c.id);
        sort_dedup(&mut item_types, "item types", &mut report, |t| t.id);
        sort_dedup(&mut relationships, "relationships", &mut report, |r| r.id);
        sort_dedup(
            &mut relationship_matches,
            "relationship matches",
            &mut report,
            |m| m.id,
        );
        sort_dedup(&mut item_changelog, "item change log", &mut report, |e| e.id);
        sort_dedup(&mut color_changelog, "color change log", &mut report, |e| e.id);
        sort_dedup(&mut api_keys, "api keys", &mut report, |k| arena.str(k.id));
        api_quirks.sort();
        api_quirks.dedup();

        let known_type = |t: ItemTypeId| {
            t == ItemTypeId::UNKNOWN || item_types.binary_search_by_key(&t, |it| it.id).is_ok()
        };
        let mut items = sort_items(
            &mut arena,
            items,
            &relationship_matches,
            &mut report,
            known_type,
        );
        for item in &mut items {
            if !known_type(item.item_type) {
                report.record(ConsistencyIssue::UnknownItemType {
                    item: item_label(&arena, item),
                    item_type: item.item_type,
                });
                item.item_type = ItemTypeId::UNKNOWN;
            }
        }

        let tables = Tables {
            colors: &colors,
            categories: &categories,
            relationship_matches: &relationship_matches,
        };
        tables.repair_items(&mut arena, &mut items, &mut report);
        tables.repair_item_types(&mut arena, &mut item_types, &mut report);
        repair_relationship_matches(
            &mut arena,
            &mut relationship_matches,
            &relationships,
            items.len(),
            &mut report,
        );

        let item_change_index = item_change_index(&arena, &item_changelog);
        let color_change_index = color_change_index(&color_changelog);

        if !report.is_empty() {
            warn!(
                issues = report.total(),
                first = %report.issues()[0],
                "repaired inconsistent catalog references"
            );
        }
        debug!(
            items = items.len(),
            colors = colors.len(),
            arena_bytes = arena.allocated_bytes(),
            "built catalog generation"
        );

        Catalog {
            arena,
            colors,
            categories,
            item_types,
            items,
            item_changelog,
            color_changelog,
            relationships,
            relationship_matches,
            api_keys,
            api_quirks,
            item_change_index,
            color_change_index,
            report,
        }
    }
}

fn item_label(arena: &Arena, item: &Item) -> String {
    format!("{} {}", item.item_type, arena.str(item.id))
}

/// Identity of an item, used for duplicate detection
fn item_key<'a>(arena: &'a Arena, item: &Item) -> (ItemTypeId, &'a [u8]) {
    (item.item_type, arena.str(item.id).as_bytes())
}

/// Stable sort by key; later records with an already seen key are dropped and reported
fn sort_dedup<T, K, F>(
    records: &mut Vec<T>,
    table: &'static str,
    report: &mut ConsistencyReport,
    key: F,
) where
    K: Ord + Display,
    F: Fn(&T) -> K,
{
    records.sort_by(|a, b| key(a).cmp(&key(b)));
    records.dedup_by(|later, kept| {
        let k = key(later);
        let duplicate = k == key(kept);
        if duplicate {
            report.record(ConsistencyIssue::DuplicateKey {
                table,
                key: k.to_string(),
            });
        }
        duplicate
    });
}

/// Sort items by (item type, id), dropping duplicates, and rewrite relationship match item
/// indices to the new positions.
///
/// Items whose type is not `known` sort as [`ItemTypeId::UNKNOWN`], where they will end up once
/// patched. Duplicates are detected on the original type, so two distinct items that both lose
/// their type are kept.
fn sort_items(
    arena: &mut Arena,
    items: Vec<Item>,
    relationship_matches: &[RelationshipMatch],
    report: &mut ConsistencyReport,
    known: impl Fn(ItemTypeId) -> bool,
) -> Vec<Item> {
    let effective = |t: ItemTypeId| if known(t) { t } else { ItemTypeId::UNKNOWN };
    let sort_key = |item: &Item| {
        let (item_type, id) = item_key(arena, item);
        (effective(item_type), id, item_type)
    };
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| sort_key(&items[a]).cmp(&sort_key(&items[b])));

    // old index -> new index; duplicates resolve to the record that was kept
    let mut remap = vec![u32::MAX; items.len()];
    let mut sorted: Vec<Item> = Vec::with_capacity(items.len());
    for old in order {
        let item = items[old];
        if let Some(kept) = sorted.last() {
            if item_key(arena, kept) == item_key(arena, &item) {
                remap[old] = (sorted.len() - 1) as u32;
                report.record(ConsistencyIssue::DuplicateKey {
                    table: "items",
                    key: item_label(arena, &item),
                });
                continue;
            }
        }
        remap[old] = sorted.len() as u32;
        sorted.push(item);
    }

    let moved = remap
        .iter()
        .enumerate()
        .any(|(old, &new)| old as u32 != new);
    if moved {
        for m in relationship_matches {
            arena.map_slice(m.items, |old| {
                // out of range before sorting stays out of range
                remap.get(old as usize).copied().unwrap_or(old)
            });
        }
    }
    sorted
}

/// Sorted tables the remaining records are checked against
#[derive(Debug, Clone, Copy)]
struct Tables<'a> {
    colors: &'a [Color],
    categories: &'a [Category],
    relationship_matches: &'a [RelationshipMatch],
}

impl Tables<'_> {
    fn has_color(&self, id: ColorId) -> bool {
        self.colors.binary_search_by_key(&id, |c| c.id).is_ok()
    }

    fn has_category(&self, id: CategoryId) -> bool {
        self.categories.binary_search_by_key(&id, |c| c.id).is_ok()
    }

    fn has_relationship_match(&self, id: RelationshipMatchId) -> bool {
        self.relationship_matches
            .binary_search_by_key(&id, |m| m.id)
            .is_ok()
    }

    fn repair_items(&self, arena: &mut Arena, items: &mut [Item], report: &mut ConsistencyReport) {
        let mut dropped = Vec::new();
        for item in items {
            if item.category != CategoryId::UNKNOWN && !self.has_category(item.category) {
                report.record(ConsistencyIssue::UnknownCategory {
                    item: item_label(arena, item),
                    category: item.category,
                });
                item.category = CategoryId::UNKNOWN;
            }
            if item.default_color != ColorId::NONE && !self.has_color(item.default_color) {
                report.record(ConsistencyIssue::UnknownColor {
                    item: item_label(arena, item),
                    color: item.default_color,
                });
                item.default_color = ColorId::NONE;
            }

            arena.retain_slice(&mut item.known_colors, |c| {
                let keep = self.has_color(ColorId::new(c));
                if !keep {
                    dropped.push(("known colors", c));
                }
                keep
            });
            arena.retain_slice(&mut item.relationship_matches, |m| {
                let keep = self.has_relationship_match(RelationshipMatchId::new(m));
                if !keep {
                    dropped.push(("relationship matches", u32::from(m)));
                }
                keep
            });
            for (list, value) in dropped.drain(..) {
                report.record(ConsistencyIssue::DanglingListEntry {
                    owner: format!("item {}", item_label(arena, item)),
                    list,
                    value,
                });
            }
        }
    }

    fn repair_item_types(
        &self,
        arena: &mut Arena,
        item_types: &mut [ItemType],
        report: &mut ConsistencyReport,
    ) {
        let mut dropped = Vec::new();
        for item_type in item_types {
            arena.retain_slice(&mut item_type.categories, |c| {
                let keep = self.has_category(CategoryId::new(c));
                if !keep {
                    dropped.push(c);
                }
                keep
            });
            for value in dropped.drain(..) {
                report.record(ConsistencyIssue::DanglingListEntry {
                    owner: format!("item type {}", item_type.id),
                    list: "categories",
                    value,
                });
            }
        }
    }
}

fn repair_relationship_matches(
    arena: &mut Arena,
    relationship_matches: &mut [RelationshipMatch],
    relationships: &[Relationship],
    item_count: usize,
    report: &mut ConsistencyReport,
) {
    let mut dropped = Vec::new();
    for m in relationship_matches {
        if m.relationship != RelationshipId::UNKNOWN
            && relationships
                .binary_search_by_key(&m.relationship, |r| r.id)
                .is_err()
        {
            report.record(ConsistencyIssue::UnknownRelationship {
                relationship_match: m.id,
                relationship: m.relationship,
            });
            m.relationship = RelationshipId::UNKNOWN;
        }
        arena.retain_slice(&mut m.items, |index| {
            let keep = (index as usize) < item_count;
            if !keep {
                dropped.push(index);
            }
            keep
        });
        for value in dropped.drain(..) {
            report.record(ConsistencyIssue::DanglingListEntry {
                owner: format!("relationship match {}", m.id),
                list: "items",
                value,
            });
        }
    }
}

/// Item change log positions sorted by (source item, entry id)
fn item_change_index(arena: &Arena, log: &[ItemChangeLogEntry]) -> Vec<u32> {
    let key = |e: &ItemChangeLogEntry| (e.from_type, arena.str(e.from_id).as_bytes(), e.id);
    let mut index: Vec<u32> = (0..log.len() as u32).collect();
    index.sort_by(|&a, &b| key(&log[a as usize]).cmp(&key(&log[b as usize])));
    index
}

/// Color change log positions sorted by (source color, entry id)
fn color_change_index(log: &[ColorChangeLogEntry]) -> Vec<u32> {
    let mut index: Vec<u32> = (0..log.len() as u32).collect();
    index.sort_by_key(|&i| {
        let e = &log[i as usize];
        (e.from_color, e.id)
    });
    index
}
