use crate::builder::CatalogBuilder;
use crate::codec::{decode_container, encode_container};
use crate::consistency::ConsistencyReport;
use crate::error::{Error, FormatError, Result};
use crate::keys::{
    ApiQuirk, CategoryId, ColorId, ItemTypeId, RelationshipId, RelationshipMatchId,
};
use crate::records::{
    ApiKey, Category, Color, ColorChangeLogEntry, Item, ItemChangeLogEntry, ItemType,
    Relationship, RelationshipMatch,
};
use refdb_arena::{Arena, ArenaStr};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tracing::info;

/// Maximum number of change log entries followed by a single redirect lookup
pub const MAX_REDIRECT_HOPS: usize = 16;

/// One immutable generation of the reference catalog.
///
/// A generation owns the arena all of its records point into, so records must only be resolved
/// against [`Catalog::arena`] of the same generation. Share it as `Arc<Catalog>`; see
/// [`crate::CatalogStore`].
pub struct Catalog {
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
    /// `item_changelog` positions sorted by source item, then entry id
    pub(crate) item_change_index: Vec<u32>,
    /// `color_changelog` positions sorted by source color, then entry id
    pub(crate) color_change_index: Vec<u32>,
    pub(crate) report: ConsistencyReport,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("colors", &self.colors.len())
            .field("categories", &self.categories.len())
            .field("item_types", &self.item_types.len())
            .field("items", &self.items.len())
            .field("item_changelog", &self.item_changelog.len())
            .field("color_changelog", &self.color_changelog.len())
            .field("relationships", &self.relationships.len())
            .field("relationship_matches", &self.relationship_matches.len())
            .field("api_keys", &self.api_keys.len())
            .field("api_quirks", &self.api_quirks)
            .field("arena_bytes", &self.arena.allocated_bytes())
            .finish_non_exhaustive()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        CatalogBuilder::new().finish()
    }
}

impl Catalog {
    /// Decode a database container of any supported version
    pub fn read_from<R: Read + Seek>(input: R) -> Result<Self, FormatError> {
        let (version, builder) = decode_container(input)?;
        let catalog = builder.finish();
        info!(
            version,
            items = catalog.items.len(),
            colors = catalog.colors.len(),
            consistency_issues = catalog.report.total(),
            "decoded catalog"
        );
        Ok(catalog)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        Self::read_from(Cursor::new(bytes))
    }

    /// Encode at [`crate::Version::LATEST`], returning the output stream
    pub fn write_to<W: Write + Seek>(&self, output: W) -> Result<W, FormatError> {
        encode_container(self, output)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        Ok(self.write_to(Cursor::new(Vec::new()))?.into_inner())
    }

    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let catalog = Self::read_from(BufReader::new(file))?;
        info!(path = %path.display(), "loaded catalog file");
        Ok(catalog)
    }

    /// Write the catalog next to `path` and atomically move it into place
    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
        let tmp_path = tmp.path().to_path_buf();
        self.write_to(BufWriter::new(tmp.as_file_mut()))?
            .into_inner()
            .map_err(|e| Error::io(&tmp_path, e.into_error()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| Error::io(&tmp_path, e))?;
        tmp.persist(path).map_err(|e| Error::Persist {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        info!(path = %path.display(), "saved catalog file");
        Ok(())
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Resolve a string of this generation
    pub fn str(&self, s: ArenaStr) -> &str {
        self.arena.str(s)
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn item_types(&self) -> &[ItemType] {
        &self.item_types
    }

    /// All items, sorted by item type and id
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item_changelog(&self) -> &[ItemChangeLogEntry] {
        &self.item_changelog
    }

    pub fn color_changelog(&self) -> &[ColorChangeLogEntry] {
        &self.color_changelog
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn relationship_matches(&self) -> &[RelationshipMatch] {
        &self.relationship_matches
    }

    pub fn api_keys(&self) -> &[ApiKey] {
        &self.api_keys
    }

    pub fn api_quirks(&self) -> &[ApiQuirk] {
        &self.api_quirks
    }

    pub fn consistency_report(&self) -> &ConsistencyReport {
        &self.report
    }

    pub fn color(&self, id: ColorId) -> Option<&Color> {
        let i = self.colors.binary_search_by_key(&id, |c| c.id).ok()?;
        Some(&self.colors[i])
    }

    pub fn category(&self, id: CategoryId) -> Option<&Category> {
        let i = self.categories.binary_search_by_key(&id, |c| c.id).ok()?;
        Some(&self.categories[i])
    }

    pub fn item_type(&self, id: ItemTypeId) -> Option<&ItemType> {
        let i = self.item_types.binary_search_by_key(&id, |t| t.id).ok()?;
        Some(&self.item_types[i])
    }

    pub fn item(&self, item_type: ItemTypeId, id: &str) -> Option<&Item> {
        self.item_index(item_type, id).map(|i| &self.items[i])
    }

    /// Position of an item in [`Self::items`], as used by relationship matches
    pub fn item_index(&self, item_type: ItemTypeId, id: &str) -> Option<usize> {
        let key = (item_type, id.as_bytes());
        self.items
            .binary_search_by(|it| (it.item_type, self.arena.str(it.id).as_bytes()).cmp(&key))
            .ok()
    }

    pub fn item_by_index(&self, index: u32) -> Option<&Item> {
        self.items.get(index as usize)
    }

    pub fn relationship(&self, id: RelationshipId) -> Option<&Relationship> {
        let i = self.relationships.binary_search_by_key(&id, |r| r.id).ok()?;
        Some(&self.relationships[i])
    }

    pub fn relationship_match(&self, id: RelationshipMatchId) -> Option<&RelationshipMatch> {
        let i = self
            .relationship_matches
            .binary_search_by_key(&id, |m| m.id)
            .ok()?;
        Some(&self.relationship_matches[i])
    }

    /// Items taking part in a relationship match
    pub fn relationship_match_items(
        &self,
        id: RelationshipMatchId,
    ) -> impl Iterator<Item = &Item> + '_ {
        self.relationship_match(id)
            .into_iter()
            .flat_map(|m| m.items(&self.arena))
            .filter_map(|i| self.item_by_index(i))
    }

    /// Value of the API key named `id`
    pub fn api_key(&self, id: &str) -> Option<&str> {
        let i = self
            .api_keys
            .binary_search_by(|k| self.arena.str(k.id).cmp(id))
            .ok()?;
        Some(self.arena.str(self.api_keys[i].key))
    }

    pub fn has_api_quirk(&self, quirk: ApiQuirk) -> bool {
        self.api_quirks.binary_search(&quirk).is_ok()
    }

    /// Highest entry id over both change logs, `0` if both are empty
    pub fn latest_changelog_id(&self) -> u32 {
        let items = self.item_changelog.last().map_or(0, |e| e.id);
        let colors = self.color_changelog.last().map_or(0, |e| e.id);
        items.max(colors)
    }

    fn newest_item_change(&self, item_type: ItemTypeId, id: &str) -> Option<&ItemChangeLogEntry> {
        let key = (item_type, id.as_bytes());
        let source = |i: u32| {
            let e = &self.item_changelog[i as usize];
            (e.from_type, self.arena.str(e.from_id).as_bytes())
        };
        let end = self.item_change_index.partition_point(|&i| source(i) <= key);
        let last = *self.item_change_index.get(end.checked_sub(1)?)?;
        (source(last) == key).then(|| &self.item_changelog[last as usize])
    }

    fn newest_color_change(&self, color: ColorId) -> Option<&ColorChangeLogEntry> {
        let end = self
            .color_change_index
            .partition_point(|&i| self.color_changelog[i as usize].from_color <= color);
        let last = *self.color_change_index.get(end.checked_sub(1)?)?;
        let entry = &self.color_changelog[last as usize];
        (entry.from_color == color).then_some(entry)
    }

    /// Follow the item change log starting at `(item_type, id)`.
    ///
    /// Returns the item the key was last changed into, or `None` if it was never changed. At
    /// most [`MAX_REDIRECT_HOPS`] entries are followed and a cycle ends the walk.
    pub fn resolve_item_change(&self, item_type: ItemTypeId, id: &str) -> Option<(ItemTypeId, &str)> {
        let mut resolved: Option<(ItemTypeId, &str)> = None;
        let mut visited: Vec<(ItemTypeId, &str)> = Vec::new();
        for _ in 0..MAX_REDIRECT_HOPS {
            let (t, i) = resolved.unwrap_or((item_type, id));
            let Some(entry) = self.newest_item_change(t, i) else {
                break;
            };
            let target = (entry.to_type, self.arena.str(entry.to_id));
            if target == (item_type, id) || visited.contains(&target) {
                break;
            }
            visited.push(target);
            resolved = Some(target);
        }
        resolved
    }

    /// Color counterpart of [`Self::resolve_item_change`]
    pub fn resolve_color_change(&self, color: ColorId) -> Option<ColorId> {
        let mut resolved = None;
        let mut visited = Vec::new();
        for _ in 0..MAX_REDIRECT_HOPS {
            let Some(entry) = self.newest_color_change(resolved.unwrap_or(color)) else {
                break;
            };
            let target = entry.to_color;
            if target == color || visited.contains(&target) {
                break;
            }
            visited.push(target);
            resolved = Some(target);
        }
        resolved
    }

    pub fn info(&self) -> CatalogInfo {
        let mut items_per_type: Vec<(ItemTypeId, usize)> = Vec::new();
        for item in &self.items {
            match items_per_type.last_mut() {
                Some((t, n)) if *t == item.item_type => *n += 1,
                _ => items_per_type.push((item.item_type, 1)),
            }
        }
        CatalogInfo {
            colors: self.colors.len(),
            categories: self.categories.len(),
            item_types: self.item_types.len(),
            items: self.items.len(),
            items_per_type,
            item_changelog: self.item_changelog.len(),
            color_changelog: self.color_changelog.len(),
            relationships: self.relationships.len(),
            relationship_matches: self.relationship_matches.len(),
            api_keys: self.api_keys.len(),
            api_quirks: self.api_quirks.clone(),
            latest_changelog_id: self.latest_changelog_id(),
            arena_blocks: self.arena.block_count(),
            arena_allocated_bytes: self.arena.allocated_bytes(),
            arena_capacity_bytes: self.arena.capacity_bytes(),
            consistency_issues: self.report.total(),
        }
    }
}

/// Summary of a catalog generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogInfo {
    pub colors: usize,
    pub categories: usize,
    pub item_types: usize,
    pub items: usize,
    pub items_per_type: Vec<(ItemTypeId, usize)>,
    pub item_changelog: usize,
    pub color_changelog: usize,
    pub relationships: usize,
    pub relationship_matches: usize,
    pub api_keys: usize,
    pub api_quirks: Vec<ApiQuirk>,
    pub latest_changelog_id: u32,
    pub arena_blocks: usize,
    pub arena_allocated_bytes: usize,
    pub arena_capacity_bytes: usize,
    pub consistency_issues: usize,
}

impl Display for CatalogInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "colors:               {}", self.colors)?;
        writeln!(f, "categories:           {}", self.categories)?;
        writeln!(f, "item types:           {}", self.item_types)?;
        writeln!(f, "items:                {}", self.items)?;
        for (item_type, count) in &self.items_per_type {
            writeln!(f, "  {item_type}:                 {count}")?;
        }
        writeln!(f, "item change log:      {}", self.item_changelog)?;
        writeln!(f, "color change log:     {}", self.color_changelog)?;
        writeln!(f, "latest change log id: {}", self.latest_changelog_id)?;
        writeln!(f, "relationships:        {}", self.relationships)?;
        writeln!(f, "relationship matches: {}", self.relationship_matches)?;
        writeln!(f, "api keys:             {}", self.api_keys)?;
        let quirks: Vec<_> = self.api_quirks.iter().map(|q| q.name()).collect();
        writeln!(f, "api quirks:           [{}]", quirks.join(", "))?;
        writeln!(
            f,
            "arena:                {} block(s), {} of {} bytes used",
            self.arena_blocks, self.arena_allocated_bytes, self.arena_capacity_bytes
        )?;
        write!(f, "consistency issues:   {}", self.consistency_issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Version;
    use pretty_assertions::assert_eq;
    use refdb_time::Time;

    fn part() -> ItemTypeId {
        ItemTypeId::new(b'P').unwrap()
    }

    fn day(n: i64) -> Time {
        Time::from_timestamp_millis(n * 86_400_000).unwrap()
    }

    pub(crate) fn sample() -> Catalog {
        let mut b = CatalogBuilder::new();
        b.add_color(ColorId::new(1), "White").rgb = 0xf2_f3_f2;
        b.add_color(ColorId::new(11), "Black").rgb = 0x1b_2a_34;
        b.add_category(CategoryId::new(5), "Brick");
        let cats = b.alloc_slice(&[5u32]);
        b.add_item_type(part(), "Part").categories = cats;
        b.add_relationship(RelationshipId::new(1), "Mold variant");

        let colors = b.alloc_slice(&[1u32, 11]);
        let matches = b.alloc_slice(&[1u16]);
        let brick = b.add_item(part(), "3001", "Brick 2 x 4");
        brick.category = CategoryId::new(5);
        brick.default_color = ColorId::new(1);
        brick.known_colors = colors;
        brick.relationship_matches = matches;
        b.add_item(part(), "3001old", "Brick 2 x 4 (old mold)");
        b.add_relationship_match(RelationshipMatchId::new(1), RelationshipId::new(1), &[0, 1]);

        b.add_item_change(10, day(1), (part(), "a"), (part(), "b"));
        b.add_item_change(11, day(2), (part(), "b"), (part(), "c"));
        b.add_item_change(12, day(3), (part(), "a"), (part(), "3001"));
        b.add_color_change(3, day(1), ColorId::new(100), ColorId::new(101));
        b.add_color_change(4, day(2), ColorId::new(101), ColorId::new(11));
        b.add_api_key("rebrickable", "secret");
        b.add_api_quirk(ApiQuirk::LegacyColorIds);
        b.finish()
    }

    #[test]
    fn lookups() {
        let c = sample();
        let arena = c.arena();
        assert_eq!(c.color(ColorId::new(11)).unwrap().name(arena), "Black");
        assert!(c.color(ColorId::new(2)).is_none());
        assert_eq!(c.category(CategoryId::new(5)).unwrap().name(arena), "Brick");
        assert_eq!(c.item_type(part()).unwrap().name(arena), "Part");
        assert_eq!(c.item(part(), "3001old").unwrap().name(arena), "Brick 2 x 4 (old mold)");
        assert!(c.item(part(), "3002").is_none());
        assert!(c.item(ItemTypeId::new(b'S').unwrap(), "3001").is_none());
        assert_eq!(c.relationship(RelationshipId::new(1)).unwrap().name(arena), "Mold variant");
        let members: Vec<_> = c
            .relationship_match_items(RelationshipMatchId::new(1))
            .map(|i| i.id(arena))
            .collect();
        assert_eq!(members, vec!["3001", "3001old"]);
        assert_eq!(c.api_key("rebrickable"), Some("secret"));
        assert_eq!(c.api_key("other"), None);
        assert!(c.has_api_quirk(ApiQuirk::LegacyColorIds));
        assert!(!c.has_api_quirk(ApiQuirk::UnreliableWeights));
        assert_eq!(c.latest_changelog_id(), 12);
    }

    #[test]
    fn item_changes_follow_the_newest_entry() {
        let c = sample();
        // a -> b (10) was superseded by a -> 3001 (12)
        assert_eq!(c.resolve_item_change(part(), "a"), Some((part(), "3001")));
        assert_eq!(c.resolve_item_change(part(), "b"), Some((part(), "c")));
        assert_eq!(c.resolve_item_change(part(), "3001"), None);
    }

    #[test]
    fn color_changes_chain() {
        let c = sample();
        assert_eq!(c.resolve_color_change(ColorId::new(100)), Some(ColorId::new(11)));
        assert_eq!(c.resolve_color_change(ColorId::new(101)), Some(ColorId::new(11)));
        assert_eq!(c.resolve_color_change(ColorId::new(11)), None);
    }

    #[test]
    fn redirect_cycles_terminate() {
        let mut b = CatalogBuilder::new();
        b.add_item_change(1, day(1), (part(), "x"), (part(), "y"));
        b.add_item_change(2, day(1), (part(), "y"), (part(), "z"));
        b.add_item_change(3, day(1), (part(), "z"), (part(), "y"));
        b.add_color_change(1, day(1), ColorId::new(1), ColorId::new(1));
        let c = b.finish();
        assert_eq!(c.resolve_item_change(part(), "x"), Some((part(), "z")));
        assert_eq!(c.resolve_color_change(ColorId::new(1)), None);
    }

    #[test]
    fn redirect_chains_are_bounded() {
        let mut b = CatalogBuilder::new();
        let names: Vec<String> = (0..40).map(|i| format!("i{i}")).collect();
        for (n, pair) in names.windows(2).enumerate() {
            b.add_item_change(n as u32, day(1), (part(), &pair[0]), (part(), &pair[1]));
        }
        let c = b.finish();
        assert_eq!(
            c.resolve_item_change(part(), "i0"),
            Some((part(), format!("i{MAX_REDIRECT_HOPS}").as_str()))
        );
    }

    /// Table level summary, arena layout depends on allocation order
    fn tables(info: CatalogInfo) -> CatalogInfo {
        CatalogInfo {
            arena_blocks: 0,
            arena_allocated_bytes: 0,
            arena_capacity_bytes: 0,
            ..info
        }
    }

    #[test]
    fn round_trip_through_bytes() {
        let c = sample();
        let bytes = c.to_bytes().unwrap();
        let d = Catalog::from_bytes(&bytes).unwrap();
        assert_eq!(tables(d.info()), tables(c.info()));

        let arena = d.arena();
        let brick = d.item(part(), "3001").unwrap();
        assert_eq!(brick.known_colors(arena).count(), 2);
        assert_eq!(d.resolve_item_change(part(), "a"), Some((part(), "3001")));
        assert_eq!(d.api_key("rebrickable"), Some("secret"));

        // the re-encoded bytes are stable
        assert_eq!(d.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn info_summary() {
        let info = sample().info();
        assert_eq!(info.items, 2);
        assert_eq!(info.items_per_type, vec![(part(), 2)]);
        assert_eq!(info.api_quirks, vec![ApiQuirk::LegacyColorIds]);
        assert_eq!(info.latest_changelog_id, 12);
        assert_eq!(info.arena_blocks, 1);
        let text = info.to_string();
        assert!(text.contains("items:                2"), "{text}");
        assert!(text.contains("legacy-color-ids"), "{text}");
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(crate::default_database_name(Version::LATEST));
        let c = sample();
        c.save_file(&path).unwrap();
        let d = Catalog::load_file(&path).unwrap();
        assert_eq!(tables(d.info()), tables(c.info()));

        let missing = Catalog::load_file(dir.path().join("nope")).unwrap_err();
        assert!(matches!(missing, Error::Io { .. }));
    }
}
