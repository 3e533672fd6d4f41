//! The reference catalog: records, their versioned binary encoding and the live handle that
//! swaps whole catalog generations under concurrent readers.
//!
//! A database file is a tree of [`refdb_chunk`] chunks:
//!
//! ```text
//! RCAT (container version)
//!   COLR CATG ITYP ITEM ICHG CCHG RELS RMAT AKEY AQRK   one chunk per table
//!   <unknown chunks are skipped>
//! ```
//!
//! Every table chunk carries its own [`Version`] and holds a `u32` record count followed by the
//! records. Files from [`Version::OLDEST_STILL_SUPPORTED`] on can be read; files are always
//! written at [`Version::LATEST`].

mod builder;
mod catalog;
pub mod codec;
mod consistency;
mod error;
mod file;
mod keys;
mod records;
mod store;
mod version;

pub use builder::CatalogBuilder;
pub use catalog::{Catalog, CatalogInfo, MAX_REDIRECT_HOPS};
pub use consistency::{ConsistencyIssue, ConsistencyReport, MAX_REPORTED_ISSUES};
pub use error::{Error, FormatError, Result};
pub use file::{default_database_name, remove_database_files};
pub use keys::{
    ApiQuirk, CategoryId, ColorId, ColorType, ItemTypeFlags, ItemTypeId, RelationshipId,
    RelationshipMatchId,
};
pub use records::{
    ApiKey, Category, Color, ColorChangeLogEntry, Dimensions, Item, ItemChangeLogEntry, ItemType,
    Relationship, RelationshipMatch,
};
pub use store::{CatalogStore, UpdateState};
pub use version::Version;

// Re-exported so callers can resolve record views without depending on the arena crate
pub use refdb_arena::{Arena, ArenaIter, ArenaSlice, ArenaStr};
