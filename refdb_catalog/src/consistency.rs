//! Referential checks run once per generation while it is built.
//!
//! Records are never dropped for pointing at keys that do not exist: scalar references are
//! patched to the sentinel of their key type and dangling list entries are removed from the
//! list. Only duplicate keys lose records (the first occurrence is kept). Everything that was
//! changed ends up in the [`ConsistencyReport`] of the generation.

use crate::keys::{CategoryId, ColorId, ItemTypeId, RelationshipId, RelationshipMatchId};
use std::fmt::Display;

/// Upper bound of issues kept verbatim in a report; the total is always counted
pub const MAX_REPORTED_ISSUES: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsistencyIssue {
    /// A later record had the same key as an earlier one and was dropped
    DuplicateKey { table: &'static str, key: String },
    /// An item referenced a category that does not exist, patched to [`CategoryId::UNKNOWN`]
    UnknownCategory { item: String, category: CategoryId },
    /// An item referenced an item type that does not exist, patched to [`ItemTypeId::UNKNOWN`]
    UnknownItemType { item: String, item_type: ItemTypeId },
    /// An item's default color does not exist, patched to [`ColorId::NONE`]
    UnknownColor { item: String, color: ColorId },
    /// A relationship match referenced a relationship that does not exist, patched to
    /// [`RelationshipId::UNKNOWN`]
    UnknownRelationship {
        relationship_match: RelationshipMatchId,
        relationship: RelationshipId,
    },
    /// A list entry pointed at a key that does not exist and was removed
    DanglingListEntry {
        owner: String,
        list: &'static str,
        value: u32,
    },
}

impl Display for ConsistencyIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateKey { table, key } => {
                write!(f, "duplicate key {key} in {table}, later record dropped")
            }
            Self::UnknownCategory { item, category } => {
                write!(f, "item {item} references unknown category {category}")
            }
            Self::UnknownItemType { item, item_type } => {
                write!(f, "item {item} references unknown item type {item_type}")
            }
            Self::UnknownColor { item, color } => {
                write!(f, "item {item} references unknown default color {color}")
            }
            Self::UnknownRelationship {
                relationship_match,
                relationship,
            } => write!(
                f,
                "relationship match {relationship_match} references unknown relationship {relationship}"
            ),
            Self::DanglingListEntry { owner, list, value } => {
                write!(f, "{owner}: removed unknown entry {value} from {list}")
            }
        }
    }
}

/// The issues found while building one catalog generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    issues: Vec<ConsistencyIssue>,
    total: usize,
}

impl ConsistencyReport {
    pub(crate) fn record(&mut self, issue: ConsistencyIssue) {
        self.total += 1;
        if self.issues.len() < MAX_REPORTED_ISSUES {
            self.issues.push(issue);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of issues found, including the ones not kept in [`Self::issues`]
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn issues(&self) -> &[ConsistencyIssue] {
        &self.issues
    }
}

impl Display for ConsistencyReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} consistency issue(s)", self.total)?;
        for issue in &self.issues {
            writeln!(f, "  {issue}")?;
        }
        if self.total > self.issues.len() {
            writeln!(f, "  ... and {} more", self.total - self.issues.len())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_is_capped_but_counts_everything() {
        let mut report = ConsistencyReport::default();
        assert!(report.is_empty());
        for value in 0..(MAX_REPORTED_ISSUES as u32 + 10) {
            report.record(ConsistencyIssue::DanglingListEntry {
                owner: "P 3001".into(),
                list: "known colors",
                value,
            });
        }
        assert_eq!(report.total(), MAX_REPORTED_ISSUES + 10);
        assert_eq!(report.issues().len(), MAX_REPORTED_ISSUES);
        assert!(report.to_string().ends_with("... and 10 more\n"));
    }
}
