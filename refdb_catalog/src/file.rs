use crate::error::{Error, Result};
use crate::version::Version;
use std::path::Path;
use tracing::{debug, info};

const DATABASE_FILE_PREFIX: &str = "database-v";

/// File name a database of `version` is stored under, e.g. `database-v12`
pub fn default_database_name(version: Version) -> String {
    format!("{DATABASE_FILE_PREFIX}{}", version.as_u32())
}

/// Remove every stored database generation from `dir`.
///
/// Returns the number of removed files; a missing directory counts as empty.
pub fn remove_database_files(dir: impl AsRef<Path>) -> Result<usize> {
    let dir = dir.as_ref();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(Error::io(dir, e)),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let name = entry.file_name();
        let is_database = name
            .to_str()
            .and_then(|n| n.strip_prefix(DATABASE_FILE_PREFIX))
            .is_some_and(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()));
        if !is_database || !entry.file_type().is_ok_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        std::fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
        debug!(path = %path.display(), "removed database file");
        removed += 1;
    }
    info!(dir = %dir.display(), removed, "removed database files");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(default_database_name(Version::V12), "database-v12");
        assert_eq!(default_database_name(Version::V6), "database-v6");
    }

    #[test]
    fn removes_only_database_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["database-v6", "database-v12", "database-vX", "update-state.json"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        assert_eq!(remove_database_files(dir.path()).unwrap(), 2);
        let mut left: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        left.sort();
        assert_eq!(left, vec!["database-vX", "update-state.json"]);

        assert_eq!(remove_database_files(dir.path().join("missing")).unwrap(), 0);
    }
}
