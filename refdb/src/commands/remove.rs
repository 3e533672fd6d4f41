use super::common::state_path;
use std::error::Error;
use std::path::PathBuf;

#[derive(Debug, clap::Parser)]
pub(crate) struct Config {
    /// Directory holding the database files
    #[clap(long = "data-dir", env = "REFDB_DATA_DIR")]
    data_dir: PathBuf,

    /// Also forget the stored update state (last update time and entity tag)
    #[clap(long = "state")]
    remove_state: bool,
}

pub(crate) fn command(config: Config) -> Result<(), Box<dyn Error>> {
    let removed = refdb_catalog::remove_database_files(&config.data_dir)?;
    if config.remove_state {
        match std::fs::remove_file(state_path(&config.data_dir)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    println!(
        "Removed {removed} database file(s) from {}",
        config.data_dir.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::common::STATE_FILE_NAME;

    #[test]
    fn keeps_state_unless_asked() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["database-v9", "database-v12", STATE_FILE_NAME] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        command(Config {
            data_dir: dir.path().to_path_buf(),
            remove_state: false,
        })
        .unwrap();
        assert!(!dir.path().join("database-v12").exists());
        assert!(dir.path().join(STATE_FILE_NAME).exists());

        command(Config {
            data_dir: dir.path().to_path_buf(),
            remove_state: true,
        })
        .unwrap();
        assert!(!dir.path().join(STATE_FILE_NAME).exists());
    }
}
