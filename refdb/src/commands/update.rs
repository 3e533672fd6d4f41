use super::common::state_path;
use refdb_catalog::{default_database_name, CatalogStore, Version};
use refdb_client::HttpTransfer;
use refdb_time::{SystemProvider, TimeProvider};
use refdb_update::{UpdateEvent, UpdateStatus, Updater, UpdaterConfig};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, clap::Parser)]
pub(crate) struct Config {
    /// Location of the remote database
    #[clap(long = "url", env = "REFDB_URL")]
    url: Url,

    /// Directory holding the local database and update state
    #[clap(long = "data-dir", env = "REFDB_DATA_DIR")]
    data_dir: PathBuf,

    /// Minimum age of the local database before it is refreshed, e.g. "12h" or "7d". "0s" only
    /// updates when forced or when no local database exists.
    #[clap(long = "interval", env = "REFDB_UPDATE_INTERVAL", default_value = "1d")]
    interval: humantime::Duration,

    /// Download even if the local database is recent enough
    #[clap(long = "force")]
    force: bool,
}

pub(crate) async fn command(config: Config) -> Result<(), Box<dyn Error>> {
    std::fs::create_dir_all(&config.data_dir)?;

    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemProvider::new());
    let store = Arc::new(CatalogStore::new(Arc::clone(&time_provider)));
    let state_path = state_path(&config.data_dir);
    store.load_state(&state_path)?;
    load_local(&store, &config.data_dir);

    let updater = Updater::new(
        Arc::clone(&store),
        Arc::new(HttpTransfer::new()?),
        UpdaterConfig {
            url: config.url,
            database_path: Some(config.data_dir.join(default_database_name(Version::LATEST))),
            state_path: Some(state_path),
            update_interval: config.interval.into(),
        },
        time_provider,
    );

    let mut events = updater.subscribe();
    if !updater.start_update(config.force) {
        let last = store
            .last_updated()
            .map_or_else(|| "never".to_string(), |t| t.to_string());
        println!("Database is up to date (last updated {last})");
        return Ok(());
    }

    let mut message = None;
    loop {
        match events.recv().await {
            Ok(UpdateEvent::Progress { received, total }) => {
                debug!(received, total, "download progress");
            }
            Ok(UpdateEvent::Finished { message: m, .. }) => {
                message = m;
                break;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => debug!(skipped = n, "missed update events"),
            Err(RecvError::Closed) => break,
        }
    }

    match updater.wait_until_settled().await {
        UpdateStatus::Valid => {
            let catalog = store.current().ok_or("update finished without a database")?;
            match message {
                Some(m) => println!("Database unchanged ({m})"),
                None => println!("Database updated: {} items", catalog.items().len()),
            }
            Ok(())
        }
        status => Err(format!(
            "update {status}: {}",
            message.unwrap_or_else(|| "no details".to_string())
        )
        .into()),
    }
}

/// Load the newest database file present in `data_dir`, if any
fn load_local(store: &CatalogStore, data_dir: &Path) {
    for version in Version::ALL.iter().rev() {
        let path = data_dir.join(default_database_name(*version));
        if !path.is_file() {
            continue;
        }
        match store.load_file(&path) {
            Ok(_) => {
                info!(path = %path.display(), "loaded local database");
                return;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "ignoring unreadable database"),
        }
    }
}
