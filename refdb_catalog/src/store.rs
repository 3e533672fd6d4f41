use crate::catalog::Catalog;
use crate::error::{Error, Result};
use parking_lot::RwLock;
use refdb_time::{Time, TimeProvider};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Refresh bookkeeping persisted next to the database file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateState {
    /// Unix milliseconds of the last successful refresh
    pub last_updated_ms: Option<i64>,
    /// Entity tag of the last downloaded database, for conditional requests
    pub etag: Option<String>,
    pub update_interval_secs: u64,
}

impl UpdateState {
    pub fn last_updated(&self) -> Option<Time> {
        self.last_updated_ms.and_then(Time::from_timestamp_millis)
    }

    /// Load from a JSON file; a missing file yields the default state
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no update state, starting fresh");
                Ok(Self::default())
            }
            Err(e) => Err(Error::io(path, e)),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let json = serde_json::to_vec_pretty(self)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
        let tmp_path = tmp.path().to_path_buf();
        tmp.write_all(&json).map_err(|e| Error::io(&tmp_path, e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| Error::io(&tmp_path, e))?;
        tmp.persist(path).map_err(|e| Error::Persist {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        Ok(())
    }
}

/// The live catalog handle.
///
/// Readers take an `Arc<Catalog>` from [`Self::current`] and keep using that generation for as
/// long as they hold it; publishing a new generation only swaps the pointer, the old generation
/// is freed once its last reader lets go. The generation and its [`UpdateState`] change
/// together under one lock.
#[derive(Debug)]
pub struct CatalogStore {
    live: RwLock<Live>,
    time_provider: Arc<dyn TimeProvider>,
}

#[derive(Debug, Default)]
struct Live {
    current: Option<Arc<Catalog>>,
    state: UpdateState,
}

impl CatalogStore {
    pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
        Self::with_state(time_provider, UpdateState::default())
    }

    pub fn with_state(time_provider: Arc<dyn TimeProvider>, state: UpdateState) -> Self {
        Self {
            live: RwLock::new(Live {
                current: None,
                state,
            }),
            time_provider,
        }
    }

    pub fn time_provider(&self) -> Arc<dyn TimeProvider> {
        Arc::clone(&self.time_provider)
    }

    pub fn current(&self) -> Option<Arc<Catalog>> {
        self.live.read().current.as_ref().map(Arc::clone)
    }

    /// The current generation together with the state it was refreshed with
    pub fn snapshot(&self) -> (Option<Arc<Catalog>>, UpdateState) {
        let live = self.live.read();
        (live.current.as_ref().map(Arc::clone), live.state.clone())
    }

    /// Whether a catalog generation is loaded
    pub fn is_valid(&self) -> bool {
        self.live.read().current.is_some()
    }

    /// Make `catalog` the current generation, returning the one it replaced
    pub fn publish(&self, catalog: Catalog) -> Option<Arc<Catalog>> {
        let next = Arc::new(catalog);
        let previous = self.live.write().current.replace(next);
        debug!(replaced = previous.is_some(), "published catalog generation");
        previous
    }

    /// [`Self::publish`] a freshly downloaded generation and record where it came from
    pub fn publish_refreshed(
        &self,
        catalog: Catalog,
        refreshed_at: Time,
        etag: Option<String>,
    ) -> Option<Arc<Catalog>> {
        let next = Arc::new(catalog);
        let mut live = self.live.write();
        let previous = live.current.replace(next);
        live.state.last_updated_ms = Some(refreshed_at.timestamp_millis());
        live.state.etag = etag;
        drop(live);
        debug!(replaced = previous.is_some(), "published refreshed catalog generation");
        previous
    }

    /// Drop the current generation
    pub fn clear(&self) -> Option<Arc<Catalog>> {
        let mut live = self.live.write();
        live.state.last_updated_ms = None;
        live.state.etag = None;
        live.current.take()
    }

    pub fn state(&self) -> UpdateState {
        self.live.read().state.clone()
    }

    pub fn last_updated(&self) -> Option<Time> {
        self.live.read().state.last_updated()
    }

    pub fn etag(&self) -> Option<String> {
        self.live.read().state.etag.clone()
    }

    pub fn set_update_interval(&self, interval: Duration) {
        self.live.write().state.update_interval_secs = interval.as_secs();
    }

    /// Whether a refresh is due.
    ///
    /// Always true without a loaded catalog. Otherwise a zero `interval` disables time based
    /// refreshes, and a refresh is due when the last one is unknown or older than `interval`.
    pub fn is_update_needed(&self, interval: Duration) -> bool {
        let last = {
            let live = self.live.read();
            if live.current.is_none() {
                return true;
            }
            live.state.last_updated()
        };
        if interval.is_zero() {
            return false;
        }
        let Some(last) = last else {
            return true;
        };
        match self.time_provider.now().checked_duration_since(last) {
            Some(age) => age > interval,
            // last refresh is in the future, the clock was changed
            None => false,
        }
    }

    /// Decode `path` and publish it. The current generation is untouched on failure.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Arc<Catalog>> {
        let catalog = Catalog::load_file(path)?;
        let next = Arc::new(catalog);
        self.live.write().current = Some(Arc::clone(&next));
        Ok(next)
    }

    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.current().ok_or(Error::NoCatalog)?.save_file(path)
    }

    pub fn load_state(&self, path: impl AsRef<Path>) -> Result<()> {
        let state = UpdateState::load(path)?;
        info!(
            last_updated = ?state.last_updated(),
            etag = state.etag.as_deref().unwrap_or_default(),
            "loaded update state"
        );
        self.live.write().state = state;
        Ok(())
    }

    pub fn save_state(&self, path: impl AsRef<Path>) -> Result<()> {
        self.state().save(path)
    }
}
