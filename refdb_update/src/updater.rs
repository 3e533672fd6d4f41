use crate::transfer::{ProgressReporter, Transfer};
use crate::{Error, Result};
use bytes::Bytes;
use flate2::read::GzDecoder;
use parking_lot::Mutex;
use refdb_catalog::{Catalog, CatalogStore};
use refdb_time::{Time, TimeProvider};
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// No update has run, or the last one was cancelled
    Idle,
    Updating,
    /// The loaded catalog is up to date with the remote source
    Valid,
    Failed,
}

impl std::fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Updating => "updating",
            Self::Valid => "valid",
            Self::Failed => "failed",
        })
    }
}

/// Notifications sent to [`Updater::subscribe`]rs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    Started,
    Progress { received: u64, total: Option<u64> },
    Finished { success: bool, message: Option<String> },
    StatusChanged(UpdateStatus),
    LastUpdatedChanged(Time),
    /// A new generation is about to replace the current one
    AboutToReset,
    /// A new generation replaced the current one
    Reset,
}

#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    pub url: Url,
    /// Where a downloaded database is saved, not persisted if `None`
    pub database_path: Option<PathBuf>,
    /// Where the update state is saved, not persisted if `None`
    pub state_path: Option<PathBuf>,
    /// Minimum age of the loaded catalog before a non-forced update runs, zero to only update on
    /// demand
    pub update_interval: Duration,
}

#[derive(Debug)]
struct InFlight {
    seq: u64,
    token: CancellationToken,
    /// The new generation is live; the update can no longer be cancelled
    published: bool,
}

/// Runs catalog updates, at most one at a time
#[derive(Debug, Clone)]
pub struct Updater {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    store: Arc<CatalogStore>,
    transfer: Arc<dyn Transfer>,
    config: UpdaterConfig,
    time_provider: Arc<dyn TimeProvider>,
    status: watch::Sender<UpdateStatus>,
    events: broadcast::Sender<UpdateEvent>,
    /// The running update; only the update registered here may publish or settle
    in_flight: Mutex<Option<InFlight>>,
    next_seq: AtomicU64,
}

impl Updater {
    pub fn new(
        store: Arc<CatalogStore>,
        transfer: Arc<dyn Transfer>,
        config: UpdaterConfig,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        let initial = if store.is_valid() {
            UpdateStatus::Valid
        } else {
            UpdateStatus::Idle
        };
        store.set_update_interval(config.update_interval);
        let (status, _) = watch::channel(initial);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store,
                transfer,
                config,
                time_provider,
                status,
                events,
                in_flight: Mutex::new(None),
                next_seq: AtomicU64::new(1),
            }),
        }
    }

    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.inner.store
    }

    pub fn status(&self) -> UpdateStatus {
        *self.inner.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<UpdateStatus> {
        self.inner.status.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdateEvent> {
        self.inner.events.subscribe()
    }

    /// Start an update on the current tokio runtime.
    ///
    /// Returns `false` without doing anything if an update is already running, or if `force` is
    /// not set and the store does not need an update yet.
    pub fn start_update(&self, force: bool) -> bool {
        let inner = &self.inner;
        let mut slot = inner.in_flight.lock();
        if slot.is_some() {
            debug!("update already in progress");
            return false;
        }
        if !force && !inner.store.is_update_needed(inner.config.update_interval) {
            debug!("catalog is fresh, not updating");
            return false;
        }

        let seq = inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        *slot = Some(InFlight {
            seq,
            token: token.clone(),
            published: false,
        });
        inner.set_status(UpdateStatus::Updating);
        inner.emit(UpdateEvent::Started);
        drop(slot);

        info!(seq, url = %inner.config.url, force, "starting catalog update");
        tokio::spawn(Arc::clone(inner).run(seq, token));
        true
    }

    /// Abort the running update, if any.
    ///
    /// The status goes back to [`UpdateStatus::Idle`] right away and nothing the aborted update
    /// produced will be published. Returns `false` if nothing is running or the update already
    /// published its catalog, in which case it runs to completion.
    pub fn cancel_update(&self) -> bool {
        let inner = &self.inner;
        let mut slot = inner.in_flight.lock();
        let Some(in_flight) = slot.take_if(|f| !f.published) else {
            if let Some(f) = slot.as_ref() {
                debug!(seq = f.seq, "catalog already published, not cancelling");
            }
            return false;
        };
        in_flight.token.cancel();
        inner.set_status(UpdateStatus::Idle);
        inner.emit(UpdateEvent::Finished {
            success: false,
            message: Some("cancelled".to_string()),
        });
        info!(seq = in_flight.seq, "catalog update cancelled");
        true
    }

    /// Wait until no update is running and return the resulting status
    pub async fn wait_until_settled(&self) -> UpdateStatus {
        let mut rx = self.inner.status.subscribe();
        match rx.wait_for(|s| *s != UpdateStatus::Updating).await {
            Ok(status) => *status,
            // the sender lives as long as `self`
            Err(_) => UpdateStatus::Idle,
        }
    }
}

impl Inner {
    fn emit(&self, event: UpdateEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn set_status(&self, status: UpdateStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            self.emit(UpdateEvent::StatusChanged(status));
        }
    }

    fn is_current(slot: &Option<InFlight>, seq: u64) -> bool {
        slot.as_ref().is_some_and(|f| f.seq == seq)
    }

    async fn run(self: Arc<Self>, seq: u64, token: CancellationToken) {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(seq, "update task stopped");
                return;
            }
            result = self.update(seq) => result,
        };

        match result {
            Ok(message) => self.settle(seq, UpdateStatus::Valid, message),
            Err(e) => {
                warn!(seq, error = %e, "catalog update failed");
                self.settle(seq, UpdateStatus::Failed, Some(e.to_string()));
            }
        }
    }

    async fn update(&self, seq: u64) -> Result<Option<String>> {
        // a conditional request only makes sense if there is something to keep
        let etag = match self.store.snapshot() {
            (Some(_), state) => state.etag,
            (None, _) => None,
        };
        let progress = ProgressReporter::new(self.events.clone());
        let response = self
            .transfer
            .fetch(&self.config.url, etag.as_deref(), progress)
            .await?;

        match response.status {
            200 => {}
            304 if self.store.is_valid() => {
                info!(seq, "catalog not modified");
                return Ok(Some("not modified".to_string()));
            }
            304 => return Err(Error::NotModifiedWithoutCatalog),
            status => return Err(Error::UnexpectedStatus(status)),
        }

        let body = response.body;
        let size = body.len();
        let catalog = tokio::task::spawn_blocking(move || decode(body)).await??;
        info!(seq, bytes = size, items = catalog.items().len(), "downloaded catalog");

        if !self.publish(seq, catalog, response.etag) {
            return Ok(None);
        }
        self.persist().await;
        Ok(None)
    }

    /// Swap in the new generation, unless this update was cancelled in the meantime
    fn publish(&self, seq: u64, catalog: Catalog, etag: Option<String>) -> bool {
        let mut slot = self.in_flight.lock();
        let Some(in_flight) = slot.as_mut().filter(|f| f.seq == seq) else {
            debug!(seq, "discarding catalog of cancelled update");
            return false;
        };
        in_flight.published = true;
        let now = self.time_provider.now();
        self.emit(UpdateEvent::AboutToReset);
        self.store.publish_refreshed(catalog, now, etag);
        self.emit(UpdateEvent::Reset);
        self.emit(UpdateEvent::LastUpdatedChanged(now));
        true
    }

    async fn persist(&self) {
        let Some(catalog) = self.store.current() else {
            return;
        };
        let database_path = self.config.database_path.clone();
        let state_path = self.config.state_path.clone();
        if database_path.is_none() && state_path.is_none() {
            return;
        }
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || -> refdb_catalog::Result<()> {
            if let Some(path) = database_path {
                catalog.save_file(path)?;
            }
            if let Some(path) = state_path {
                store.save_state(path)?;
            }
            Ok(())
        })
        .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "failed to persist updated catalog"),
            Err(e) => warn!(error = %e, "catalog persistence task failed"),
        }
    }

    fn settle(&self, seq: u64, status: UpdateStatus, message: Option<String>) {
        let mut slot = self.in_flight.lock();
        if !Self::is_current(&slot, seq) {
            return;
        }
        *slot = None;
        self.set_status(status);
        self.emit(UpdateEvent::Finished {
            success: status == UpdateStatus::Valid,
            message,
        });
    }
}

/// Gunzip if needed and decode
fn decode(body: Bytes) -> Result<Catalog> {
    if body.starts_with(&GZIP_MAGIC) {
        let mut raw = Vec::with_capacity(body.len() * 4);
        GzDecoder::new(body.as_ref())
            .read_to_end(&mut raw)
            .map_err(Error::Decompress)?;
        Ok(Catalog::from_bytes(&raw)?)
    } else {
        Ok(Catalog::from_bytes(&body)?)
    }
}
