use crate::UpdateEvent;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;
use thiserror::Error;
use tokio::sync::broadcast;
use url::Url;

/// A completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResponse {
    pub status: u16,
    pub etag: Option<String>,
    pub body: Bytes,
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("network error: {0}")]
    Network(String),

    #[error("transfer aborted")]
    Aborted,
}

/// Reports download progress to the subscribers of the owning updater
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    events: broadcast::Sender<UpdateEvent>,
}

impl ProgressReporter {
    pub(crate) fn new(events: broadcast::Sender<UpdateEvent>) -> Self {
        Self { events }
    }

    /// A reporter nobody listens to
    pub fn disconnected() -> Self {
        let (events, _) = broadcast::channel(1);
        Self { events }
    }

    /// `total` is `None` when the response did not announce its length
    pub fn report(&self, received: u64, total: Option<u64>) {
        let _ = self.events.send(UpdateEvent::Progress { received, total });
    }
}

/// Fetches the database from the remote source.
///
/// `etag` is the entity tag of the database that is currently loaded, if any; implementations
/// send it as `If-None-Match` so an unchanged database comes back as status 304 without a body.
/// Aborting a transfer is done by dropping the returned future.
#[async_trait]
pub trait Transfer: Debug + Send + Sync + 'static {
    async fn fetch(
        &self,
        url: &Url,
        etag: Option<&str>,
        progress: ProgressReporter,
    ) -> Result<TransferResponse, TransferError>;
}
