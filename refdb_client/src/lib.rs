//! HTTP transport for catalog updates.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use refdb_update::{ProgressReporter, Transfer, TransferError, TransferResponse};
use reqwest::header::{ETAG, IF_NONE_MATCH};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;
use url::Url;

const USER_AGENT: &str = concat!("refdb/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to build the HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A [`Transfer`] that downloads the database with a plain `GET`
#[derive(Debug, Clone)]
pub struct HttpTransfer {
    http_client: reqwest::Client,
}

impl HttpTransfer {
    pub fn new() -> Result<Self> {
        Self::with_connect_timeout(Duration::from_secs(30))
    }

    pub fn with_connect_timeout(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .build()
            .map_err(Error::Build)?;
        Ok(Self { http_client })
    }

    /// Use an already configured [`reqwest::Client`]
    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

fn network(e: reqwest::Error) -> TransferError {
    TransferError::Network(e.to_string())
}

#[async_trait]
impl Transfer for HttpTransfer {
    async fn fetch(
        &self,
        url: &Url,
        etag: Option<&str>,
        progress: ProgressReporter,
    ) -> Result<TransferResponse, TransferError> {
        let mut req = self.http_client.get(url.clone());
        if let Some(etag) = etag {
            req = req.header(IF_NONE_MATCH, etag);
        }
        let resp = req.send().await.map_err(network)?;

        let status = resp.status();
        let etag = resp
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        debug!(%url, %status, etag = etag.as_deref().unwrap_or_default(), "database response");

        if status == StatusCode::NOT_MODIFIED || !status.is_success() {
            return Ok(TransferResponse {
                status: status.as_u16(),
                etag,
                body: Bytes::new(),
            });
        }

        let total = resp.content_length();
        let mut body = BytesMut::with_capacity(total.unwrap_or_default().min(1 << 30) as usize);
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(network)?;
            body.extend_from_slice(&chunk);
            progress.report(body.len() as u64, total);
        }

        Ok(TransferResponse {
            status: status.as_u16(),
            etag,
            body: body.freeze(),
        })
    }
}
