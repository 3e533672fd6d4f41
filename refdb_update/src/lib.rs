//! Refreshing the live catalog from a remote source.
//!
//! An [`Updater`] drives one update at a time: a conditional fetch through a [`Transfer`], an
//! optional gunzip, decoding on a blocking thread and finally swapping the new generation into
//! the [`refdb_catalog::CatalogStore`]. Readers of the store are never blocked by any of this and
//! keep whatever generation they already hold.

use thiserror::Error;

mod transfer;
mod updater;

pub use transfer::{ProgressReporter, Transfer, TransferError, TransferResponse};
pub use updater::{UpdateEvent, UpdateStatus, Updater, UpdaterConfig};

#[derive(Debug, Error)]
pub enum Error {
    #[error("transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("downloaded database is invalid: {0}")]
    Format(#[from] refdb_catalog::FormatError),

    #[error("unexpected response status {0}")]
    UnexpectedStatus(u16),

    #[error("server reported no change, but no database is loaded")]
    NotModifiedWithoutCatalog,

    #[error("failed to decompress downloaded database: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("decoding task failed: {0}")]
    DecodeTask(#[from] tokio::task::JoinError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
