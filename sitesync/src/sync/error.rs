use std::io;
use std::path::{Path, PathBuf};

use reqwest::StatusCode;
use sitesync_core::SiteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{method} {path} failed: status {status}")]
    RemoteProtocol {
        method: &'static str,
        path: String,
        status: StatusCode,
    },
    #[error("I/O error on {path:?}: {source}")]
    LocalIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("too many retries for {path} after {attempts} attempts; try again later")]
    RetryBudgetExhausted { path: String, attempts: u32 },
    #[error("cannot list files on server: {0}")]
    Pagination(#[source] SiteError),
    #[error("api error: {0}")]
    Api(#[from] SiteError),
    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("sync cancelled")]
    Cancelled,
}

impl SyncError {
    pub(crate) fn local_io(path: &Path, source: io::Error) -> Self {
        SyncError::LocalIo {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Maps a failed request onto the run's error taxonomy: unexpected status
    /// codes become [`SyncError::RemoteProtocol`], everything else stays an
    /// API error.
    pub(crate) fn from_request(method: &'static str, path: &str, err: SiteError) -> Self {
        match err.status() {
            Some(status) => SyncError::RemoteProtocol {
                method,
                path: path.to_string(),
                status,
            },
            None => SyncError::Api(err),
        }
    }
}
