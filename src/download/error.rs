//! Error types for the download module.
//!
//! Transient variants describe why one attempt failed and are retried inside
//! [`ResumableTransfer::download`](super::ResumableTransfer::download). Only
//! the terminal variants (`Exhausted`, `Cancelled`, `InvalidConfig`,
//! `ClientBuild`) ever leave it.

use std::path::PathBuf;

use thiserror::Error;

use crate::http_client::ClientBuildError;

/// Errors that can occur during a resumable download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection reset, TLS, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL being downloaded.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Connecting or receiving headers took longer than the attempt timeout.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// No body bytes arrived within the attempt timeout.
    #[error("download of {url} stalled at byte {offset}")]
    Stalled {
        /// The URL being downloaded.
        url: String,
        /// Bytes on disk when the stream stalled.
        offset: u64,
    },

    /// HTTP error response.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while sizing, opening or writing the destination.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Bytes on disk disagree with the length the server announced.
    #[error(
        "integrity check failed for {path}: expected {expected_bytes} bytes, got {actual_bytes}"
    )]
    Integrity {
        /// Destination path.
        path: PathBuf,
        /// Expected total size in bytes.
        expected_bytes: u64,
        /// Size the file would have (or has) reached.
        actual_bytes: u64,
    },

    /// Every attempt failed. The partial file has been removed.
    #[error("download of {url} failed after {attempts} attempts: {last_error}")]
    Exhausted {
        /// The URL being downloaded.
        url: String,
        /// Destination that was cleaned up.
        path: PathBuf,
        /// Number of attempts made.
        attempts: u32,
        /// Cause of the final failed attempt.
        #[source]
        last_error: Box<DownloadError>,
    },

    /// The observer asked to stop. The partial file is kept for resumption.
    #[error("download of {url} cancelled with {bytes_on_disk} bytes on disk at {path}")]
    Cancelled {
        /// The URL being downloaded.
        url: String,
        /// Destination holding the partial data.
        path: PathBuf,
        /// Bytes already written.
        bytes_on_disk: u64,
    },

    /// Transfer configuration rejected by validation.
    #[error("invalid transfer configuration: {reason}")]
    InvalidConfig {
        /// Which setting was rejected.
        reason: String,
    },

    /// The download HTTP client could not be built.
    #[error(transparent)]
    ClientBuild(#[from] ClientBuildError),
}

impl DownloadError {
    /// Creates a network error from a reqwest error, folding timeouts into
    /// [`DownloadError::Timeout`].
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a stall error.
    pub fn stalled(url: impl Into<String>, offset: u64) -> Self {
        Self::Stalled {
            url: url.into(),
            offset,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an integrity mismatch error.
    pub fn integrity(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Integrity {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// True for errors that end the download without another attempt.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Exhausted { .. }
                | Self::Cancelled { .. }
                | Self::InvalidConfig { .. }
                | Self::ClientBuild(_)
        )
    }
}
