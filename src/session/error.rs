//! Error types for session-level HTTP calls.

use thiserror::Error;

use crate::http_client::ClientBuildError;

/// Errors surfaced by [`SessionClient`](super::SessionClient) requests.
///
/// Login never produces one of these; it reports
/// [`LoginOutcome::Failed`](super::LoginOutcome::Failed) instead.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The underlying HTTP client could not be constructed.
    #[error(transparent)]
    ClientBuild(#[from] ClientBuildError),

    /// A request URL could not be parsed or joined.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
    },

    /// Network-level error (DNS, connection refused, TLS, reset).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL being requested.
        url: String,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },

    /// The request timed out.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL being requested.
        url: String,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL being requested.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The edge answered with an anti-automation challenge instead of data.
    #[error("anti-automation challenge (HTTP {status}) requesting {url}")]
    Challenged {
        /// The URL being requested.
        url: String,
        /// The HTTP status of the challenge response.
        status: u16,
    },
}

impl SessionError {
    /// Maps a reqwest send error, separating timeouts from other failures.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a challenge error.
    pub fn challenged(url: impl Into<String>, status: u16) -> Self {
        Self::Challenged {
            url: url.into(),
            status,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}
