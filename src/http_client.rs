//! Shared HTTP client construction policy.
//!
//! Centralizes networking defaults for the API session and the download
//! transfer so both present the same browser profile.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use crate::user_agent::{BROWSER_USER_AGENT, browser_default_headers};

/// Failure to construct a reqwest client.
#[derive(Debug, Clone, Error)]
#[error("failed to build {client} HTTP client: {reason}")]
pub struct ClientBuildError {
    /// Which client was being built ("api", "download").
    pub client: &'static str,
    /// Builder failure description.
    pub reason: String,
}

/// Options that differ between the API client and the download client.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClientOptions {
    pub(crate) name: &'static str,
    pub(crate) connect_timeout: Duration,
    /// Whole-request timeout. `None` for streaming downloads, which are
    /// bounded per read instead.
    pub(crate) request_timeout: Option<Duration>,
    pub(crate) read_timeout: Option<Duration>,
    pub(crate) cookie_store: bool,
    /// Ranged downloads must address raw bytes, never a compressed encoding.
    pub(crate) gzip: bool,
}

/// Builds a client using the shared browser profile.
///
/// # Errors
///
/// Returns [`ClientBuildError`] when reqwest rejects the configuration.
pub(crate) fn build_http_client(options: ClientOptions) -> Result<Client, ClientBuildError> {
    let mut builder = Client::builder()
        .connect_timeout(options.connect_timeout)
        .user_agent(BROWSER_USER_AGENT)
        .default_headers(browser_default_headers())
        .cookie_store(options.cookie_store)
        .gzip(options.gzip);

    if let Some(timeout) = options.request_timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(timeout) = options.read_timeout {
        builder = builder.read_timeout(timeout);
    }

    builder.build().map_err(|error| ClientBuildError {
        client: options.name,
        reason: error.to_string(),
    })
}
