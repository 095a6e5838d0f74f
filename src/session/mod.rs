//! Authenticated API session.
//!
//! [`SessionClient`] owns the HTTP client used for every API call: it logs in
//! once, attaches `Authorization: Bearer <token>` when a token is held, and
//! presents a browser profile so the edge serves data instead of challenges.
//!
//! Login failures are not errors. [`SessionClient::login`] returns a
//! [`LoginOutcome`] and the client simply stays anonymous on failure; callers
//! that need authentication check [`SessionClient::is_authenticated`].
//!
//! # Example
//!
//! ```no_run
//! use iwara_core::session::{ApiEndpoints, Credentials, HttpTimeouts, SessionClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = SessionClient::new(ApiEndpoints::default(), HttpTimeouts::default())?;
//! let outcome = session.login(&Credentials::new("me@example.com", "hunter2")).await;
//! if !outcome.is_authenticated() {
//!     println!("continuing anonymously");
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::SessionClient;
pub use error::SessionError;

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// Default API origin.
pub const DEFAULT_API_BASE_URL: &str = "https://api.iwara.tv";

/// Scheme applied to the scheme-relative download links found in manifests.
pub const DEFAULT_DOWNLOAD_SCHEME: &str = "https";

/// Default API connect timeout (10 seconds).
pub const DEFAULT_API_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default API request timeout (30 seconds).
pub const DEFAULT_API_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Where API calls are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    /// API origin, e.g. `https://api.iwara.tv`.
    pub api_base_url: String,
    /// Scheme (without `:`) used to complete scheme-relative download links.
    pub download_scheme: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            download_scheme: DEFAULT_DOWNLOAD_SCHEME.to_string(),
        }
    }
}

impl ApiEndpoints {
    /// Creates endpoints for a custom API origin with the default download scheme.
    #[must_use]
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    /// Overrides the download scheme (e.g. `http` against a local mirror).
    #[must_use]
    pub fn with_download_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.download_scheme = scheme.into();
        self
    }

    /// Joins an API path onto the base URL.
    #[must_use]
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// `POST` target for login.
    #[must_use]
    pub fn login_url(&self) -> String {
        self.api_url("user/login")
    }

    /// Listing endpoint.
    #[must_use]
    pub fn videos_url(&self) -> String {
        self.api_url("videos")
    }

    /// Metadata endpoint for one video.
    #[must_use]
    pub fn video_url(&self, video_id: &str) -> String {
        self.api_url(&format!("video/{video_id}"))
    }

    /// Completes a manifest download link.
    ///
    /// Scheme-relative links (`//host/path`) get the configured scheme;
    /// absolute links are returned unchanged.
    #[must_use]
    pub fn absolute_download_url(&self, link: &str) -> String {
        if link.starts_with("//") {
            format!("{}:{link}", self.download_scheme)
        } else {
            link.to_string()
        }
    }
}

/// Timeouts for API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// TCP/TLS connect timeout.
    pub connect: Duration,
    /// Whole-request timeout for API calls.
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(DEFAULT_API_CONNECT_TIMEOUT_SECS),
            request: Duration::from_secs(DEFAULT_API_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Account identifier and secret used for login.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// Account e-mail.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// True when either field is blank; such credentials are never sent.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.email.trim().is_empty() || self.password.is_empty()
    }
}

// Keep the secret out of logs and panics.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Why a login attempt left the session anonymous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationFailure {
    /// Human-readable cause.
    pub reason: String,
}

impl fmt::Display for AuthenticationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "authentication failed: {}", self.reason)
    }
}

/// Result of [`SessionClient::login`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "callers that require authentication must branch on the login outcome"]
pub enum LoginOutcome {
    /// A token was parsed and stored.
    Authenticated,
    /// No token; subsequent calls are anonymous.
    Failed(AuthenticationFailure),
}

impl LoginOutcome {
    pub(crate) fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(AuthenticationFailure {
            reason: reason.into(),
        })
    }

    /// True for [`LoginOutcome::Authenticated`].
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_endpoints_default_urls() {
        let endpoints = ApiEndpoints::default();
        assert_eq!(endpoints.login_url(), "https://api.iwara.tv/user/login");
        assert_eq!(endpoints.videos_url(), "https://api.iwara.tv/videos");
        assert_eq!(
            endpoints.video_url("JxhNoTWKaoZzAV"),
            "https://api.iwara.tv/video/JxhNoTWKaoZzAV"
        );
    }

    #[test]
    fn test_api_endpoints_trailing_slash_is_normalized() {
        let endpoints = ApiEndpoints::new("http://127.0.0.1:9000/");
        assert_eq!(endpoints.video_url("a"), "http://127.0.0.1:9000/video/a");
    }

    #[test]
    fn test_absolute_download_url_prefixes_scheme_relative_link() {
        let endpoints = ApiEndpoints::default();
        assert_eq!(
            endpoints.absolute_download_url("//cdn.example/file.mp4?x=1"),
            "https://cdn.example/file.mp4?x=1"
        );
    }

    #[test]
    fn test_absolute_download_url_keeps_absolute_link() {
        let endpoints = ApiEndpoints::default().with_download_scheme("http");
        assert_eq!(
            endpoints.absolute_download_url("https://cdn.example/f.mp4"),
            "https://cdn.example/f.mp4"
        );
        assert_eq!(
            endpoints.absolute_download_url("//cdn.example/f.mp4"),
            "http://cdn.example/f.mp4"
        );
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let credentials = Credentials::new("me@example.com", "hunter2");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("me@example.com"));
        assert!(!debug.contains("hunter2"), "password leaked: {debug}");
    }

    #[test]
    fn test_credentials_is_blank() {
        assert!(Credentials::new("", "pw").is_blank());
        assert!(Credentials::new("me@example.com", "").is_blank());
        assert!(!Credentials::new("me@example.com", "pw").is_blank());
    }

    #[test]
    fn test_login_outcome_failed_display() {
        let LoginOutcome::Failed(failure) = LoginOutcome::failed("no token") else {
            panic!("expected failure");
        };
        assert_eq!(failure.to_string(), "authentication failed: no token");
    }
}
