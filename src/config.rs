//! TOML-backed configuration for the session, transfer and output directory.
//!
//! Every field has a default, so an empty file (or no file) is valid:
//!
//! ```toml
//! output_dir = "videos"
//! api_base_url = "https://api.iwara.tv"
//! max_retries = 5
//! chunk_size = 1048576
//! per_attempt_timeout_secs = 30
//!
//! [credentials]
//! email = "me@example.com"
//! password = "hunter2"
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::download::{
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_PER_ATTEMPT_TIMEOUT, TransferConfig,
};
use crate::session::{
    ApiEndpoints, Credentials, DEFAULT_API_BASE_URL, DEFAULT_API_CONNECT_TIMEOUT_SECS,
    DEFAULT_API_REQUEST_TIMEOUT_SECS, DEFAULT_DOWNLOAD_SCHEME, HttpTimeouts,
};

/// Directory name under the XDG config home.
const CONFIG_DIR_NAME: &str = "iwara-dl";

/// Upper bound for attempts per download. The last backoff delay,
/// `2^(max_retries - 2)` seconds, stays exact up to this value.
const MAX_RETRIES_LIMIT: u32 = 32;

/// Upper bound for a single write block (64 MiB).
const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config{}: {source}", describe_path(.path.as_deref()))]
    Parse {
        /// Config file path, when parsed from disk.
        path: Option<PathBuf>,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is outside its accepted range.
    #[error("invalid config value for `{field}`: {value}. Expected {expected}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// The rejected value.
        value: String,
        /// Accepted range or form.
        expected: &'static str,
    },
}

/// Downloader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloaderConfig {
    /// Directory videos are written to.
    pub output_dir: PathBuf,
    /// API origin.
    pub api_base_url: String,
    /// Scheme for scheme-relative download links.
    pub download_scheme: String,
    pub api_connect_timeout_secs: u64,
    pub api_request_timeout_secs: u64,
    /// Attempts per download, including the first.
    pub max_retries: u32,
    /// Write block size in bytes.
    pub chunk_size: usize,
    /// Connect and stall bound for each download attempt.
    pub per_attempt_timeout_secs: u64,
    /// Optional login.
    pub credentials: Option<Credentials>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("videos"),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            download_scheme: DEFAULT_DOWNLOAD_SCHEME.to_string(),
            api_connect_timeout_secs: DEFAULT_API_CONNECT_TIMEOUT_SECS,
            api_request_timeout_secs: DEFAULT_API_REQUEST_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            chunk_size: DEFAULT_CHUNK_SIZE,
            per_attempt_timeout_secs: DEFAULT_PER_ATTEMPT_TIMEOUT.as_secs(),
            credentials: None,
        }
    }
}

impl DownloaderConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(raw).map_err(|source| ConfigError::Parse { path: None, source })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the file at `path`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Read`], [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
        config.validate()?;
        debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Loads the default config file if it exists, otherwise returns defaults.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load) when the file exists.
    pub fn load_default() -> Result<Self, ConfigError> {
        match resolve_default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Checks values against runtime constraints.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.download_scheme.as_str(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "download_scheme",
                value: self.download_scheme.clone(),
                expected: "\"http\" or \"https\"",
            });
        }
        if url::Url::parse(&self.api_base_url).is_err() {
            return Err(ConfigError::Invalid {
                field: "api_base_url",
                value: self.api_base_url.clone(),
                expected: "an absolute URL",
            });
        }
        validate_timeout_secs("api_connect_timeout_secs", self.api_connect_timeout_secs)?;
        validate_timeout_secs("api_request_timeout_secs", self.api_request_timeout_secs)?;
        validate_timeout_secs("per_attempt_timeout_secs", self.per_attempt_timeout_secs)?;
        if !(1..=MAX_RETRIES_LIMIT).contains(&self.max_retries) {
            return Err(ConfigError::Invalid {
                field: "max_retries",
                value: self.max_retries.to_string(),
                expected: "range 1..=32",
            });
        }
        if !(1..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(ConfigError::Invalid {
                field: "chunk_size",
                value: self.chunk_size.to_string(),
                expected: "range 1..=67108864",
            });
        }
        Ok(())
    }

    /// API endpoints from this config.
    #[must_use]
    pub fn api_endpoints(&self) -> ApiEndpoints {
        ApiEndpoints::new(self.api_base_url.clone()).with_download_scheme(self.download_scheme.clone())
    }

    /// API timeouts from this config.
    #[must_use]
    pub fn http_timeouts(&self) -> HttpTimeouts {
        HttpTimeouts {
            connect: Duration::from_secs(self.api_connect_timeout_secs),
            request: Duration::from_secs(self.api_request_timeout_secs),
        }
    }

    /// Transfer tunables from this config.
    #[must_use]
    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            max_retries: self.max_retries,
            chunk_size: self.chunk_size,
            per_attempt_timeout: Duration::from_secs(self.per_attempt_timeout_secs),
        }
    }
}

fn describe_path(path: Option<&Path>) -> String {
    path.map(|p| format!(" file '{}'", p.display()))
        .unwrap_or_default()
}

fn validate_timeout_secs(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if !(1..=3600).contains(&value) {
        return Err(ConfigError::Invalid {
            field,
            value: value.to_string(),
            expected: "range 1..=3600",
        });
    }
    Ok(())
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/iwara-dl/config.toml`
/// 2. `$HOME/.config/iwara-dl/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join(CONFIG_DIR_NAME)
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(CONFIG_DIR_NAME)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = DownloaderConfig::from_toml_str("").unwrap();
        assert_eq!(config, DownloaderConfig::default());
        assert_eq!(config.transfer_config(), TransferConfig::default());
        assert_eq!(config.http_timeouts(), HttpTimeouts::default());
        assert_eq!(config.api_endpoints(), ApiEndpoints::default());
    }

    #[test]
    fn test_full_document_round_trips_into_runtime_types() {
        let raw = r#"
            output_dir = "/data/videos"
            api_base_url = "http://127.0.0.1:8080"
            download_scheme = "http"
            max_retries = 3
            chunk_size = 4096
            per_attempt_timeout_secs = 10

            [credentials]
            email = "me@example.com"
            password = "pw"
        "#;
        let config = DownloaderConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/data/videos"));
        assert_eq!(
            config.api_endpoints().absolute_download_url("//cdn/x"),
            "http://cdn/x"
        );
        let transfer = config.transfer_config();
        assert_eq!(transfer.max_retries, 3);
        assert_eq!(transfer.chunk_size, 4096);
        assert_eq!(transfer.per_attempt_timeout, Duration::from_secs(10));
        assert_eq!(
            config.credentials,
            Some(Credentials::new("me@example.com", "pw"))
        );
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        for (raw, field) in [
            ("max_retries = 0", "max_retries"),
            ("max_retries = 33", "max_retries"),
            ("chunk_size = 0", "chunk_size"),
            ("per_attempt_timeout_secs = 0", "per_attempt_timeout_secs"),
            ("api_request_timeout_secs = 7200", "api_request_timeout_secs"),
            ("download_scheme = \"ftp\"", "download_scheme"),
            ("api_base_url = \"not a url\"", "api_base_url"),
        ] {
            match DownloaderConfig::from_toml_str(raw) {
                Err(ConfigError::Invalid { field: got, .. }) => assert_eq!(got, field, "{raw}"),
                other => panic!("expected Invalid for `{raw}`, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_unknown_key_is_parse_error() {
        let result = DownloaderConfig::from_toml_str("concurrency = 3");
        assert!(matches!(result, Err(ConfigError::Parse { path: None, .. })));
    }

    #[test]
    fn test_load_reads_file_and_reports_path() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("config.toml");
        fs::write(&good, "max_retries = 2\n").unwrap();
        assert_eq!(DownloaderConfig::load(&good).unwrap().max_retries, 2);

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "max_retries = \"many\"\n").unwrap();
        let err = DownloaderConfig::load(&bad).unwrap_err();
        assert!(err.to_string().contains("bad.toml"), "got: {err}");

        let missing = dir.path().join("missing.toml");
        assert!(matches!(
            DownloaderConfig::load(&missing),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_default_config_path_ends_with_app_dir() {
        if let Some(path) = resolve_default_config_path() {
            assert!(path.ends_with("iwara-dl/config.toml"), "got {}", path.display());
        }
    }
}
