//! Iwara Download Core Library
//!
//! Resolves a video id to its original-quality (`Source`) rendition and
//! downloads it with a resumable, retrying transfer.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`session`] - Authenticated API client (login, bearer-authorized GETs)
//! - [`resolver`] - Metadata, request signature, rendition manifest, listing
//! - [`download`] - Resumable ranged download with retry and stall timeout
//! - [`pipeline`] - Video id → file on disk
//! - [`config`] - TOML configuration
//!
//! # Example
//!
//! ```no_run
//! use iwara_core::{DownloaderConfig, ResumableTransfer, SessionClient, VideoDownloader};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DownloaderConfig::load_default()?;
//! let mut session = SessionClient::new(config.api_endpoints(), config.http_timeouts())?;
//! if let Some(credentials) = &config.credentials {
//!     let _ = session.login(credentials).await;
//! }
//! let transfer = ResumableTransfer::new(config.transfer_config())?;
//! let downloader = VideoDownloader::new(session, transfer, &config.output_dir);
//! let outcome = downloader.download_video("JxhNoTWKaoZzAV").await?;
//! println!("saved {}", outcome.path.display());
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub(crate) mod http_client;
pub mod pipeline;
pub mod resolver;
pub mod session;
pub mod user_agent;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::{ConfigError, DownloaderConfig};
pub use download::{DownloadError, ResumableTransfer, TransferConfig, TransferOutcome};
pub use http_client::ClientBuildError;
pub use pipeline::{PipelineError, VideoDownloader};
pub use resolver::{DownloadTarget, ResolveError, ResourceResolver, VideoMetadata};
pub use session::{Credentials, LoginOutcome, SessionClient, SessionError};
