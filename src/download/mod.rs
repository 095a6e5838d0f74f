//! Resumable HTTP download of one URL to one file.
//!
//! # Features
//!
//! - Resume from the bytes already on disk with `Range: bytes=<n>-`
//! - Skip the download entirely when the local file already matches the
//!   remote length
//! - Bounded retries with exponential backoff (1s, 2s, 4s, ...)
//! - Per-chunk stall timeout so a dead connection cannot hang forever
//! - Injectable [`ByteSource`], [`Sleeper`] and [`TransferObserver`] seams
//!
//! # Example
//!
//! ```no_run
//! use iwara_core::download::{ResumableTransfer, TransferConfig};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transfer = ResumableTransfer::new(TransferConfig::default())?;
//! let outcome = transfer
//!     .download("https://files.example/abc.mp4", Path::new("./abc.mp4"))
//!     .await?;
//! println!("{} bytes in {} attempt(s)", outcome.bytes, outcome.attempts);
//! # Ok(())
//! # }
//! ```

mod error;
mod retry;
mod source;
mod transfer;

pub use error::DownloadError;
pub use retry::{RetryDecision, RetryPolicy, Sleeper, TokioSleeper};
pub use source::{
    ByteSource, ByteStream, HttpByteSource, PARTIAL_CONTENT, RANGE_NOT_SATISFIABLE, RangeResponse,
};
pub use transfer::{
    DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_PER_ATTEMPT_TIMEOUT, LoggingObserver,
    ResumableTransfer, TransferConfig, TransferObserver, TransferOutcome, TransferProgress,
};
