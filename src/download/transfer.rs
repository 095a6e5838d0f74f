//! Resumable, retrying transfer of one URL to one file.
//!
//! The destination file doubles as the resume checkpoint: its size is the
//! offset requested on the next attempt, and because bytes are only ever
//! appended in order, the file is always a prefix of the resource.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures_util::StreamExt;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use super::{
    ByteSource, DownloadError, HttpByteSource, RetryDecision, RetryPolicy, Sleeper, TokioSleeper,
};

/// Default number of attempts per download.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default write block size (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Default bound on connecting and on each wait for body data (30 seconds).
pub const DEFAULT_PER_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables for [`ResumableTransfer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Total attempts, including the first.
    pub max_retries: u32,
    /// Bytes buffered before each write + flush.
    pub chunk_size: usize,
    /// Bound on connecting and on any single wait for the next body chunk.
    pub per_attempt_timeout: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            chunk_size: DEFAULT_CHUNK_SIZE,
            per_attempt_timeout: DEFAULT_PER_ATTEMPT_TIMEOUT,
        }
    }
}

impl TransferConfig {
    /// Checks every field is usable.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.max_retries == 0 {
            return Err(DownloadError::invalid_config("max_retries must be at least 1"));
        }
        if self.chunk_size == 0 {
            return Err(DownloadError::invalid_config("chunk_size must be at least 1 byte"));
        }
        if self.per_attempt_timeout.is_zero() {
            return Err(DownloadError::invalid_config(
                "per_attempt_timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Snapshot reported after each block reaches disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// 1-indexed attempt number.
    pub attempt: u32,
    /// Bytes durably written so far.
    pub bytes_on_disk: u64,
    /// Expected final size, when the server announced one.
    pub total_bytes: Option<u64>,
}

impl TransferProgress {
    /// Completed fraction in `0.0..=1.0`, if the total is known.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> Option<f64> {
        self.total_bytes
            .filter(|total| *total > 0)
            .map(|total| (self.bytes_on_disk as f64 / total as f64).min(1.0))
    }
}

/// Receives progress and decides whether the transfer keeps going.
pub trait TransferObserver: Send + Sync {
    /// Called after each block is written and flushed.
    fn on_progress(&self, progress: &TransferProgress);

    /// Polled before every attempt and before every read; `false` cancels.
    fn should_continue(&self) -> bool {
        true
    }
}

/// Default observer: logs progress at `debug` and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl TransferObserver for LoggingObserver {
    fn on_progress(&self, progress: &TransferProgress) {
        debug!(
            attempt = progress.attempt,
            bytes = progress.bytes_on_disk,
            total = ?progress.total_bytes,
            "transfer progress"
        );
    }
}

/// Result of a successful [`ResumableTransfer::download`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Destination file.
    pub path: PathBuf,
    /// Final file size.
    pub bytes: u64,
    /// Attempts used; zero when the file was already complete.
    pub attempts: u32,
    /// True when some attempt continued from existing bytes.
    pub resumed: bool,
    /// True when the existing file already matched the remote length.
    pub already_complete: bool,
}

/// What the attempts of one download have observed so far.
#[derive(Debug, Default)]
struct RunState {
    resumed: bool,
    already_complete: bool,
}

/// Downloads a URL to a file, resuming from whatever is already on disk.
pub struct ResumableTransfer {
    source: Arc<dyn ByteSource>,
    sleeper: Arc<dyn Sleeper>,
    observer: Arc<dyn TransferObserver>,
    policy: RetryPolicy,
    config: TransferConfig,
}

impl std::fmt::Debug for ResumableTransfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumableTransfer")
            .field("config", &self.config)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ResumableTransfer {
    /// Creates a transfer over HTTP with the default sleeper and observer.
    ///
    /// # Errors
    ///
    /// [`DownloadError::InvalidConfig`] or [`DownloadError::ClientBuild`].
    pub fn new(config: TransferConfig) -> Result<Self, DownloadError> {
        config.validate()?;
        let source = HttpByteSource::new(config.per_attempt_timeout)?;
        Self::with_source(config, Arc::new(source))
    }

    /// Creates a transfer over a custom [`ByteSource`].
    ///
    /// # Errors
    ///
    /// [`DownloadError::InvalidConfig`] when `config` is invalid.
    pub fn with_source(
        config: TransferConfig,
        source: Arc<dyn ByteSource>,
    ) -> Result<Self, DownloadError> {
        config.validate()?;
        Ok(Self {
            source,
            sleeper: Arc::new(TokioSleeper),
            observer: Arc::new(LoggingObserver),
            policy: RetryPolicy::default(),
            config,
        })
    }

    /// Replaces the sleeper used between attempts.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replaces the progress/cancellation observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replaces the backoff policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Downloads `url` to `destination`.
    ///
    /// An existing file is treated as a prefix to resume from. If it already
    /// matches the remote length no body is fetched at all.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::Exhausted`] after `max_retries` failed attempts;
    ///   the partial file has been deleted
    /// - [`DownloadError::Cancelled`] when the observer stops the transfer;
    ///   the partial file is kept
    #[instrument(skip(self, destination), fields(path = %destination.display()))]
    pub async fn download(
        &self,
        url: &str,
        destination: &Path,
    ) -> Result<TransferOutcome, DownloadError> {
        if let Some(outcome) = self.check_existing(url, destination).await {
            return Ok(outcome);
        }

        let max_attempts = self.config.max_retries;
        let mut state = RunState::default();
        let mut attempt = 1;
        loop {
            let result = self.attempt(url, destination, attempt, &mut state).await;
            let error = match result {
                Ok(bytes) => {
                    info!(bytes, attempt, resumed = state.resumed, "download complete");
                    return Ok(TransferOutcome {
                        path: destination.to_path_buf(),
                        bytes,
                        attempts: attempt,
                        resumed: state.resumed,
                        already_complete: state.already_complete,
                    });
                }
                Err(error) if error.is_terminal() => {
                    info!(error = %error, "download stopped; partial file kept");
                    return Err(error);
                }
                Err(error) => error,
            };

            warn!(attempt, max_attempts, error = %error, "download attempt failed");
            match self.policy.decide(attempt, max_attempts) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    self.sleeper.sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    warn!(reason = %reason, "giving up; removing partial file");
                    remove_partial(destination).await;
                    return Err(DownloadError::Exhausted {
                        url: url.to_string(),
                        path: destination.to_path_buf(),
                        attempts: attempt,
                        last_error: Box::new(error),
                    });
                }
            }
        }
    }

    /// Checks the remote length when a local file exists. Returns an outcome
    /// when nothing needs fetching; deletes a local file larger than the
    /// resource. Failures here fall through to the attempt loop.
    async fn check_existing(&self, url: &str, destination: &Path) -> Option<TransferOutcome> {
        let local = match local_len(destination).await {
            Ok(0) => return None,
            Ok(len) => len,
            Err(error) => {
                warn!(error = %error, "cannot size existing file; proceeding with download");
                return None;
            }
        };

        match self.source.content_length(url).await {
            Ok(Some(total)) if total == local => {
                info!(bytes = local, "file already complete; skipping download");
                Some(TransferOutcome {
                    path: destination.to_path_buf(),
                    bytes: local,
                    attempts: 0,
                    resumed: false,
                    already_complete: true,
                })
            }
            Ok(Some(total)) if total < local => {
                warn!(local, total, "local file larger than remote; restarting from zero");
                if let Err(error) = tokio::fs::remove_file(destination).await {
                    warn!(error = %error, "cannot remove oversized file");
                }
                None
            }
            Ok(total) => {
                debug!(local, ?total, "resuming from existing file");
                None
            }
            Err(error) => {
                warn!(error = %error, "length check failed; proceeding with download");
                None
            }
        }
    }

    /// One ranged fetch from the current on-disk offset. Returns the final
    /// file size on success.
    async fn attempt(
        &self,
        url: &str,
        destination: &Path,
        attempt: u32,
        state: &mut RunState,
    ) -> Result<u64, DownloadError> {
        let bytes_on_disk = local_len(destination).await?;
        self.ensure_continue(url, destination, bytes_on_disk)?;

        let limit = self.config.per_attempt_timeout;
        let response = timeout(limit, self.source.fetch_from(url, bytes_on_disk))
            .await
            .map_err(|_| DownloadError::timeout(url))??;

        if response.is_past_end() {
            info!(bytes = bytes_on_disk, "range starts at end of resource; file already complete");
            state.already_complete = true;
            return Ok(bytes_on_disk);
        }

        let mut offset = bytes_on_disk;
        if offset > 0 {
            if response.is_partial() {
                state.resumed = true;
            } else {
                debug!(status = response.status, "server ignored range; rewriting from zero");
                offset = 0;
            }
        }
        let total = response
            .content_length
            .map(|len| {
                offset
                    .checked_add(len)
                    .ok_or_else(|| DownloadError::integrity(destination, u64::MAX, offset))
            })
            .transpose()?;
        debug!(attempt, offset, ?total, "attempt started");

        let mut file = open_destination(destination, offset > 0).await?;
        let mut body = response.body;
        let chunk_size = self.config.chunk_size;
        let mut buffer = BytesMut::with_capacity(chunk_size);

        loop {
            self.ensure_continue(url, destination, offset)?;
            let next = timeout(limit, body.next())
                .await
                .map_err(|_| DownloadError::stalled(url, offset))?;
            let Some(chunk) = next else {
                break;
            };
            buffer.extend_from_slice(&chunk?);

            while buffer.len() >= chunk_size {
                let block = buffer.split_to(chunk_size);
                offset = self
                    .write_block(&mut file, destination, &block, offset, total, attempt)
                    .await?;
            }
        }
        if !buffer.is_empty() {
            offset = self
                .write_block(&mut file, destination, &buffer, offset, total, attempt)
                .await?;
        }

        match total {
            Some(expected) if expected != offset => {
                Err(DownloadError::integrity(destination, expected, offset))
            }
            _ => Ok(offset),
        }
    }

    async fn write_block(
        &self,
        file: &mut File,
        destination: &Path,
        block: &[u8],
        offset: u64,
        total: Option<u64>,
        attempt: u32,
    ) -> Result<u64, DownloadError> {
        let next = offset + block.len() as u64;
        if let Some(expected) = total {
            if next > expected {
                return Err(DownloadError::integrity(destination, expected, next));
            }
        }

        file.write_all(block)
            .await
            .map_err(|e| DownloadError::io(destination, e))?;
        file.flush()
            .await
            .map_err(|e| DownloadError::io(destination, e))?;

        self.observer.on_progress(&TransferProgress {
            attempt,
            bytes_on_disk: next,
            total_bytes: total,
        });
        Ok(next)
    }

    fn ensure_continue(
        &self,
        url: &str,
        destination: &Path,
        bytes_on_disk: u64,
    ) -> Result<(), DownloadError> {
        if self.observer.should_continue() {
            Ok(())
        } else {
            Err(DownloadError::Cancelled {
                url: url.to_string(),
                path: destination.to_path_buf(),
                bytes_on_disk,
            })
        }
    }
}

/// Size of the file at `path`, or 0 when it does not exist.
async fn local_len(path: &Path) -> Result<u64, DownloadError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(DownloadError::io(path, e)),
    }
}

async fn open_destination(path: &Path, append: bool) -> Result<File, DownloadError> {
    let mut options = OpenOptions::new();
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options
        .create(true)
        .open(path)
        .await
        .map_err(|e| DownloadError::io(path, e))
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial file"),
    }
}
