//! Video id → file on disk.
//!
//! [`VideoDownloader`] chains a [`ResourceResolver`] and a
//! [`ResumableTransfer`]: resolve the `Source` link, then download it to
//! `<output_dir>/<video_id>.<ext>`. Running it again for the same id resumes
//! or skips according to what is already on disk.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, instrument};

use crate::download::{DownloadError, ResumableTransfer, TransferOutcome};
use crate::resolver::{DownloadTarget, ResolveError, ResourceResolver};
use crate::session::SessionClient;

/// Errors from [`VideoDownloader::download_video`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The id cannot be used as a file name component.
    #[error("invalid video id '{video_id}': {reason}")]
    InvalidVideoId {
        /// The rejected id.
        video_id: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The rendition MIME subtype is not a plain file extension.
    #[error("unusable file type '{file_type}' for video '{video_id}'")]
    InvalidFileType {
        /// The requested video id.
        video_id: String,
        /// The derived extension.
        file_type: String,
    },

    /// The output directory could not be created.
    #[error("cannot prepare output directory {path}: {source}")]
    Io {
        /// The output directory.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The transfer failed.
    #[error(transparent)]
    Download(#[from] DownloadError),
}

/// Downloads videos by id into one directory.
#[derive(Debug)]
pub struct VideoDownloader {
    session: SessionClient,
    transfer: ResumableTransfer,
    output_dir: PathBuf,
}

impl VideoDownloader {
    /// Creates a downloader writing into `output_dir`.
    #[must_use]
    pub fn new(
        session: SessionClient,
        transfer: ResumableTransfer,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            session,
            transfer,
            output_dir: output_dir.into(),
        }
    }

    /// The session used for resolution.
    #[must_use]
    pub fn session(&self) -> &SessionClient {
        &self.session
    }

    /// Mutable access, e.g. to log in after construction.
    pub fn session_mut(&mut self) -> &mut SessionClient {
        &mut self.session
    }

    /// Directory downloads are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where `target` will be written.
    #[must_use]
    pub fn destination_for(&self, target: &DownloadTarget) -> PathBuf {
        self.output_dir.join(target.file_name())
    }

    /// Resolves and downloads one video.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidVideoId`] before any request is made
    /// - [`PipelineError::Resolve`] when resolution fails
    /// - [`PipelineError::InvalidFileType`] for an unusable extension
    /// - [`PipelineError::Io`] when the output directory cannot be created
    /// - [`PipelineError::Download`] when the transfer is exhausted or cancelled
    #[instrument(skip(self))]
    pub async fn download_video(&self, video_id: &str) -> Result<TransferOutcome, PipelineError> {
        validate_video_id(video_id)?;

        let target = ResourceResolver::new(&self.session)
            .resolve_download_target(video_id)
            .await?;
        validate_file_type(video_id, &target.file_type)?;

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|source| PipelineError::Io {
                path: self.output_dir.clone(),
                source,
            })?;

        let destination = self.destination_for(&target);
        let outcome = self
            .transfer
            .download(&target.download_url, &destination)
            .await?;
        info!(
            path = %outcome.path.display(),
            bytes = outcome.bytes,
            already_complete = outcome.already_complete,
            "video downloaded"
        );
        Ok(outcome)
    }
}

fn validate_video_id(video_id: &str) -> Result<(), PipelineError> {
    let reject = |reason| {
        Err(PipelineError::InvalidVideoId {
            video_id: video_id.to_string(),
            reason,
        })
    };
    if video_id.trim().is_empty() {
        return reject("id is empty");
    }
    if video_id.contains(['/', '\\']) {
        return reject("id contains a path separator");
    }
    if video_id.contains("..") {
        return reject("id contains '..'");
    }
    Ok(())
}

fn validate_file_type(video_id: &str, file_type: &str) -> Result<(), PipelineError> {
    if file_type.is_empty() || !file_type.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(PipelineError::InvalidFileType {
            video_id: video_id.to_string(),
            file_type: file_type.to_string(),
        });
    }
    Ok(())
}
