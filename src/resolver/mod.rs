//! Video id → download target resolution.
//!
//! Resolution is two chained calls through the [`SessionClient`]:
//!
//! 1. `GET {api}/video/{id}` for [`VideoMetadata`], whose `fileUrl` carries a
//!    signed `expires` parameter.
//! 2. `GET {fileUrl}` with `X-Version: <signature>` (see [`signature`]) for the
//!    rendition manifest, from which the `Source` rendition is chosen.
//!
//! The result is a [`DownloadTarget`]: a pre-signed link that needs no
//! session to fetch.
//!
//! # Example
//!
//! ```no_run
//! use iwara_core::resolver::ResourceResolver;
//! use iwara_core::session::{ApiEndpoints, HttpTimeouts, SessionClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = SessionClient::new(ApiEndpoints::default(), HttpTimeouts::default())?;
//! let target = ResourceResolver::new(&session)
//!     .resolve_download_target("JxhNoTWKaoZzAV")
//!     .await?;
//! println!("{} ({})", target.download_url, target.file_type);
//! # Ok(())
//! # }
//! ```

mod error;
mod listing;
mod manifest;
pub mod signature;

pub use error::ResolveError;
pub use listing::{MAX_PAGE_LIMIT, Rating, Sort, VideoPage, VideoQuery, VideoSummary};
pub use manifest::{Rendition, RenditionSource, SOURCE_RENDITION, select_source};
pub use signature::{SIGNATURE_SUFFIX, derive_signature, parse_expires};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::session::SessionClient;

/// Header carrying the manifest request signature.
pub const SIGNATURE_HEADER: &str = "x-version";

/// Metadata for one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub video_id: String,
    /// File id used in the signature.
    pub file_id: String,
    /// Signed manifest URL containing `expires`.
    pub file_url: String,
    pub thumbnail_id: Option<u32>,
    pub title: Option<String>,
    /// Size in bytes as reported by the API.
    pub file_size: Option<u64>,
    pub num_views: u64,
    pub num_likes: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResponse {
    #[serde(default)]
    file_url: Option<String>,
    #[serde(default)]
    file: Option<FileResponse>,
    #[serde(default)]
    thumbnail: Option<u32>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    num_views: u64,
    #[serde(default)]
    num_likes: u64,
}

#[derive(Deserialize)]
struct FileResponse {
    id: String,
    #[serde(default)]
    size: Option<u64>,
}

/// Where and what to download for a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub video_id: String,
    /// Absolute, pre-signed download URL.
    pub download_url: String,
    /// Extension from the rendition MIME subtype, e.g. `mp4`.
    pub file_type: String,
    /// Size advertised by metadata, if any. The transfer trusts the
    /// download server's `Content-Length` instead.
    pub expected_size: Option<u64>,
}

impl DownloadTarget {
    /// `<video_id>.<file_type>`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.video_id, self.file_type)
    }
}

/// Resolves video ids using a borrowed session.
#[derive(Debug, Clone, Copy)]
pub struct ResourceResolver<'a> {
    session: &'a SessionClient,
}

impl<'a> ResourceResolver<'a> {
    /// Creates a resolver over `session`.
    #[must_use]
    pub fn new(session: &'a SessionClient) -> Self {
        Self { session }
    }

    /// Fetches [`VideoMetadata`] with a single request.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MetadataFetch`] on transport failure,
    /// non-success status, malformed body, or a body lacking `fileUrl` or
    /// `file.id`.
    #[instrument(skip(self))]
    pub async fn resolve_metadata(&self, video_id: &str) -> Result<VideoMetadata, ResolveError> {
        let url = self.session.endpoints().video_url(video_id);
        let response = self
            .session
            .authorized_get(&url, &[])
            .await
            .map_err(|e| ResolveError::metadata_fetch(video_id, e.to_string()))?;

        let body: VideoResponse = read_json(response)
            .await
            .map_err(|reason| ResolveError::metadata_fetch(video_id, reason))?;

        let file_url = body
            .file_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ResolveError::metadata_fetch(video_id, "metadata has no fileUrl"))?;
        let file = body
            .file
            .ok_or_else(|| ResolveError::metadata_fetch(video_id, "metadata has no file.id"))?;

        debug!(file_id = %file.id, "resolved video metadata");
        Ok(VideoMetadata {
            video_id: video_id.to_string(),
            file_id: file.id,
            file_url,
            thumbnail_id: body.thumbnail,
            title: body.title,
            file_size: file.size,
            num_views: body.num_views,
            num_likes: body.num_likes,
        })
    }

    /// Resolves the `Source` rendition's download link.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::MetadataFetch`] from the metadata step
    /// - [`ResolveError::SignatureResolution`] when `fileUrl` has no `expires`
    /// - [`ResolveError::ManifestFetch`] when the signed manifest request fails
    /// - [`ResolveError::NoSourceRendition`] when no entry is named `Source`
    #[instrument(skip(self))]
    pub async fn resolve_download_target(
        &self,
        video_id: &str,
    ) -> Result<DownloadTarget, ResolveError> {
        let metadata = self.resolve_metadata(video_id).await?;
        let renditions = self.fetch_manifest(&metadata).await?;

        let Some(source) = select_source(&renditions) else {
            let available = renditions.iter().map(|r| r.name.clone()).collect();
            return Err(ResolveError::no_source_rendition(video_id, available));
        };

        let target = DownloadTarget {
            video_id: video_id.to_string(),
            download_url: self
                .session
                .endpoints()
                .absolute_download_url(&source.src.download),
            file_type: source.file_type(),
            expected_size: metadata.file_size,
        };
        info!(file_type = %target.file_type, "resolved Source rendition");
        Ok(target)
    }

    /// Fetches the signed rendition manifest for `metadata`.
    ///
    /// # Errors
    ///
    /// [`ResolveError::SignatureResolution`] or [`ResolveError::ManifestFetch`].
    pub async fn fetch_manifest(
        &self,
        metadata: &VideoMetadata,
    ) -> Result<Vec<Rendition>, ResolveError> {
        let expires = parse_expires(&metadata.file_url)?;
        let signature = derive_signature(&metadata.file_id, &expires, SIGNATURE_SUFFIX);

        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&signature)
            .map_err(|e| ResolveError::manifest_fetch(&metadata.video_id, e.to_string()))?;
        headers.insert(HeaderName::from_static(SIGNATURE_HEADER), value);

        let response = self
            .session
            .authorized_get_with_headers(&metadata.file_url, headers)
            .await
            .map_err(|e| ResolveError::manifest_fetch(&metadata.video_id, e.to_string()))?;

        let renditions: Vec<Rendition> = read_json(response)
            .await
            .map_err(|reason| ResolveError::manifest_fetch(&metadata.video_id, reason))?;
        debug!(renditions = renditions.len(), "fetched rendition manifest");
        Ok(renditions)
    }

    /// Lists videos.
    ///
    /// # Errors
    ///
    /// [`ResolveError::InvalidQuery`] for a bad `date`, otherwise
    /// [`ResolveError::Listing`].
    #[instrument(skip(self))]
    pub async fn list_videos(&self, query: &VideoQuery) -> Result<VideoPage, ResolveError> {
        let params = query.to_params()?;
        let url = self.session.endpoints().videos_url();
        let response = self
            .session
            .authorized_get(&url, &params)
            .await
            .map_err(|e| ResolveError::listing(e.to_string()))?;
        let page: VideoPage = read_json(response).await.map_err(ResolveError::listing)?;
        debug!(results = page.results.len(), count = page.count, "listed videos");
        Ok(page)
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, String> {
    let url = response.url().to_string();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| format!("failed to read body from {url}: {e}"))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("malformed JSON from {url}: {e}"))
}
