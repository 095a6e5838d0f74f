//! Byte sources for resumable transfers.
//!
//! [`ByteSource`] is the seam between the transfer state machine and the
//! network: a length check plus a ranged fetch. [`HttpByteSource`] is the
//! production implementation; tests script their own.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, HeaderMap, RANGE};
use reqwest::{Client, Response};
use tracing::{debug, instrument};

use super::DownloadError;
use crate::http_client::{ClientOptions, build_http_client};

/// Body of a ranged response, yielded in whatever pieces the transport delivers.
pub type ByteStream = BoxStream<'static, Result<Bytes, DownloadError>>;

/// HTTP status for a satisfied range request.
pub const PARTIAL_CONTENT: u16 = 206;

/// HTTP status for a range starting at or past the end of the resource.
pub const RANGE_NOT_SATISFIABLE: u16 = 416;

/// Response to [`ByteSource::fetch_from`].
pub struct RangeResponse {
    /// HTTP status; 206 when the range was honoured, 416 when the requested
    /// offset is exactly the resource length.
    pub status: u16,
    /// `Content-Length` of this response (remaining bytes when partial).
    pub content_length: Option<u64>,
    /// Response body.
    pub body: ByteStream,
}

impl RangeResponse {
    /// True when the server honoured the requested range.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.status == PARTIAL_CONTENT
    }

    /// True when the requested offset already covers the whole resource.
    #[must_use]
    pub fn is_past_end(&self) -> bool {
        self.status == RANGE_NOT_SATISFIABLE
    }
}

impl std::fmt::Debug for RangeResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeResponse")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Where transfer bytes come from.
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Total resource length from a `HEAD` request, if the server reports one.
    async fn content_length(&self, url: &str) -> Result<Option<u64>, DownloadError>;

    /// Requests the resource from byte `offset` onwards.
    ///
    /// A range starting exactly at the end of the resource is not an error:
    /// implementations answer it with an empty body and status
    /// [`RANGE_NOT_SATISFIABLE`].
    async fn fetch_from(&self, url: &str, offset: u64) -> Result<RangeResponse, DownloadError>;
}

/// [`ByteSource`] over plain HTTP(S).
///
/// Download links are pre-signed, so no session or authorization is
/// attached. Compression is disabled so ranges address raw file bytes.
#[derive(Debug, Clone)]
pub struct HttpByteSource {
    client: Client,
}

impl HttpByteSource {
    /// Builds the download client. `timeout` bounds connecting and each
    /// socket read; there is no whole-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, DownloadError> {
        let client = build_http_client(ClientOptions {
            name: "download",
            connect_timeout: timeout,
            request_timeout: None,
            read_timeout: Some(timeout),
            cookie_store: false,
            gzip: false,
        })?;
        Ok(Self { client })
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> Result<Response, DownloadError> {
        let response = request
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, e))?;
        check_status(response, url)
    }
}

#[async_trait]
impl ByteSource for HttpByteSource {
    #[instrument(level = "debug", skip(self))]
    async fn content_length(&self, url: &str) -> Result<Option<u64>, DownloadError> {
        let response = self.send(self.client.head(url), url).await?;
        let length = header_content_length(response.headers());
        debug!(?length, "HEAD length");
        Ok(length)
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_from(&self, url: &str, offset: u64) -> Result<RangeResponse, DownloadError> {
        let response = self
            .client
            .get(url)
            .header(RANGE, format!("bytes={offset}-"))
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, e))?;

        if response.status().as_u16() == RANGE_NOT_SATISFIABLE
            && offset > 0
            && unsatisfied_range_length(response.headers()) == Some(offset)
        {
            debug!(offset, "range starts at end of resource");
            return Ok(RangeResponse {
                status: RANGE_NOT_SATISFIABLE,
                content_length: Some(0),
                body: futures_util::stream::empty::<Result<Bytes, DownloadError>>().boxed(),
            });
        }
        let response = check_status(response, url)?;

        let status = response.status().as_u16();
        let content_length = header_content_length(response.headers());
        debug!(status, ?content_length, "ranged GET");

        let owned_url = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| DownloadError::from_reqwest(owned_url.as_str(), e)))
            .boxed();

        Ok(RangeResponse {
            status,
            content_length,
            body,
        })
    }
}

fn check_status(response: Response, url: &str) -> Result<Response, DownloadError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(DownloadError::http_status(url, status.as_u16()))
    }
}

/// Complete length from a 416 `Content-Range: bytes */<length>`.
fn unsatisfied_range_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().strip_prefix("bytes */"))
        .and_then(|v| v.trim().parse().ok())
}

// Read the header directly: `Response::content_length` reports the body
// size hint, which is zero for HEAD.
fn header_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
