//! Error types for resolver operations.
//!
//! Every variant is fatal to the requested operation and surfaced
//! immediately; the resolver never retries.

use thiserror::Error;

/// Errors that can occur while turning a video id into a download target.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// Video metadata endpoint unreachable, non-success or malformed.
    #[error("failed to fetch metadata for video '{video_id}': {reason}")]
    MetadataFetch {
        /// The requested video id.
        video_id: String,
        /// Why the fetch failed.
        reason: String,
    },

    /// The metadata `fileUrl` has no usable `expires` parameter.
    #[error("cannot derive request signature from file URL '{file_url}': {reason}")]
    SignatureResolution {
        /// The file URL from metadata.
        file_url: String,
        /// Why the expiry could not be read.
        reason: String,
    },

    /// The signed rendition manifest could not be fetched or parsed.
    #[error("failed to fetch rendition manifest for video '{video_id}': {reason}")]
    ManifestFetch {
        /// The requested video id.
        video_id: String,
        /// Why the fetch failed.
        reason: String,
    },

    /// The manifest lacks a `Source` rendition.
    #[error("no Source rendition for video '{video_id}' (available: {})", .available.join(", "))]
    NoSourceRendition {
        /// The requested video id.
        video_id: String,
        /// Rendition names that were present.
        available: Vec<String>,
    },

    /// The listing endpoint failed.
    #[error("failed to list videos: {reason}")]
    Listing {
        /// Why the listing failed.
        reason: String,
    },

    /// A listing query parameter is out of range.
    #[error("invalid video query: {reason}")]
    InvalidQuery {
        /// Which parameter was rejected and why.
        reason: String,
    },
}

impl ResolveError {
    /// Creates a `MetadataFetch` error.
    #[must_use]
    pub fn metadata_fetch(video_id: &str, reason: impl Into<String>) -> Self {
        Self::MetadataFetch {
            video_id: video_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a `SignatureResolution` error.
    #[must_use]
    pub fn signature_resolution(file_url: &str, reason: impl Into<String>) -> Self {
        Self::SignatureResolution {
            file_url: file_url.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a `ManifestFetch` error.
    #[must_use]
    pub fn manifest_fetch(video_id: &str, reason: impl Into<String>) -> Self {
        Self::ManifestFetch {
            video_id: video_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a `NoSourceRendition` error.
    #[must_use]
    pub fn no_source_rendition(video_id: &str, available: Vec<String>) -> Self {
        Self::NoSourceRendition {
            video_id: video_id.to_string(),
            available,
        }
    }

    /// Creates a `Listing` error.
    #[must_use]
    pub fn listing(reason: impl Into<String>) -> Self {
        Self::Listing {
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidQuery` error.
    #[must_use]
    pub fn invalid_query(reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_fetch_display() {
        let msg = ResolveError::metadata_fetch("abc", "HTTP 404").to_string();
        assert!(msg.contains("'abc'"), "Expected id in: {msg}");
        assert!(msg.contains("HTTP 404"));
    }

    #[test]
    fn test_no_source_rendition_lists_available_names() {
        let error = ResolveError::no_source_rendition(
            "abc",
            vec!["540".to_string(), "360".to_string()],
        );
        let msg = error.to_string();
        assert!(msg.contains("no Source rendition"), "got: {msg}");
        assert!(msg.contains("540, 360"), "got: {msg}");
    }

    #[test]
    fn test_signature_resolution_display() {
        let msg = ResolveError::signature_resolution("https://f/x", "missing expires").to_string();
        assert!(msg.contains("https://f/x"));
        assert!(msg.contains("missing expires"));
    }
}
