//! `X-Version` request signature for the rendition manifest.
//!
//! The file server only answers manifest requests carrying
//! `X-Version: hex(sha1("{file_id}_{expires}{suffix}"))`, where `expires` is
//! taken from the signed `fileUrl` in the video metadata.

use sha1::{Digest, Sha1};
use url::Url;

use super::ResolveError;

/// Shared suffix mixed into every signature.
///
/// Owned by the server and subject to change without notice; this is the
/// only place it is written down.
pub const SIGNATURE_SUFFIX: &str = "_5nFp9kmbNnHdAFhaqMvt";

/// Computes the lowercase hex SHA-1 signature for a file.
#[must_use]
pub fn derive_signature(file_id: &str, expires: &str, suffix: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(file_id.as_bytes());
    hasher.update(b"_");
    hasher.update(expires.as_bytes());
    hasher.update(suffix.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Extracts the `expires` query parameter from a signed file URL.
///
/// The parameter may appear anywhere in the query string.
///
/// # Errors
///
/// Returns [`ResolveError::SignatureResolution`] when the URL does not parse
/// or carries no non-empty `expires` value.
pub fn parse_expires(file_url: &str) -> Result<String, ResolveError> {
    let parsed = Url::parse(file_url)
        .map_err(|e| ResolveError::signature_resolution(file_url, format!("invalid URL: {e}")))?;

    parsed
        .query_pairs()
        .find(|(key, _)| key == "expires")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            ResolveError::signature_resolution(file_url, "missing `expires` query parameter")
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_signature_known_vector() {
        assert_eq!(
            derive_signature("abc", "123", "_5nFp9kmbNnHdAFhaqMvt"),
            "b870ad6db71bbbccfc9c3df63fcc12d85eadfc5f"
        );
    }

    #[test]
    fn test_derive_signature_uses_shared_suffix_constant() {
        assert_eq!(
            derive_signature("abc", "123", SIGNATURE_SUFFIX),
            derive_signature("abc", "123", "_5nFp9kmbNnHdAFhaqMvt")
        );
    }

    #[test]
    fn test_derive_signature_changes_with_expiry() {
        let first = derive_signature("abc", "123", SIGNATURE_SUFFIX);
        let second = derive_signature("abc", "124", SIGNATURE_SUFFIX);
        assert_ne!(first, second);
        assert_eq!(second, "66bc7670ef8c27dfbab0bce6f3495a4206096392");
        assert_eq!(first.len(), 40, "160-bit digest is 40 hex chars");
    }

    #[test]
    fn test_parse_expires_first_position() {
        let url = "https://files.iwara.tv/file/abc?expires=999&sig=xyz";
        assert_eq!(parse_expires(url).unwrap(), "999");
    }

    #[test]
    fn test_parse_expires_later_position() {
        let url = "https://files.iwara.tv/file/abc?sig=xyz&expires=999";
        assert_eq!(parse_expires(url).unwrap(), "999");
    }

    #[test]
    fn test_parse_expires_missing_parameter() {
        let result = parse_expires("https://files.iwara.tv/file/abc?sig=xyz");
        assert!(matches!(result, Err(ResolveError::SignatureResolution { .. })));
    }

    #[test]
    fn test_parse_expires_empty_value() {
        let result = parse_expires("https://files.iwara.tv/file/abc?expires=&sig=xyz");
        assert!(matches!(result, Err(ResolveError::SignatureResolution { .. })));
    }

    #[test]
    fn test_parse_expires_unparseable_url() {
        let result = parse_expires("file/abc?expires=1");
        assert!(matches!(result, Err(ResolveError::SignatureResolution { .. })));
    }
}
