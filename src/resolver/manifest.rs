//! Rendition manifest returned by the signed `fileUrl` request.

use serde::Deserialize;

/// Name of the original-quality rendition.
pub const SOURCE_RENDITION: &str = "Source";

/// One quality variant in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Rendition {
    /// Quality label, e.g. `Source`, `540`, `360`.
    pub name: String,
    /// MIME type, e.g. `video/mp4`.
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Links for this rendition.
    pub src: RenditionSource,
}

/// Links attached to a rendition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenditionSource {
    /// Pre-signed, scheme-relative download link (`//host/path?...`).
    pub download: String,
}

impl Rendition {
    /// File extension derived from the MIME subtype (`video/mp4` → `mp4`).
    ///
    /// Parameters such as `; codecs=...` are dropped.
    #[must_use]
    pub fn file_type(&self) -> String {
        let essence = self
            .mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        essence
            .rsplit('/')
            .next()
            .unwrap_or(essence)
            .to_ascii_lowercase()
    }
}

/// Picks the `Source` rendition.
///
/// When several entries are named `Source` the first one wins; lower
/// qualities are never substituted.
#[must_use]
pub fn select_source(renditions: &[Rendition]) -> Option<&Rendition> {
    renditions.iter().find(|r| r.name == SOURCE_RENDITION)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rendition(name: &str, link: &str) -> Rendition {
        Rendition {
            name: name.to_string(),
            mime_type: "video/mp4".to_string(),
            src: RenditionSource {
                download: link.to_string(),
            },
        }
    }

    #[test]
    fn test_select_source_regardless_of_position() {
        let renditions = vec![
            rendition("Preview", "//cdn/preview"),
            rendition("Source", "//cdn/source"),
            rendition("Trailer", "//cdn/trailer"),
        ];
        let selected = select_source(&renditions).unwrap();
        assert_eq!(selected.src.download, "//cdn/source");
    }

    #[test]
    fn test_select_source_first_of_duplicates() {
        let renditions = vec![
            rendition("Source", "//cdn/first"),
            rendition("Source", "//cdn/second"),
        ];
        assert_eq!(select_source(&renditions).unwrap().src.download, "//cdn/first");
    }

    #[test]
    fn test_select_source_absent() {
        let renditions = vec![rendition("540", "//cdn/540"), rendition("360", "//cdn/360")];
        assert!(select_source(&renditions).is_none());
    }

    #[test]
    fn test_select_source_is_case_sensitive() {
        let renditions = vec![rendition("source", "//cdn/lower")];
        assert!(select_source(&renditions).is_none());
    }

    #[test]
    fn test_file_type_from_mime() {
        let mut r = rendition("Source", "//cdn/x");
        assert_eq!(r.file_type(), "mp4");
        r.mime_type = "video/webm; codecs=\"vp9\"".to_string();
        assert_eq!(r.file_type(), "webm");
    }

    #[test]
    fn test_manifest_deserializes_wire_format() {
        let raw = r#"[
            {"id":"1","name":"Source","type":"video/mp4","src":{"view":"//v/1","download":"//d/1?download=1"}},
            {"id":"2","name":"540","type":"video/mp4","src":{"view":"//v/2","download":"//d/2"}}
        ]"#;
        let renditions: Vec<Rendition> = serde_json::from_str(raw).unwrap();
        assert_eq!(renditions.len(), 2);
        assert_eq!(renditions[0].name, "Source");
        assert_eq!(renditions[0].src.download, "//d/1?download=1");
    }
}
