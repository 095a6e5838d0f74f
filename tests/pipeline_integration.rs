//! End-to-end tests: video id → metadata → signed manifest → Source file.

use std::time::Duration;

use iwara_core::download::TransferConfig;
use iwara_core::resolver::{ResolveError, ResourceResolver, VideoQuery};
use iwara_core::session::{ApiEndpoints, Credentials, HttpTimeouts};
use iwara_core::{PipelineError, ResumableTransfer, SessionClient, VideoDownloader};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const VIDEO_ID: &str = "JxhNoTWKaoZzAV";
const FILE_ID: &str = "file-42";
const EXPIRES: &str = "1700000000";
/// hex(sha1("file-42_1700000000_5nFp9kmbNnHdAFhaqMvt"))
const EXPECTED_SIGNATURE: &str = "74e3843945e4ac78f26243364a5bb1186049ad47";

struct RangeResponder {
    content: Vec<u8>,
}

impl Respond for RangeResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let offset = request
            .headers
            .get("range")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("bytes="))
            .and_then(|v| v.strip_suffix('-'))
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        if offset == 0 {
            ResponseTemplate::new(200).set_body_bytes(self.content.clone())
        } else {
            ResponseTemplate::new(206).set_body_bytes(self.content[offset..].to_vec())
        }
    }
}

fn video_bytes() -> Vec<u8> {
    (0..5_000_u32).map(|i| (i * 7 % 256) as u8).collect()
}

/// Mounts metadata, signed manifest, HEAD and ranged download endpoints.
async fn mount_site(server: &MockServer, content: &[u8]) {
    let file_url = format!(
        "{}/file/{FILE_ID}?hash=abc&expires={EXPIRES}",
        server.uri()
    );
    let download_link = format!(
        "{}/download/{FILE_ID}.mp4?download=1",
        server.uri().trim_start_matches("http:")
    );

    Mock::given(method("GET"))
        .and(path(format!("/video/{VIDEO_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": VIDEO_ID,
            "title": "Example",
            "fileUrl": file_url,
            "file": {"id": FILE_ID, "size": content.len()},
            "thumbnail": 0,
            "numViews": 100,
            "numLikes": 10
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/file/{FILE_ID}")))
        .and(header("x-version", EXPECTED_SIGNATURE))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "360", "type": "video/mp4", "src": {"view": "//x/360", "download": "//x/360?download=1"}},
            {"name": "Source", "type": "video/mp4", "src": {"view": "//x/src", "download": download_link}},
            {"name": "540", "type": "video/mp4", "src": {"view": "//x/540", "download": "//x/540?download=1"}}
        ])))
        .mount(server)
        .await;

    Mock::given(method("HEAD"))
        .and(path(format!("/download/{FILE_ID}.mp4")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.to_vec()))
        .mount(server)
        .await;
}

fn downloader(server: &MockServer, output: &std::path::Path) -> VideoDownloader {
    let session = SessionClient::new(
        ApiEndpoints::new(server.uri()).with_download_scheme("http"),
        HttpTimeouts::default(),
    )
    .expect("session client");
    let transfer = ResumableTransfer::new(TransferConfig {
        max_retries: 2,
        chunk_size: 512,
        per_attempt_timeout: Duration::from_secs(5),
    })
    .expect("transfer");
    VideoDownloader::new(session, transfer, output)
}

#[tokio::test]
async fn test_download_video_end_to_end_then_idempotent() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let server = MockServer::start().await;
    let content = video_bytes();
    mount_site(&server, &content).await;
    Mock::given(method("GET"))
        .and(path(format!("/download/{FILE_ID}.mp4")))
        .respond_with(RangeResponder {
            content: content.clone(),
        })
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("failed to create temp dir");
    let output = dir.path().join("videos");
    let downloader = downloader(&server, &output);

    let first = downloader
        .download_video(VIDEO_ID)
        .await
        .expect("first download succeeds");
    let expected_path = output.join(format!("{VIDEO_ID}.mp4"));
    assert_eq!(first.path, expected_path);
    assert_eq!(first.bytes, 5_000);
    assert_eq!(std::fs::read(&expected_path).expect("read output"), content);

    let second = downloader
        .download_video(VIDEO_ID)
        .await
        .expect("second download succeeds");
    assert!(second.already_complete, "no bytes fetched the second time");
    assert_eq!(std::fs::read(&expected_path).expect("read output"), content);
}

#[tokio::test]
async fn test_download_video_resumes_partial_file() {
    let server = MockServer::start().await;
    let content = video_bytes();
    mount_site(&server, &content).await;
    Mock::given(method("GET"))
        .and(path(format!("/download/{FILE_ID}.mp4")))
        .and(header("range", "bytes=1234-"))
        .respond_with(RangeResponder {
            content: content.clone(),
        })
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("failed to create temp dir");
    let expected_path = dir.path().join(format!("{VIDEO_ID}.mp4"));
    std::fs::write(&expected_path, &content[..1234]).expect("seed partial");

    let outcome = downloader(&server, dir.path())
        .download_video(VIDEO_ID)
        .await
        .expect("resume succeeds");

    assert!(outcome.resumed);
    assert_eq!(std::fs::read(&expected_path).expect("read output"), content);
}

#[tokio::test]
async fn test_missing_source_rendition_downloads_nothing() {
    let server = MockServer::start().await;
    let file_url = format!("{}/file/{FILE_ID}?expires={EXPIRES}", server.uri());
    Mock::given(method("GET"))
        .and(path(format!("/video/{VIDEO_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "fileUrl": file_url,
            "file": {"id": FILE_ID}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/file/{FILE_ID}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "540", "type": "video/mp4", "src": {"download": "//x/540"}}
        ])))
        .mount(&server)
        .await;

    let dir = TempDir::new().expect("failed to create temp dir");
    let result = downloader(&server, dir.path()).download_video(VIDEO_ID).await;

    assert!(matches!(
        result,
        Err(PipelineError::Resolve(ResolveError::NoSourceRendition { .. }))
    ));
    assert!(!dir.path().join(format!("{VIDEO_ID}.mp4")).exists());
}

#[tokio::test]
async fn test_logged_in_session_lists_and_resolves_with_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token": "tok-e2e"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/videos"))
        .and(query_param("subscribed", "true"))
        .and(header("authorization", "Bearer tok-e2e"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "count": 1,
            "results": [{"id": VIDEO_ID, "title": "Example", "numViews": 1, "numLikes": 0}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = SessionClient::new(ApiEndpoints::new(server.uri()), HttpTimeouts::default())
        .expect("session client");
    let outcome = session
        .login(&Credentials::new("me@example.com", "pw"))
        .await;
    assert!(outcome.is_authenticated());

    let page = ResourceResolver::new(&session)
        .list_videos(&VideoQuery {
            subscribed: true,
            ..VideoQuery::default()
        })
        .await
        .expect("listing succeeds");
    assert_eq!(page.results.len(), 1);
    assert_eq!(page.results[0].id, VIDEO_ID);
}
