//! Payload bytes served over HTTP match the files on disk.

use std::sync::Arc;

use axum::http::{StatusCode, header};
use serde_json::json;
use trove_core::source::DirectorySource;

use crate::common::{TestLibrary, body_bytes, get, get_json, listed_ids, payload_bytes, router};

#[tokio::test]
async fn test_listed_item_streams_exact_bytes() {
    let library = TestLibrary::new();
    let video = payload_bytes(300_000, 3);
    let thumbnail = payload_bytes(512, 9);
    library.add_item(
        "LQ3K9ZP1",
        json!({"id": "LQ3K9ZP1", "name": "clip", "ext": "mp4", "tags": ["holiday"]}),
        &[("clip.mp4", video.as_slice()), ("clip_thumbnail.png", thumbnail.as_slice())],
    );

    let source = Arc::new(DirectorySource::new(library.root()));
    let app = router(source, library.config());

    let (status, body) = get_json(&app, "/getList").await;
    assert_eq!(status, StatusCode::OK);
    let ids = listed_ids(&body);
    assert_eq!(ids, vec!["LQ3K9ZP1"]);
    assert_eq!(body["data"]["files"][0]["size"], video.len());
    assert_eq!(body["data"]["files"][0]["type"], "video");

    let response = get(&app, &format!("/files/{}", ids[0])).await;
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers().clone();
    assert_eq!(headers[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(
        headers[header::CONTENT_LENGTH].to_str().unwrap(),
        video.len().to_string()
    );
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "inline; filename=\"clip.mp4\""
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let bytes = body_bytes(response).await;
    assert_eq!(bytes.len(), video.len());
    assert!(bytes == video.as_slice());
}

#[tokio::test]
async fn test_random_media_streams_the_only_match() {
    let library = TestLibrary::new();
    let keep = payload_bytes(70_000, 1);
    let other = payload_bytes(10_000, 2);
    library.add_item(
        "KEEP01",
        json!({"name": "keep.png", "tags": ["keep"]}),
        &[("keep.png", keep.as_slice())],
    );
    library.add_item(
        "SKIP01",
        json!({"name": "skip.png", "tags": ["skip"]}),
        &[("skip.png", other.as_slice())],
    );

    let app = router(
        Arc::new(DirectorySource::new(library.root())),
        library.config(),
    );

    let response = get(&app, "/getRandomMedia?tags=keep").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-trove-item-id"], "KEEP01");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert!(body_bytes(response).await == keep.as_slice());
}

#[tokio::test]
async fn test_item_without_payload_is_not_found() {
    let library = TestLibrary::new();
    library.add_item("EMPTY1", json!({"name": "empty.png"}), &[]);

    let app = router(
        Arc::new(DirectorySource::new(library.root())),
        library.config(),
    );

    let (status, body) = get_json(&app, "/files/EMPTY1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    let message = body["error"].as_str().unwrap();
    assert!(!message.contains(library.root().to_str().unwrap()));
}

#[tokio::test]
async fn test_path_escape_attempts_are_not_found() {
    let library = TestLibrary::new();
    library.add_item("SAFE01", json!({"name": "a.png"}), &[("a.png", b"png".as_slice())]);

    let app = router(
        Arc::new(DirectorySource::new(library.root())),
        library.config(),
    );

    for uri in ["/files/..", "/files/a%5Cb", "/files/..%2Fimages"] {
        let response = get(&app, uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}
