//! Queries against the on-disk directory convention.

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;
use trove_core::TroveConfig;
use trove_core::source::DirectorySource;

use crate::common::{TestLibrary, get_json, listed_ids, router};

fn sample_library() -> TestLibrary {
    let library = TestLibrary::new();
    library.add_item(
        "IMG001",
        json!({
            "name": "harbor.png",
            "tags": ["sea", "boats"],
            "folders": ["TRIP"],
            "btime": 1_700_000_000_000_i64,
            "mtime": 1_700_000_500_000_i64,
            "annotation": "Sunrise over the harbor"
        }),
        &[("harbor.png", b"png-bytes".as_slice())],
    );
    library.add_item(
        "IMG002",
        json!({
            "name": "forest.jpg",
            "tags": ["trees"],
            "folders": ["HOME"],
            "btime": 1_600_000_000_000_i64
        }),
        &[("forest.jpg", b"jpeg".as_slice())],
    );
    library.add_item(
        "VID001",
        json!({
            "name": "waves",
            "ext": "MP4",
            "tags": ["sea"],
            "btime": 1_650_000_000_000_i64
        }),
        &[("waves.mp4", b"mp4-bytes-longer".as_slice())],
    );
    library.add_item(
        "GONE01",
        json!({"name": "deleted.png", "tags": ["sea"], "isDeleted": true}),
        &[("deleted.png", b"png".as_slice())],
    );
    library
}

fn app(library: &TestLibrary) -> axum::Router {
    router(
        Arc::new(DirectorySource::new(library.root())),
        library.config(),
    )
}

#[tokio::test]
async fn test_deleted_and_broken_items_are_hidden() {
    let library = sample_library();
    std::fs::create_dir_all(library.item_dir("NOMETA")).unwrap();
    let broken = library.item_dir("BROKEN");
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(broken.join("metadata.json"), "{ not json").unwrap();

    let (status, body) = get_json(&app(&library), "/getList?orderBy=name_asc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed_ids(&body), vec!["IMG002", "IMG001", "VID001"]);
    assert_eq!(body["data"]["total"], 3);
}

#[tokio::test]
async fn test_keyword_searches_stored_metadata() {
    let library = sample_library();

    let (_, body) = get_json(&app(&library), "/getList?keyword=SUNRISE").await;
    assert_eq!(listed_ids(&body), vec!["IMG001"]);

    let (_, body) = get_json(&app(&library), "/getList?keyword=tree").await;
    assert_eq!(listed_ids(&body), vec!["IMG002"]);
}

#[tokio::test]
async fn test_extension_filter_is_normalized() {
    let library = sample_library();

    let (_, body) = get_json(&app(&library), "/getList?ext=.MP4").await;
    assert_eq!(listed_ids(&body), vec!["VID001"]);
    assert_eq!(body["data"]["files"][0]["ext"], ".mp4");
    assert_eq!(body["data"]["files"][0]["name"], "waves");

    let (_, body) = get_json(&app(&library), "/getList?ext=png").await;
    assert_eq!(listed_ids(&body), vec!["IMG001"]);
}

#[tokio::test]
async fn test_tags_and_folders_combine() {
    let library = sample_library();

    let (_, body) = get_json(&app(&library), "/getList?tags=sea&orderBy=name_asc").await;
    assert_eq!(listed_ids(&body), vec!["IMG001", "VID001"]);

    let (_, body) = get_json(&app(&library), "/getList?tags=sea&folders=TRIP,HOME").await;
    assert_eq!(listed_ids(&body), vec!["IMG001"]);
}

#[tokio::test]
async fn test_ordering_by_stored_timestamps_and_size() {
    let library = sample_library();

    let (_, body) = get_json(&app(&library), "/getList?orderBy=created_desc").await;
    assert_eq!(listed_ids(&body), vec!["IMG001", "VID001", "IMG002"]);
    assert_eq!(body["data"]["files"][0]["created"], 1_700_000_000_000_i64);
    assert_eq!(body["data"]["files"][0]["modified"], 1_700_000_500_000_i64);

    let (_, body) = get_json(&app(&library), "/getList?orderBy=size_desc").await;
    assert_eq!(listed_ids(&body), vec!["VID001", "IMG001", "IMG002"]);
}

#[tokio::test]
async fn test_missing_library_is_unavailable() {
    let dir = tempfile::TempDir::new().unwrap();
    let missing = dir.path().join("not-there");
    let app = router(
        Arc::new(DirectorySource::new(&missing)),
        TroveConfig::for_testing(&missing),
    );

    let (status, body) = get_json(&app, "/getList").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Library is not configured");

    let (status, _) = get_json(&app, "/getRandom").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_service_info_reports_library() {
    let library = sample_library();

    let (status, body) = get_json(&app(&library), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "directory");
    assert_eq!(body["library"], library.root().display().to_string());
}
