//! JSON API behavior against an in-memory library.

use std::sync::Arc;

use axum::http::{Method, StatusCode, header};
use trove_core::source::{MemorySource, UnconfiguredSource};
use trove_core::{Item, TroveConfig};

use crate::common::{body_bytes, get, get_json, listed_ids, router, send};

fn library() -> Arc<MemorySource> {
    Arc::new(MemorySource::with_items([
        Item::new("A", "a.png", "/nowhere/a.png")
            .with_size(10)
            .with_tags(["x"])
            .with_folders(["F1"]),
        Item::new("B", "b.png", "/nowhere/b.png")
            .with_size(20)
            .with_tags(["x", "y"])
            .with_folders(["F2"]),
        Item::new("C", "c.png", "/nowhere/c.png")
            .with_size(5)
            .with_tags(["y"]),
    ]))
}

fn config() -> TroveConfig {
    let mut config = TroveConfig::default();
    config.server.port = 0;
    config
}

#[tokio::test]
async fn test_tag_filter_sorted_by_size() {
    let app = router(library(), config());

    let (status, body) = get_json(&app, "/getList?tags=x&orderBy=size_asc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(listed_ids(&body), vec!["A", "B"]);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["files"][0]["size"], 10);
    assert_eq!(body["data"]["files"][1]["size"], 20);
}

#[tokio::test]
async fn test_random_without_match_is_not_found() {
    let app = router(library(), config());

    let (status, body) = get_json(&app, "/getRandom?folders=nonexistent").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_second_page_by_name() {
    let app = router(library(), config());

    let (status, body) = get_json(&app, "/getList?limit=1&offset=1&orderBy=name_asc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed_ids(&body), vec!["B"]);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["limit"], 1);
    assert_eq!(body["data"]["offset"], 1);
}

#[tokio::test]
async fn test_malformed_numbers_fall_back_to_defaults() {
    let app = router(library(), config());

    let (status, body) = get_json(&app, "/getList?limit=abc&offset=-3&orderBy=name_desc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed_ids(&body), vec!["C", "B", "A"]);
    assert_eq!(body["data"]["limit"], 100);
    assert_eq!(body["data"]["offset"], 0);
}

#[tokio::test]
async fn test_folders_match_any() {
    let app = router(library(), config());

    let (_, body) = get_json(&app, "/getList?folders=F2,F1&orderBy=name_asc").await;
    assert_eq!(listed_ids(&body), vec!["A", "B"]);

    let (_, body) = get_json(&app, "/getList?tags=x,y").await;
    assert_eq!(listed_ids(&body), vec!["B"]);
}

#[tokio::test]
async fn test_random_only_returns_matches() {
    let app = router(library(), config());

    for _ in 0..20 {
        let (status, body) = get_json(&app, "/getRandom?tags=y").await;
        assert_eq!(status, StatusCode::OK);
        let id = body["data"]["id"].as_str().unwrap();
        assert!(id == "B" || id == "C", "unexpected pick {id}");
        assert!(body["data"].get("payload").is_none());
    }
}

#[tokio::test]
async fn test_rejected_candidates_are_never_fully_resolved() {
    let source = library();
    let app = router(source.clone(), config());

    for _ in 0..10 {
        let (status, _) = get_json(&app, "/getRandom?tags=x,y").await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(source.full_calls_for(&"A".into()), 0);
    assert_eq!(source.full_calls_for(&"C".into()), 0);
    assert_eq!(source.full_calls_for(&"B".into()), 10);
}

#[tokio::test]
async fn test_repeated_parameters_still_answer_json() {
    let app = router(library(), config());

    let (status, body) = get_json(&app, "/getList?limit=5&limit=abc&orderBy=name_asc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(listed_ids(&body), vec!["A", "B", "C"]);
    assert_eq!(body["data"]["limit"], 100);

    let (status, body) = get_json(&app, "/getList?tags=x&tags=y&orderBy=name_asc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed_ids(&body), vec!["B", "C"]);

    let (status, body) = get_json(&app, "/getList?orderBy=name_asc&order_by=size_desc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed_ids(&body), vec!["B", "A", "C"]);

    for _ in 0..10 {
        let (status, body) = get_json(&app, "/getRandom?tags=y&tags=x").await;
        assert_eq!(status, StatusCode::OK);
        let id = body["data"]["id"].as_str().unwrap();
        assert!(id == "A" || id == "B", "unexpected pick {id}");
    }
}

#[tokio::test]
async fn test_every_request_sees_a_fresh_listing() {
    let source = library();
    let app = router(source.clone(), config());

    let (_, body) = get_json(&app, "/getList?orderBy=name_asc").await;
    assert_eq!(listed_ids(&body), vec!["A", "B", "C"]);

    assert!(source.remove(&"B".into()).is_some());
    let (_, body) = get_json(&app, "/getList?orderBy=name_asc").await;
    assert_eq!(listed_ids(&body), vec!["A", "C"]);
    assert_eq!(body["data"]["total"], 2);
}

#[tokio::test]
async fn test_upstream_failure_lists_nothing() {
    let source = library();
    source.set_upstream_failure(true);
    let app = router(source, config());

    let (status, body) = get_json(&app, "/getList?limit=5&offset=2").await;
    assert_eq!(status, StatusCode::OK);
    assert!(listed_ids(&body).is_empty());
    assert_eq!(body["data"]["total"], 0);
    assert_eq!(body["data"]["limit"], 5);
    assert_eq!(body["data"]["offset"], 2);
}

#[tokio::test]
async fn test_unknown_item_is_not_found() {
    let app = router(library(), config());

    let (status, body) = get_json(&app, "/files/ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("ghost"));
}

#[tokio::test]
async fn test_unconfigured_library_is_unavailable() {
    let app = router(
        Arc::new(UnconfiguredSource::new("no library path configured")),
        config(),
    );

    let (status, body) = get_json(&app, "/getList").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);

    let (status, _) = get_json(&app, "/getRandomMedia").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = get_json(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unconfigured");
}

#[tokio::test]
async fn test_service_info() {
    let source = MemorySource::with_items([Item::new("A", "a.png", "/srv/media/a.png")])
        .with_root("/srv/media");
    let app = router(Arc::new(source), config());

    let (status, body) = get_json(&app, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "trove");
    assert_eq!(body["status"], "running");
    assert_eq!(body["source"], "memory");
    assert_eq!(body["library"], "/srv/media");
    assert_eq!(body["uptimeSeconds"], 0);
    assert_eq!(body["endpoints"]["list"], "GET /getList");
}

#[tokio::test]
async fn test_preflight_on_any_path() {
    let app = router(library(), config());

    for path in ["/getList", "/files/A", "/anything"] {
        let response = send(&app, Method::OPTIONS, path).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(body_bytes(response).await.is_empty());
    }
}

#[tokio::test]
async fn test_cors_headers_on_errors_too() {
    let app = router(library(), config());

    let response = get(&app, "/files/ghost").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type"
    );
}
