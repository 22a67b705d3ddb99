//! Catalog-backed library against a mock catalog service.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::{Value, json};
use tokio_test::{assert_err, assert_ok};
use trove_core::source::CatalogSource;
use trove_core::{ItemId, ItemSource, TroveConfig};

use crate::common::{TestLibrary, body_bytes, get as http_get, get_json, listed_ids, router};

const TOKEN: &str = "secret-token";

#[derive(Clone)]
struct MockCatalog {
    records: Arc<Vec<Value>>,
    library: PathBuf,
    info_calls: Arc<AtomicUsize>,
}

type Params = Query<HashMap<String, String>>;

fn authorized(params: &HashMap<String, String>) -> bool {
    params.get("token").map(String::as_str) == Some(TOKEN)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"status": "error", "message": "bad token"})),
    )
        .into_response()
}

async fn item_list(State(catalog): State<MockCatalog>, Query(params): Params) -> Response {
    if !authorized(&params) {
        return unauthorized();
    }
    Json(json!({"status": "success", "data": catalog.records.as_slice()})).into_response()
}

async fn item_info(State(catalog): State<MockCatalog>, Query(params): Params) -> Response {
    if !authorized(&params) {
        return unauthorized();
    }
    catalog.info_calls.fetch_add(1, Ordering::SeqCst);
    let wanted = params.get("id").cloned().unwrap_or_default();
    match catalog
        .records
        .iter()
        .find(|record| record["id"].as_str() == Some(wanted.as_str()))
    {
        Some(record) => Json(json!({"status": "success", "data": record})).into_response(),
        None => Json(json!({"status": "error", "message": "Item does not exist"})).into_response(),
    }
}

async fn library_info(State(catalog): State<MockCatalog>, Query(params): Params) -> Response {
    if !authorized(&params) {
        return unauthorized();
    }
    Json(json!({
        "status": "success",
        "data": {"library": {"path": catalog.library.display().to_string()}}
    }))
    .into_response()
}

struct Fixture {
    library: TestLibrary,
    base_url: String,
    info_calls: Arc<AtomicUsize>,
    linked_payload: Vec<u8>,
    stored_payload: Vec<u8>,
}

impl Fixture {
    fn source(&self) -> CatalogSource {
        CatalogSource::new(self.base_url.clone()).with_token(TOKEN)
    }
}

/// Starts a catalog with one item linked by `filePath`, one stored under
/// the library root, one deleted item and one entry without an id.
async fn start_catalog() -> Fixture {
    let library = TestLibrary::new();

    let linked_payload = b"0123456789".to_vec();
    let linked_dir = library.root().join("linked");
    std::fs::create_dir_all(&linked_dir).unwrap();
    let linked_path = linked_dir.join("a.png");
    std::fs::write(&linked_path, &linked_payload).unwrap();

    let stored_payload = crate::common::payload_bytes(4_096, 5);
    library.add_item(
        "CAT002",
        json!({"id": "CAT002", "name": "b.png"}),
        &[("b.png", stored_payload.as_slice())],
    );

    let records = vec![
        json!({
            "id": "CAT001",
            "name": "a.png",
            "tags": ["x"],
            "size": 999,
            "filePath": linked_path.display().to_string()
        }),
        json!({"id": "CAT002", "name": "b.png", "tags": ["x", "y"], "size": 20}),
        json!({"id": "CAT003", "name": "c.png", "tags": ["y"], "isDeleted": true}),
        json!({"name": "anonymous.png", "tags": ["x"]}),
    ];

    let info_calls = Arc::new(AtomicUsize::new(0));
    let catalog = MockCatalog {
        records: Arc::new(records),
        library: library.root().to_path_buf(),
        info_calls: Arc::clone(&info_calls),
    };
    let app = Router::new()
        .route("/api/item/list", get(item_list))
        .route("/api/item/info", get(item_info))
        .route("/api/library/info", get(library_info))
        .with_state(catalog);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Fixture {
        library,
        base_url: format!("http://{address}"),
        info_calls,
        linked_payload,
        stored_payload,
    }
}

#[tokio::test]
async fn test_enumeration_skips_deleted_and_anonymous_entries() {
    let fixture = start_catalog().await;
    let source = fixture.source();

    let ids = assert_ok!(source.enumerate_ids().await);
    assert_eq!(ids, vec![ItemId::new("CAT001"), ItemId::new("CAT002")]);
}

#[tokio::test]
async fn test_lightweight_lookups_use_the_listing() {
    let fixture = start_catalog().await;
    let source = fixture.source();

    assert_ok!(source.enumerate_ids().await);
    let light = assert_ok!(source.get_lightweight(&ItemId::new("CAT002")).await).unwrap();
    assert_eq!(light.tags, vec!["x", "y"]);
    assert_eq!(fixture.info_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_full_lookup_locates_payloads() {
    let fixture = start_catalog().await;
    let source = fixture.source();

    let linked = assert_ok!(source.get_full(&ItemId::new("CAT001")).await).unwrap();
    assert!(linked.payload.ends_with("linked/a.png"));
    assert_eq!(linked.size, fixture.linked_payload.len() as u64);
    assert_eq!(source.library_root(), None);

    let stored = assert_ok!(source.get_full(&ItemId::new("CAT002")).await).unwrap();
    assert_eq!(
        stored.payload,
        fixture.library.item_dir("CAT002").join("b.png")
    );
    assert_eq!(stored.size, fixture.stored_payload.len() as u64);
    assert_eq!(
        source.library_root().as_deref(),
        Some(fixture.library.root())
    );

    let missing = assert_ok!(source.get_full(&ItemId::new("NOPE")).await);
    assert!(missing.is_none());
    let deleted = assert_ok!(source.get_full(&ItemId::new("CAT003")).await);
    assert!(deleted.is_none());
}

#[tokio::test]
async fn test_wrong_token_is_an_upstream_failure() {
    let fixture = start_catalog().await;
    let source = CatalogSource::new(fixture.base_url.clone()).with_token("wrong");

    let error = assert_err!(source.enumerate_ids().await);
    assert!(error.is_upstream());
}

#[tokio::test]
async fn test_catalog_library_over_http() {
    let fixture = start_catalog().await;
    let mut config = TroveConfig::default();
    config.server.port = 0;
    let app = router(Arc::new(fixture.source()), config);

    let (status, body) = get_json(&app, "/getList?tags=x&orderBy=size_asc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed_ids(&body), vec!["CAT001", "CAT002"]);
    assert_eq!(body["data"]["files"][0]["size"], 10);
    assert_eq!(body["data"]["files"][1]["size"], 4_096);

    let response = http_get(&app, "/files/CAT002").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_bytes(response).await == fixture.stored_payload.as_slice());

    let (status, _) = get_json(&app, "/files/CAT003").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unreachable_catalog_lists_nothing() {
    let fixture = start_catalog().await;
    let mut config = TroveConfig::default();
    config.server.port = 0;
    let source = CatalogSource::new(fixture.base_url.clone()).with_token("wrong");
    let app = router(Arc::new(source), config);

    let (status, body) = get_json(&app, "/getList").await;
    assert_eq!(status, StatusCode::OK);
    assert!(listed_ids(&body).is_empty());

    let (status, body) = get_json(&app, "/getRandom").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_queries_resolve_from_the_enumerated_records() {
    let fixture = start_catalog().await;
    let app = router(Arc::new(fixture.source()), TroveConfig::default());

    let (status, body) = get_json(&app, "/getList?orderBy=name_asc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed_ids(&body), vec!["CAT001", "CAT002"]);

    let (status, body) = get_json(&app, "/getRandom?tags=y").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "CAT002");
    assert_eq!(fixture.info_calls.load(Ordering::SeqCst), 0);

    // A direct file request is a new lookup and asks the catalog again.
    let response = http_get(&app, "/files/CAT001").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(fixture.info_calls.load(Ordering::SeqCst), 1);
}
