//! Shared fixtures: router wiring, request helpers and an on-disk library
//! builder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use trove_core::{Entropy, FixedClock, ItemSource, TroveConfig};
use trove_web::{AppState, build_router};

/// Router over `source` with a fixed clock and seeded entropy.
pub fn router(source: Arc<dyn ItemSource>, config: TroveConfig) -> Router {
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    build_router(AppState::new(
        source,
        config,
        Arc::new(clock),
        Entropy::seeded(7),
    ))
}

pub async fn send(router: &Router, method: Method, uri: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    router.clone().oneshot(request).await.unwrap()
}

pub async fn get(router: &Router, uri: &str) -> Response {
    send(router, Method::GET, uri).await
}

pub async fn body_bytes(response: Response) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

/// Status and decoded JSON body of a GET.
pub async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = get(router, uri).await;
    let status = response.status();
    let body = body_bytes(response).await;
    (status, serde_json::from_slice(&body).unwrap())
}

/// Ids of the `files` array of a `/getList` body, in order.
pub fn listed_ids(body: &Value) -> Vec<String> {
    body["data"]["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|file| file["id"].as_str().unwrap().to_string())
        .collect()
}

/// Deterministic non-repeating-looking payload bytes.
pub fn payload_bytes(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i.wrapping_mul(31) as u8) ^ seed.wrapping_add((i >> 8) as u8))
        .collect()
}

/// A library on disk using the `images/<id>.info/` layout.
pub struct TestLibrary {
    dir: TempDir,
}

impl TestLibrary {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("images")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn item_dir(&self, id: &str) -> PathBuf {
        self.root().join("images").join(format!("{id}.info"))
    }

    /// Writes `metadata.json` plus the given files for one item.
    pub fn add_item(&self, id: &str, metadata: Value, files: &[(&str, &[u8])]) -> PathBuf {
        let dir = self.item_dir(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("metadata.json"), metadata.to_string()).unwrap();
        for (name, bytes) in files {
            std::fs::write(dir.join(name), bytes).unwrap();
        }
        dir
    }

    pub fn config(&self) -> TroveConfig {
        TroveConfig::for_testing(self.root())
    }
}
