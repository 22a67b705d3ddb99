//! Service status endpoint.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::server::AppState;

/// Body of `GET /`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInfo {
    /// Service name
    pub name: &'static str,
    /// Crate version
    pub version: &'static str,
    /// `running`, or `unconfigured` while no library is available
    pub status: &'static str,
    /// Active item source type
    pub source: &'static str,
    /// Library root, when known
    pub library: Option<String>,
    /// Server start time
    pub started_at: DateTime<Utc>,
    /// Seconds since start
    pub uptime_seconds: i64,
    /// Route map
    pub endpoints: BTreeMap<&'static str, &'static str>,
}

/// `GET /` and every unmatched path.
pub async fn service_info(State(state): State<AppState>) -> Json<ServiceInfo> {
    let source = state.source.source_type();
    let status = if source == "unconfigured" {
        "unconfigured"
    } else {
        "running"
    };
    let uptime_seconds = (state.clock.now() - state.started_at).num_seconds().max(0);

    Json(ServiceInfo {
        name: "trove",
        version: env!("CARGO_PKG_VERSION"),
        status,
        source,
        library: state
            .source
            .library_root()
            .map(|root| root.display().to_string()),
        started_at: state.started_at,
        uptime_seconds,
        endpoints: BTreeMap::from([
            ("info", "GET /"),
            ("file", "GET /files/{id}"),
            ("list", "GET /getList"),
            ("random", "GET /getRandom"),
            ("randomMedia", "GET /getRandomMedia"),
        ]),
    })
}
