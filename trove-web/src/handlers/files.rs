//! Payload endpoints.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};
use trove_core::{ItemId, ResolveError};

use super::params::Filters;
use crate::error::ApiError;
use crate::server::AppState;
use crate::streaming::stream_payload;

/// `GET /files/{id}`: streams one item's payload.
pub async fn file_by_id(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = ItemId::new(id);
    debug!(%id, "File request");

    let handle = match state.resolver.resolve(&id).await {
        Ok(handle) => handle,
        Err(e) => return resolve_failure(&id, e).into_response(),
    };

    match stream_payload(handle, &state.config.streaming).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

/// `GET /getRandomMedia`: streams the payload of one random match.
pub async fn random_media(
    State(state): State<AppState>,
    Filters(params): Filters,
) -> Response {
    let filter = params.into_filter(state.config.query.default_limit);

    let item = match state.selector.pick_full(&filter).await {
        Ok(Some(item)) => item,
        Ok(None) => return ApiError::not_found("No matching item").into_response(),
        Err(e) => return ApiError::from(e).into_response(),
    };

    let id = item.id.clone();
    let handle = match state.resolver.resolve_payload(item).await {
        Ok(handle) => handle,
        Err(e) => return resolve_failure(&id, e).into_response(),
    };

    match stream_payload(handle, &state.config.streaming).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

fn resolve_failure(id: &ItemId, error: ResolveError) -> ApiError {
    match &error {
        ResolveError::NotFound { .. } | ResolveError::PayloadMissing { .. } => {
            debug!(%id, error = %error, "Payload not available");
        }
        ResolveError::Source(source) => {
            warn!(%id, error = %source, "Failed to resolve item");
        }
    }
    error.into()
}
