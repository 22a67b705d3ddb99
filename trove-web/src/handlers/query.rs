//! Listing and random selection endpoints.

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use tracing::debug;
use trove_core::ItemSummary;

use super::params::Filters;
use crate::error::{ApiError, ApiResponse};
use crate::server::AppState;

/// `data` of a `/getList` response.
#[derive(Debug, Serialize)]
pub struct ListData {
    /// The requested page
    pub files: Vec<ItemSummary>,
    /// Number of matches before pagination
    pub total: usize,
    /// Effective page size
    pub limit: usize,
    /// Effective offset
    pub offset: usize,
}

/// `GET /getList`: filtered, ordered, paginated summaries.
///
/// # Errors
/// - `ApiError::Unavailable` - Library not configured
/// - `ApiError::Internal` - Library could not be read
pub async fn list_items(
    State(state): State<AppState>,
    Filters(params): Filters,
) -> Result<Json<ApiResponse<ListData>>, ApiError> {
    let filter = params.into_filter(state.config.query.default_limit);
    let page = state.engine.list(&filter).await?;
    debug!(total = page.total, returned = page.items.len(), "List query");

    let page = page.map(|item| item.summary());
    Ok(ApiResponse::ok(ListData {
        files: page.items,
        total: page.total,
        limit: page.limit,
        offset: page.offset,
    }))
}

/// `GET /getRandom`: summary of one random match.
///
/// # Errors
/// - `ApiError::NotFound` - Nothing matches
/// - `ApiError::Unavailable` - Library not configured
pub async fn random_item(
    State(state): State<AppState>,
    Filters(params): Filters,
) -> Result<Json<ApiResponse<ItemSummary>>, ApiError> {
    let filter = params.into_filter(state.config.query.default_limit);
    let item = state
        .selector
        .pick_full(&filter)
        .await?
        .ok_or_else(|| ApiError::not_found("No matching item"))?;
    Ok(ApiResponse::ok(item.summary()))
}
