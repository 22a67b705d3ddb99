//! Query-string extraction for the filter endpoints.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use tracing::debug;
use trove_core::FilterParams;

/// Filter parameters taken from the query string.
///
/// Never rejects a request: a repeated key keeps its last value and a query
/// string that cannot be decoded counts as empty.
#[derive(Debug, Clone, Default)]
pub struct Filters(pub FilterParams);

impl<S> FromRequestParts<S> for Filters
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let pairs = match Query::<Vec<(String, String)>>::try_from_uri(&parts.uri) {
            Ok(Query(pairs)) => pairs,
            Err(e) => {
                debug!(error = %e, "Ignoring undecodable query string");
                Vec::new()
            }
        };
        Ok(Self(FilterParams::from_pairs(pairs)))
    }
}
