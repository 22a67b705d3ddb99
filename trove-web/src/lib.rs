//! Trove Web - JSON query API and payload streaming
//!
//! Serves a Trove library over HTTP: service info, filtered listings,
//! random selection and byte-exact payload streaming.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]

pub mod error;
pub mod handlers;
pub mod server;
pub mod streaming;

// Re-export main types
pub use error::{ApiError, ApiResponse};
pub use server::{AppState, MediaServer, ServerError, build_router, run_server};
