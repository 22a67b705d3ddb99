//! Integration tests for Trove
//!
//! These tests drive the HTTP router end to end against real sources: an
//! in-memory library, a directory library in a temporary folder and a mock
//! catalog service on an ephemeral port.

#[path = "integration/common.rs"]
mod common;

#[path = "integration/catalog_source.rs"]
mod catalog_source;
#[path = "integration/directory_library.rs"]
mod directory_library;
#[path = "integration/http_api.rs"]
mod http_api;
#[path = "integration/streaming_roundtrip.rs"]
mod streaming_roundtrip;
