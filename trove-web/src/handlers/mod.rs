//! HTTP request handlers organized by functionality

pub mod files;
pub mod info;
pub mod params;
pub mod query;

// Re-export handler functions
pub use files::{file_by_id, random_media};
pub use info::{ServiceInfo, service_info};
pub use params::Filters;
pub use query::{ListData, list_items, random_item};
