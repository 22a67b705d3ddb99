//! Trove Core - Media library querying and payload resolution
//!
//! This crate provides the building blocks of the Trove media server: the
//! item model, interchangeable item sources (directory convention, remote
//! catalog), the query engine, the random selector and the payload resolver.
//! HTTP concerns live in `trove-web`.

pub mod clock;
pub mod config;
pub mod entropy;
pub mod filter;
pub mod item;
pub mod media_type;
pub mod query;
pub mod random;
pub mod resolver;
pub mod source;
pub mod source_kind;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::TroveConfig;
pub use entropy::Entropy;
pub use filter::{FilterParams, OrderBy, QueryFilter};
pub use item::{Filterable, Item, ItemId, ItemSummary, LightItem};
pub use media_type::FileKind;
pub use query::{Page, QueryEngine};
pub use random::RandomSelector;
pub use resolver::{ItemResolver, PayloadHandle, ResolveError};
pub use source::{ItemSource, SourceError, SourceResult};
pub use source_kind::SourceKind;

/// Errors that can bubble up from any Trove subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TroveError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TroveError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            TroveError::Source(e) => match e {
                SourceError::Unconfigured { reason } => {
                    format!("Library is not available yet: {reason}")
                }
                SourceError::Upstream { .. } => "The catalog could not be reached".to_string(),
                SourceError::InvalidId { id } => format!("'{id}' is not a valid item id"),
                SourceError::Io { .. } => "File system error occurred".to_string(),
            },
            TroveError::Resolve(e) => match e {
                ResolveError::NotFound { id } => format!("Item {id} not found"),
                ResolveError::PayloadMissing { id, .. } => {
                    format!("File for item {id} is missing")
                }
                ResolveError::Source(_) => "Item could not be resolved".to_string(),
            },
            TroveError::Configuration { reason } => format!("Configuration error: {reason}"),
            TroveError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            TroveError::Configuration { .. }
                | TroveError::Source(SourceError::InvalidId { .. })
                | TroveError::Resolve(ResolveError::NotFound { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, TroveError>;
