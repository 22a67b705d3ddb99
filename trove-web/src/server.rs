//! HTTP server for the Trove library API
//!
//! Builds the axum router, wires the injected query components into shared
//! state and manages the listener lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::Request;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use trove_core::{
    Clock, Entropy, ItemResolver, ItemSource, QueryEngine, RandomSelector, SystemClock,
    TroveConfig, TroveError,
};

use crate::handlers::{file_by_id, list_items, random_item, random_media, service_info};

/// Shared state handed to every handler.
///
/// Everything is injected: tests build it with an in-memory source, a
/// fixed clock and seeded entropy.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Origin of library items
    pub source: Arc<dyn ItemSource>,
    /// List queries
    pub engine: QueryEngine,
    /// Random picks
    pub selector: RandomSelector,
    /// Identifier to payload resolution
    pub resolver: ItemResolver,
    /// Wall clock for uptime reporting
    pub clock: Arc<dyn Clock>,
    /// Read-only configuration
    pub config: Arc<TroveConfig>,
    /// When this state was created
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wires the query components around `source`.
    pub fn new(
        source: Arc<dyn ItemSource>,
        config: TroveConfig,
        clock: Arc<dyn Clock>,
        entropy: Entropy,
    ) -> Self {
        Self {
            engine: QueryEngine::new(Arc::clone(&source), entropy.clone()),
            selector: RandomSelector::new(Arc::clone(&source), entropy),
            resolver: ItemResolver::new(Arc::clone(&source)),
            started_at: clock.now(),
            clock,
            config: Arc::new(config),
            source,
        }
    }

    /// Production wiring: source from configuration, system clock, OS entropy.
    pub fn from_config(config: TroveConfig) -> Self {
        let source = trove_core::source::from_config(&config.library);
        Self::new(source, config, Arc::new(SystemClock), Entropy::from_os())
    }
}

/// Builds the router with CORS, preflight and request tracing.
pub fn build_router(state: AppState) -> Router {
    let enable_cors = state.config.server.enable_cors;

    let router = Router::new()
        .route("/", get(service_info))
        .route("/files/{id}", get(file_by_id))
        .route("/getList", get(list_items))
        .route("/getRandom", get(random_item))
        .route("/getRandomMedia", get(random_media))
        .fallback(service_info)
        .with_state(state)
        .layer(middleware::from_fn(answer_preflight));

    let router = if enable_cors {
        router
            .layer(SetResponseHeaderLayer::overriding(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, OPTIONS"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type"),
            ))
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http())
}

/// `OPTIONS` on any path is answered with an empty 200 before routing.
async fn answer_preflight(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    next.run(request).await
}

/// Errors from the server lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("Failed to bind {address}: {reason}")]
    BindFailed {
        /// Requested address
        address: SocketAddr,
        /// Underlying error
        reason: String,
    },

    /// `start` was called on a running server.
    #[error("Server already running on {address}")]
    AlreadyRunning {
        /// Address currently served
        address: SocketAddr,
    },

    /// The server task ended with an error.
    #[error("Server failed: {reason}")]
    ServeFailed {
        /// Underlying error
        reason: String,
    },

    /// Configuration could not be turned into a listener.
    #[error(transparent)]
    Config(#[from] TroveError),
}

/// A startable, stoppable HTTP server.
#[derive(Debug)]
pub struct MediaServer {
    state: AppState,
    local_addr: Option<SocketAddr>,
    shutdown_sender: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl MediaServer {
    /// Creates a stopped server.
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            local_addr: None,
            shutdown_sender: None,
            task: None,
        }
    }

    /// Binds the configured address and starts serving in the background.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// port 0 was requested.
    ///
    /// # Errors
    /// - `ServerError::AlreadyRunning` - Server was already started
    /// - `ServerError::Config` - Host is not a valid address
    /// - `ServerError::BindFailed` - Address could not be bound
    pub async fn start(&mut self) -> Result<SocketAddr, ServerError> {
        if let Some(address) = self.local_addr {
            return Err(ServerError::AlreadyRunning { address });
        }

        let address = self.state.config.server.bind_addr()?;
        let listener = tokio::net::TcpListener::bind(address)
            .await
            .map_err(|e| ServerError::BindFailed {
                address,
                reason: e.to_string(),
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindFailed {
                address,
                reason: e.to_string(),
            })?;

        let (shutdown_sender, shutdown_receiver) = oneshot::channel::<()>();
        let app = build_router(self.state.clone());

        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_receiver.await;
                })
                .await
        });

        tracing::info!(
            address = %local_addr,
            source = self.state.source.source_type(),
            "Trove server listening"
        );

        self.local_addr = Some(local_addr);
        self.shutdown_sender = Some(shutdown_sender);
        self.task = Some(task);
        Ok(local_addr)
    }

    /// Address being served, if running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Whether `start` succeeded and `stop` has not been called.
    pub fn is_running(&self) -> bool {
        self.local_addr.is_some()
    }

    /// Stops accepting connections and waits for in-flight requests.
    ///
    /// # Errors
    /// - `ServerError::ServeFailed` - The server task failed or panicked
    pub async fn stop(&mut self) -> Result<(), ServerError> {
        if let Some(sender) = self.shutdown_sender.take() {
            let _ = sender.send(());
        }
        self.local_addr = None;

        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| ServerError::ServeFailed {
                    reason: e.to_string(),
                })?
                .map_err(|e| ServerError::ServeFailed {
                    reason: e.to_string(),
                })?;
            tracing::info!("Trove server stopped");
        }
        Ok(())
    }
}

/// Runs the server until Ctrl-C.
///
/// # Errors
/// - `ServerError::BindFailed` - Address could not be bound
/// - `ServerError::ServeFailed` - Server task failed
pub async fn run_server(config: TroveConfig) -> Result<(), ServerError> {
    let mut server = MediaServer::new(AppState::from_config(config));
    let address = server.start().await?;
    println!("Trove media server running on http://{address}");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C, shutting down");
    }
    server.stop().await
}
