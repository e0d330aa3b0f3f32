//! HTTP surface of the assistant
//!
//! | Route | Method | |
//! |---|---|---|
//! | `/health` | GET | tool server connectivity |
//! | `/chat` | POST | one turn for `{message, user_id}` |
//! | `/reset-context/:user_id` | POST, DELETE | drop a customer's session |

mod routes;

pub use routes::{ChatRequest, ChatResponse, ErrorBody};

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::{Result, RentaldeskError};
use crate::handler::RequestHandler;
use crate::tools::ConnectivityCheck;

/// Shared state of every route
#[derive(Clone)]
pub struct AppState {
    /// Turn orchestration, owning the session registry
    pub handler: Arc<RequestHandler>,
    /// Tool server reachability probe
    pub toolbox: Arc<dyn ConnectivityCheck>,
}

impl AppState {
    /// Create the state
    pub fn new(handler: Arc<RequestHandler>, toolbox: Arc<dyn ConnectivityCheck>) -> Self {
        Self { handler, toolbox }
    }
}

/// Build the application router with CORS and request tracing
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/chat", post(routes::chat))
        .route(
            "/reset-context/:user_id",
            post(routes::reset_context).delete(routes::reset_context),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serves the router until Ctrl-C
///
/// # Errors
///
/// Returns error if the address cannot be bound
pub async fn serve(config: &ServerConfig, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|e| {
            RentaldeskError::Config(format!(
                "Cannot listen on {}:{}: {}",
                config.host, config.port, e
            ))
        })?;
    tracing::info!("Starting HTTP server on {}", listener.local_addr()?);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
