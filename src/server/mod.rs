//! HTTP surface over a [`Relay`].

pub mod error;
pub mod routes;

pub use error::ApiError;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::error::RelayError;
use crate::service::Relay;

/// Build the router. CORS allows any origin.
pub fn router(relay: Relay) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(routes::chat))
        .route("/elicitation/respond", post(routes::respond))
        .route("/elicitation/cancel", post(routes::cancel))
        .route("/elicitations", get(routes::pending))
        .route("/tools", get(routes::tools))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(relay)
}

/// Bind `bind` and serve until Ctrl-C or [`Relay::shutdown`].
pub async fn serve(relay: Relay, bind: &str) -> Result<(), RelayError> {
    if relay.is_healthy().await {
        info!(executor = relay.executor_name(), "tool executor is healthy");
    } else {
        warn!(executor = relay.executor_name(), "tool executor is not reachable; tool calls will fail");
    }

    let listener = TcpListener::bind(bind).await?;
    let addr = listener.local_addr()?;
    info!(%addr, "relay listening");

    let shutdown_relay = relay.clone();
    let token = relay.shutdown_token();
    axum::serve(listener, router(relay))
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("interrupt received"),
                _ = token.cancelled() => {}
            }
            shutdown_relay.shutdown();
        })
        .await?;

    info!("relay stopped");
    Ok(())
}
