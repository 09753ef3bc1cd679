//! Ops server — read-only Axum JSON API for operational monitoring.
//!
//! Exposes engine statistics, the withdrawal review queue, and recently
//! settled wagers. Withdrawal requests are paid out manually, so the
//! review queue endpoint is what an operator works through.

pub mod routes;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use routes::AppState;

/// Start the ops web server. Spawns a background task, doesn't block.
pub fn spawn_ops(state: AppState, port: u16) {
    let app = build_router(state);

    tokio::spawn(async move {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        info!("Ops server starting on http://localhost:{}", port);

        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(port, error = %e, "Failed to bind ops server port");
                return;
            }
        };

        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Ops server exited with error");
        }
    });
}

/// Build the Axum router with all routes and CORS.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin("*".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/stats", get(routes::get_stats))
        .route("/api/withdrawals/pending", get(routes::get_pending_withdrawals))
        .route("/api/wagers/recent", get(routes::get_recent_wagers))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
