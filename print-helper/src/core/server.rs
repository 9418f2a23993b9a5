//! Server Implementation
//!
//! HTTP 服务器启动和管理

use axum::{Router, middleware};
use tower_http::cors::CorsLayer;

use crate::core::{Config, ServerState};

/// Request body limit (JSON invoices, uploaded PDFs)
pub const BODY_LIMIT: usize = 5 * 1024 * 1024;

/// HTTP 请求日志中间件
async fn log_request(
    request: http::Request<axum::body::Body>,
    next: middleware::Next,
) -> http::Response<axum::body::Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let status = response.status();

    tracing::info!(target: "http_access", "{} {} {}", method, uri, status);

    response
}

/// Build the fully layered application for a state
pub fn build_app(state: ServerState) -> Router {
    crate::api::build_router()
        .with_state(state)
        .layer(axum::extract::DefaultBodyLimit::max(BODY_LIMIT))
        // Called from a browser app on another origin
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(log_request))
}

/// HTTP Server
pub struct Server {
    config: Config,
    state: ServerState,
}

impl Server {
    pub fn new(config: Config, state: ServerState) -> Self {
        Self { config, state }
    }

    pub async fn run(&self) -> std::io::Result<()> {
        let state = self.state.clone();

        // Adopt a default printer up front so the first print is fast
        if let Err(e) = state.directory.auto_assign_default(&state.store).await {
            tracing::warn!("Startup default printer assignment failed: {}", e);
        }

        let app = build_app(state);
        let addr = self.config.listen_addr();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("🖨️  Print helper listening on http://{}", addr);

        let shutdown = async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
