//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::DeployError;
use crate::server::handlers::{
    cluster_map_handler, deploy_handler, health_handler, info_handler, metrics_handler,
    status_handler,
};
use crate::server::middleware::{common_headers, require_api_client};
use crate::server::state::ServerState;

/// Build the API router
pub fn router(state: Arc<ServerState>) -> Router {
    let protected = Router::new()
        .route("/v1.0/info", get(info_handler))
        .route("/v1.0/metrics", get(metrics_handler))
        .route("/v1.0/deploy", post(deploy_handler))
        .route("/v1.0/status/{deploy_id}", get(status_handler))
        .route("/v1.0/cluster_map", get(cluster_map_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_client,
        ));

    Router::new()
        // Liveness, open to anyone
        .route("/v1.0/health", get(health_handler))
        // Token protected endpoints
        .merge(protected)
        // State and middleware
        .layer(middleware::from_fn_with_state(state.clone(), common_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), DeployError>>, DeployError> {
    let app = router(state);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| DeployError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| DeployError::ServerError(e.to_string()))
    });

    Ok(handle)
}
