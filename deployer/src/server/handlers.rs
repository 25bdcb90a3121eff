//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::models::deploy::{
    is_safe_name, DeployRecord, DeployRequest, DeployStatus, ServiceRequest,
};
use crate::server::middleware::RequestId;
use crate::server::state::ServerState;
use crate::server::stats::StatsSnapshot;
use crate::telemetry::{collect_memory, MemoryMetrics};
use crate::utils::{random_suffix, version_info, SUFFIX_SIZE};

pub const INVALID_JSON_TEXT: &str = "Invalid JSON format in text of body in request.";
pub const INVALID_JSON_ATTRIBUTE: &str = "Invalid - 'serviceName' and 'version' are required.";
pub const INVALID_NAME_ATTRIBUTE: &str =
    "Invalid - 'serviceName' and 'version' may only contain letters, digits, '.', '_' and '-'.";

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "coreos-deploy".to_string(),
        version: version.version,
    })
}

/// Server options as reported to clients
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsView {
    pub name: String,
    pub host_name: String,
    pub domain: String,
    pub environment: String,
    pub port: u16,
    pub etcd2_endpoint: String,
    pub fleetctl: String,
    #[serde(rename = "debugEnabled")]
    pub debug: bool,
}

impl OptionsView {
    fn new(state: &ServerState) -> Self {
        let options = &state.options;
        Self {
            name: options.server.name.clone(),
            host_name: options.server.host.clone(),
            domain: options.domain.clone(),
            environment: options.environment.clone(),
            port: options.server.port,
            etcd2_endpoint: options.etcd2_endpoint.clone().unwrap_or_default(),
            fleetctl: options.fleetctl.clone(),
            debug: options.debug,
        }
    }
}

/// Info response
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub options: OptionsView,
}

/// Server information handler
pub async fn info_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(InfoResponse {
        options: OptionsView::new(&state),
    })
}

/// Metrics response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsResponse {
    pub options: OptionsView,
    pub stats: StatsSnapshot,
    pub mem_stats: MemoryMetrics,
    pub pending_deploys: usize,
}

/// Metrics handler
pub async fn metrics_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(MetricsResponse {
        options: OptionsView::new(&state),
        stats: state.stats.snapshot(),
        mem_stats: collect_memory(),
        pending_deploys: state.deploy_queue.pending(),
    })
}

/// Deploy accepted response
#[derive(Debug, Serialize, Deserialize)]
pub struct DeployResponse {
    #[serde(rename = "deployID")]
    pub deploy_id: String,
}

/// Deploy handler: queue the deploy and answer with its id straight away
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    Extension(RequestId(deploy_id)): Extension<RequestId>,
    body: Bytes,
) -> Response {
    let service: ServiceRequest = match serde_json::from_slice(&body) {
        Ok(service) => service,
        Err(_) => return (StatusCode::BAD_REQUEST, INVALID_JSON_TEXT).into_response(),
    };
    if service.service_name.is_empty() || service.version.is_empty() {
        return (StatusCode::BAD_REQUEST, INVALID_JSON_ATTRIBUTE).into_response();
    }
    if !is_safe_name(&service.service_name) || !is_safe_name(&service.version) {
        return (StatusCode::BAD_REQUEST, INVALID_NAME_ATTRIBUTE).into_response();
    }

    let request = DeployRequest::new(
        service,
        deploy_id.clone(),
        random_suffix(SUFFIX_SIZE),
        state.options.domain.clone(),
        state.options.environment.clone(),
    );
    info!(
        "Accepted deploy {} of {} {}",
        deploy_id, request.service_name, request.version
    );

    if let Err(e) = state.deploy_queue.submit(request) {
        error!("Unable to queue deploy {}: {}", deploy_id, e);
        return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
    }
    Json(DeployResponse { deploy_id }).into_response()
}

/// Deploy status as returned to clients
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployStatusResponse {
    #[serde(rename = "deployID")]
    pub deploy_id: String,
    pub domain: String,
    pub environment: String,
    pub service_name: String,
    pub version: String,
    pub suffix: String,
    pub num_instances: u32,
    pub status: DeployStatus,
    pub message: String,
    pub log: String,
    pub updated_at: String,
    pub created_at: String,
}

impl From<DeployRecord> for DeployStatusResponse {
    fn from(record: DeployRecord) -> Self {
        Self {
            deploy_id: record.deploy_id,
            domain: record.domain,
            environment: record.environment,
            service_name: record.service_name,
            version: record.version,
            suffix: record.suffix,
            num_instances: record.num_instances,
            status: record.status,
            message: record.message,
            log: record.log,
            updated_at: record.updated_at.to_rfc3339(),
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

/// Status lookup failure
#[derive(Debug, Serialize)]
pub struct StatusErrorResponse {
    pub id: String,
    pub error: String,
}

/// Deploy status handler
pub async fn status_handler(
    State(state): State<Arc<ServerState>>,
    Path(deploy_id): Path<String>,
) -> Response {
    match state.deploy_log.query_deploy(&deploy_id).await {
        Ok(record) => Json(DeployStatusResponse::from(record)).into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(StatusErrorResponse {
                id: deploy_id,
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

/// Cluster map filters
#[derive(Debug, Default, Deserialize)]
pub struct ClusterMapQuery {
    #[serde(default)]
    pub machine: String,
    #[serde(default)]
    pub unit: String,
}

/// Cluster map failure
#[derive(Debug, Serialize)]
pub struct ClusterMapError {
    pub error: String,
}

/// Cluster map handler
pub async fn cluster_map_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ClusterMapQuery>,
) -> Response {
    match state.aggregator.query(&query.machine, &query.unit).await {
        Ok(status) => Json(status).into_response(),
        Err(e) => {
            error!("Cluster map query failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ClusterMapError {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}
