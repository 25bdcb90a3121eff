//! Server state

use std::sync::Arc;

use crate::app::options::AppOptions;
use crate::app::state::AppState;
use crate::deploylog::DeployLogStore;
use crate::fleet::cluster::ClusterAggregator;
use crate::server::stats::RequestStats;
use crate::workers::deployer::DeployQueue;

/// Server state shared across handlers
pub struct ServerState {
    pub server_name: String,
    pub options: AppOptions,
    pub deploy_queue: Arc<DeployQueue>,
    pub deploy_log: Arc<dyn DeployLogStore>,
    pub aggregator: ClusterAggregator,
    pub stats: Arc<RequestStats>,
}

impl ServerState {
    pub fn new(app_state: &AppState) -> Self {
        Self {
            server_name: app_state.options.server.name.clone(),
            options: app_state.options.clone(),
            deploy_queue: app_state.deploy_queue.clone(),
            deploy_log: app_state.deploy_log.clone(),
            aggregator: app_state.aggregator.clone(),
            stats: app_state.stats.clone(),
        }
    }

    /// Whether `token` is one of the configured API tokens
    pub fn valid_token(&self, token: &str) -> bool {
        !token.is_empty() && self.options.auth_tokens.iter().any(|t| t == token)
    }
}
