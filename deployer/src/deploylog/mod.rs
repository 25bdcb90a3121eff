//! Deploy log stores

use async_trait::async_trait;

use crate::errors::DeployError;
use crate::models::deploy::{DeployRecord, DeployRequest, DeployStatus};

pub mod file;
pub mod memory;

/// Durable record of every deploy attempt, queried by deploy id
#[async_trait]
pub trait DeployLogStore: Send + Sync {
    /// Insert a fresh record in the `Started` state
    async fn start_deploy(&self, request: &DeployRequest) -> bool;

    /// Move a started record to its terminal state
    async fn update_deploy(
        &self,
        deploy_id: &str,
        status: DeployStatus,
        message: &str,
        log: &str,
    ) -> bool;

    async fn query_deploy(&self, deploy_id: &str) -> Result<DeployRecord, DeployError>;
}
