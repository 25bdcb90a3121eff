//! In-memory deploy log

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;

use crate::deploylog::DeployLogStore;
use crate::errors::DeployError;
use crate::models::deploy::{DeployRecord, DeployRequest, DeployStatus};

/// Deploy log kept for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryDeployLog {
    records: RwLock<HashMap<String, DeployRecord>>,
}

impl MemoryDeployLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl DeployLogStore for MemoryDeployLog {
    async fn start_deploy(&self, request: &DeployRequest) -> bool {
        let mut records = self.records.write().await;
        if records.contains_key(&request.deploy_id) {
            warn!("deploy {} already recorded", request.deploy_id);
            return false;
        }
        records.insert(request.deploy_id.clone(), DeployRecord::started(request));
        true
    }

    async fn update_deploy(
        &self,
        deploy_id: &str,
        status: DeployStatus,
        message: &str,
        log: &str,
    ) -> bool {
        let mut records = self.records.write().await;
        match records.get_mut(deploy_id) {
            Some(record) => record.finish(status, message, log),
            None => false,
        }
    }

    async fn query_deploy(&self, deploy_id: &str) -> Result<DeployRecord, DeployError> {
        self.records
            .read()
            .await
            .get(deploy_id)
            .cloned()
            .ok_or_else(|| DeployError::NotFound(format!("deploy {}", deploy_id)))
    }
}
