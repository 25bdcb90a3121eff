//! Deploy log persisted as one JSON file per deploy

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, warn};

use crate::deploylog::DeployLogStore;
use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::models::deploy::{DeployRecord, DeployRequest, DeployStatus};

/// Stores `{dir}/{deploy_id}.json` records
pub struct FileDeployLog {
    dir: Dir,
    // Serializes read-modify-write cycles on records.
    write_lock: Mutex<()>,
}

impl FileDeployLog {
    /// Open the store, creating its directory
    pub async fn open(dir: Dir) -> Result<Self, DeployError> {
        dir.create().await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Dir {
        &self.dir
    }

    fn record_file(&self, deploy_id: &str) -> Option<File> {
        let valid = !deploy_id.is_empty()
            && deploy_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| self.dir.file(&format!("{}.json", deploy_id)))
    }

    async fn finish(
        &self,
        deploy_id: &str,
        status: DeployStatus,
        message: &str,
        log: &str,
    ) -> Result<bool, DeployError> {
        let Some(file) = self.record_file(deploy_id) else {
            return Ok(false);
        };
        if !file.exists().await {
            return Ok(false);
        }
        let mut record: DeployRecord = file.read_json().await?;
        if !record.finish(status, message, log) {
            return Ok(false);
        }
        file.write_json(&record).await?;
        Ok(true)
    }
}

#[async_trait]
impl DeployLogStore for FileDeployLog {
    async fn start_deploy(&self, request: &DeployRequest) -> bool {
        let Some(file) = self.record_file(&request.deploy_id) else {
            warn!("refusing to record deploy id {:?}", request.deploy_id);
            return false;
        };

        let _guard = self.write_lock.lock().await;
        if file.exists().await {
            warn!("deploy {} already recorded", request.deploy_id);
            return false;
        }
        match file.write_json(&DeployRecord::started(request)).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to record deploy {}: {}", request.deploy_id, e);
                false
            }
        }
    }

    async fn update_deploy(
        &self,
        deploy_id: &str,
        status: DeployStatus,
        message: &str,
        log: &str,
    ) -> bool {
        let _guard = self.write_lock.lock().await;
        match self.finish(deploy_id, status, message, log).await {
            Ok(updated) => updated,
            Err(e) => {
                error!("Failed to update deploy {}: {}", deploy_id, e);
                false
            }
        }
    }

    async fn query_deploy(&self, deploy_id: &str) -> Result<DeployRecord, DeployError> {
        let not_found = || DeployError::NotFound(format!("deploy {}", deploy_id));
        let file = self.record_file(deploy_id).ok_or_else(not_found)?;
        if !file.exists().await {
            return Err(not_found());
        }
        file.read_json().await
    }
}
