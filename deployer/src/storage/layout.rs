//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::storage::settings::Settings;

/// Directories used by the server
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Working directory for unit templates
    pub work_dir: PathBuf,

    /// Deploy log directory, `None` when the log is kept in memory
    pub deploy_log_dir: Option<PathBuf>,
}

impl StorageLayout {
    pub fn new(work_dir: impl Into<PathBuf>, deploy_log_dir: Option<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            deploy_log_dir,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let deploy_log_dir =
            (!settings.deploy_log_dir.is_empty()).then(|| PathBuf::from(&settings.deploy_log_dir));
        Self::new(&settings.tmp_dir, deploy_log_dir)
    }

    pub fn work_dir(&self) -> Dir {
        Dir::new(&self.work_dir)
    }

    pub fn deploy_log_dir(&self) -> Option<Dir> {
        self.deploy_log_dir.as_ref().map(Dir::new)
    }

    /// Create the directories
    pub async fn setup(&self) -> Result<(), DeployError> {
        self.work_dir().create().await?;
        if let Some(dir) = self.deploy_log_dir() {
            dir.create().await?;
        }
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}
