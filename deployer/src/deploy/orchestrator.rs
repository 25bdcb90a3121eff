//! Deploy orchestration
//!
//! A deploy writes the unit template to the work directory, applies the requested etcd2
//! keys, submits the template to fleet and then flips the service to its other cycle.
//! Every step is appended to a log that is stored with the terminal status of the deploy.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::deploy::cycle::flip_ab;
use crate::deploylog::DeployLogStore;
use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::fleet::ctl::FleetCtl;
use crate::kv::KeyValueClient;
use crate::models::deploy::{DeployRequest, DeployStatus};

pub const MSG_INVALID_REQUEST: &str = "Invalid service name or version.";
pub const MSG_WRITE_TEMPLATE: &str = "Unable to write service unit file to temp.";
pub const MSG_APPLY_KEYS: &str = "Unable to apply etcd2 key changes.";
pub const MSG_DESTROY_TEMPLATE: &str = "Unable to destroy previous service for new template.";
pub const MSG_SUBMIT_TEMPLATE: &str = "Unable to submit service template.";
pub const MSG_FLIP: &str = "Unable to perform A/B rotation of service.";
pub const MSG_SUCCESS: &str = "Service deployed successfully.";

/// Terminal result of a deploy, as written to the deploy log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub status: DeployStatus,
    pub message: String,
    pub log: String,
}

/// Step log accumulated in memory and persisted once at the end
#[derive(Debug, Default)]
struct StepLog {
    deploy_id: String,
    text: String,
}

impl StepLog {
    fn new(deploy_id: &str) -> Self {
        Self {
            deploy_id: deploy_id.to_string(),
            text: String::new(),
        }
    }

    fn step(&mut self, line: &str) {
        info!("[{}] {}", self.deploy_id, line);
        self.text.push_str(line);
        self.text.push('\n');
    }

    fn failure(&mut self, message: &str, err: &DeployError) {
        error!("[{}] {} {}", self.deploy_id, message, err);
        self.text.push_str(&format!("ERR: {}\n{}\n", message, err));
    }

    fn success(&mut self, message: &str) {
        info!("[{}] {}", self.deploy_id, message);
        self.text.push_str(&format!("SUCCESS: {}\n", message));
    }
}

struct StepFailure {
    message: &'static str,
    error: DeployError,
}

impl StepFailure {
    fn new(message: &'static str, error: impl Into<DeployError>) -> Self {
        Self {
            message,
            error: error.into(),
        }
    }
}

/// Runs deploys one at a time against the cluster
pub struct Orchestrator {
    kv: Arc<dyn KeyValueClient>,
    log_store: Arc<dyn DeployLogStore>,
    fleet: FleetCtl,
    work_dir: Dir,
    lock: Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        kv: Arc<dyn KeyValueClient>,
        log_store: Arc<dyn DeployLogStore>,
        fleet: FleetCtl,
        work_dir: Dir,
    ) -> Self {
        Self {
            kv,
            log_store,
            fleet,
            work_dir,
            lock: Mutex::new(()),
        }
    }

    pub fn work_dir(&self) -> &Dir {
        &self.work_dir
    }

    /// Run a deploy to completion.
    ///
    /// Never fails: the outcome is written to the deploy log and also returned.
    /// Concurrent calls are serialized for their whole duration.
    pub async fn deploy(&self, request: &DeployRequest) -> DeployOutcome {
        let _guard = self.lock.lock().await;
        info!(
            "Deploying {} {} x{} (deploy {})",
            request.service_name, request.version, request.num_instances, request.deploy_id
        );

        if !self.log_store.start_deploy(request).await {
            warn!("Unable to record start of deploy {}", request.deploy_id);
        }

        let mut log = StepLog::new(&request.deploy_id);
        let (status, message) = match self.run_steps(request, &mut log).await {
            Ok(()) => {
                log.success(MSG_SUCCESS);
                (DeployStatus::Success, MSG_SUCCESS)
            }
            Err(failure) => {
                log.failure(failure.message, &failure.error);
                (DeployStatus::Failed, failure.message)
            }
        };

        if !self
            .log_store
            .update_deploy(&request.deploy_id, status, message, &log.text)
            .await
        {
            warn!("Unable to record outcome of deploy {}", request.deploy_id);
        }

        DeployOutcome {
            status,
            message: message.to_string(),
            log: log.text,
        }
    }

    async fn run_steps(
        &self,
        request: &DeployRequest,
        log: &mut StepLog,
    ) -> Result<(), StepFailure> {
        request
            .validate()
            .map_err(|e| StepFailure::new(MSG_INVALID_REQUEST, e))?;

        log.step("Saving service unit code to temp file.");
        let template_name = request.template_file_name();
        let unit_file = self.work_dir.file(&template_name);
        unit_file
            .write_string(&request.service_template)
            .await
            .map_err(|e| StepFailure::new(MSG_WRITE_TEMPLATE, e))?;

        log.step("Applying etcd2 key changes.");
        self.kv
            .set(&request.etcd2_keys)
            .await
            .map_err(|e| StepFailure::new(MSG_APPLY_KEYS, e))?;

        log.step("Install service template.");
        if let Err(e) = self.fleet.destroy(&template_name).await {
            if !e.is_missing_unit() {
                return Err(StepFailure::new(MSG_DESTROY_TEMPLATE, e));
            }
            debug!("no previous template {}: {}", template_name, e);
        }
        self.fleet
            .submit(unit_file.path())
            .await
            .map_err(|e| StepFailure::new(MSG_SUBMIT_TEMPLATE, e))?;

        log.step("Deleting temp unit file.");
        if let Err(e) = unit_file.delete().await {
            debug!("leaving {}: {}", unit_file.path().display(), e);
        }

        log.step("Performing A/B rotation of service.");
        flip_ab(self.kv.as_ref(), &self.fleet, request)
            .await
            .map_err(|e| StepFailure::new(MSG_FLIP, e))
    }
}
