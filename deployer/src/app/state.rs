//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::command::CommandRunner;
use crate::deploy::orchestrator::Orchestrator;
use crate::deploylog::file::FileDeployLog;
use crate::deploylog::memory::MemoryDeployLog;
use crate::deploylog::DeployLogStore;
use crate::errors::DeployError;
use crate::fleet::cluster::ClusterAggregator;
use crate::fleet::ctl::FleetCtl;
use crate::kv::etcd::Etcd2Client;
use crate::kv::memory::MemoryKv;
use crate::kv::KeyValueClient;
use crate::server::stats::RequestStats;
use crate::workers::deployer::{self, DeployQueue, DeployReceiver};

/// Main application state
pub struct AppState {
    /// Options the application was started with
    pub options: AppOptions,

    /// Deploy orchestrator
    pub orchestrator: Arc<Orchestrator>,

    /// Cluster snapshot builder
    pub aggregator: ClusterAggregator,

    /// Queue feeding the deployer worker
    pub deploy_queue: Arc<DeployQueue>,

    /// Deploy log
    pub deploy_log: Arc<dyn DeployLogStore>,

    /// Request statistics
    pub stats: Arc<RequestStats>,
}

impl AppState {
    /// Assemble the state from already constructed collaborators
    pub fn new(
        options: AppOptions,
        kv: Arc<dyn KeyValueClient>,
        deploy_log: Arc<dyn DeployLogStore>,
        runner: Arc<dyn CommandRunner>,
    ) -> (Self, DeployReceiver) {
        let fleet = FleetCtl::new(options.fleetctl.clone(), runner);
        let orchestrator = Arc::new(Orchestrator::new(
            kv,
            deploy_log.clone(),
            fleet.clone(),
            options.storage.work_dir(),
        ));
        let (deploy_queue, receiver) = deployer::channel();

        let state = Self {
            options,
            orchestrator,
            aggregator: ClusterAggregator::new(fleet),
            deploy_queue: Arc::new(deploy_queue),
            deploy_log,
            stats: Arc::new(RequestStats::new()),
        };
        (state, receiver)
    }

    /// Initialize application state from options
    pub async fn init(
        options: AppOptions,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<(Self, DeployReceiver), DeployError> {
        info!("Initializing application state...");

        options.storage.setup().await?;

        let kv: Arc<dyn KeyValueClient> = match &options.etcd2_endpoint {
            Some(endpoint) => {
                info!("Using etcd2 at {}", endpoint);
                Arc::new(Etcd2Client::new(endpoint)?)
            }
            None => {
                info!("No etcd2 endpoint configured, cycle state is kept in memory");
                Arc::new(MemoryKv::new())
            }
        };

        let deploy_log: Arc<dyn DeployLogStore> = match options.storage.deploy_log_dir() {
            Some(dir) => {
                info!("Deploy log at {}", dir.path().display());
                Arc::new(FileDeployLog::open(dir).await?)
            }
            None => {
                info!("No deploy log directory configured, deploy log is kept in memory");
                Arc::new(MemoryDeployLog::new())
            }
        };

        Ok(Self::new(options, kv, deploy_log, runner))
    }

    /// Stop admitting deploys
    pub fn shutdown(&self) {
        info!("Shutting down application state...");
        self.deploy_queue.close();
    }
}
