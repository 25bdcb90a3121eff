//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::command::CommandRunner;
use crate::errors::DeployError;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::workers::deployer::{self, DeployReceiver};

/// Run the deploy server until `shutdown_signal` resolves
pub async fn run(
    version: String,
    options: AppOptions,
    runner: Arc<dyn CommandRunner>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DeployError> {
    info!("Initializing coreos-deploy {}...", version);

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, runner, &shutdown_tx, &mut shutdown_manager).await {
        error!("Failed to start server: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    runner: Arc<dyn CommandRunner>,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), DeployError> {
    let (app_state, receiver) = AppState::init(options.clone(), runner).await?;
    let app_state = Arc::new(app_state);
    shutdown_manager.with_app_state(app_state.clone())?;

    init_deployer_worker(app_state.clone(), receiver, shutdown_manager)?;
    init_server(options, app_state, shutdown_manager, shutdown_tx.subscribe()).await
}

fn init_deployer_worker(
    app_state: Arc<AppState>,
    receiver: DeployReceiver,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), DeployError> {
    info!("Initializing deployer worker...");

    let orchestrator = app_state.orchestrator.clone();
    let handle = tokio::spawn(async move {
        deployer::run(orchestrator, receiver).await;
    });

    shutdown_manager.with_deployer_worker_handle(handle)
}

async fn init_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DeployError> {
    info!("Initializing HTTP server...");

    let server_state = ServerState::new(&app_state);
    let handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_server_handle(handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    server_handle: Option<JoinHandle<Result<(), DeployError>>>,
    deployer_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            server_handle: None,
            deployer_worker_handle: None,
        }
    }

    fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), DeployError> {
        if self.app_state.is_some() {
            return Err(DeployError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    fn with_deployer_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), DeployError> {
        if self.deployer_worker_handle.is_some() {
            return Err(DeployError::ShutdownError("deployer_handle already set".to_string()));
        }
        self.deployer_worker_handle = Some(handle);
        Ok(())
    }

    fn with_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), DeployError>>,
    ) -> Result<(), DeployError> {
        if self.server_handle.is_some() {
            return Err(DeployError::ShutdownError("server_handle already set".to_string()));
        }
        self.server_handle = Some(handle);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), DeployError> {
        let _ = self.shutdown_tx.send(());
        info!("Shutting down coreos-deploy...");

        // 1. Stop admitting deploys
        if let Some(app_state) = self.app_state.as_ref() {
            app_state.shutdown();
        }

        // 2. HTTP server, bounded by the shutdown delay
        if let Some(mut handle) = self.server_handle.take() {
            let max_delay = self.lifecycle_options.max_shutdown_delay;
            match tokio::time::timeout(max_delay, &mut handle).await {
                Ok(joined) => joined.map_err(|e| DeployError::ShutdownError(e.to_string()))??,
                Err(_) => {
                    warn!("HTTP server did not stop within {:?}, aborting it", max_delay);
                    handle.abort();
                }
            }
        }

        // 3. Deployer worker: every queued deploy runs to completion
        if let Some(handle) = self.deployer_worker_handle.take() {
            if let Some(app_state) = self.app_state.as_ref() {
                let pending = app_state.deploy_queue.pending();
                if pending > 0 {
                    info!("Waiting for {} queued deploy(s) to finish...", pending);
                }
            }
            handle.await.map_err(|e| DeployError::ShutdownError(e.to_string()))?;
        }

        self.app_state = None;
        info!("Shutdown complete");
        Ok(())
    }
}
