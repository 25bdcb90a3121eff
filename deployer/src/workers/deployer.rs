//! Deployment worker
//!
//! Accepted deploys are queued and run by a single worker so that no two deploys ever
//! touch the cycle state at the same time. Closing the queue stops admission; the worker
//! then drains whatever is left and exits.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::deploy::orchestrator::Orchestrator;
use crate::errors::DeployError;
use crate::models::deploy::{DeployRequest, DeployStatus};

/// Admission side of the deploy queue
#[derive(Debug)]
pub struct DeployQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<DeployRequest>>>,
    pending: Arc<AtomicUsize>,
}

/// Worker side of the deploy queue
pub struct DeployReceiver {
    rx: mpsc::UnboundedReceiver<DeployRequest>,
    pending: Arc<AtomicUsize>,
}

/// Create a connected queue and receiver
pub fn channel() -> (DeployQueue, DeployReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicUsize::new(0));
    (
        DeployQueue {
            tx: Mutex::new(Some(tx)),
            pending: pending.clone(),
        },
        DeployReceiver { rx, pending },
    )
}

impl DeployQueue {
    /// Queue a deploy for background execution
    pub fn submit(&self, request: DeployRequest) -> Result<(), DeployError> {
        let tx = self
            .tx
            .lock()
            .map_err(|_| DeployError::Internal("deploy queue lock poisoned".to_string()))?;
        let Some(tx) = tx.as_ref() else {
            return Err(DeployError::ShutdownError(
                "server is shutting down, deploys are not accepted".to_string(),
            ));
        };

        self.pending.fetch_add(1, Ordering::SeqCst);
        tx.send(request).map_err(|_| {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            DeployError::ShutdownError("deploy worker has stopped".to_string())
        })
    }

    /// Stop admitting deploys. Already queued deploys still run.
    pub fn close(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            if tx.take().is_some() {
                info!("Deploy queue closed");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.lock().map(|tx| tx.is_none()).unwrap_or(true)
    }

    /// Deploys accepted but not yet finished
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

/// Run the deployer worker until the queue is closed and drained
pub async fn run(orchestrator: Arc<Orchestrator>, mut receiver: DeployReceiver) {
    info!("Deployer worker starting...");

    while let Some(request) = receiver.rx.recv().await {
        let outcome = orchestrator.deploy(&request).await;
        receiver.pending.fetch_sub(1, Ordering::SeqCst);

        match outcome.status {
            DeployStatus::Success => info!(
                "Deploy {} of {} {} succeeded",
                request.deploy_id, request.service_name, request.version
            ),
            _ => error!(
                "Deploy {} of {} {} failed: {}",
                request.deploy_id, request.service_name, request.version, outcome.message
            ),
        }
    }

    info!("Deployer worker drained, shutting down...");
}
