//! Thin wrapper over the fleetctl command line tool

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::command::{CommandError, CommandRunner};

/// Default location of the fleetctl binary shipped next to the server
pub const DEFAULT_FLEETCTL: &str = "/usr/local/bin/coreos-deploy/fleetctl";

const LIST_FLAGS: [&str; 3] = ["-full=true", "-l=true", "-no-legend"];

/// Issues unit lifecycle and listing commands against the cluster
#[derive(Clone)]
pub struct FleetCtl {
    program: String,
    runner: Arc<dyn CommandRunner>,
}

impl FleetCtl {
    pub fn new(program: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn exec(&self, verb: &str, args: &[&str]) -> Result<String, CommandError> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(verb.to_string());
        argv.extend(args.iter().map(|a| a.to_string()));
        self.runner.run(&self.program, &argv).await
    }

    /// Tab separated `machine ip metadata` lines
    pub async fn list_machines(&self) -> Result<String, CommandError> {
        let mut args = vec!["-fields=machine,ip,metadata"];
        args.extend(LIST_FLAGS);
        self.exec("list-machines", &args).await
    }

    /// Tab separated `machine/ip unit hash active load sub` lines
    pub async fn list_units(&self) -> Result<String, CommandError> {
        let mut args = vec!["-fields=machine,unit,hash,active,load,sub"];
        args.extend(LIST_FLAGS);
        self.exec("list-units", &args).await
    }

    pub async fn start(&self, unit: &str) -> Result<String, CommandError> {
        self.exec("start", &[unit]).await
    }

    pub async fn stop(&self, unit: &str) -> Result<String, CommandError> {
        self.exec("stop", &[unit]).await
    }

    pub async fn destroy(&self, unit: &str) -> Result<String, CommandError> {
        self.exec("destroy", &[unit]).await
    }

    pub async fn submit(&self, unit_file: &Path) -> Result<String, CommandError> {
        let path = unit_file.to_string_lossy();
        self.exec("submit", &[path.as_ref()]).await
    }

    /// Stop then destroy, ignoring both outcomes
    pub async fn stop_and_destroy(&self, unit: &str) {
        if let Err(e) = self.stop(unit).await {
            debug!("stop {} ignored: {}", unit, e);
        }
        self.destroy_quietly(unit).await;
    }

    pub async fn destroy_quietly(&self, unit: &str) {
        if let Err(e) = self.destroy(unit).await {
            debug!("destroy {} ignored: {}", unit, e);
        }
    }
}
