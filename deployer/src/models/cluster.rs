//! Cluster snapshot models

use serde::{Deserialize, Serialize};

/// Point-in-time view of the machines in the cluster and the units they run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    pub machines: Vec<ClusterMachine>,
}

/// A CoreOS host known to fleet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMachine {
    /// Machine ID
    #[serde(rename = "machine")]
    pub machine_id: String,

    /// IP address of the machine
    pub ip: String,

    /// Metadata and sub-cluster
    pub metadata: String,

    /// Units scheduled on this machine
    pub units: Vec<ClusterUnit>,
}

impl ClusterMachine {
    pub fn new(machine_id: &str, ip: &str, metadata: &str) -> Self {
        Self {
            machine_id: machine_id.to_string(),
            ip: ip.to_string(),
            metadata: metadata.to_string(),
            units: Vec::new(),
        }
    }
}

/// A systemd unit scheduled by fleet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterUnit {
    pub unit: String,
    pub hash: String,
    pub active: String,
    pub load: String,
    pub sub: String,
}
