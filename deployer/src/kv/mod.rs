//! Key-value store clients

use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::DeployError;

pub mod etcd;
pub mod memory;

/// Access to the namespaced key space shared by the cluster
#[async_trait]
pub trait KeyValueClient: Send + Sync {
    /// Fetch the given keys. A missing key is an error.
    async fn get(&self, keys: &[String]) -> Result<HashMap<String, String>, DeployError>;

    /// Upsert every pair, stopping at the first failure
    async fn set(&self, pairs: &HashMap<String, String>) -> Result<(), DeployError>;

    /// Create the pairs whose keys do not exist yet, leaving existing keys untouched
    async fn make(&self, pairs: &HashMap<String, String>) -> Result<(), DeployError>;
}
