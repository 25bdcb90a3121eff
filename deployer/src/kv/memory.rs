//! In-process key-value store

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::errors::DeployError;
use crate::kv::KeyValueClient;

/// Key-value store held in memory, used when no etcd2 endpoint is configured
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a single key without going through the trait
    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn poisoned() -> DeployError {
        DeployError::KeyValueError("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl KeyValueClient for MemoryKv {
    async fn get(&self, keys: &[String]) -> Result<HashMap<String, String>, DeployError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        keys.iter()
            .map(|key| {
                entries
                    .get(key)
                    .map(|value| (key.clone(), value.clone()))
                    .ok_or_else(|| DeployError::NotFound(key.clone()))
            })
            .collect()
    }

    async fn set(&self, pairs: &HashMap<String, String>) -> Result<(), DeployError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.extend(pairs.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn make(&self, pairs: &HashMap<String, String>) -> Result<(), DeployError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        for (key, value) in pairs {
            entries.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Ok(())
    }
}
