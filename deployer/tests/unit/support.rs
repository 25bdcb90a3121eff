//! Test doubles shared by the integration tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use coreos_deploy::command::{CommandError, CommandRunner};
use coreos_deploy::errors::DeployError;
use coreos_deploy::kv::memory::MemoryKv;
use coreos_deploy::kv::KeyValueClient;
use coreos_deploy::models::deploy::{DeployRequest, ServiceRequest};

/// Command runner that records every invocation and answers from a script.
///
/// Responses are looked up by the full argument line (`destroy web@A1.service`) and
/// then by the verb alone (`list-units`). Anything unscripted succeeds with no output.
/// Every call yields to the scheduler first, so concurrent callers get a chance to interleave.
#[derive(Default)]
pub struct ScriptedRunner {
    calls: Mutex<Vec<String>>,
    responses: Mutex<HashMap<String, Result<String, CommandError>>>,
}

impl ScriptedRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, key: &str, response: Result<String, CommandError>) {
        self.responses
            .lock()
            .unwrap()
            .insert(key.to_string(), response);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Targets of every call made with `verb`, in order
    pub fn targets(&self, verb: &str) -> Vec<String> {
        let prefix = format!("{} ", verb);
        self.calls()
            .iter()
            .filter_map(|c| c.strip_prefix(&prefix).map(|t| t.to_string()))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, _program: &str, args: &[String]) -> Result<String, CommandError> {
        tokio::task::yield_now().await;
        let line = args.join(" ");
        self.calls.lock().unwrap().push(line.clone());

        let responses = self.responses.lock().unwrap();
        let verb = args.first().map(String::as_str).unwrap_or_default();
        responses
            .get(&line)
            .or_else(|| responses.get(verb))
            .cloned()
            .unwrap_or_else(|| Ok(String::new()))
    }
}

/// Memory store whose `set` fails whenever it touches `fail_key`
pub struct FailingSetKv {
    pub inner: MemoryKv,
    pub fail_key: String,
}

#[async_trait]
impl KeyValueClient for FailingSetKv {
    async fn get(&self, keys: &[String]) -> Result<HashMap<String, String>, DeployError> {
        self.inner.get(keys).await
    }

    async fn set(&self, pairs: &HashMap<String, String>) -> Result<(), DeployError> {
        if pairs.contains_key(&self.fail_key) {
            return Err(DeployError::KeyValueError("etcd2 unavailable".to_string()));
        }
        self.inner.set(pairs).await
    }

    async fn make(&self, pairs: &HashMap<String, String>) -> Result<(), DeployError> {
        self.inner.make(pairs).await
    }
}

pub fn deploy_request(
    deploy_id: &str,
    version: &str,
    num_instances: u32,
    suffix: &str,
) -> DeployRequest {
    let body = ServiceRequest {
        service_name: "web".to_string(),
        version: version.to_string(),
        num_instances,
        service_template: "[Service]\nExecStart=/usr/bin/docker run web\n".to_string(),
        etcd2_keys: HashMap::from([(
            "/example.com/apps/web/config".to_string(),
            "{\"debug\":false}".to_string(),
        )]),
    };
    DeployRequest::new(body, deploy_id, suffix, "example.com", "development")
}
