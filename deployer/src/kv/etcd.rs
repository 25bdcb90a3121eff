//! etcd v2 HTTP client

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error};
use url::Url;

use crate::errors::DeployError;
use crate::kv::KeyValueClient;

/// Default etcd2 endpoint
pub const DEFAULT_ENDPOINT: &str = "http://0.0.0.0:2379";

#[derive(Debug, Deserialize)]
struct NodeResponse {
    node: Node,
}

#[derive(Debug, Deserialize)]
struct Node {
    #[serde(default)]
    value: Option<String>,
}

/// Key-value client speaking the etcd v2 keys API
pub struct Etcd2Client {
    client: Client,
    base_url: String,
}

impl Etcd2Client {
    /// Create a client for `endpoint`, accepting `host:port` as well as full URLs
    pub fn new(endpoint: &str) -> Result<Self, DeployError> {
        let endpoint = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("http://{}", endpoint)
        };
        let url = Url::parse(&endpoint)
            .map_err(|e| DeployError::ConfigError(format!("etcd2 endpoint {}: {}", endpoint, e)))?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: url.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn key_url(&self, key: &str) -> String {
        if key.starts_with('/') {
            format!("{}/v2/keys{}", self.base_url, key)
        } else {
            format!("{}/v2/keys/{}", self.base_url, key)
        }
    }

    async fn put(&self, key: &str, value: &str, create_only: bool) -> Result<(), DeployError> {
        let url = self.key_url(key);
        debug!("PUT {}", url);

        let mut request = self.client.put(&url).form(&[("value", value)]);
        if create_only {
            request = request.query(&[("prevExist", "false")]);
        }
        let response = request.send().await?;

        let status = response.status();
        if create_only && status == StatusCode::PRECONDITION_FAILED {
            debug!("{} already exists", key);
            return Ok(());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("etcd2 PUT {} failed: {} - {}", key, status, body);
            return Err(DeployError::KeyValueError(format!("{} {}: {}", key, status, body)));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueClient for Etcd2Client {
    async fn get(&self, keys: &[String]) -> Result<HashMap<String, String>, DeployError> {
        let mut values = HashMap::with_capacity(keys.len());
        for key in keys {
            let url = self.key_url(key);
            debug!("GET {}", url);

            let response = self.client.get(&url).send().await?;
            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Err(DeployError::NotFound(key.clone()));
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                error!("etcd2 GET {} failed: {} - {}", key, status, body);
                return Err(DeployError::KeyValueError(format!("{} {}: {}", key, status, body)));
            }

            let body: NodeResponse = response.json().await?;
            values.insert(key.clone(), body.node.value.unwrap_or_default());
        }
        Ok(values)
    }

    async fn set(&self, pairs: &HashMap<String, String>) -> Result<(), DeployError> {
        for (key, value) in pairs {
            self.put(key, value, false).await?;
        }
        Ok(())
    }

    async fn make(&self, pairs: &HashMap<String, String>) -> Result<(), DeployError> {
        for (key, value) in pairs {
            self.put(key, value, true).await?;
        }
        Ok(())
    }
}
