//! Deploy request and deploy log models

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DeployError;

/// Whether `value` can be embedded in a file name, unit name or etcd key.
///
/// Only `[A-Za-z0-9._-]` is allowed and `..` may not appear.
pub fn is_safe_name(value: &str) -> bool {
    !value.is_empty()
        && !value.contains("..")
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Body of a deploy request as posted by a client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    /// Name of the service to deploy
    pub service_name: String,

    /// Version being deployed
    pub version: String,

    /// Number of instances to start
    #[serde(default)]
    pub num_instances: u32,

    /// Source of the unit template
    #[serde(default)]
    pub service_template: String,

    /// etcd2 keys to apply before the rollout
    #[serde(default)]
    pub etcd2_keys: HashMap<String, String>,
}

/// A fully resolved deploy attempt.
///
/// Built once a request is accepted; the runtime fields are fixed from then on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub deploy_id: String,
    pub domain: String,
    pub environment: String,
    pub service_name: String,
    pub version: String,
    pub num_instances: u32,
    pub service_template: String,
    pub etcd2_keys: HashMap<String, String>,
    pub suffix: String,
}

impl DeployRequest {
    pub fn new(
        body: ServiceRequest,
        deploy_id: impl Into<String>,
        suffix: impl Into<String>,
        domain: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            deploy_id: deploy_id.into(),
            domain: domain.into(),
            environment: environment.into(),
            service_name: body.service_name,
            version: body.version,
            num_instances: body.num_instances,
            service_template: body.service_template,
            etcd2_keys: body.etcd2_keys,
            suffix: suffix.into(),
        }
    }

    /// Reject service names and versions that would escape the work dir or the etcd tree
    pub fn validate(&self) -> Result<(), DeployError> {
        for (field, value) in [("serviceName", &self.service_name), ("version", &self.version)] {
            if !is_safe_name(value) {
                return Err(DeployError::InvalidRequest(format!(
                    "{} {:?} may only contain letters, digits, '.', '_' and '-'",
                    field, value
                )));
            }
        }
        Ok(())
    }

    /// `{service}-{version}-{suffix}`, the unit family of this deploy
    pub fn unit_family(&self) -> String {
        format!("{}-{}-{}", self.service_name, self.version, self.suffix)
    }

    /// `{service}-{version}-{suffix}@.service`
    pub fn template_file_name(&self) -> String {
        format!("{}@.service", self.unit_family())
    }
}

/// Outcome of a deploy as stored in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStatus {
    Started,
    Success,
    Failed,
}

impl DeployStatus {
    pub fn code(&self) -> u8 {
        match self {
            DeployStatus::Started => 1,
            DeployStatus::Success => 2,
            DeployStatus::Failed => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeployStatus::Started)
    }
}

impl TryFrom<u8> for DeployStatus {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(DeployStatus::Started),
            2 => Ok(DeployStatus::Success),
            3 => Ok(DeployStatus::Failed),
            _ => Err(format!("Invalid deploy status: {}", code)),
        }
    }
}

impl serde::Serialize for DeployStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> serde::Deserialize<'de> for DeployStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code = u8::deserialize(deserializer)?;
        DeployStatus::try_from(code).map_err(serde::de::Error::custom)
    }
}

/// Persisted record of one deploy attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRecord {
    #[serde(rename = "deployID")]
    pub deploy_id: String,
    pub domain: String,
    pub environment: String,
    pub service_name: String,
    pub version: String,
    pub num_instances: u32,
    pub service_template: String,
    /// JSON encoding of the applied etcd2 keys
    pub etcd2_keys: String,
    pub status: DeployStatus,
    pub suffix: String,
    pub message: String,
    pub log: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Message and log text of a freshly started deploy
pub const START_DEPLOY_TEXT: &str = "Start deploy.";

impl DeployRecord {
    pub fn started(request: &DeployRequest) -> Self {
        let now = Utc::now();
        Self {
            deploy_id: request.deploy_id.clone(),
            domain: request.domain.clone(),
            environment: request.environment.clone(),
            service_name: request.service_name.clone(),
            version: request.version.clone(),
            num_instances: request.num_instances,
            service_template: request.service_template.clone(),
            etcd2_keys: serde_json::to_string(&request.etcd2_keys).unwrap_or_default(),
            status: DeployStatus::Started,
            suffix: request.suffix.clone(),
            message: START_DEPLOY_TEXT.to_string(),
            log: START_DEPLOY_TEXT.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Move the record to its terminal state.
    ///
    /// Returns false when the record already left `Started` or `status` is not terminal.
    pub fn finish(&mut self, status: DeployStatus, message: &str, log: &str) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.message = message.to_string();
        self.log = log.to_string();
        self.updated_at = Utc::now();
        true
    }
}
