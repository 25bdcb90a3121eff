//! Server settings
//!
//! Settings come from an optional JSON file and are then overridden by `--key=value`
//! command line flags.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;
use crate::fleet::ctl::DEFAULT_FLEETCTL;
use crate::kv::etcd::DEFAULT_ENDPOINT;
use crate::logs::LogLevel;

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Name reported in the `Server` response header
    #[serde(default)]
    pub name: String,

    /// Hostname or address to bind to
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Domain of the site being managed
    #[serde(default)]
    pub domain: String,

    /// Environment (development, qa, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// etcd2 endpoint. Empty keeps cycle state in memory.
    #[serde(default = "default_etcd2_endpoint")]
    pub etcd2_endpoint: String,

    /// Path to the fleetctl binary
    #[serde(default = "default_fleetctl")]
    pub fleetctl: String,

    /// Working directory for unit templates
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: String,

    /// Directory of the deploy log. Empty keeps the log in memory.
    #[serde(default = "default_deploy_log_dir")]
    pub deploy_log_dir: String,

    /// Bearer tokens accepted by the API
    #[serde(default)]
    pub auth_tokens: Vec<String>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub json_logs: bool,

    /// Enable debugging output
    #[serde(default)]
    pub debug: bool,

    /// Upper bound on waiting for the HTTP server to stop at shutdown
    #[serde(default = "default_max_shutdown_delay")]
    pub max_shutdown_delay_secs: u64,
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_etcd2_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_fleetctl() -> String {
    DEFAULT_FLEETCTL.to_string()
}

fn default_tmp_dir() -> String {
    "/tmp/coreos-deploy/".to_string()
}

fn default_deploy_log_dir() -> String {
    "/var/lib/coreos-deploy/deploys".to_string()
}

fn default_max_shutdown_delay() -> u64 {
    600
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: String::new(),
            hostname: default_hostname(),
            domain: String::new(),
            environment: default_environment(),
            port: default_port(),
            etcd2_endpoint: default_etcd2_endpoint(),
            fleetctl: default_fleetctl(),
            tmp_dir: default_tmp_dir(),
            deploy_log_dir: default_deploy_log_dir(),
            auth_tokens: Vec::new(),
            log_level: LogLevel::Info,
            json_logs: false,
            debug: false,
            max_shutdown_delay_secs: default_max_shutdown_delay(),
        }
    }
}

fn parse_flag<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, DeployError> {
    value
        .parse()
        .map_err(|_| DeployError::ConfigError(format!("invalid value for --{}: {}", key, value)))
}

impl Settings {
    /// Apply command line flags on top of the loaded settings
    pub fn apply_overrides(&mut self, args: &HashMap<String, String>) -> Result<(), DeployError> {
        for (key, value) in args {
            match key.as_str() {
                "name" => self.name = value.clone(),
                "hostname" => self.hostname = value.clone(),
                "domain" => self.domain = value.clone(),
                "environment" => self.environment = value.clone(),
                "port" => self.port = parse_flag(key, value)?,
                "etcd2_endpoint" => self.etcd2_endpoint = value.clone(),
                "fleetctl" => self.fleetctl = value.clone(),
                "tmp_dir" => self.tmp_dir = value.clone(),
                "deploy_log_dir" => self.deploy_log_dir = value.clone(),
                "auth_token" => self.auth_tokens.push(value.clone()),
                "log_level" => {
                    self.log_level = value.parse().map_err(DeployError::ConfigError)?
                }
                "json_logs" => self.json_logs = parse_flag(key, value)?,
                "debug" => self.debug = parse_flag(key, value)?,
                "max_shutdown_delay_secs" => self.max_shutdown_delay_secs = parse_flag(key, value)?,
                // Handled by the entry point
                "config" | "version" | "help" => {}
                other => {
                    return Err(DeployError::ConfigError(format!("unknown option --{}", other)))
                }
            }
        }
        Ok(())
    }

    /// Log level after taking `debug` into account
    pub fn effective_log_level(&self) -> LogLevel {
        if self.debug {
            LogLevel::Debug
        } else {
            self.log_level.clone()
        }
    }
}
