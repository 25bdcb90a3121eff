//! Application configuration options

use std::time::Duration;

use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// HTTP server configuration
    pub server: ServerOptions,

    /// Storage configuration
    pub storage: StorageLayout,

    /// Domain of the cluster being served
    pub domain: String,

    /// Environment of the cluster (development, qa, ...)
    pub environment: String,

    /// etcd2 endpoint, `None` for the in-memory store
    pub etcd2_endpoint: Option<String>,

    /// fleetctl binary
    pub fleetctl: String,

    /// Accepted API bearer tokens
    pub auth_tokens: Vec<String>,

    /// Debugging enabled
    pub debug: bool,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl AppOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            lifecycle: LifecycleOptions {
                max_shutdown_delay: Duration::from_secs(settings.max_shutdown_delay_secs),
            },
            server: ServerOptions {
                name: settings.name.clone(),
                host: settings.hostname.clone(),
                port: settings.port,
            },
            storage: StorageLayout::from_settings(settings),
            domain: settings.domain.clone(),
            environment: settings.environment.clone(),
            etcd2_endpoint: (!settings.etcd2_endpoint.is_empty())
                .then(|| settings.etcd2_endpoint.clone()),
            fleetctl: settings.fleetctl.clone(),
            auth_tokens: settings.auth_tokens.clone(),
            debug: settings.debug,
        }
    }
}

/// Lifecycle options
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for the HTTP server to stop; queued deploys always drain
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(600),
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Name reported in the `Server` header, empty for none
    pub name: String,

    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            host: "localhost".to_string(),
            port: 8080,
        }
    }
}
