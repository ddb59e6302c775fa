// Configuration loading, merging and validation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api;

pub const PROD: &str = "prod";
pub const DEV: &str = "dev";
pub const TEST: &str = "test";

pub const DEFAULT_SOCKET: &str = "token-resource";
pub const DEFAULT_RESOURCE: &str = "example.com/token";
pub const DEFAULT_COUNT: i64 = 1;
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("resource count {0} is too low, at least 1 is required")]
    CountTooLow(i64),
    #[error("resource count {0} does not fit into usize")]
    CountTooHigh(i64),
    #[error("resource name must not be empty")]
    EmptyResource,
    #[error("socket name must not be empty")]
    EmptySocket,
}

/// What the plugin advertises and where it listens.
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginIdentity {
    pub resource_name: String,
    pub unit_count: usize,
    pub socket_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_env")]
    pub env: String,
    #[serde(default)]
    pub logs: Option<Logs>,
    #[serde(default)]
    pub plugin: Plugin,
    #[serde(default)]
    pub kubelet: Kubelet,
    #[serde(default)]
    pub shutdown: Option<Shutdown>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Logs {
    pub level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Plugin {
    /// Socket file name, joined onto `dir`.
    pub socket: String,
    pub resource: String,
    pub count: i64,
    pub dir: PathBuf,
}

impl Default for Plugin {
    fn default() -> Self {
        Self {
            socket: DEFAULT_SOCKET.to_string(),
            resource: DEFAULT_RESOURCE.to_string(),
            count: DEFAULT_COUNT,
            dir: PathBuf::from(api::DEVICE_PLUGIN_PATH),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Kubelet {
    /// Defaults to `kubelet.sock` inside the plugin directory.
    pub socket: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Shutdown {
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

/// Values given explicitly on the command line; they win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub socket: Option<String>,
    pub resource: Option<String>,
    pub count: Option<i64>,
    pub dir: Option<PathBuf>,
    pub kubelet_socket: Option<PathBuf>,
}

fn default_env() -> String {
    PROD.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: default_env(),
            logs: None,
            plugin: Plugin::default(),
            kubelet: Kubelet::default(),
            shutdown: None,
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let abs_path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve absolute config filepath: {:?}", path))?;

        let data = std::fs::read_to_string(&abs_path)
            .with_context(|| format!("read config yaml file {:?}", abs_path))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("unmarshal yaml from {:?}", abs_path))?;

        Ok(cfg)
    }

    /// Applies command line values on top of the loaded ones.
    pub fn merge(mut self, overrides: Overrides) -> Self {
        if let Some(socket) = overrides.socket {
            self.plugin.socket = socket;
        }
        if let Some(resource) = overrides.resource {
            self.plugin.resource = resource;
        }
        if let Some(count) = overrides.count {
            self.plugin.count = count;
        }
        if let Some(dir) = overrides.dir {
            self.plugin.dir = dir;
        }
        if let Some(socket) = overrides.kubelet_socket {
            self.kubelet.socket = Some(socket);
        }
        self
    }

    pub fn is_prod(&self) -> bool {
        self.env == PROD
    }

    pub fn is_dev(&self) -> bool {
        self.env == DEV
    }

    pub fn is_test(&self) -> bool {
        self.env == TEST
    }

    /// Full path of the plugin's own listening socket.
    pub fn socket_path(&self) -> PathBuf {
        self.plugin.dir.join(&self.plugin.socket)
    }

    /// Full path of the kubelet registration socket.
    pub fn kubelet_socket(&self) -> PathBuf {
        self.kubelet
            .socket
            .clone()
            .unwrap_or_else(|| self.plugin.dir.join(api::KUBELET_SOCKET_NAME))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown
            .as_ref()
            .and_then(|s| s.timeout)
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT)
    }

    /// Returns the tracing filter directive: `logs.level` if set, otherwise
    /// derived from the numeric verbosity (0 info, 1 debug, 2+ trace).
    pub fn log_filter(&self, verbosity: i32) -> String {
        if let Some(level) = self.logs.as_ref().and_then(|l| l.level.as_ref()) {
            return level.clone();
        }
        match verbosity {
            i32::MIN..=0 => "info",
            1 => "debug",
            _ => "trace",
        }
        .to_string()
    }

    /// Validates the plugin section and builds the immutable identity.
    pub fn identity(&self) -> Result<PluginIdentity, ConfigError> {
        let count = self.plugin.count;
        if count < 1 {
            return Err(ConfigError::CountTooLow(count));
        }
        let unit_count = usize::try_from(count).map_err(|_| ConfigError::CountTooHigh(count))?;
        if self.plugin.resource.is_empty() {
            return Err(ConfigError::EmptyResource);
        }
        if self.plugin.socket.is_empty() {
            return Err(ConfigError::EmptySocket);
        }

        Ok(PluginIdentity {
            resource_name: self.plugin.resource.clone(),
            unit_count,
            socket_path: self.socket_path(),
        })
    }
}

mod test_config;
pub use test_config::new_test_config;
