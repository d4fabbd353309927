use netscope_core::{DefaultNamingStrategy, SecurityConfig};
use netscope_transport::DEFAULT_MAX_FRAME_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variable that overrides `security.api_key`.
pub const API_KEY_ENV: &str = "NETSCOPE_API_KEY";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetScopeConfig {
    pub rest: RestConfig,
    pub rpc: RpcConfig,
    pub security: SecurityConfig,
    pub naming: NamingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestConfig {
    pub host: String,
    pub port: u16,
    pub docs_path: String,
}

impl Default for RestConfig {
    fn default() -> Self {
        RestConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            docs_path: "/netscope/docs".to_string(),
        }
    }
}

impl RestConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// Largest accepted frame, in bytes.
    pub max_inbound_message_size: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        RpcConfig {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 9090,
            max_inbound_message_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl RpcConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// First path segment of generated paths.
    pub namespace: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        NamingConfig {
            namespace: "netscope".to_string(),
        }
    }
}

impl NamingConfig {
    pub fn strategy(&self) -> DefaultNamingStrategy {
        DefaultNamingStrategy::new(self.namespace.clone())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl NetScopeConfig {
    /// Load a JSON config file. Missing sections and fields take defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply `NETSCOPE_API_KEY`, if set and non-empty.
    pub fn apply_env(self) -> Self {
        let key = std::env::var(API_KEY_ENV).ok();
        self.with_env_key(key)
    }

    fn with_env_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            self.security.api_key = Some(key);
        }
        self
    }
}
