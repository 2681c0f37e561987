use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use stratus_zone_client::ZoneClientConfig;

pub const ENV_BIND_ADDR: &str = "STRATUS_CONSOLE_BIND_ADDR";
pub const ENV_LOG: &str = "STRATUS_CONSOLE_LOG";
pub const ENV_MODE: &str = "STRATUS_CONSOLE_MODE";
pub const ENV_RPC_ENDPOINT: &str = "STRATUS_CONSOLE_RPC_ENDPOINT";
pub const ENV_EVENT_ENDPOINT: &str = "STRATUS_CONSOLE_EVENT_ENDPOINT";
pub const ENV_RPC_NAMESPACE: &str = "STRATUS_CONSOLE_RPC_NAMESPACE";
pub const ENV_RPC_TIMEOUT_MS: &str = "STRATUS_CONSOLE_RPC_TIMEOUT_MS";
pub const ENV_ZONES_PATH: &str = "STRATUS_CONSOLE_ZONES_PATH";
pub const ENV_SIGNING_KEY_PATH: &str = "STRATUS_CONSOLE_SIGNING_KEY_PATH";
pub const ENV_TOKEN_TTL_SECONDS: &str = "STRATUS_CONSOLE_TOKEN_TTL_SECONDS";
pub const ENV_TOKEN_REMEMBER_TTL_SECONDS: &str = "STRATUS_CONSOLE_TOKEN_REMEMBER_TTL_SECONDS";
pub const ENV_UPLOAD_DIR: &str = "STRATUS_CONSOLE_UPLOAD_DIR";
pub const ENV_MAX_UPLOAD_BYTES: &str = "STRATUS_CONSOLE_MAX_UPLOAD_BYTES";
pub const ENV_TFA_ISSUER: &str = "STRATUS_CONSOLE_TFA_ISSUER";

const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_RPC_ENDPOINT: &str = "http://127.0.0.1:4633/RPC2";
const DEFAULT_EVENT_ENDPOINT: &str = "tcp://127.0.0.1:4634";
const DEFAULT_RPC_NAMESPACE: &str = "stratus.";
const DEFAULT_RPC_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_SIGNING_KEY_PATH: &str = "/var/lib/stratus-console/signing.key";
const DEFAULT_TOKEN_TTL_SECONDS: i64 = 3_600;
const DEFAULT_TOKEN_REMEMBER_TTL_SECONDS: i64 = 2_592_000;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;
const DEFAULT_TFA_ISSUER: &str = "stratus-console";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Production deployments enforce the session replay guard; development
/// deployments skip it so tokens minted before a restart keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Production,
    Development,
}

impl DeploymentMode {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "development" | "dev" => Self::Development,
            _ => Self::Production,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
        }
    }

    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub log_filter: String,
    pub mode: DeploymentMode,
    pub rpc_endpoint: String,
    pub event_endpoint: String,
    pub rpc_namespace: String,
    pub rpc_timeout_ms: u64,
    pub zones_path: Option<PathBuf>,
    pub signing_key_path: PathBuf,
    pub token_ttl_seconds: i64,
    pub token_remember_ttl_seconds: i64,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub tfa_issuer: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = match env_string(ENV_BIND_ADDR) {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: ENV_BIND_ADDR,
                value: raw.clone(),
            })?,
            None => default_bind_addr(),
        };
        Ok(Self {
            bind_addr,
            log_filter: env_string(ENV_LOG).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            mode: env_string(ENV_MODE)
                .map(|raw| DeploymentMode::parse(&raw))
                .unwrap_or(DeploymentMode::Production),
            rpc_endpoint: env_string(ENV_RPC_ENDPOINT)
                .unwrap_or_else(|| DEFAULT_RPC_ENDPOINT.to_string()),
            event_endpoint: env_string(ENV_EVENT_ENDPOINT)
                .unwrap_or_else(|| DEFAULT_EVENT_ENDPOINT.to_string()),
            rpc_namespace: env_string(ENV_RPC_NAMESPACE)
                .unwrap_or_else(|| DEFAULT_RPC_NAMESPACE.to_string()),
            rpc_timeout_ms: env_parse(ENV_RPC_TIMEOUT_MS)?.unwrap_or(DEFAULT_RPC_TIMEOUT_MS),
            zones_path: env_string(ENV_ZONES_PATH).map(PathBuf::from),
            signing_key_path: env_string(ENV_SIGNING_KEY_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SIGNING_KEY_PATH)),
            token_ttl_seconds: env_parse(ENV_TOKEN_TTL_SECONDS)?
                .unwrap_or(DEFAULT_TOKEN_TTL_SECONDS),
            token_remember_ttl_seconds: env_parse(ENV_TOKEN_REMEMBER_TTL_SECONDS)?
                .unwrap_or(DEFAULT_TOKEN_REMEMBER_TTL_SECONDS),
            upload_dir: env_string(ENV_UPLOAD_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            max_upload_bytes: env_parse(ENV_MAX_UPLOAD_BYTES)?.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            tfa_issuer: env_string(ENV_TFA_ISSUER).unwrap_or_else(|| DEFAULT_TFA_ISSUER.to_string()),
        })
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn zone_client_config(&self) -> ZoneClientConfig {
        ZoneClientConfig {
            timeout: self.rpc_timeout(),
            namespace: self.rpc_namespace.clone(),
        }
    }

    #[cfg(test)]
    pub fn for_tests(root: &std::path::Path) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            mode: DeploymentMode::Production,
            rpc_endpoint: "http://127.0.0.1:1/RPC2".to_string(),
            event_endpoint: "tcp://127.0.0.1:1".to_string(),
            rpc_namespace: DEFAULT_RPC_NAMESPACE.to_string(),
            rpc_timeout_ms: 2_000,
            zones_path: None,
            signing_key_path: root.join("signing.key"),
            token_ttl_seconds: 300,
            token_remember_ttl_seconds: 3_600,
            upload_dir: root.join("uploads"),
            max_upload_bytes: 1024 * 1024,
            tfa_issuer: DEFAULT_TFA_ISSUER.to_string(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 2616))
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    env_string(name)
        .map(|raw| {
            raw.parse::<T>().map_err(|_| ConfigError::Invalid {
                name,
                value: raw.clone(),
            })
        })
        .transpose()
}
