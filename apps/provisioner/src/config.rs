use std::env;
use std::net::SocketAddr;

use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8990";
const DEFAULT_LOG_FILTER: &str = "info";
const DEFAULT_BOOTSTRAP_SERVERS: &str = "kafka-external.dev.apps.eo4eu.eu:9092";
const DEFAULT_CLUSTER_API_BASE_URL: &str = "https://kubernetes.default.svc";
const DEFAULT_CLUSTER_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CLUSTER_REQUEST_ATTEMPTS: usize = 2;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub log_filter: String,
    /// Deployment-fixed Kafka bootstrap endpoint, constant per deployment.
    pub bootstrap_servers: String,
    pub cluster_api_base_url: String,
    /// Service-account bearer token for the cluster API, if any.
    pub cluster_api_token: Option<String>,
    pub cluster_timeout_ms: u64,
    pub cluster_request_attempts: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid bind address {value}: {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr_raw = env::var("STREAMSOURCE_BIND_ADDR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr: SocketAddr =
            bind_addr_raw
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidBindAddr {
                    value: bind_addr_raw.clone(),
                    source,
                })?;

        let log_filter = env::var("STREAMSOURCE_LOG")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let bootstrap_servers = env::var("STREAMSOURCE_BOOTSTRAP_SERVERS")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BOOTSTRAP_SERVERS.to_string())
            .trim()
            .to_string();

        let cluster_api_base_url = env::var("STREAMSOURCE_CLUSTER_API_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CLUSTER_API_BASE_URL.to_string())
            .trim()
            .to_string();

        let cluster_api_token = env::var("STREAMSOURCE_CLUSTER_API_TOKEN")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let cluster_timeout_ms = env::var("STREAMSOURCE_CLUSTER_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(DEFAULT_CLUSTER_TIMEOUT_MS);

        let cluster_request_attempts = env::var("STREAMSOURCE_CLUSTER_REQUEST_ATTEMPTS")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(DEFAULT_CLUSTER_REQUEST_ATTEMPTS);

        Ok(Self {
            bind_addr,
            log_filter,
            bootstrap_servers,
            cluster_api_base_url,
            cluster_api_token,
            cluster_timeout_ms,
            cluster_request_attempts,
        })
    }

    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            bootstrap_servers: DEFAULT_BOOTSTRAP_SERVERS.to_string(),
            cluster_api_base_url: "https://cluster.test.invalid".to_string(),
            cluster_api_token: None,
            cluster_timeout_ms: DEFAULT_CLUSTER_TIMEOUT_MS,
            cluster_request_attempts: 1,
        }
    }
}
