use std::time::Duration;

use crate::domain::services::gateway_guard::DEFAULT_GATEWAY_TIMEOUT;

/// Runtime configuration of the back office
#[derive(Debug, Clone)]
pub struct BackOfficeConfig {
    pub database_url: String,
    pub bind_address: String,
    /// Overrides the production/sandbox gateway URL when set
    pub gateway_base_url: Option<String>,
    pub gateway_sandbox: bool,
    pub gateway_timeout_milliseconds: u64,
    pub webhook_rate_limit_per_minute: u32,
}

impl Default for BackOfficeConfig {
    fn default() -> Self {
        BackOfficeConfig {
            database_url: "sqlite:data/recovery_desk.db".to_string(),
            bind_address: "0.0.0.0:3000".to_string(),
            gateway_base_url: None,
            gateway_sandbox: true,
            gateway_timeout_milliseconds: DEFAULT_GATEWAY_TIMEOUT.as_millis() as u64,
            webhook_rate_limit_per_minute: 600,
        }
    }
}

impl BackOfficeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> BackOfficeConfig {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Same rules as `from_env`, reading values through `lookup`
    pub fn from_source<F>(lookup: F) -> BackOfficeConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = BackOfficeConfig::default();

        if let Some(url) = lookup("DATABASE_URL") {
            if url.trim().is_empty() {
                tracing::warn!(
                    "Empty DATABASE_URL, using default: {}",
                    config.database_url
                );
            } else {
                config.database_url = url;
            }
        }

        if let Some(address) = lookup("BIND_ADDRESS") {
            match address.parse::<std::net::SocketAddr>() {
                Ok(_) => config.bind_address = address,
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse BIND_ADDRESS '{}': {}, using default: {}",
                        address,
                        e,
                        config.bind_address
                    );
                }
            }
        }

        if let Some(base_url) = lookup("GATEWAY_BASE_URL") {
            if base_url.starts_with("http://") || base_url.starts_with("https://") {
                config.gateway_base_url = Some(base_url.trim_end_matches('/').to_string());
            } else {
                tracing::warn!(
                    "Invalid GATEWAY_BASE_URL '{}' (must start with http:// or https://), ignoring",
                    base_url
                );
            }
        }

        if let Some(sandbox) = lookup("GATEWAY_SANDBOX") {
            config.gateway_sandbox = sandbox.to_lowercase() == "true" || sandbox == "1";
        }

        if let Some(timeout) = lookup("GATEWAY_TIMEOUT_MILLISECONDS") {
            match timeout.parse::<u64>() {
                Ok(value) if (1000..=120_000).contains(&value) => {
                    config.gateway_timeout_milliseconds = value;
                }
                Ok(value) => {
                    tracing::warn!(
                        "Invalid GATEWAY_TIMEOUT_MILLISECONDS value: {} (must be between 1000 and 120000), using default: {}",
                        value,
                        config.gateway_timeout_milliseconds
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse GATEWAY_TIMEOUT_MILLISECONDS '{}': {}, using default: {}",
                        timeout,
                        e,
                        config.gateway_timeout_milliseconds
                    );
                }
            }
        }

        if let Some(limit) = lookup("WEBHOOK_RATE_LIMIT_PER_MINUTE") {
            match limit.parse::<u32>() {
                Ok(value) if value > 0 && value <= 100_000 => {
                    config.webhook_rate_limit_per_minute = value;
                }
                _ => {
                    tracing::warn!(
                        "Invalid WEBHOOK_RATE_LIMIT_PER_MINUTE '{}', using default: {}",
                        limit,
                        config.webhook_rate_limit_per_minute
                    );
                }
            }
        }

        config
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_milliseconds)
    }
}
