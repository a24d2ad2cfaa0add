//! Secret loading for the gateway API key and the webhook token.
//!
//! Secrets are read from the 1Password CLI when available, falling back to
//! environment variables when `SecretConfig::allow_env_vars` is set. Values
//! are returned as `Zeroizing<String>` so they are wiped on drop.

use std::env;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

pub const GATEWAY_API_KEY_ENV: &str = "GATEWAY_API_KEY";
pub const WEBHOOK_TOKEN_ENV: &str = "WEBHOOK_TOKEN";

const GATEWAY_API_KEY_OP: &str = "op://RecoveryDesk/Asaas/api_key";
const WEBHOOK_TOKEN_OP: &str = "op://RecoveryDesk/Asaas/webhook_token";

const MIN_API_KEY_LENGTH: usize = 32;
const MIN_WEBHOOK_TOKEN_LENGTH: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("1Password CLI error: {0}")]
    OnePasswordError(String),

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("Secret validation failed: {0}")]
    ValidationFailed(String),
}

#[derive(Debug, Clone)]
pub struct SecretConfig {
    /// Allow environment variables as a source. Off in release builds.
    pub allow_env_vars: bool,
    /// Skip the 1Password CLI entirely
    pub skip_op_cli: bool,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            allow_env_vars: cfg!(debug_assertions),
            skip_op_cli: false,
        }
    }
}

impl SecretConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = env::var("ALLOW_ENV_SECRETS") {
            config.allow_env_vars = value.to_lowercase() == "true" || value == "1";
        }
        if let Ok(value) = env::var("SKIP_OP_CLI") {
            config.skip_op_cli = value.to_lowercase() == "true" || value == "1";
        }
        config
    }
}

/// Load a secret from 1Password, falling back to the environment
pub fn load_secret(
    op_reference: &str,
    env_var_name: &str,
    config: &SecretConfig,
) -> Result<Zeroizing<String>, SecretError> {
    if !config.skip_op_cli {
        match load_from_op_cli(op_reference) {
            Ok(secret) => {
                info!("✓ Loaded secret from 1Password CLI: {}", env_var_name);
                return Ok(secret);
            }
            Err(e) => warn!("1Password CLI not available: {}", e),
        }
    }

    if config.allow_env_vars {
        warn!(
            "Loading secret from environment variable: {} (not for production)",
            env_var_name
        );
        load_from_env(env_var_name)
    } else {
        error!(
            "Secret loading failed: 1Password CLI unavailable and env vars disabled for {}",
            env_var_name
        );
        Err(SecretError::NotFound(env_var_name.to_string()))
    }
}

fn load_from_op_cli(reference: &str) -> Result<Zeroizing<String>, SecretError> {
    use std::process::Command;

    let output = Command::new("op")
        .arg("read")
        .arg(reference)
        .output()
        .map_err(|e| SecretError::OnePasswordError(format!("Failed to execute 'op': {}", e)))?;

    if !output.status.success() {
        return Err(SecretError::OnePasswordError(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let secret = String::from_utf8(output.stdout)
        .map_err(|e| SecretError::OnePasswordError(format!("Invalid UTF-8 from 1Password: {}", e)))?
        .trim()
        .to_string();

    if secret.is_empty() {
        return Err(SecretError::OnePasswordError(
            "1Password returned empty secret".to_string(),
        ));
    }

    Ok(Zeroizing::new(secret))
}

fn load_from_env(env_var_name: &str) -> Result<Zeroizing<String>, SecretError> {
    match env::var(env_var_name) {
        Ok(value) if !value.trim().is_empty() => Ok(Zeroizing::new(value.trim().to_string())),
        _ => Err(SecretError::EnvVarNotSet(env_var_name.to_string())),
    }
}

pub fn validate_secret_strength(secret: &str, min_length: usize) -> Result<(), SecretError> {
    if secret.len() < min_length {
        return Err(SecretError::ValidationFailed(format!(
            "Secret too short: {} characters (minimum: {})",
            secret.len(),
            min_length
        )));
    }

    let weak_patterns = ["changeme", "placeholder", "example", "12345"];
    let lower = secret.to_lowercase();
    if let Some(pattern) = weak_patterns.iter().find(|p| lower.contains(*p)) {
        return Err(SecretError::ValidationFailed(format!(
            "Secret contains weak pattern: {}",
            pattern
        )));
    }

    Ok(())
}

/// Gateway API key (`access_token` header on every gateway call)
pub fn load_gateway_api_key(config: &SecretConfig) -> Result<Zeroizing<String>, SecretError> {
    let key = load_secret(GATEWAY_API_KEY_OP, GATEWAY_API_KEY_ENV, config)?;
    if key.len() < MIN_API_KEY_LENGTH {
        return Err(SecretError::ValidationFailed(format!(
            "{} too short: {} characters (minimum: {})",
            GATEWAY_API_KEY_ENV,
            key.len(),
            MIN_API_KEY_LENGTH
        )));
    }
    Ok(key)
}

/// Shared token the gateway presents on webhook deliveries
pub fn load_webhook_token(config: &SecretConfig) -> Result<Zeroizing<String>, SecretError> {
    let token = load_secret(WEBHOOK_TOKEN_OP, WEBHOOK_TOKEN_ENV, config)?;
    validate_secret_strength(&token, MIN_WEBHOOK_TOKEN_LENGTH)?;
    Ok(token)
}
