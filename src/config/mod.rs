//! Configuration module for the session/tenancy gateway.
//!
//! The gateway is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 5601
//!
//! [backend]
//! url = "https://security-engine:9200"
//!
//! [auth.session]
//! secret = "${SESSION_SECRET}"
//! ```

mod auth;
mod backend;
mod multitenancy;
mod server;

use std::path::Path;

pub use auth::*;
pub use backend::*;
pub use multitenancy::*;
use serde::{Deserialize, Serialize};
pub use server::*;

/// Root configuration for the gateway.
///
/// All sections are optional with sensible defaults, allowing a minimal
/// configuration for local development against a loopback engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PorticoConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// External security engine connection.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Authentication and session cookie configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Tenant resolution configuration.
    #[serde(default)]
    pub multitenancy: MultitenancyConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PorticoConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;

        let mut config: PorticoConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&mut self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.backend.validate()?;
        self.auth.validate()?;
        self.multitenancy.validate()?;
        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log filter directive (overridden by `RUST_LOG` when set).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit logs as JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Variables appearing after a `#` comment on a line are left alone.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let match_start = cap.get(0).unwrap().start();

            if let Some(pos) = comment_pos
                && match_start >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..match_start]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = cap.get(0).unwrap().end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PorticoConfig::from_str("").unwrap();
        assert_eq!(config.server.port, 5601);
        assert!(config.multitenancy.enabled);
        assert!(config.multitenancy.global_enabled);
    }

    #[test]
    fn test_env_var_expansion() {
        // SAFETY: test-only env mutation, no concurrent readers of this var
        unsafe { std::env::set_var("PORTICO_TEST_SECRET", "a-signing-secret-of-decent-length") };
        let config = PorticoConfig::from_str(
            r#"
            [auth.session]
            secret = "${PORTICO_TEST_SECRET}"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.auth.session.secret.as_deref(),
            Some("a-signing-secret-of-decent-length")
        );
    }

    #[test]
    fn test_env_var_missing() {
        let err = PorticoConfig::from_str(
            r#"
            [auth.session]
            secret = "${PORTICO_DEFINITELY_UNSET}"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EnvVarNotFound(_)));
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let config = PorticoConfig::from_str(
            r#"
            # secret = "${PORTICO_ALSO_UNSET}"
            [server]
            port = 5602
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 5602);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = PorticoConfig::from_str("[server]\nbogus = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
