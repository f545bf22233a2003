use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Connection settings for the external security engine.
///
/// The engine owns credential verification, role resolution and SAML
/// assertion validation; the gateway only calls its HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the security engine.
    #[serde(default = "default_url")]
    pub url: String,

    /// Per-call timeout in seconds. A slow engine degrades requests to
    /// unauthenticated rather than blocking them.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Skip TLS certificate verification (development only).
    #[serde(default)]
    pub insecure: bool,
}

impl BackendConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.url).map_err(|e| {
            ConfigError::Validation(format!("backend.url is not a valid URL: {e}"))
        })?;
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "backend.timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout_secs: default_timeout(),
            insecure: false,
        }
    }
}

fn default_url() -> String {
    "http://127.0.0.1:9200".to_string()
}

fn default_timeout() -> u64 {
    10
}
