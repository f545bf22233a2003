use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Tenant resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultitenancyConfig {
    /// Master toggle. When disabled, requests pass through without tenant
    /// resolution or header injection.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Whether the shared global tenant may be selected.
    #[serde(default = "default_true")]
    pub global_enabled: bool,

    /// Whether each account's private tenant may be selected.
    #[serde(default = "default_true")]
    pub private_enabled: bool,

    /// Ordered list of tenants to prefer when no explicit signal or stored
    /// preference applies. The first entry the account is authorized for
    /// wins.
    #[serde(default)]
    pub preferred: Vec<String>,

    /// Default workspace integration.
    #[serde(default)]
    pub workspace: WorkspaceConfig,
}

impl MultitenancyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in &self.preferred {
            if name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "multitenancy.preferred must not contain empty tenant names".into(),
                ));
            }
        }
        Ok(())
    }
}

impl Default for MultitenancyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            global_enabled: true,
            private_enabled: true,
            preferred: Vec::new(),
            workspace: WorkspaceConfig::default(),
        }
    }
}

/// Default workspace integration.
///
/// When enabled, the gateway makes a best-effort call after tenant
/// resolution to ensure a default workspace exists for the resolved
/// tenant. Failures are logged and never surfaced to the user.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Whether to ensure a default workspace for resolved tenants.
    #[serde(default)]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}
