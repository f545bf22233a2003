use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::auth::AuthKind;

/// Minimum length for the cookie signing secret, in bytes.
const MIN_SECRET_LENGTH: usize = 32;

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Login protocol the dashboard front-end uses. Determines the
    /// post-logout redirect behavior.
    #[serde(default)]
    pub kind: AuthKind,

    /// Session cookie configuration.
    #[serde(default)]
    pub session: SessionConfig,

    /// Tenant preference cookie configuration. Persisted independently of
    /// the session so the selection survives logout.
    #[serde(default)]
    pub preference: PreferenceCookieConfig,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(secret) = &self.session.secret
            && secret.len() < MIN_SECRET_LENGTH
        {
            return Err(ConfigError::Validation(format!(
                "auth.session.secret must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }
        if self.session.cookie_name == self.preference.cookie_name {
            return Err(ConfigError::Validation(
                "auth.session.cookie_name and auth.preference.cookie_name must differ".into(),
            ));
        }
        Ok(())
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Cookie name.
    #[serde(default = "default_session_cookie")]
    pub cookie_name: String,

    /// Session duration in seconds.
    #[serde(default = "default_session_duration")]
    pub ttl_secs: u64,

    /// Secure cookie (HTTPS only).
    #[serde(default = "default_true")]
    pub secure: bool,

    /// SameSite cookie attribute.
    #[serde(default)]
    pub same_site: SameSite,

    /// Secret key for signing session and preference cookies.
    /// If not provided, a random key is generated on startup
    /// (sessions won't survive restarts).
    #[serde(default)]
    pub secret: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_session_cookie(),
            ttl_secs: default_session_duration(),
            secure: true,
            same_site: SameSite::default(),
            secret: None,
        }
    }
}

/// Preference cookie configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreferenceCookieConfig {
    /// Cookie name.
    #[serde(default = "default_preference_cookie")]
    pub cookie_name: String,

    /// Preference duration in seconds. Deliberately long: the selected
    /// tenant is meant to survive logout/login cycles.
    #[serde(default = "default_preference_duration")]
    pub ttl_secs: u64,
}

impl Default for PreferenceCookieConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_preference_cookie(),
            ttl_secs: default_preference_duration(),
        }
    }
}

/// SameSite cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

fn default_session_cookie() -> String {
    "portico_auth".to_string()
}

fn default_preference_cookie() -> String {
    "portico_preferences".to_string()
}

fn default_session_duration() -> u64 {
    3600
}

fn default_preference_duration() -> u64 {
    // One year.
    365 * 24 * 3600
}

fn default_true() -> bool {
    true
}
