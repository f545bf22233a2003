use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base path the dashboard is served under (e.g. behind a reverse
    /// proxy at "/dashboard"). Used as the fallback redirect target and
    /// prepended to error-page paths. Empty means served at the root.
    #[serde(default)]
    pub base_path: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_path.is_empty() && !self.base_path.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "server.base_path must start with '/' (got {:?})",
                self.base_path
            )));
        }
        if self.base_path.ends_with('/') {
            return Err(ConfigError::Validation(
                "server.base_path must not end with '/'".into(),
            ));
        }
        Ok(())
    }

    /// The path the browser lands on after login: the base path, or "/"
    /// when no base path is configured.
    pub fn app_root(&self) -> String {
        if self.base_path.is_empty() {
            "/".to_string()
        } else {
            self.base_path.clone()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_path: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_host() -> IpAddr {
    "127.0.0.1".parse().unwrap()
}

fn default_port() -> u16 {
    5601
}

fn default_timeout() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_path_must_be_rooted() {
        let config = ServerConfig {
            base_path: "dashboard".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_path_no_trailing_slash() {
        let config = ServerConfig {
            base_path: "/dashboard/".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_app_root() {
        let config = ServerConfig::default();
        assert_eq!(config.app_root(), "/");

        let config = ServerConfig {
            base_path: "/dashboard".into(),
            ..Default::default()
        };
        assert_eq!(config.app_root(), "/dashboard");
    }
}
