//! Authentication primitives shared across routes and middleware.
//!
//! This module defines:
//! - `AuthKind`, the login protocol the dashboard is configured for
//! - `AuthError`, the error taxonomy for everything auth- and tenant-related
//! - `RedirectTarget` and `classify_auth_failure`, the pure mapping from an
//!   auth failure to the fixed set of error-page redirects used by the SAML
//!   flow (the browser never sees backend error detail)
//! - `sanitize_next_url`, the open-redirect guard applied to every
//!   post-login redirect target

use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Auth Kind
// ─────────────────────────────────────────────────────────────────────────────

/// Login protocol the front-end uses.
///
/// Replaces string branching on the auth-type value: every consumer matches
/// exhaustively, and unrecognized values survive config round-trips as
/// `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum AuthKind {
    #[default]
    Basic,
    Saml,
    OpenId,
    Proxy,
    Other(String),
}

impl From<String> for AuthKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "basic" | "basicauth" => AuthKind::Basic,
            "saml" => AuthKind::Saml,
            "openid" | "oidc" => AuthKind::OpenId,
            "proxy" => AuthKind::Proxy,
            _ => AuthKind::Other(value),
        }
    }
}

impl From<AuthKind> for String {
    fn from(kind: AuthKind) -> Self {
        match kind {
            AuthKind::Basic => "basic".to_string(),
            AuthKind::Saml => "saml".to_string(),
            AuthKind::OpenId => "openid".to_string(),
            AuthKind::Proxy => "proxy".to_string(),
            AuthKind::Other(value) => value,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error Taxonomy
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum AuthError {
    /// No session cookie, or the cookie failed signature/expiry checks
    MissingCredentials,

    /// Credentials were provided but the engine rejected them
    /// (generic — prevents enumeration)
    InvalidCredentials,

    /// The account has no usable tenant
    MissingTenant,

    /// The requested tenant is not authorized for this account or is
    /// disabled by configuration
    InvalidTenant(String),

    /// The engine could not produce a SAML redirect descriptor
    SamlConfig(String),

    /// The engine is unreachable or returned a server-side failure
    BackendUnavailable(String),

    /// Internal error during authentication
    Internal(String),
}

/// Wire shape for auth error bodies.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::MissingCredentials => (
                StatusCode::UNAUTHORIZED,
                "missing_credentials",
                "Authentication credentials required".to_string(),
            ),
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                "Invalid authentication credentials".to_string(),
            ),
            AuthError::MissingTenant => (
                StatusCode::FORBIDDEN,
                "missing_tenant",
                "No tenant available for this account".to_string(),
            ),
            AuthError::InvalidTenant(tenant) => (
                StatusCode::FORBIDDEN,
                "invalid_tenant",
                format!("Tenant '{tenant}' is not available for this account"),
            ),
            // Backend detail stays in the logs; clients get a generic body.
            AuthError::SamlConfig(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "saml_config_error",
                "Single sign-on is misconfigured".to_string(),
            ),
            AuthError::BackendUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "backend_unavailable",
                "Security engine unavailable".to_string(),
            ),
            AuthError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal error".to_string(),
            ),
        };

        let body = ErrorBody {
            error: code,
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingCredentials => write!(f, "Authentication credentials required"),
            AuthError::InvalidCredentials => write!(f, "Invalid authentication credentials"),
            AuthError::MissingTenant => write!(f, "No tenant available for this account"),
            AuthError::InvalidTenant(tenant) => {
                write!(f, "Tenant '{tenant}' is not available for this account")
            }
            AuthError::SamlConfig(msg) => write!(f, "SAML configuration error: {msg}"),
            AuthError::BackendUnavailable(msg) => write!(f, "Security engine unavailable: {msg}"),
            AuthError::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<crate::backend::BackendError> for AuthError {
    fn from(error: crate::backend::BackendError) -> Self {
        use crate::backend::BackendError;
        match error {
            // Both rejections collapse to one client-visible failure.
            BackendError::Unauthorized | BackendError::Forbidden(_) => {
                AuthError::InvalidCredentials
            }
            BackendError::SamlConfig(msg) => AuthError::SamlConfig(msg),
            BackendError::Transport(e) => AuthError::BackendUnavailable(e.to_string()),
            BackendError::UnexpectedStatus { status, body } => {
                AuthError::BackendUnavailable(format!("status {status}: {body}"))
            }
            BackendError::Decode(msg) => AuthError::Internal(msg),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Redirect Classification
// ─────────────────────────────────────────────────────────────────────────────

/// The fixed set of error-page destinations reachable from the SAML flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    SamlConfigError,
    SamlAuthError,
    MissingTenant,
    SamlLogoutSuccess,
}

impl RedirectTarget {
    /// Render the redirect path under the configured base path.
    pub fn as_path(self, base_path: &str) -> String {
        let kind = match self {
            RedirectTarget::SamlConfigError => "samlConfigError",
            RedirectTarget::SamlAuthError => "samlAuthError",
            RedirectTarget::MissingTenant => "missingTenant",
            RedirectTarget::SamlLogoutSuccess => "samlLogoutSuccess",
        };
        format!("{base_path}/customerror?type={kind}")
    }
}

/// Map an auth failure to its error-page redirect.
///
/// Pure function so the mapping is testable without any HTTP machinery.
/// Everything that is not a tenant problem collapses into the generic auth
/// error page: the browser never learns whether a credential was expired,
/// forged, or rejected for some engine-internal reason.
pub fn classify_auth_failure(error: &AuthError) -> RedirectTarget {
    match error {
        AuthError::MissingTenant | AuthError::InvalidTenant(_) => RedirectTarget::MissingTenant,
        AuthError::SamlConfig(_) => RedirectTarget::SamlConfigError,
        AuthError::MissingCredentials
        | AuthError::InvalidCredentials
        | AuthError::BackendUnavailable(_)
        | AuthError::Internal(_) => RedirectTarget::SamlAuthError,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Open-Redirect Guard
// ─────────────────────────────────────────────────────────────────────────────

/// Sanitize a post-login redirect target.
///
/// Only same-origin relative paths are accepted. A value containing `//`
/// anywhere is rejected — that covers scheme-relative URLs (`//evil.com`),
/// absolute URLs (`https://...`), and backslash tricks once normalized by
/// the browser. Rejected values resolve to the app root.
pub fn sanitize_next_url(next_url: Option<&str>, app_root: &str) -> String {
    match next_url {
        Some(url) if url.starts_with('/') && !url.contains("//") && !url.contains('\\') => {
            url.to_string()
        }
        _ => app_root.to_string(),
    }
}
