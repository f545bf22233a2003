//! Security engine collaborator contract.
//!
//! Every interaction with the external security engine goes through the
//! `SecurityBackend` trait so routes, middleware, and tests never talk to
//! the wire directly. The production implementation lives in `http`; tests
//! either stand up a wiremock server behind `HttpSecurityBackend` or provide
//! their own trait impl.

mod http;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::HttpSecurityBackend;

// ─────────────────────────────────────────────────────────────────────────────
// Credentials & Account Info
// ─────────────────────────────────────────────────────────────────────────────

/// Credential material attached to requests toward the engine.
///
/// The session cookie stores exactly one of these; the codec serializes the
/// tagged form so a basic credential can never be replayed as a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl Credential {
    /// Render the `Authorization` header value for this credential.
    pub fn authorization_header(&self) -> String {
        match self {
            Credential::Basic { username, password } => {
                use base64::Engine as _;
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{username}:{password}"));
                format!("Basic {encoded}")
            }
            Credential::Bearer { token } => format!("Bearer {token}"),
        }
    }
}

/// Account facts as reported by the engine.
///
/// `tenants` maps tenant name to write access (`true` = read-write).
/// Always fetched fresh per request; never cached in the session cookie,
/// so revoked tenant access takes effect on the next request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountInfo {
    pub user_name: String,
    #[serde(default)]
    pub tenants: HashMap<String, bool>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub backend_roles: Vec<String>,
    /// IdP logout URL, present only for SSO-backed accounts.
    #[serde(default)]
    pub sso_logout_url: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// SAML Descriptors
// ─────────────────────────────────────────────────────────────────────────────

/// Engine-produced descriptor for initiating a SAML login.
#[derive(Debug, Clone, Deserialize)]
pub struct SamlAuthorizeDescriptor {
    /// IdP URL the browser should be redirected to.
    #[serde(rename = "location")]
    pub idp_location: String,
    /// Opaque request identifier correlating the response with this attempt.
    #[serde(rename = "requestId")]
    pub request_id: String,
}

/// Token minted by the engine after ACS validation.
#[derive(Debug, Clone, Deserialize)]
pub struct SamlAuthToken {
    #[serde(rename = "authorization")]
    pub authorization: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum BackendError {
    /// Engine rejected the credential (401).
    #[error("authentication rejected")]
    Unauthorized,

    /// Engine understood the request but denied it (403).
    #[error("access denied: {0}")]
    Forbidden(String),

    /// SAML is not configured on the engine side.
    #[error("SAML configuration error: {0}")]
    SamlConfig(String),

    /// Engine returned an unexpected status.
    #[error("engine returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Transport failure reaching the engine.
    #[error("engine unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// Engine response could not be decoded.
    #[error("malformed engine response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Whether the failure means the credential itself is bad, as opposed
    /// to the engine being unhealthy.
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, BackendError::Unauthorized | BackendError::Forbidden(_))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Operations the session layer needs from the security engine.
#[async_trait]
pub trait SecurityBackend: Send + Sync {
    /// Validate a credential and return the account it maps to.
    async fn authenticate(&self, credential: &Credential) -> Result<AccountInfo, BackendError>;

    /// Fetch current account facts for an already-validated credential.
    async fn auth_info(&self, credential: &Credential) -> Result<AccountInfo, BackendError>;

    /// Ask the engine for a SAML login descriptor (IdP URL + request id).
    async fn saml_authorize(&self) -> Result<SamlAuthorizeDescriptor, BackendError>;

    /// Exchange a SAML response for an engine-minted token.
    ///
    /// `request_id` is `None` for IdP-initiated flows, where no login
    /// attempt originated here; those flows instead pass `acs_endpoint`,
    /// the gateway's own consumer URL, so the engine validates the
    /// assertion against a fixed endpoint identity rather than a request
    /// it never issued.
    async fn saml_authtoken(
        &self,
        saml_response: &str,
        request_id: Option<&str>,
        acs_endpoint: Option<&str>,
    ) -> Result<SamlAuthToken, BackendError>;

    /// Ensure a default workspace exists for the account in the given
    /// tenant. Best-effort convenience; callers tolerate failure.
    async fn ensure_workspace(
        &self,
        credential: &Credential,
        tenant: &str,
    ) -> Result<(), BackendError>;
}
