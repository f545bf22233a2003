//! Cookie-backed session state.
//!
//! All session state lives in a single signed cookie; the server keeps
//! nothing. The envelope carries the credential (once authenticated) plus a
//! small set of named storage slots used by in-flight flows.

pub mod codec;
pub mod gateway;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::Credential;

pub use codec::{CodecError, SessionCodec};
pub use gateway::SessionGateway;

/// Slot holding the pending SAML login context between the redirect to the
/// IdP and the assertion coming back.
pub const SLOT_TEMP_SAML: &str = "temp-saml";

/// Slot holding the tenant selected for this session.
pub const SLOT_TENANT: &str = "tenant";

/// Prefix for slots holding one-shot notifications, keyed by the page the
/// notification is destined for.
pub const SLOT_TOAST_PREFIX: &str = "toast:";

/// Slot name for the notification queued for `target_url`.
///
/// Keying by destination keeps a toast meant for one page from overwriting
/// or surfacing on another.
pub fn toast_slot(target_url: &str) -> String {
    format!("{SLOT_TOAST_PREFIX}{target_url}")
}

/// Everything a session cookie carries.
///
/// `credential` is absent while a login flow is still in progress; slots can
/// be written either way (a SAML login parks its context here before any
/// credential exists).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<Credential>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub slots: HashMap<String, Value>,
}

impl SessionEnvelope {
    /// Fresh anonymous envelope with the given lifetime.
    pub fn anonymous(ttl_secs: u64) -> Self {
        let now = Utc::now();
        Self {
            credential: None,
            issued_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_secs as i64),
            slots: HashMap::new(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Pending SAML login context, stored in [`SLOT_TEMP_SAML`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamlRequestContext {
    /// Request id issued by the engine for an SP-initiated attempt.
    /// `None` once would mean IdP-initiated, but those never park context.
    pub request_id: String,
    /// Where to send the browser after a successful login.
    pub next_url: String,
}

/// Tenant selection payload carried by the long-lived preference cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantPreference {
    pub tenant: String,
}
