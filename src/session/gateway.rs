//! Per-request session façade.
//!
//! A `SessionGateway` is constructed once per request from the shared codec,
//! the engine client, and the request's cookie jar. Routes and middleware
//! never touch cookies or the codec directly; every read and write goes
//! through here so the cookie attributes and the signing discipline stay in
//! one place.

use std::sync::Arc;

use serde_json::Value;
use tower_cookies::{
    Cookie, Cookies,
    cookie::{SameSite as CookieSameSite, time::Duration as CookieDuration},
};

use crate::{
    auth::AuthError,
    backend::{AccountInfo, Credential, SecurityBackend},
    config::{AuthConfig, SameSite},
};

use super::{SLOT_TENANT, SessionCodec, SessionEnvelope, TenantPreference};

pub struct SessionGateway {
    codec: Arc<SessionCodec>,
    backend: Arc<dyn SecurityBackend>,
    config: Arc<AuthConfig>,
    cookies: Cookies,
}

fn cookie_same_site(same_site: SameSite) -> CookieSameSite {
    match same_site {
        SameSite::Strict => CookieSameSite::Strict,
        SameSite::Lax => CookieSameSite::Lax,
        SameSite::None => CookieSameSite::None,
    }
}

impl SessionGateway {
    pub fn new(
        codec: Arc<SessionCodec>,
        backend: Arc<dyn SecurityBackend>,
        config: Arc<AuthConfig>,
        cookies: Cookies,
    ) -> Self {
        Self {
            codec,
            backend,
            config,
            cookies,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session cookie
    // ─────────────────────────────────────────────────────────────────────

    /// Decode the session cookie, if present, unexpired, and untampered.
    ///
    /// Any defect in the cookie is treated as "no session": the caller
    /// cannot distinguish a missing cookie from a forged one, and must not.
    pub fn read(&self) -> Option<SessionEnvelope> {
        let cookie = self.cookies.get(&self.config.session.cookie_name)?;
        let envelope: SessionEnvelope = match self.codec.decode(cookie.value()) {
            Ok(envelope) => envelope,
            Err(error) => {
                tracing::debug!(%error, "discarding undecodable session cookie");
                return None;
            }
        };
        if envelope.is_expired() {
            tracing::debug!("discarding expired session cookie");
            return None;
        }
        Some(envelope)
    }

    /// Sign and write the envelope back as the session cookie.
    pub fn write(&self, envelope: &SessionEnvelope) -> Result<(), AuthError> {
        let value = self
            .codec
            .encode(envelope)
            .map_err(|e| AuthError::Internal(format!("session encode failed: {e}")))?;
        let session = &self.config.session;
        let cookie = Cookie::build((session.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .secure(session.secure)
            .same_site(cookie_same_site(session.same_site))
            .max_age(CookieDuration::seconds(session.ttl_secs as i64))
            .build();
        self.cookies.add(cookie);
        Ok(())
    }

    /// Validate a credential against the engine and start a session.
    ///
    /// Slots written before authentication (a pending SAML context, a queued
    /// toast) survive into the authenticated session.
    pub async fn authenticate(
        &self,
        credential: Credential,
    ) -> Result<(SessionEnvelope, AccountInfo), AuthError> {
        let account = self.backend.authenticate(&credential).await?;

        let mut envelope = SessionEnvelope::anonymous(self.config.session.ttl_secs);
        if let Some(existing) = self.read() {
            envelope.slots = existing.slots;
        }
        envelope.credential = Some(credential);
        self.write(&envelope)?;

        tracing::info!(user = %account.user_name, "session established");
        Ok((envelope, account))
    }

    /// Fetch fresh account facts for the current session.
    ///
    /// Deliberately uncached: tenant authorization must reflect the
    /// engine's current state, not what was true at login.
    pub async fn auth_info(&self, envelope: &SessionEnvelope) -> Result<AccountInfo, AuthError> {
        let credential = envelope
            .credential
            .as_ref()
            .ok_or(AuthError::MissingCredentials)?;
        Ok(self.backend.auth_info(credential).await?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Named slots
    // ─────────────────────────────────────────────────────────────────────

    /// Write a slot, creating an anonymous envelope if none exists.
    pub fn put_slot(&self, slot: &str, value: Value) -> Result<(), AuthError> {
        let mut envelope = self
            .read()
            .unwrap_or_else(|| SessionEnvelope::anonymous(self.config.session.ttl_secs));
        envelope.slots.insert(slot.to_string(), value);
        self.write(&envelope)
    }

    pub fn get_slot(&self, slot: &str) -> Option<Value> {
        self.read()?.slots.get(slot).cloned()
    }

    /// Read a slot and remove it in the same request.
    ///
    /// The rewritten cookie goes out with this response, so a replayed or
    /// concurrent request racing for the same slot finds it empty. This is
    /// what makes a parked SAML context single-use.
    pub fn take_slot(&self, slot: &str) -> Result<Option<Value>, AuthError> {
        let Some(mut envelope) = self.read() else {
            return Ok(None);
        };
        let value = envelope.slots.remove(slot);
        if value.is_some() {
            self.write(&envelope)?;
        }
        Ok(value)
    }

    pub fn clear_slot(&self, slot: &str) -> Result<(), AuthError> {
        self.take_slot(slot).map(|_| ())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tenant preference cookie
    // ─────────────────────────────────────────────────────────────────────

    /// Last tenant the user explicitly selected, surviving logout.
    pub fn read_preference(&self) -> Option<String> {
        let cookie = self.cookies.get(&self.config.preference.cookie_name)?;
        match self.codec.decode::<TenantPreference>(cookie.value()) {
            Ok(preference) => Some(preference.tenant),
            Err(error) => {
                tracing::debug!(%error, "discarding undecodable preference cookie");
                None
            }
        }
    }

    pub fn write_preference(&self, tenant: &str) -> Result<(), AuthError> {
        let value = self
            .codec
            .encode(&TenantPreference {
                tenant: tenant.to_string(),
            })
            .map_err(|e| AuthError::Internal(format!("preference encode failed: {e}")))?;
        let preference = &self.config.preference;
        let cookie = Cookie::build((preference.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .secure(self.config.session.secure)
            .same_site(cookie_same_site(self.config.session.same_site))
            .max_age(CookieDuration::seconds(preference.ttl_secs as i64))
            .build();
        self.cookies.add(cookie);
        Ok(())
    }

    /// Persist the session's selected tenant, then drop the session cookie.
    ///
    /// The preference cookie is left standing so the next login lands in
    /// the same tenant.
    pub fn clear(&self) -> Result<(), AuthError> {
        if let Some(envelope) = self.read()
            && let Some(tenant) = envelope
                .slots
                .get(SLOT_TENANT)
                .and_then(Value::as_str)
        {
            self.write_preference(tenant)?;
        }

        let session = &self.config.session;
        let removal = Cookie::build(session.cookie_name.clone())
            .path("/")
            .http_only(true)
            .secure(session.secure)
            .same_site(cookie_same_site(session.same_site))
            .max_age(CookieDuration::ZERO)
            .build();
        self.cookies.add(removal);
        Ok(())
    }
}
