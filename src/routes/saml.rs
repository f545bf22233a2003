//! SAML single sign-on flow.
//!
//! The engine owns all SAML cryptography; this layer runs the browser-side
//! state machine. An SP-initiated login parks its request id and return URL
//! in the session's temp slot, the assertion consumer reclaims that slot
//! exactly once, and every failure resolves to one of a fixed set of error
//! pages so nothing engine-internal reaches the browser.

use axum::{
    extract::{Query, State},
    response::Redirect,
};
use serde::Deserialize;
use tower_cookies::Cookies;

use crate::{
    AppState,
    auth::{AuthError, classify_auth_failure, sanitize_next_url},
    backend::Credential,
    session::{SLOT_TEMP_SAML, SamlRequestContext},
};

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    #[serde(rename = "nextUrl")]
    pub next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AcsForm {
    #[serde(rename = "SAMLResponse")]
    pub saml_response: String,
}

fn failure_redirect(state: &AppState, error: &AuthError) -> Redirect {
    let target = classify_auth_failure(error);
    Redirect::to(&target.as_path(&state.config.server.base_path))
}

/// Start an SP-initiated login.
///
/// An already-authenticated browser skips the IdP entirely and goes
/// straight to its destination.
#[tracing::instrument(name = "saml_login", skip_all)]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(params): Query<LoginParams>,
) -> Redirect {
    let app_root = state.config.server.app_root();
    let next_url = sanitize_next_url(params.next_url.as_deref(), &app_root);

    let gateway = state.session_gateway(cookies);
    if gateway.read().is_some_and(|e| e.credential.is_some()) {
        return Redirect::to(&next_url);
    }

    let descriptor = match state.backend.saml_authorize().await {
        Ok(descriptor) => descriptor,
        Err(error) => {
            let error = AuthError::from(error);
            tracing::warn!(%error, "SAML authorize failed");
            return failure_redirect(&state, &error);
        }
    };

    let context = SamlRequestContext {
        request_id: descriptor.request_id,
        next_url,
    };
    let parked = serde_json::to_value(&context)
        .map_err(|e| AuthError::Internal(e.to_string()))
        .and_then(|value| gateway.put_slot(SLOT_TEMP_SAML, value));
    if let Err(error) = parked {
        tracing::error!(%error, "failed to park SAML context");
        return failure_redirect(&state, &error);
    }

    Redirect::to(&descriptor.idp_location)
}

/// Assertion consumer for SP-initiated logins.
///
/// The parked context is consumed on first read; a duplicate or replayed
/// POST finds the slot empty and lands on the auth error page instead of
/// minting a second session.
#[tracing::instrument(name = "saml_acs", skip_all)]
pub async fn acs(
    State(state): State<AppState>,
    cookies: Cookies,
    axum::extract::Form(form): axum::extract::Form<AcsForm>,
) -> Redirect {
    let gateway = state.session_gateway(cookies);

    let context = match gateway.take_slot(SLOT_TEMP_SAML) {
        Ok(Some(value)) => match serde_json::from_value::<SamlRequestContext>(value) {
            Ok(context) => context,
            Err(error) => {
                tracing::warn!(%error, "parked SAML context is malformed");
                return failure_redirect(&state, &AuthError::InvalidCredentials);
            }
        },
        Ok(None) => {
            tracing::warn!("ACS called with no pending SAML login");
            return failure_redirect(&state, &AuthError::MissingCredentials);
        }
        Err(error) => return failure_redirect(&state, &error),
    };

    complete_login(
        &state,
        &gateway,
        &form.saml_response,
        Some(&context.request_id),
        None,
        &context.next_url,
    )
    .await
}

/// Assertion consumer for IdP-initiated logins.
///
/// No login originated here, so there is no parked context and no request
/// id to correlate; instead the gateway names its own consumer endpoint so
/// the engine validates the assertion against that fixed identity. A
/// successful exchange lands on the app root.
#[tracing::instrument(name = "saml_acs_idp_initiated", skip_all)]
pub async fn acs_idp_initiated(
    State(state): State<AppState>,
    cookies: Cookies,
    axum::extract::Form(form): axum::extract::Form<AcsForm>,
) -> Redirect {
    let gateway = state.session_gateway(cookies);
    let app_root = state.config.server.app_root();
    let acs_endpoint = format!(
        "{}/auth/saml/acs/idpinitiated",
        state.config.server.base_path
    );
    complete_login(
        &state,
        &gateway,
        &form.saml_response,
        None,
        Some(&acs_endpoint),
        &app_root,
    )
    .await
}

async fn complete_login(
    state: &AppState,
    gateway: &crate::session::SessionGateway,
    saml_response: &str,
    request_id: Option<&str>,
    acs_endpoint: Option<&str>,
    next_url: &str,
) -> Redirect {
    let token = match state
        .backend
        .saml_authtoken(saml_response, request_id, acs_endpoint)
        .await
    {
        Ok(token) => token,
        Err(error) => {
            let error = AuthError::from(error);
            tracing::warn!(%error, "SAML token exchange failed");
            return failure_redirect(state, &error);
        }
    };

    let credential = Credential::Bearer {
        token: strip_bearer(&token.authorization),
    };
    match gateway.authenticate(credential).await {
        Ok((_envelope, account)) => {
            if state.config.multitenancy.enabled
                && !crate::tenant::has_usable_tenant(&account, &state.config.multitenancy)
            {
                tracing::warn!(user = %account.user_name, "account has no usable tenant");
                return failure_redirect(state, &AuthError::MissingTenant);
            }
            tracing::info!(user = %account.user_name, "SAML login completed");
            let app_root = state.config.server.app_root();
            Redirect::to(&sanitize_next_url(Some(next_url), &app_root))
        }
        Err(error) => {
            tracing::warn!(%error, "engine rejected SAML-minted credential");
            failure_redirect(state, &error)
        }
    }
}

/// The engine hands back a full `Authorization` header value.
fn strip_bearer(authorization: &str) -> String {
    authorization
        .strip_prefix("Bearer ")
        .or_else(|| authorization.strip_prefix("bearer "))
        .unwrap_or(authorization)
        .to_string()
}

/// SAML logout.
///
/// Resolves the IdP logout URL while the credential is still at hand, then
/// drops the session. Tenant persistence happens inside `clear`, so the
/// tenant selected in this session greets the user at the next login.
#[tracing::instrument(name = "saml_logout", skip_all)]
pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> Redirect {
    let gateway = state.session_gateway(cookies);

    let sso_logout_url = match gateway.read() {
        Some(envelope) if envelope.credential.is_some() => {
            match gateway.auth_info(&envelope).await {
                Ok(account) => account.sso_logout_url,
                Err(error) => {
                    tracing::debug!(%error, "could not resolve IdP logout URL");
                    None
                }
            }
        }
        _ => None,
    };

    if let Err(error) = gateway.clear() {
        tracing::warn!(%error, "session clear failed during logout");
    }

    match sso_logout_url {
        Some(url) => Redirect::to(&url),
        None => {
            let target = crate::auth::RedirectTarget::SamlLogoutSuccess;
            Redirect::to(&target.as_path(&state.config.server.base_path))
        }
    }
}
