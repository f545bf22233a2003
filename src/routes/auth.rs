//! Password login and logout.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use crate::{
    AppState,
    auth::{AuthError, AuthKind, sanitize_next_url},
    backend::Credential,
    session::toast_slot,
};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    #[serde(rename = "nextUrl")]
    pub next_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub username: String,
    pub tenants: std::collections::HashMap<String, bool>,
    pub roles: Vec<String>,
    /// Where the front-end should navigate after login. Already passed
    /// through the open-redirect guard.
    #[serde(rename = "nextUrl")]
    pub next_url: String,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
}

#[tracing::instrument(name = "auth_login", skip_all)]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(params): Query<LoginParams>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    let gateway = state.session_gateway(cookies);
    let credential = Credential::Basic {
        username: request.username,
        password: request.password,
    };
    let (_envelope, account) = gateway.authenticate(credential).await?;

    let app_root = state.config.server.app_root();
    Ok(Json(LoginResponse {
        username: account.user_name,
        tenants: account.tenants,
        roles: account.roles,
        next_url: sanitize_next_url(params.next_url.as_deref(), &app_root),
    }))
}

/// End the session and tell the front-end where to go next.
///
/// The tenant selected during the session is persisted to the preference
/// cookie by `clear`, so it survives into the next login. SAML sessions are
/// pointed at the dedicated logout flow, which still holds the credential
/// needed to resolve the IdP logout URL. OpenId sessions resolve the IdP
/// logout URL here, while the credential is still at hand. Every other
/// kind is done once the cookie is gone.
#[tracing::instrument(name = "auth_logout", skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Json<LogoutResponse>, AuthError> {
    let base = &state.config.server.base_path;
    let gateway = state.session_gateway(cookies);

    let redirect_url = match &state.config.auth.kind {
        AuthKind::Saml => format!("{base}/auth/saml/logout"),
        AuthKind::OpenId => match gateway.read() {
            Some(envelope) if envelope.credential.is_some() => gateway
                .auth_info(&envelope)
                .await
                .ok()
                .and_then(|account| account.sso_logout_url)
                .unwrap_or_else(|| format!("{base}/login")),
            _ => format!("{base}/login"),
        },
        AuthKind::Basic | AuthKind::Proxy | AuthKind::Other(_) => format!("{base}/login"),
    };

    if !matches!(state.config.auth.kind, AuthKind::Saml) {
        gateway.clear()?;
    }

    Ok(Json(LogoutResponse { redirect_url }))
}

#[derive(Debug, Serialize)]
pub struct ToastResponse {
    pub toast: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ToastParams {
    #[serde(rename = "targetUrl")]
    pub target_url: String,
}

#[derive(Debug, Deserialize)]
pub struct ToastRequest {
    #[serde(rename = "targetUrl")]
    pub target_url: String,
    pub toast: serde_json::Value,
}

/// Read and clear the notification queued for one destination page.
///
/// Each slot is consumed on read, so a notification is shown once no matter
/// how many tabs poll for it; toasts queued for other pages stay put.
#[tracing::instrument(name = "toast_get", skip_all)]
pub async fn get_toast(
    State(state): State<AppState>,
    cookies: Cookies,
    Query(params): Query<ToastParams>,
) -> Result<Json<ToastResponse>, AuthError> {
    let gateway = state.session_gateway(cookies);
    let toast = gateway.take_slot(&toast_slot(&params.target_url))?;
    Ok(Json(ToastResponse { toast }))
}

/// Queue a notification for the next poll from the given page.
#[tracing::instrument(name = "toast_put", skip_all)]
pub async fn put_toast(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(request): Json<ToastRequest>,
) -> Result<Json<ToastResponse>, AuthError> {
    let gateway = state.session_gateway(cookies);
    if gateway.read().is_none() {
        return Err(AuthError::MissingCredentials);
    }
    gateway.put_slot(&toast_slot(&request.target_url), request.toast.clone())?;
    Ok(Json(ToastResponse {
        toast: Some(request.toast),
    }))
}
