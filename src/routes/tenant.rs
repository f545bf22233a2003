//! Tenant selection endpoints.

use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};
use tower_cookies::Cookies;

use crate::{
    AppState,
    auth::AuthError,
    middleware::ResolvedTenant,
    session::SLOT_TENANT,
    tenant::validate_tenant,
};

#[derive(Debug, Serialize)]
pub struct TenantResponse {
    pub tenant: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectTenantRequest {
    pub tenant: String,
}

/// Report the tenant the current request resolved to.
#[tracing::instrument(name = "tenant_current", skip_all)]
pub async fn current_tenant(
    State(state): State<AppState>,
    cookies: Cookies,
    resolved: Option<Extension<ResolvedTenant>>,
) -> Result<Json<TenantResponse>, AuthError> {
    let gateway = state.session_gateway(cookies);
    if gateway.read().is_none() {
        return Err(AuthError::MissingCredentials);
    }
    let tenant = resolved.and_then(|Extension(ResolvedTenant(tenant))| tenant);
    Ok(Json(TenantResponse { tenant }))
}

/// Explicit tenant switch.
///
/// Unlike passive resolution, an unauthorized tenant here is a hard error:
/// the caller asked for it by name. A successful switch lands in both the
/// session and the preference cookie, so it holds across requests and
/// across logins.
#[tracing::instrument(name = "tenant_select", skip_all)]
pub async fn select_tenant(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(request): Json<SelectTenantRequest>,
) -> Result<Json<TenantResponse>, AuthError> {
    let gateway = state.session_gateway(cookies);
    let envelope = gateway.read().ok_or(AuthError::MissingCredentials)?;
    let account = gateway.auth_info(&envelope).await?;

    let tenant = validate_tenant(&request.tenant, &account, &state.config.multitenancy)?;
    gateway.put_slot(SLOT_TENANT, serde_json::json!(tenant))?;
    gateway.write_preference(&tenant)?;

    tracing::info!(user = %account.user_name, %tenant, "tenant switched");
    Ok(Json(TenantResponse {
        tenant: Some(tenant),
    }))
}
