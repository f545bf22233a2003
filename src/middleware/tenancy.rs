//! Tenancy preprocessor.
//!
//! Runs ahead of the proxied surfaces and stamps each request with the
//! tenant it should execute under. A request that cannot be authenticated
//! is passed through untouched; the downstream handler or engine decides
//! what an anonymous request may do. This middleware never turns a tenancy
//! problem into a hard failure.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, header::HeaderName},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

use crate::{
    AppState,
    backend::AccountInfo,
    session::{SLOT_TENANT, SessionEnvelope},
    tenant::{TenantSignals, resolve_tenant},
};

/// Header consumed by the engine to scope a request to a tenant.
pub static SECURITY_TENANT_HEADER: HeaderName = HeaderName::from_static("securitytenant");

/// Alternate spelling accepted on inbound requests.
pub static SECURITY_TENANT_HEADER_ALT: HeaderName = HeaderName::from_static("security_tenant");

/// Request extension carrying the tenant decided by the preprocessor.
#[derive(Debug, Clone)]
pub struct ResolvedTenant(pub Option<String>);

/// Path prefixes the preprocessor applies to.
fn in_scope(path: &str) -> bool {
    path == "/"
        || path.starts_with("/elasticsearch")
        || path.starts_with("/api")
        || path.starts_with("/app")
}

/// Pull the tenant override out of the query string, either spelling.
fn tenant_from_query(query: Option<&str>) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "security_tenant" || key == "securitytenant")
        .map(|(_, value)| value.into_owned())
}

#[tracing::instrument(name = "tenancy_preprocessor", skip_all)]
pub async fn tenancy_preprocessor(
    State(state): State<AppState>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request
        .uri()
        .path()
        .strip_prefix(&state.config.server.base_path)
        .unwrap_or(request.uri().path());

    if !state.config.multitenancy.enabled || !in_scope(path) {
        return next.run(request).await;
    }

    let gateway = state.session_gateway(cookies);

    let Some(envelope) = gateway.read() else {
        request.extensions_mut().insert(ResolvedTenant(None));
        return next.run(request).await;
    };

    // The account is fetched fresh on every request: a tenant revoked on
    // the engine side must stop resolving immediately.
    let account = match gateway.auth_info(&envelope).await {
        Ok(account) => account,
        Err(error) => {
            tracing::warn!(%error, "auth info unavailable, continuing unauthenticated");
            request.extensions_mut().insert(ResolvedTenant(None));
            return next.run(request).await;
        }
    };

    let query_tenant = tenant_from_query(request.uri().query());
    let header_tenant = [&SECURITY_TENANT_HEADER, &SECURITY_TENANT_HEADER_ALT]
        .into_iter()
        .find_map(|name| request.headers().get(name))
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let session_tenant = envelope
        .slots
        .get(SLOT_TENANT)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);
    let stored = session_tenant.or_else(|| gateway.read_preference());

    let resolution = resolve_tenant(
        TenantSignals {
            query: query_tenant.as_deref(),
            header: header_tenant.as_deref(),
            preference: stored.as_deref(),
        },
        &account,
        &state.config.multitenancy,
    );

    if let Some(tenant) = &resolution.tenant {
        if let Ok(value) = HeaderValue::from_str(tenant) {
            request.headers_mut().insert(&SECURITY_TENANT_HEADER, value);
        }
        persist_selection(&gateway, &envelope, tenant, resolution.changed);
        ensure_default_workspace(&state, &envelope, &account, tenant).await;
    }

    request
        .extensions_mut()
        .insert(ResolvedTenant(resolution.tenant.clone()));

    next.run(request).await
}

/// Record the resolved tenant, writing cookies only when something moved.
fn persist_selection(
    gateway: &crate::session::SessionGateway,
    envelope: &SessionEnvelope,
    tenant: &str,
    changed: bool,
) {
    let slot_current = envelope
        .slots
        .get(SLOT_TENANT)
        .and_then(serde_json::Value::as_str);
    if slot_current != Some(tenant)
        && let Err(error) = gateway.put_slot(SLOT_TENANT, serde_json::json!(tenant))
    {
        tracing::warn!(%error, "failed to record tenant in session");
    }
    if changed
        && let Err(error) = gateway.write_preference(tenant)
    {
        tracing::warn!(%error, "failed to persist tenant preference");
    }
}

/// Best-effort default workspace provisioning.
///
/// Failures are logged and swallowed: a missing workspace degrades the
/// first-run experience, it must never block the request.
async fn ensure_default_workspace(
    state: &AppState,
    envelope: &SessionEnvelope,
    account: &AccountInfo,
    tenant: &str,
) {
    if !state.config.multitenancy.workspace.enabled {
        return;
    }
    let writable = account.tenants.get(tenant).copied().unwrap_or(true);
    if !writable {
        return;
    }
    let Some(credential) = &envelope.credential else {
        return;
    };
    if let Err(error) = state.backend.ensure_workspace(credential, tenant).await {
        tracing::debug!(%error, tenant, "default workspace provisioning failed");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{Router, body::Body, http::StatusCode, routing::get};
    use http::Request as HttpRequest;
    use tower::ServiceExt;
    use tower_cookies::CookieManagerLayer;

    use crate::backend::{
        BackendError, Credential, SamlAuthToken, SamlAuthorizeDescriptor, SecurityBackend,
    };
    use crate::config::PorticoConfig;
    use crate::session::SessionCodec;

    use super::*;

    struct FixedBackend {
        tenants: HashMap<String, bool>,
    }

    #[async_trait]
    impl SecurityBackend for FixedBackend {
        async fn authenticate(
            &self,
            credential: &Credential,
        ) -> Result<AccountInfo, BackendError> {
            self.auth_info(credential).await
        }

        async fn auth_info(&self, _credential: &Credential) -> Result<AccountInfo, BackendError> {
            Ok(AccountInfo {
                user_name: "alice".into(),
                tenants: self.tenants.clone(),
                ..AccountInfo::default()
            })
        }

        async fn saml_authorize(&self) -> Result<SamlAuthorizeDescriptor, BackendError> {
            Err(BackendError::SamlConfig("unused".into()))
        }

        async fn saml_authtoken(
            &self,
            _saml_response: &str,
            _request_id: Option<&str>,
            _acs_endpoint: Option<&str>,
        ) -> Result<SamlAuthToken, BackendError> {
            Err(BackendError::SamlConfig("unused".into()))
        }

        async fn ensure_workspace(
            &self,
            _credential: &Credential,
            _tenant: &str,
        ) -> Result<(), BackendError> {
            Ok(())
        }
    }

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn state_with(tenants: &[(&str, bool)]) -> AppState {
        let mut config = PorticoConfig::default();
        config.auth.session.secret = Some(SECRET.into());
        config.multitenancy.preferred = vec!["alice".into(), "global_tenant".into()];
        AppState {
            config: Arc::new(config),
            backend: Arc::new(FixedBackend {
                tenants: tenants
                    .iter()
                    .map(|(name, writable)| (name.to_string(), *writable))
                    .collect(),
            }),
            codec: Arc::new(SessionCodec::new(SECRET)),
        }
    }

    fn app(state: AppState) -> Router {
        async fn echo_tenant(request: Request) -> String {
            request
                .headers()
                .get("securitytenant")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("<none>")
                .to_string()
        }

        Router::new()
            .route("/api/status", get(echo_tenant))
            .route("/internal/status", get(echo_tenant))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                tenancy_preprocessor,
            ))
            .layer(CookieManagerLayer::new())
            .with_state(state)
    }

    fn session_cookie(state: &AppState) -> String {
        let mut envelope = SessionEnvelope::anonymous(3600);
        envelope.credential = Some(Credential::Basic {
            username: "alice".into(),
            password: "pw".into(),
        });
        let value = state.codec.encode(&envelope).unwrap();
        format!("{}={}", state.config.auth.session.cookie_name, value)
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_injects_tenant_from_preferred_list() {
        let state = state_with(&[("global_tenant", true), ("alice", true)]);
        let cookie = session_cookie(&state);
        let response = app(state)
            .oneshot(
                HttpRequest::get("/api/status")
                    .header("cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        // "alice" is the account's own name and resolves to the private tenant.
        assert_eq!(body_string(response).await, "__user__");
    }

    #[tokio::test]
    async fn test_skips_unauthorized_preferred_entry() {
        let state = state_with(&[("global_tenant", true)]);
        let mut config = (*state.config).clone();
        config.multitenancy.preferred = vec!["bob".into(), "global_tenant".into()];
        config.multitenancy.private_enabled = false;
        let state = AppState {
            config: Arc::new(config),
            ..state
        };
        let cookie = session_cookie(&state);
        let response = app(state)
            .oneshot(
                HttpRequest::get("/api/status")
                    .header("cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "global_tenant");
    }

    #[tokio::test]
    async fn test_query_override_wins() {
        let state = state_with(&[("global_tenant", true), ("finance", true)]);
        let cookie = session_cookie(&state);
        let response = app(state)
            .oneshot(
                HttpRequest::get("/api/status?security_tenant=finance")
                    .header("cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "finance");
    }

    #[tokio::test]
    async fn test_unauthenticated_request_passes_through() {
        let state = state_with(&[("global_tenant", true)]);
        let response = app(state)
            .oneshot(HttpRequest::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<none>");
    }

    #[tokio::test]
    async fn test_out_of_scope_path_untouched() {
        let state = state_with(&[("global_tenant", true)]);
        let cookie = session_cookie(&state);
        let response = app(state)
            .oneshot(
                HttpRequest::get("/internal/status")
                    .header("cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "<none>");
    }

    #[tokio::test]
    async fn test_multitenancy_disabled_injects_nothing() {
        let state = state_with(&[("global_tenant", true)]);
        let mut config = (*state.config).clone();
        config.multitenancy.enabled = false;
        let state = AppState {
            config: Arc::new(config),
            ..state
        };
        let cookie = session_cookie(&state);
        let response = app(state)
            .oneshot(
                HttpRequest::get("/api/status")
                    .header("cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "<none>");
    }
}
