//! HTTP route handlers.

pub mod auth;
pub mod health;
pub mod saml;
pub mod sharing;
pub mod tenant;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

/// Assemble every route the service exposes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/saml/login", get(saml::login))
        .route("/auth/saml/acs", post(saml::acs))
        .route("/auth/saml/acs/idpinitiated", post(saml::acs_idp_initiated))
        .route("/auth/saml/logout", get(saml::logout).post(saml::logout))
        .route(
            "/api/v1/multitenancy/tenant",
            get(tenant::current_tenant).post(tenant::select_tenant),
        )
        .route(
            "/api/v1/toast",
            get(auth::get_toast).post(auth::put_toast),
        )
        .route("/api/v1/sharing/diff", post(sharing::diff_shares))
}
