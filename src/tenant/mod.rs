//! Tenant selection.
//!
//! `resolver` holds the pure precedence logic; this module defines the
//! canonical tenant names and the alias normalization every entry point
//! shares.

pub mod resolver;

pub use resolver::{
    TenantResolution, TenantSignals, has_usable_tenant, resolve_tenant, validate_tenant,
};

/// Canonical name of the shared tenant.
pub const GLOBAL_TENANT: &str = "global_tenant";

/// Canonical name of the per-user tenant as sent to the engine.
pub const PRIVATE_TENANT: &str = "__user__";

/// Collapse the aliases accepted on the wire into canonical names.
///
/// The shared tenant appears as `global`, `global_tenant` or the empty
/// string; the per-user tenant as `private`, `__user__`, or the account's
/// own user name.
pub fn normalize_tenant(raw: &str, user_name: &str) -> String {
    match raw {
        "" | "global" | GLOBAL_TENANT => GLOBAL_TENANT.to_string(),
        "private" | PRIVATE_TENANT => PRIVATE_TENANT.to_string(),
        other if other == user_name => PRIVATE_TENANT.to_string(),
        other => other.to_string(),
    }
}
