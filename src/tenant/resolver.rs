//! Pure tenant precedence logic.
//!
//! Resolution never performs I/O: callers gather the signals from the
//! request and pass in freshly-fetched account facts. Every candidate is
//! revalidated against the account on every request, so tenant access
//! revoked on the engine side stops working immediately, whatever cookie
//! the browser still holds.

use crate::{
    auth::AuthError,
    backend::AccountInfo,
    config::MultitenancyConfig,
};

use super::{GLOBAL_TENANT, PRIVATE_TENANT, normalize_tenant};

/// Request-scoped tenant hints, in descending precedence.
#[derive(Debug, Default, Clone, Copy)]
pub struct TenantSignals<'a> {
    /// `security_tenant` (or `securitytenant`) query parameter.
    pub query: Option<&'a str>,
    /// `securitytenant` (or `security_tenant`) request header.
    pub header: Option<&'a str>,
    /// Tenant stored in the long-lived preference cookie.
    pub preference: Option<&'a str>,
}

/// Outcome of a resolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantResolution {
    /// Canonical tenant to scope this request to; `None` means the request
    /// proceeds without a tenant header.
    pub tenant: Option<String>,
    /// Whether the stored preference no longer matches and should be
    /// rewritten. Stays `false` when the preference itself won, so steady
    /// state produces no cookie writes.
    pub changed: bool,
}

/// Whether the account may use a (canonical) tenant right now.
fn is_authorized(tenant: &str, account: &AccountInfo, config: &MultitenancyConfig) -> bool {
    match tenant {
        GLOBAL_TENANT => config.global_enabled && account.tenants.contains_key(GLOBAL_TENANT),
        // The engine lists the private tenant under the account's own name.
        PRIVATE_TENANT => {
            config.private_enabled && account.tenants.contains_key(&account.user_name)
        }
        named => account.tenants.contains_key(named),
    }
}

/// Pick the tenant for a request.
///
/// Precedence: query parameter, then header, then stored preference, then
/// the configured preferred list. A candidate that fails authorization is
/// skipped, never silently substituted: the next weaker signal gets its
/// turn. With nothing left the request runs tenant-less.
pub fn resolve_tenant(
    signals: TenantSignals<'_>,
    account: &AccountInfo,
    config: &MultitenancyConfig,
) -> TenantResolution {
    let normalized_preference = signals
        .preference
        .map(|raw| normalize_tenant(raw, &account.user_name));

    let explicit = [
        ("query", signals.query),
        ("header", signals.header),
        ("preference", signals.preference),
    ];

    for (source, raw) in explicit {
        let Some(raw) = raw else { continue };
        let candidate = normalize_tenant(raw, &account.user_name);
        if is_authorized(&candidate, account, config) {
            let changed = source != "preference"
                && normalized_preference.as_deref() != Some(candidate.as_str());
            return TenantResolution {
                tenant: Some(candidate),
                changed,
            };
        }
        tracing::debug!(
            user = %account.user_name,
            tenant = %candidate,
            source,
            "requested tenant not authorized, falling through"
        );
    }

    for raw in &config.preferred {
        let candidate = normalize_tenant(raw, &account.user_name);
        if is_authorized(&candidate, account, config) {
            let changed = normalized_preference.as_deref() != Some(candidate.as_str());
            return TenantResolution {
                tenant: Some(candidate),
                changed,
            };
        }
    }

    TenantResolution {
        tenant: None,
        changed: false,
    }
}

/// Whether the account can use any tenant at all under this configuration.
///
/// False means tenant resolution can never succeed for this account, not
/// merely that no signal picked one.
pub fn has_usable_tenant(account: &AccountInfo, config: &MultitenancyConfig) -> bool {
    account
        .tenants
        .keys()
        .any(|name| is_authorized(&normalize_tenant(name, &account.user_name), account, config))
}

/// Strict variant for explicit tenant switches.
///
/// Unlike [`resolve_tenant`], an unauthorized tenant here is an error, not
/// a fall-through: the user asked for this tenant by name and must learn
/// the switch did not happen.
pub fn validate_tenant(
    requested: &str,
    account: &AccountInfo,
    config: &MultitenancyConfig,
) -> Result<String, AuthError> {
    let candidate = normalize_tenant(requested, &account.user_name);
    if is_authorized(&candidate, account, config) {
        Ok(candidate)
    } else {
        Err(AuthError::InvalidTenant(requested.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;

    use super::*;

    fn account(tenants: &[&str]) -> AccountInfo {
        AccountInfo {
            user_name: "alice".into(),
            tenants: tenants
                .iter()
                .map(|name| (name.to_string(), true))
                .collect::<HashMap<_, _>>(),
            ..AccountInfo::default()
        }
    }

    fn config(preferred: &[&str]) -> MultitenancyConfig {
        MultitenancyConfig {
            preferred: preferred.iter().map(|p| p.to_string()).collect(),
            ..MultitenancyConfig::default()
        }
    }

    #[rstest]
    // Query beats everything.
    #[case(Some("finance"), Some("global"), Some("audit"), "finance")]
    // Header beats the stored preference.
    #[case(None, Some("global"), Some("audit"), "global_tenant")]
    // Preference wins when nothing stronger is present.
    #[case(None, None, Some("audit"), "audit")]
    fn test_precedence(
        #[case] query: Option<&str>,
        #[case] header: Option<&str>,
        #[case] preference: Option<&str>,
        #[case] expected: &str,
    ) {
        let account = account(&["global_tenant", "finance", "audit"]);
        let resolution = resolve_tenant(
            TenantSignals {
                query,
                header,
                preference,
            },
            &account,
            &config(&[]),
        );
        assert_eq!(resolution.tenant.as_deref(), Some(expected));
    }

    #[test]
    fn test_unauthorized_query_falls_through_to_header() {
        let account = account(&["global_tenant", "audit"]);
        let resolution = resolve_tenant(
            TenantSignals {
                query: Some("finance"),
                header: Some("audit"),
                preference: None,
            },
            &account,
            &config(&[]),
        );
        assert_eq!(resolution.tenant.as_deref(), Some("audit"));
    }

    #[test]
    fn test_preferred_list_first_authorized_wins() {
        let account = account(&["global_tenant", "alice"]);
        let resolution = resolve_tenant(
            TenantSignals::default(),
            &account,
            &config(&["alice", "global_tenant"]),
        );
        // "alice" is the account's own name, so it maps to the private tenant.
        assert_eq!(resolution.tenant.as_deref(), Some(PRIVATE_TENANT));
    }

    #[test]
    fn test_preferred_list_skips_unauthorized_entries() {
        let account = account(&["global_tenant", "alice"]);
        let resolution = resolve_tenant(
            TenantSignals::default(),
            &account,
            &config(&["bob", "global_tenant"]),
        );
        assert_eq!(resolution.tenant.as_deref(), Some(GLOBAL_TENANT));
    }

    #[test]
    fn test_no_signals_and_no_preferred_means_no_tenant() {
        let account = account(&["global_tenant"]);
        let resolution = resolve_tenant(TenantSignals::default(), &account, &config(&[]));
        assert_eq!(resolution.tenant, None);
        assert!(!resolution.changed);
    }

    #[test]
    fn test_preference_match_is_not_a_change() {
        let account = account(&["global_tenant", "audit"]);
        let resolution = resolve_tenant(
            TenantSignals {
                preference: Some("audit"),
                ..TenantSignals::default()
            },
            &account,
            &config(&[]),
        );
        assert_eq!(resolution.tenant.as_deref(), Some("audit"));
        assert!(!resolution.changed, "steady state must not rewrite the cookie");
    }

    #[test]
    fn test_query_differing_from_preference_is_a_change() {
        let account = account(&["global_tenant", "audit", "finance"]);
        let resolution = resolve_tenant(
            TenantSignals {
                query: Some("finance"),
                header: None,
                preference: Some("audit"),
            },
            &account,
            &config(&[]),
        );
        assert_eq!(resolution.tenant.as_deref(), Some("finance"));
        assert!(resolution.changed);
    }

    #[test]
    fn test_query_matching_preference_is_not_a_change() {
        let account = account(&["global_tenant", "audit"]);
        let resolution = resolve_tenant(
            TenantSignals {
                query: Some("audit"),
                header: None,
                preference: Some("audit"),
            },
            &account,
            &config(&[]),
        );
        assert!(!resolution.changed);
    }

    #[test]
    fn test_global_disabled_blocks_global() {
        let account = account(&["global_tenant"]);
        let mut config = config(&[]);
        config.global_enabled = false;
        let resolution = resolve_tenant(
            TenantSignals {
                query: Some("global"),
                ..TenantSignals::default()
            },
            &account,
            &config,
        );
        assert_eq!(resolution.tenant, None);
    }

    #[test]
    fn test_private_disabled_blocks_private() {
        let account = account(&["global_tenant"]);
        let mut config = config(&[]);
        config.private_enabled = false;
        let err = validate_tenant("private", &account, &config).unwrap_err();
        assert!(matches!(err, AuthError::InvalidTenant(_)));
    }

    #[test]
    fn test_validate_accepts_aliases() {
        let account = account(&["global_tenant", "alice"]);
        let config = config(&[]);
        assert_eq!(validate_tenant("", &account, &config).unwrap(), GLOBAL_TENANT);
        assert_eq!(
            validate_tenant("alice", &account, &config).unwrap(),
            PRIVATE_TENANT
        );
    }

    #[test]
    fn test_private_requires_engine_reported_tenant() {
        // Private tenancy is enabled, but the engine never listed a private
        // tenant for this account, so the alias must not resolve.
        let account = account(&["global_tenant"]);
        let err = validate_tenant("private", &account, &config(&[])).unwrap_err();
        assert!(matches!(err, AuthError::InvalidTenant(_)));

        let resolution = resolve_tenant(
            TenantSignals {
                query: Some("__user__"),
                ..TenantSignals::default()
            },
            &account,
            &config(&["global_tenant"]),
        );
        assert_eq!(resolution.tenant.as_deref(), Some(GLOBAL_TENANT));
    }

    #[test]
    fn test_has_usable_tenant() {
        let mut config = config(&[]);
        config.private_enabled = false;

        // A named tenant is enough.
        assert!(has_usable_tenant(&account(&["audit"]), &config));
        // Only the global tenant, and it is enabled.
        assert!(has_usable_tenant(&account(&["global_tenant"]), &config));

        // Nothing but the global tenant, and it is disabled.
        config.global_enabled = false;
        assert!(!has_usable_tenant(&account(&["global_tenant"]), &config));
        assert!(!has_usable_tenant(&account(&[]), &config));

        // Private tenancy rescues the account only when the engine reports
        // a private tenant, listed under the account's own name.
        config.private_enabled = true;
        assert!(has_usable_tenant(&account(&["alice"]), &config));
        assert!(!has_usable_tenant(&account(&[]), &config));
    }

    #[test]
    fn test_validate_rejects_unknown_tenant() {
        let account = account(&["global_tenant"]);
        let err = validate_tenant("finance", &account, &config(&[])).unwrap_err();
        assert!(matches!(err, AuthError::InvalidTenant(name) if name == "finance"));
    }
}
