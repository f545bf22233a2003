//! Resource sharing reconciliation.
//!
//! A share record maps access levels to recipient groups. Reconciliation
//! turns a desired record and a current record into the minimal add/revoke
//! patch, and applying that patch to the current record reproduces the
//! desired one. Ordered collections keep the patch output deterministic.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Recipients of one access level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recipients {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub users: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub roles: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub backend_roles: BTreeSet<String>,
}

impl Recipients {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.roles.is_empty() && self.backend_roles.is_empty()
    }

    fn difference(&self, other: &Recipients) -> Recipients {
        Recipients {
            users: self.users.difference(&other.users).cloned().collect(),
            roles: self.roles.difference(&other.roles).cloned().collect(),
            backend_roles: self
                .backend_roles
                .difference(&other.backend_roles)
                .cloned()
                .collect(),
        }
    }

    fn extend(&mut self, other: &Recipients) {
        self.users.extend(other.users.iter().cloned());
        self.roles.extend(other.roles.iter().cloned());
        self.backend_roles
            .extend(other.backend_roles.iter().cloned());
    }

    fn remove(&mut self, other: &Recipients) {
        self.users.retain(|u| !other.users.contains(u));
        self.roles.retain(|r| !other.roles.contains(r));
        self.backend_roles.retain(|b| !other.backend_roles.contains(b));
    }
}

/// Share record: access level name to recipients.
pub type ShareWith = BTreeMap<String, Recipients>;

/// Patch to move one share record toward another.
///
/// Access levels whose delta is empty are omitted entirely, so an empty
/// patch serializes as two empty maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharePatch {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub add: ShareWith,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub revoke: ShareWith,
}

impl SharePatch {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.revoke.is_empty()
    }
}

/// Compute the patch that rewrites `current` into `desired`.
pub fn diff(desired: &ShareWith, current: &ShareWith) -> SharePatch {
    let mut patch = SharePatch::default();
    let empty = Recipients::default();

    for (level, wanted) in desired {
        let have = current.get(level).unwrap_or(&empty);
        let added = wanted.difference(have);
        if !added.is_empty() {
            patch.add.insert(level.clone(), added);
        }
    }

    for (level, have) in current {
        let wanted = desired.get(level).unwrap_or(&empty);
        let revoked = have.difference(wanted);
        if !revoked.is_empty() {
            patch.revoke.insert(level.clone(), revoked);
        }
    }

    patch
}

/// Apply a patch to a share record.
///
/// Revocations run after additions; a recipient named in both ends up
/// revoked. Access levels left with no recipients are dropped from the
/// record rather than kept as empty groups.
pub fn apply(current: &ShareWith, patch: &SharePatch) -> ShareWith {
    let mut result = current.clone();

    for (level, added) in &patch.add {
        result.entry(level.clone()).or_default().extend(added);
    }

    for (level, revoked) in &patch.revoke {
        if let Some(recipients) = result.get_mut(level) {
            recipients.remove(revoked);
        }
    }

    result.retain(|_, recipients| !recipients.is_empty());
    result
}
