//! Group-based access policy
//!
//! Pure evaluation over the accumulated user data: no I/O, no directory access.
//! Administrators may list groups by DN or by short name, so a membership is
//! matched through both identifiers.

use dirauth_core::config::PolicyConfig;
use dirauth_core::types::{AuthorizationDecision, GroupRecord, MembershipMap, UserData, UserValue};
use dirauth_core::{Error, Result, ADMIN_ROLE, MEMBER_OF_KEY};
use std::collections::HashSet;

/// Check allow/refuse lists.
///
/// The refuse list is evaluated first: a group present in both lists rejects.
/// When several refused groups match, the one met first in traversal order is
/// reported, comparing a group's DN before its short name.
pub fn assert_access(data: &UserData, policy: &PolicyConfig) -> Result<()> {
    let memberships = match data.get(MEMBER_OF_KEY) {
        Some(UserValue::Groups(memberships)) => memberships,
        Some(_) => {
            return Err(Error::Configuration(format!(
                "\"{}\" does not hold a membership map",
                MEMBER_OF_KEY
            )))
        }
        None if policy.membership_required() => {
            return Err(Error::Configuration(format!(
                "the directory did not load any memberships (even empty ones) for this user; \
                 make sure groups are returned under the \"{}\" key",
                MEMBER_OF_KEY
            )))
        }
        None => return Ok(()),
    };

    if let Some(refused) = &policy.refuse_groups {
        if let Some(hit) = identifiers(memberships).find(|id| refused.contains(*id)) {
            return Err(Error::blacklisted(hit));
        }
    }

    if let Some(allowed) = &policy.allow_groups {
        if !identifiers(memberships).any(|id| allowed.contains(id)) {
            return Err(Error::not_whitelisted());
        }
    }

    Ok(())
}

/// Roles granted by group membership, in first-seen order without duplicates
pub fn derive_roles(data: &UserData, policy: &PolicyConfig) -> Vec<String> {
    let mut roles = RoleList::default();
    let Some(memberships) = data.memberships() else {
        return roles.into_vec();
    };

    if policy.derive_mail_roles {
        for mail in memberships.iter().filter_map(GroupRecord::mail) {
            roles.push(mail);
        }
    }

    if let Some(role_map) = &policy.role_map {
        for group in memberships {
            let keys = [Some(group.dn.as_str()), Some(group.name.as_str()), group.mail()];
            for key in keys.into_iter().flatten() {
                if let Some(role) = role_map.get(key) {
                    roles.push(role);
                }
            }
        }
    }

    if let Some(admin_groups) = &policy.admin_groups {
        if !roles.contains(ADMIN_ROLE) && identifiers(memberships).any(|id| admin_groups.contains(id))
        {
            roles.push(ADMIN_ROLE);
        }
    }

    roles.into_vec()
}

/// DN and short name of every group, in traversal order
fn identifiers(memberships: &MembershipMap) -> impl Iterator<Item = &str> {
    memberships.iter().flat_map(|group| {
        std::iter::once(group.dn.as_str())
            .chain(Some(group.name.as_str()).filter(|name| !name.is_empty()))
    })
}

#[derive(Default)]
struct RoleList {
    roles: Vec<String>,
    seen: HashSet<String>,
}

impl RoleList {
    fn push(&mut self, role: &str) {
        if self.seen.insert(role.to_string()) {
            self.roles.push(role.to_string());
        }
    }

    fn contains(&self, role: &str) -> bool {
        self.seen.contains(role)
    }

    fn into_vec(self) -> Vec<String> {
        self.roles
    }
}

/// Policy evaluator bound to one configuration
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    config: PolicyConfig,
}

impl AccessPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn assert_access(&self, data: &UserData) -> Result<()> {
        assert_access(data, &self.config)
    }

    pub fn derive_roles(&self, data: &UserData) -> Vec<String> {
        derive_roles(data, &self.config)
    }

    /// Access check followed by role derivation
    pub fn evaluate(&self, data: &UserData) -> AuthorizationDecision {
        match self.assert_access(data) {
            Ok(()) => AuthorizationDecision::Allowed {
                roles: self.derive_roles(data),
            },
            Err(err) => AuthorizationDecision::try_from(&err).unwrap_or_else(|()| {
                AuthorizationDecision::Rejected {
                    reason: err.to_string(),
                    kind: dirauth_core::types::RejectionKind::Configuration,
                    group: None,
                }
            }),
        }
    }
}
