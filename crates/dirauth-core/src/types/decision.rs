//! Authorization decision types

use crate::error::{Error, ForbiddenKind};
use serde::Serialize;

/// Why a login was rejected by policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// Memberships were required but never loaded
    Configuration,
    Blacklist,
    Whitelist,
}

/// Outcome of policy evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AuthorizationDecision {
    Allowed {
        roles: Vec<String>,
    },
    Rejected {
        reason: String,
        kind: RejectionKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        group: Option<String>,
    },
}

impl AuthorizationDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AuthorizationDecision::Allowed { .. })
    }

    /// Roles on success, the matching error otherwise
    pub fn into_result(self) -> crate::Result<Vec<String>> {
        match self {
            AuthorizationDecision::Allowed { roles } => Ok(roles),
            AuthorizationDecision::Rejected { reason, kind, group } => Err(match kind {
                RejectionKind::Configuration => Error::Configuration(reason),
                RejectionKind::Blacklist => Error::Forbidden {
                    kind: ForbiddenKind::Blacklist,
                    group,
                },
                RejectionKind::Whitelist => Error::Forbidden {
                    kind: ForbiddenKind::Whitelist,
                    group,
                },
            }),
        }
    }
}

impl TryFrom<&Error> for AuthorizationDecision {
    type Error = ();

    /// Only policy errors have a decision counterpart
    fn try_from(err: &Error) -> Result<Self, ()> {
        let (kind, group) = match err {
            Error::Configuration(_) => (RejectionKind::Configuration, None),
            Error::Forbidden {
                kind: ForbiddenKind::Blacklist,
                group,
            } => (RejectionKind::Blacklist, group.clone()),
            Error::Forbidden {
                kind: ForbiddenKind::Whitelist,
                group,
            } => (RejectionKind::Whitelist, group.clone()),
            _ => return Err(()),
        };

        Ok(AuthorizationDecision::Rejected {
            reason: err.to_string(),
            kind,
            group,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_round_trips_to_error() {
        let err = Error::blacklisted("CN=Contractors,OU=G");
        let decision = AuthorizationDecision::try_from(&err).unwrap();
        assert!(!decision.is_allowed());

        match decision.into_result() {
            Err(Error::Forbidden { kind, group }) => {
                assert_eq!(kind, ForbiddenKind::Blacklist);
                assert_eq!(group.as_deref(), Some("CN=Contractors,OU=G"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_transport_errors_have_no_decision() {
        assert!(AuthorizationDecision::try_from(&Error::InvalidCredentials).is_err());
    }
}
