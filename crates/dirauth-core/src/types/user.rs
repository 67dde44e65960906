//! User types

use crate::types::MembershipMap;
use crate::{ID_KEY, MEMBER_OF_KEY, USERNAME_KEY};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// One value in the accumulated user data
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UserValue {
    Text(String),
    List(Vec<String>),
    Fields(BTreeMap<String, UserValue>),
    Groups(MembershipMap),
}

impl UserValue {
    /// Single-valued attributes collapse to text, anything else stays a list
    pub fn from_values(mut values: Vec<String>) -> Self {
        if values.len() == 1 {
            UserValue::Text(values.remove(0))
        } else {
            UserValue::List(values)
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            UserValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_fields(&self) -> Option<&BTreeMap<String, UserValue>> {
        match self {
            UserValue::Fields(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_groups(&self) -> Option<&MembershipMap> {
        match self {
            UserValue::Groups(g) => Some(g),
            _ => None,
        }
    }
}

impl From<String> for UserValue {
    fn from(value: String) -> Self {
        UserValue::Text(value)
    }
}

impl From<&str> for UserValue {
    fn from(value: &str) -> Self {
        UserValue::Text(value.to_string())
    }
}

impl From<MembershipMap> for UserValue {
    fn from(value: MembershipMap) -> Self {
        UserValue::Groups(value)
    }
}

/// Data accumulated for one login by the enrichment handlers.
///
/// Every handler owns exactly one key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UserData {
    fields: BTreeMap<String, UserValue>,
}

impl UserData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_user(username: &str, fqdn: &str) -> Self {
        let mut data = Self::new();
        data.insert(USERNAME_KEY, username);
        data.insert(crate::FQDN_KEY, fqdn);
        data
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<UserValue>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&UserValue> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<UserValue> {
        self.fields.remove(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(UserValue::as_text)
    }

    pub fn username(&self) -> Option<&str> {
        self.text(USERNAME_KEY)
    }

    /// The resolved membership, if a groups handler stored one
    pub fn memberships(&self) -> Option<&MembershipMap> {
        self.get(MEMBER_OF_KEY).and_then(UserValue::as_groups)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Authenticated identity handed to the host application
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub id: String,
    pub roles: Vec<String>,
    pub attributes: UserData,
    pub authenticated_at: DateTime<Utc>,
}

impl Principal {
    /// The `id` field when a handler supplied one, otherwise the username
    pub fn from_user_data(attributes: UserData, roles: Vec<String>) -> Self {
        let id = attributes
            .text(ID_KEY)
            .or_else(|| attributes.username())
            .unwrap_or_default()
            .to_string();

        Self {
            id,
            roles,
            attributes,
            authenticated_at: Utc::now(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == crate::ADMIN_ROLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GroupRecord;

    #[test]
    fn test_from_values_collapses_single() {
        assert_eq!(
            UserValue::from_values(vec!["a".into()]),
            UserValue::Text("a".into())
        );
        assert_eq!(
            UserValue::from_values(vec!["a".into(), "b".into()]),
            UserValue::List(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_memberships_only_for_groups_value() {
        let mut data = UserData::for_user("jdoe", "corp.local");
        assert!(data.memberships().is_none());

        data.insert(MEMBER_OF_KEY, MembershipMap::new());
        assert!(data.memberships().unwrap().is_empty());

        data.insert(MEMBER_OF_KEY, "not a map");
        assert!(data.memberships().is_none());
    }

    #[test]
    fn test_principal_id_prefers_explicit_id() {
        let mut data = UserData::for_user("jdoe", "corp.local");
        let principal = Principal::from_user_data(data.clone(), vec![]);
        assert_eq!(principal.id, "jdoe");

        data.insert(ID_KEY, "42");
        let principal = Principal::from_user_data(data, vec!["admin".into()]);
        assert_eq!(principal.id, "42");
        assert!(principal.is_admin());
    }

    #[test]
    fn test_user_data_serializes_flat() {
        let mut data = UserData::for_user("jdoe", "corp.local");
        let groups: MembershipMap = vec![GroupRecord::new("CN=A,OU=G", "A")].into_iter().collect();
        data.insert(MEMBER_OF_KEY, groups);

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["username"], "jdoe");
        assert_eq!(json["memberOf"]["CN=A,OU=G"]["name"], "A");
    }
}
