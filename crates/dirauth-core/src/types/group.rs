//! Group types

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use std::collections::HashMap;

/// A directory group, keyed by its DN
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct GroupRecord {
    pub dn: String,
    /// First `CN=` component of the DN
    pub name: String,
    /// Local part of the group mail address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
}

impl GroupRecord {
    pub fn new(dn: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            name: name.into(),
            mail: None,
        }
    }

    pub fn with_mail(mut self, mail: impl Into<String>) -> Self {
        self.mail = Some(mail.into());
        self
    }

    /// Mail local part, treating an empty value as absent
    pub fn mail(&self) -> Option<&str> {
        self.mail.as_deref().filter(|m| !m.is_empty())
    }
}

/// Transitive group membership of one user: DN -> GroupRecord.
///
/// A DN is stored at most once. Iteration follows insertion order, which for a
/// resolved membership is the breadth-first traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipMap {
    groups: Vec<GroupRecord>,
    index: HashMap<String, usize>,
}

impl MembershipMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn contains(&self, dn: &str) -> bool {
        self.index.contains_key(dn)
    }

    pub fn get(&self, dn: &str) -> Option<&GroupRecord> {
        self.index.get(dn).map(|&i| &self.groups[i])
    }

    /// Insert a record unless its DN is already present. Returns true if inserted.
    pub fn insert(&mut self, record: GroupRecord) -> bool {
        if self.index.contains_key(&record.dn) {
            return false;
        }
        self.index.insert(record.dn.clone(), self.groups.len());
        self.groups.push(record);
        true
    }

    /// Swap the record stored under `record.dn`, keeping its position.
    /// Returns false when the DN is not a member.
    pub fn replace(&mut self, record: GroupRecord) -> bool {
        match self.index.get(&record.dn) {
            Some(&i) => {
                self.groups[i] = record;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &GroupRecord> {
        self.groups.iter()
    }

    pub fn dns(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.dn.as_str())
    }
}

impl FromIterator<GroupRecord> for MembershipMap {
    fn from_iter<I: IntoIterator<Item = GroupRecord>>(iter: I) -> Self {
        let mut map = MembershipMap::new();
        for record in iter {
            map.insert(record);
        }
        map
    }
}

impl IntoIterator for MembershipMap {
    type Item = GroupRecord;
    type IntoIter = std::vec::IntoIter<GroupRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

impl<'a> IntoIterator for &'a MembershipMap {
    type Item = &'a GroupRecord;
    type IntoIter = std::slice::Iter<'a, GroupRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}

impl Serialize for MembershipMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for group in &self.groups {
            map.serialize_entry(&group.dn, group)?;
        }
        map.end()
    }
}
