//! In-memory directory for tests
//!
//! Understands the default user-lookup, group-catalog and group-parent filters
//! and records every filter it is asked to run.

use crate::directory::{
    DirectoryConnector, DirectoryEntry, DirectoryQuery, DirectoryResult, SearchRequest,
    NO_ATTRIBUTES,
};
use async_trait::async_trait;
use dirauth_core::{DirectoryError, Error, Result};
use ldap3::ldap_unescape;
use ::metrics::{
    Counter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const CATALOG_FILTER: &str = "(&(objectClass=Group))";
const PARENT_PREFIX: &str = "(&(objectClass=group)(member=";
const USER_PREFIX: &str = "(|(userprincipalname=";

#[derive(Default)]
struct State {
    users: Vec<DirectoryEntry>,
    groups: Vec<DirectoryEntry>,
    passwords: HashMap<String, String>,
    failing_on: Option<String>,
    queries: Mutex<Vec<String>>,
    binds: Mutex<Vec<String>>,
}

#[derive(Clone, Default)]
pub struct MemoryDirectory {
    state: Arc<State>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn state_mut(&mut self) -> &mut State {
        Arc::get_mut(&mut self.state).expect("directory is configured before use")
    }

    pub fn with_user_entry(mut self, entry: DirectoryEntry) -> Self {
        self.state_mut().users.push(entry);
        self
    }

    /// User `CN=<sam>,OU=Users,DC=corp,DC=local` with the given direct groups
    pub fn with_user(self, sam: &str, member_of: &[&str]) -> Self {
        let mut entry = DirectoryEntry::new(format!("CN={},OU=Users,DC=corp,DC=local", sam))
            .with_attr("sAMAccountName", [sam])
            .with_attr("userPrincipalName", [format!("{}@corp.local", sam)]);
        if !member_of.is_empty() {
            entry = entry.with_attr("memberOf", member_of.iter().copied());
        }
        self.with_user_entry(entry)
    }

    pub fn with_group(mut self, dn: &str, mail: Option<&str>, members: &[&str]) -> Self {
        let mut entry = DirectoryEntry::new(dn);
        if let Some(mail) = mail {
            entry = entry.with_attr("mail", [mail]);
        }
        if !members.is_empty() {
            entry = entry.with_attr("member", members.iter().copied());
        }
        self.state_mut().groups.push(entry);
        self
    }

    pub fn with_password(mut self, bind_name: &str, password: &str) -> Self {
        self.state_mut()
            .passwords
            .insert(bind_name.to_string(), password.to_string());
        self
    }

    /// Fail every search whose filter contains `needle`
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.state_mut().failing_on = Some(needle.to_string());
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.queries.lock().unwrap().clone()
    }

    pub fn parent_queries(&self) -> Vec<String> {
        self.queries()
            .into_iter()
            .filter(|q| q.starts_with(PARENT_PREFIX))
            .collect()
    }

    pub fn binds(&self) -> Vec<String> {
        self.state.binds.lock().unwrap().clone()
    }

    fn matching(&self, filter: &str) -> DirectoryResult<Vec<DirectoryEntry>> {
        if filter == CATALOG_FILTER {
            return Ok(self.state.groups.clone());
        }

        if let Some(rest) = filter.strip_prefix(PARENT_PREFIX) {
            let member = unescape(filter, rest.trim_end_matches(')'))?;
            return Ok(self
                .state
                .groups
                .iter()
                .filter(|g| g.attr("member").is_some_and(|m| m.contains(&member)))
                .cloned()
                .collect());
        }

        if let Some(rest) = filter.strip_prefix(USER_PREFIX) {
            let identifier = unescape(filter, rest.split(')').next().unwrap_or_default())?;
            return Ok(self
                .state
                .users
                .iter()
                .filter(|u| {
                    ["sAMAccountName", "userPrincipalName"].iter().any(|attr| {
                        u.first(attr)
                            .is_some_and(|v| v.eq_ignore_ascii_case(&identifier))
                    })
                })
                .cloned()
                .collect());
        }

        Err(DirectoryError::Search {
            filter: filter.to_string(),
            message: "unsupported filter".to_string(),
        })
    }
}

fn project(mut entry: DirectoryEntry, attrs: &[String]) -> DirectoryEntry {
    if attrs.is_empty() {
        return entry;
    }
    let keep = |name: &String| {
        attrs
            .iter()
            .any(|a| a != NO_ATTRIBUTES && a.eq_ignore_ascii_case(name))
    };
    entry.attrs.retain(|name, _| keep(name));
    entry.bin_attrs.retain(|name, _| keep(name));
    entry
}

fn unescape(filter: &str, value: &str) -> DirectoryResult<String> {
    ldap_unescape(value)
        .map(Cow::into_owned)
        .map_err(|e| DirectoryError::Search {
            filter: filter.to_string(),
            message: e.to_string(),
        })
}

#[async_trait]
impl DirectoryQuery for MemoryDirectory {
    async fn search(&self, request: &SearchRequest) -> DirectoryResult<Vec<DirectoryEntry>> {
        self.state
            .queries
            .lock()
            .unwrap()
            .push(request.filter.clone());

        if let Some(needle) = &self.state.failing_on {
            if request.filter.contains(needle.as_str()) {
                return Err(DirectoryError::Search {
                    filter: request.filter.clone(),
                    message: "server unavailable".to_string(),
                });
            }
        }

        Ok(self
            .matching(&request.filter)?
            .into_iter()
            .map(|entry| project(entry, &request.attrs))
            .collect())
    }
}

#[async_trait]
impl DirectoryConnector for MemoryDirectory {
    async fn bind(&self, bind_name: &str, password: &str) -> Result<Arc<dyn DirectoryQuery>> {
        self.state.binds.lock().unwrap().push(bind_name.to_string());

        match self.state.passwords.get(bind_name) {
            Some(expected) if expected == password => Ok(Arc::new(self.clone())),
            _ => Err(Error::InvalidCredentials),
        }
    }
}

/// Recorder that counts `dirauth_directory_queries_total` by `kind`
#[derive(Clone, Default)]
pub struct QueryRecorder {
    counts: Arc<Mutex<HashMap<String, u64>>>,
}

impl QueryRecorder {
    /// Run `future` to completion with this recorder installed on the thread
    pub fn record<F: std::future::Future>(&self, future: F) -> F::Output {
        ::metrics::with_local_recorder(self, || futures::executor::block_on(future))
    }

    pub fn count(&self, kind: &str) -> u64 {
        self.counts.lock().unwrap().get(kind).copied().unwrap_or(0)
    }
}

struct KindCounter {
    kind: String,
    counts: Arc<Mutex<HashMap<String, u64>>>,
}

impl CounterFn for KindCounter {
    fn increment(&self, value: u64) {
        *self.counts.lock().unwrap().entry(self.kind.clone()).or_default() += value;
    }

    fn absolute(&self, value: u64) {
        self.counts.lock().unwrap().insert(self.kind.clone(), value);
    }
}

impl Recorder for QueryRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        if key.name() != crate::metrics::names::DIRECTORY_QUERIES_TOTAL {
            return Counter::noop();
        }
        let kind = key
            .labels()
            .find(|label| label.key() == "kind")
            .map(|label| label.value().to_string())
            .unwrap_or_default();
        Counter::from_arc(Arc::new(KindCounter {
            kind,
            counts: self.counts.clone(),
        }))
    }

    fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}
