//! Post-bind enrichment handlers
//!
//! After a successful bind, every registered handler runs once against the
//! bound session, in registration order. Each one owns a single key of the
//! accumulated [`UserData`]: whatever it returns is stored under the name it
//! was registered with, and later handlers see the fields written before them.

mod groups;
mod thumbnail;
mod user_info;

pub use groups::GroupsLoader;
pub use thumbnail::{ThumbnailLoader, THUMBNAIL_KEY};
pub use user_info::{UserInfoLoader, USER_INFO_KEY};

use crate::directory::DirectoryQuery;
use async_trait::async_trait;
use dirauth_core::types::{UserData, UserValue};
use dirauth_core::Result;
use std::fmt;
use std::sync::Arc;

/// One enrichment step
#[async_trait]
pub trait EnrichmentHandler: Send + Sync {
    /// Value for this handler's key; `None` leaves the key unset
    async fn load(&self, session: &dyn DirectoryQuery, data: &UserData)
        -> Result<Option<UserValue>>;
}

/// Ordered, named handler slots
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    slots: Vec<(String, Arc<dyn EnrichmentHandler>)>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler, or replace the one registered under the same name in place
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn EnrichmentHandler>) {
        let name = name.into();
        match self.slots.iter_mut().find(|(slot, _)| *slot == name) {
            Some((_, existing)) => *existing = handler,
            None => self.slots.push((name, handler)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn EnrichmentHandler>> {
        let index = self.slots.iter().position(|(slot, _)| slot == name)?;
        Some(self.slots.remove(index).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.iter().any(|(slot, _)| slot == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn EnrichmentHandler>)> {
        self.slots.iter().map(|(name, handler)| (name.as_str(), handler))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
