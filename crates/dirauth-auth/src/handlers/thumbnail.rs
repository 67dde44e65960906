//! Profile picture handler

use super::EnrichmentHandler;
use crate::directory::{DirectoryQuery, SearchRequest};
use crate::filter::Filters;
use crate::metrics;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use dirauth_core::types::{UserData, UserValue};
use dirauth_core::{Error, Result};

/// Default registration name
pub const THUMBNAIL_KEY: &str = "thumbnail";

const PHOTO_ATTRIBUTE: &str = "thumbnailPhoto";

/// Loads `thumbnailPhoto` as a `data:` URI
#[derive(Debug, Clone, Default)]
pub struct ThumbnailLoader {
    filters: Filters,
}

impl ThumbnailLoader {
    pub fn new(filters: Filters) -> Self {
        Self { filters }
    }
}

#[async_trait]
impl EnrichmentHandler for ThumbnailLoader {
    async fn load(
        &self,
        session: &dyn DirectoryQuery,
        data: &UserData,
    ) -> Result<Option<UserValue>> {
        let username = data
            .username()
            .ok_or_else(|| Error::Configuration("username is not set".to_string()))?;

        let request = SearchRequest::subtree(self.filters.user_lookup(username))
            .with_attrs([PHOTO_ATTRIBUTE]);
        metrics::record_directory_query("thumbnail");
        let entry = session.search_one(&request).await?;

        let photo = entry
            .and_then(|entry| entry.binary(PHOTO_ATTRIBUTE))
            .and_then(|values| values.into_iter().find(|raw| !raw.is_empty()));

        Ok(photo.map(|raw| {
            UserValue::Text(format!("data:image/jpeg;base64,{}", STANDARD.encode(raw)))
        }))
    }
}
