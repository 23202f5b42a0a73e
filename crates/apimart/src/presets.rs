//! Cached preset browsing.
//!
//! Preset lists change rarely and are re-requested every time a browsing
//! view opens, so they go through an explicitly owned [`TtlCache`] keyed
//! by the category query, with a manual refresh trigger for pull-to-refresh
//! style UIs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use pictor_core::cache::TtlCache;

use crate::api::{ApimartApi, ApimartApiError, Preset};

/// Anything that can fetch the preset list for a category.
/// Implemented by [`ApimartApi`]; tests substitute a scripted source.
#[async_trait]
pub trait PresetSource: Send + Sync {
    async fn fetch_presets(&self, category: &str) -> Result<Vec<Preset>, ApimartApiError>;
}

#[async_trait]
impl PresetSource for ApimartApi {
    async fn fetch_presets(&self, category: &str) -> Result<Vec<Preset>, ApimartApiError> {
        self.list_presets(category).await
    }
}

/// Preset lists behind a TTL cache.
pub struct PresetCatalog<S> {
    source: Arc<S>,
    cache: Mutex<TtlCache<String, Vec<Preset>>>,
}

impl<S: PresetSource> PresetCatalog<S> {
    pub fn new(source: Arc<S>, ttl: Duration) -> Self {
        Self {
            source,
            cache: Mutex::new(TtlCache::new(ttl)),
        }
    }

    /// List presets for a category, served from cache while fresh.
    ///
    /// Fetch errors are not cached; the next call retries.
    pub async fn list(&self, category: &str) -> Result<Vec<Preset>, ApimartApiError> {
        let mut cache = self.cache.lock().await;
        if let Some(hit) = cache.get(&category.to_string()) {
            return Ok(hit);
        }
        let presets = self.source.fetch_presets(category).await?;
        cache.insert(category.to_string(), presets.clone());
        Ok(presets)
    }

    /// Drop the cached list for a category and fetch it again.
    pub async fn refresh(&self, category: &str) -> Result<Vec<Preset>, ApimartApiError> {
        self.cache.lock().await.invalidate(&category.to_string());
        self.list(category).await
    }
}
