//! Provider registry: factories by provider id, adapters by credential.
//!
//! Adapters are built lazily on first use and cached under
//! `(provider id, sha256 of the API key)`, so a rotated key gets its own
//! adapter instead of silently reusing the one built with the old key.
//! Building an adapter for a new key evicts the provider's adapters for
//! other keys, so the cache holds at most one adapter per provider in
//! steady state. The raw key is never kept as a cache key.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use colloquy_types::llm::ProviderError;

use super::box_provider::BoxChatProvider;

/// Builds an adapter for one credential.
///
/// Construction must be cheap and synchronous; connecting happens on the
/// first call, not here.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, api_key: &SecretString) -> Result<BoxChatProvider, ProviderError>;
}

impl<F> ProviderFactory for F
where
    F: Fn(&SecretString) -> Result<BoxChatProvider, ProviderError> + Send + Sync,
{
    fn create(&self, api_key: &SecretString) -> Result<BoxChatProvider, ProviderError> {
        self(api_key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    provider_id: String,
    credential: [u8; 32],
}

impl CacheKey {
    fn new(provider_id: &str, api_key: &SecretString) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(provider_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(api_key.expose_secret().as_bytes());
        Self {
            provider_id: provider_id.to_string(),
            credential: hasher.finalize().into(),
        }
    }
}

/// Registry of provider factories plus the shared adapter cache.
///
/// Factories are registered at startup (`&mut self`); lookups go through
/// `&self` and are safe to call from any number of concurrent requests.
pub struct ProviderRegistry {
    factories: HashMap<String, Arc<dyn ProviderFactory>>,
    cache: DashMap<CacheKey, Arc<BoxChatProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            cache: DashMap::new(),
        }
    }

    /// Register the factory for a provider id, replacing any previous one.
    ///
    /// Replacing a factory evicts adapters it built earlier.
    pub fn register_factory(
        &mut self,
        provider_id: impl Into<String>,
        factory: impl ProviderFactory + 'static,
    ) {
        let provider_id = provider_id.into();
        if self
            .factories
            .insert(provider_id.clone(), Arc::new(factory))
            .is_some()
        {
            self.invalidate(&provider_id);
        }
    }

    /// Get the adapter for `(provider_id, api_key)`, building it on first use.
    ///
    /// When two requests race on a cold key, exactly one adapter is built
    /// and both receive it. Factory errors are returned and not cached.
    pub fn get_provider(
        &self,
        provider_id: &str,
        api_key: &SecretString,
    ) -> Result<Arc<BoxChatProvider>, ProviderError> {
        let key = CacheKey::new(provider_id, api_key);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }

        let factory = self
            .factories
            .get(provider_id)
            .ok_or_else(|| ProviderError::ProviderNotFound(provider_id.to_string()))?;

        let credential = key.credential;
        let provider = {
            let entry = self.cache.entry(key).or_try_insert_with(|| {
                tracing::debug!(provider = %provider_id, "constructing provider adapter");
                factory.create(api_key).map(Arc::new)
            })?;
            Arc::clone(entry.value())
        };

        // The shard lock is released above; retain would deadlock otherwise.
        self.evict_rotated(provider_id, &credential);
        Ok(provider)
    }

    /// Drop a provider's adapters built for any credential but `current`.
    fn evict_rotated(&self, provider_id: &str, current: &[u8; 32]) {
        let before = self.cache.len();
        self.cache
            .retain(|key, _| key.provider_id != provider_id || key.credential == *current);
        let evicted = before.saturating_sub(self.cache.len());
        if evicted > 0 {
            tracing::info!(provider = %provider_id, evicted, "adapters for rotated keys evicted");
        }
    }

    /// Drop every cached adapter of a provider. Returns how many were evicted.
    pub fn invalidate(&self, provider_id: &str) -> usize {
        let before = self.cache.len();
        self.cache.retain(|key, _| key.provider_id != provider_id);
        let evicted = before.saturating_sub(self.cache.len());
        if evicted > 0 {
            tracing::info!(provider = %provider_id, evicted, "provider adapters invalidated");
        }
        evicted
    }

    /// Drop all cached adapters.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Number of cached adapters.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Provider ids with a registered factory, sorted.
    pub fn supported_providers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
