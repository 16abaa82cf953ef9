use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

use super::Translator;
use crate::core::errors::TranslationError;
use crate::core::types::TranslationResult;
use crate::utils::Metrics;

/// In-memory LRU of recent translations, keyed by xxHash3 of the request.
///
/// Phrases and menus get re-scanned constantly, so repeated requests skip the
/// upstream. Nothing is written to disk.
#[derive(Clone)]
pub struct TranslationCache {
    inner: Arc<Mutex<LruCache<u64, TranslationResult>>>,
    metrics: Option<Metrics>,
}

impl TranslationCache {
    pub fn new(max_entries: NonZeroUsize, metrics: Option<Metrics>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LruCache::new(max_entries))),
            metrics,
        }
    }

    /// Hash of `(from, to, text)`; fields are NUL-separated so they can't run together
    pub fn generate_key(text: &str, from: &str, to: &str) -> u64 {
        let mut hash_input = Vec::with_capacity(text.len() + from.len() + to.len() + 2);
        hash_input.extend_from_slice(from.as_bytes());
        hash_input.push(0);
        hash_input.extend_from_slice(to.as_bytes());
        hash_input.push(0);
        hash_input.extend_from_slice(text.as_bytes());
        xxh3_64(&hash_input)
    }

    pub fn get(&self, key: u64) -> Option<TranslationResult> {
        let hit = self.inner.lock().get(&key).cloned();
        if let Some(ref m) = self.metrics {
            if hit.is_some() {
                m.record_cache_hit();
            } else {
                m.record_cache_miss();
            }
        }
        hit
    }

    pub fn put(&self, key: u64, result: TranslationResult) {
        let mut cache = self.inner.lock();
        cache.put(key, result);
        if let Some(ref m) = self.metrics {
            m.update_cache_size(cache.len());
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `Translator` decorator that consults a [`TranslationCache`] first.
///
/// Only successful translations are cached; errors always reach the caller.
pub struct CachedTranslator {
    inner: Arc<dyn Translator>,
    cache: TranslationCache,
}

impl CachedTranslator {
    pub fn new(inner: Arc<dyn Translator>, cache: TranslationCache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl Translator for CachedTranslator {
    async fn translate(
        &self,
        text: &str,
        from: &str,
        to: &str,
    ) -> Result<TranslationResult, TranslationError> {
        let key = TranslationCache::generate_key(text, from, to);
        if let Some(hit) = self.cache.get(key) {
            debug!("Translation cache hit ({} chars)", text.len());
            return Ok(hit);
        }

        let result = self.inner.translate(text, from, to).await?;
        self.cache.put(key, result.clone());
        Ok(result)
    }
}
