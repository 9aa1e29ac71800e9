//! Best-effort in-memory layer above the disk-backed thumbnail store.
//!
//! Purely an optimization: dropping every entry at any moment is always
//! correct, the next retrieve just pays a disk decode again. Nothing here
//! is persisted and no correctness-relevant state lives in this layer.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use image::RgbaImage;
use lru::LruCache;
use uuid::Uuid;

use super::cache::CacheKey;

/// Bounded decoded-image map keyed like the disk store.
pub(crate) struct HotCache {
    images: Mutex<LruCache<CacheKey, Arc<RgbaImage>>>,
}

impl HotCache {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        HotCache {
            images: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub(crate) fn get(&self, key: &CacheKey) -> Option<Arc<RgbaImage>> {
        self.images.lock().unwrap().get(key).cloned()
    }

    pub(crate) fn insert(&self, key: CacheKey, image: Arc<RgbaImage>) {
        self.images.lock().unwrap().put(key, image);
    }

    pub(crate) fn remove(&self, key: &CacheKey) {
        self.images.lock().unwrap().pop(key);
    }

    /// Drop every entry for one asset, across formats.
    pub(crate) fn remove_asset(&self, asset_id: Uuid) {
        let mut images = self.images.lock().unwrap();
        let stale: Vec<CacheKey> = images
            .iter()
            .filter(|(key, _)| key.asset_id == asset_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            images.pop(&key);
        }
    }

    pub(crate) fn clear(&self) {
        self.images.lock().unwrap().clear();
    }
}

impl std::fmt::Debug for HotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let images = self.images.lock().unwrap();
        f.debug_struct("HotCache").field("len", &images.len()).finish()
    }
}
