//! Disk-backed, capacity-bounded thumbnail cache.
//!
//! Each (asset, format) key moves through `Absent -> Pending -> Ready` and
//! back to `Absent` when it is evicted or its asset is deleted. Ready
//! entries live as JPEG files under the cache directory with their order
//! tracked in an LRU index; Pending keys exist only in memory and are never
//! evicted. Results are delivered through callbacks, with an explicit
//! synchronous/asynchronous flag so grid cells can tell whether the image
//! arrived before `retrieve` returned.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::{DynamicImage, ImageFormat, RgbaImage};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::runtime::Handle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::artwork::ArtworkSource;
use super::format::ThumbnailFormat;
use super::hot::HotCache;
use crate::error::Result;
use crate::store::asset::AssetRecord;

/// Whether a retrieve callback ran before `retrieve` returned.
///
/// Load-bearing for the grid: a display slot that issued an asynchronous
/// request may have been reassigned by the time the result arrives, so
/// `Deferred` results must be revalidated against the slot's current
/// assignment (see [`crate::slot`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The callback ran inside the `retrieve` call.
    Immediate,
    /// The callback runs after `retrieve` has returned.
    Deferred,
}

/// Cache key: asset identity plus format name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub asset_id: Uuid,
    pub format_name: String,
}

impl CacheKey {
    fn new(asset_id: Uuid, format: &ThumbnailFormat) -> Self {
        CacheKey {
            asset_id,
            format_name: format.name.to_string(),
        }
    }
}

type RetrieveCallback = Box<dyn FnOnce(Option<Arc<RgbaImage>>, Delivery) + Send>;

/// One in-flight extraction; all callers registered while the key was
/// Pending resolve from the same result.
struct PendingExtraction {
    /// Asset epoch at registration, doubling as the registration's
    /// identity: eviction bumps the epoch and drops the registration, so a
    /// completed extraction that no longer finds its own epoch knows its
    /// work was invalidated and discards the result instead of storing it.
    epoch: u64,
    waiters: Vec<RetrieveCallback>,
}

struct CacheState {
    /// Ready entries only, most recently used first.
    entries: LruCache<CacheKey, PathBuf>,
    pending: HashMap<CacheKey, PendingExtraction>,
    /// Bumped on every eviction and never reset; keeps any extraction
    /// started before the eviction from resolving one started after it.
    epochs: HashMap<Uuid, u64>,
}

struct Inner {
    cache_dir: PathBuf,
    media_root: PathBuf,
    source: Arc<dyn ArtworkSource>,
    state: Mutex<CacheState>,
    hot: HotCache,
    runtime: Handle,
}

/// Keyed, disk-backed cache of fixed-format thumbnail images.
///
/// One instance per storage root; cheap to clone and share. Must be
/// constructed inside a Tokio runtime, whose blocking pool carries the
/// extraction and decode work.
#[derive(Clone)]
pub struct ThumbnailCache {
    inner: Arc<Inner>,
}

const INDEX_FILE: &str = "index.json";
const INDEX_VERSION: u32 = 1;

/// On-disk index: entry order and file names. Opaque and versioned; an
/// unreadable or mismatched index just means an empty cache plus an orphan
/// sweep.
#[derive(Serialize, Deserialize)]
struct CacheIndex {
    version: u32,
    /// Most recently used first, mirroring the in-memory order.
    entries: Vec<IndexEntry>,
}

#[derive(Serialize, Deserialize)]
struct IndexEntry {
    asset_id: Uuid,
    format_name: String,
    /// Path relative to the cache directory.
    file: String,
}

impl ThumbnailCache {
    /// Open the cache rooted at `cache_dir` for media files under
    /// `media_root`, retaining at most `max_entries` thumbnails.
    pub fn open(
        cache_dir: &Path,
        media_root: &Path,
        max_entries: usize,
        source: Arc<dyn ArtworkSource>,
    ) -> Result<Self> {
        fs::create_dir_all(cache_dir)?;

        let capacity = NonZeroUsize::new(max_entries.max(1)).unwrap();
        let entries = load_index(cache_dir, capacity);
        sweep_orphans(cache_dir, &entries);
        debug!(
            dir = %cache_dir.display(),
            entries = entries.len(),
            "thumbnail cache opened"
        );

        Ok(ThumbnailCache {
            inner: Arc::new(Inner {
                cache_dir: cache_dir.to_path_buf(),
                media_root: media_root.to_path_buf(),
                source,
                state: Mutex::new(CacheState {
                    entries,
                    pending: HashMap::new(),
                    epochs: HashMap::new(),
                }),
                hot: HotCache::new(max_entries.max(1)),
                runtime: Handle::current(),
            }),
        })
    }

    /// Fetch the thumbnail for `asset` in `format`.
    ///
    /// The callback always runs exactly once, with `None` when the asset
    /// has no extractable artwork. The returned [`Delivery`] (also handed
    /// to the callback) says whether that happened inside this call.
    ///
    /// Concurrent retrieves for the same key share one extraction.
    pub fn retrieve<F>(&self, asset: &AssetRecord, format: &ThumbnailFormat, on_result: F) -> Delivery
    where
        F: FnOnce(Option<Arc<RgbaImage>>, Delivery) + Send + 'static,
    {
        let key = CacheKey::new(asset.id, format);

        // Decoded and in memory: the only synchronous completion.
        if let Some(image) = self.inner.hot.get(&key) {
            // Keep the disk entry's recency in step with the hot hit.
            let _ = self.inner.state.lock().unwrap().entries.get(&key);
            on_result(Some(image), Delivery::Immediate);
            return Delivery::Immediate;
        }

        let mut state = self.inner.state.lock().unwrap();

        // Ready on disk: decode off the caller's context.
        if let Some(path) = state.entries.get(&key) {
            let path = path.clone();
            drop(state);
            self.spawn_decode(key, path, Box::new(on_result));
            return Delivery::Deferred;
        }

        // Already being extracted: coalesce.
        if let Some(pending) = state.pending.get_mut(&key) {
            pending.waiters.push(Box::new(on_result));
            return Delivery::Deferred;
        }

        // Absent: this caller starts the one extraction.
        let epoch = state.epochs.get(&asset.id).copied().unwrap_or(0);
        state.pending.insert(
            key.clone(),
            PendingExtraction {
                epoch,
                waiters: vec![Box::new(on_result)],
            },
        );
        drop(state);

        let media_path = self.inner.media_root.join(&asset.stored_file_name);
        self.spawn_extraction(key, media_path, *format, epoch);
        Delivery::Deferred
    }

    /// Remove every entry for `asset_id`, across all formats.
    ///
    /// An extraction in flight for the asset keeps running, but its result
    /// is discarded on arrival instead of stored, and its waiters receive
    /// `None`. Safe to call concurrently with `retrieve`, and a no-op for
    /// an asset with nothing cached.
    pub fn evict(&self, asset_id: Uuid) {
        let mut state = self.inner.state.lock().unwrap();
        *state.epochs.entry(asset_id).or_insert(0) += 1;

        // Cancel in-flight extractions by dropping their registrations; the
        // work itself keeps running and discovers the discard on arrival.
        // A retrieve issued after this sees Absent and extracts afresh.
        let pending_keys: Vec<CacheKey> = state
            .pending
            .keys()
            .filter(|key| key.asset_id == asset_id)
            .cloned()
            .collect();
        let mut cancelled: Vec<RetrieveCallback> = Vec::new();
        for key in &pending_keys {
            if let Some(pending) = state.pending.remove(key) {
                cancelled.extend(pending.waiters);
            }
        }

        let stale: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|(key, _)| key.asset_id == asset_id)
            .map(|(key, _)| key.clone())
            .collect();
        let mut removed = Vec::new();
        for key in &stale {
            if let Some(path) = state.entries.pop(key) {
                removed.push(path);
            }
        }
        let snapshot = index_snapshot(&state);
        drop(state);

        self.inner.hot.remove_asset(asset_id);
        for path in &removed {
            remove_entry_file(path);
        }
        if !removed.is_empty() {
            persist_index(&self.inner.cache_dir, &snapshot);
            debug!(%asset_id, count = removed.len(), "evicted thumbnails");
        }
        for waiter in cancelled {
            waiter(None, Delivery::Deferred);
        }
    }

    /// Drop the in-memory hot layer. Never affects correctness; the disk
    /// store is untouched.
    pub fn trim_memory(&self) {
        self.inner.hot.clear();
    }

    /// Number of Ready entries currently retained.
    pub fn ready_count(&self) -> usize {
        self.inner.state.lock().unwrap().entries.len()
    }

    /// Whether a Ready entry exists for the key right now.
    pub fn contains(&self, asset_id: Uuid, format: &ThumbnailFormat) -> bool {
        self.inner
            .state
            .lock()
            .unwrap()
            .entries
            .contains(&CacheKey::new(asset_id, format))
    }

    /// Decode a Ready entry from disk on the blocking pool.
    fn spawn_decode(&self, key: CacheKey, path: PathBuf, on_result: RetrieveCallback) {
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn_blocking(move || {
            match image::open(&path) {
                Ok(image) => {
                    let image = Arc::new(image.to_rgba8());
                    inner.hot.insert(key, Arc::clone(&image));
                    on_result(Some(image), Delivery::Deferred);
                }
                Err(e) => {
                    // Entry file vanished or rotted; degrade to Absent so
                    // the next retrieve extracts afresh.
                    warn!(path = %path.display(), error = %e, "dropping unreadable cache entry");
                    let mut state = inner.state.lock().unwrap();
                    state.entries.pop(&key);
                    let snapshot = index_snapshot(&state);
                    drop(state);
                    persist_index(&inner.cache_dir, &snapshot);
                    on_result(None, Delivery::Deferred);
                }
            }
        });
    }

    /// Run the extractor for a missing key on the blocking pool. `epoch`
    /// names the registration this task works for.
    fn spawn_extraction(&self, key: CacheKey, media_path: PathBuf, format: ThumbnailFormat, epoch: u64) {
        let inner = Arc::clone(&self.inner);
        self.inner.runtime.spawn_blocking(move || {
            let rendered = inner
                .source
                .extract_cover(&media_path)
                .map(|source| format.render(&source));
            finish_extraction(&inner, key, epoch, rendered);
        });
    }
}

/// Install (or discard) a finished extraction and resolve its waiters.
fn finish_extraction(inner: &Inner, key: CacheKey, epoch: u64, rendered: Option<RgbaImage>) {
    // Write the entry file before taking the lock; the rename below is the
    // single atomic publish, and a discarded result just deletes the file.
    let written = rendered.as_ref().and_then(|image| {
        match write_entry_file(&inner.cache_dir, &key, image) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "could not persist thumbnail; serving uncached");
                None
            }
        }
    });
    let image = rendered.map(Arc::new);

    let mut state = inner.state.lock().unwrap();
    // Only the registration this task was spawned for may resolve. Evict
    // removes registrations (and bumps the epoch a replacement would carry),
    // so a mismatch means this result is inert.
    let pending = match state.pending.remove(&key) {
        Some(pending) if pending.epoch == epoch => pending,
        Some(replacement) => {
            // A fresh registration took the key; leave it untouched.
            state.pending.insert(key, replacement);
            drop(state);
            if let Some(path) = &written {
                remove_entry_file(path);
            }
            return;
        }
        None => {
            drop(state);
            if let Some(path) = &written {
                remove_entry_file(path);
            }
            return;
        }
    };

    let mut displaced = None;
    if let (Some(image), Some(path)) = (&image, &written) {
        displaced = state.entries.push(key.clone(), path.clone());
        inner.hot.insert(key.clone(), Arc::clone(image));
    }
    let snapshot = written.is_some().then(|| index_snapshot(&state));
    drop(state);

    // Capacity pressure: the least recently used entry made way.
    if let Some((old_key, old_path)) = displaced {
        if old_key != key {
            inner.hot.remove(&old_key);
            remove_entry_file(&old_path);
            debug!(asset_id = %old_key.asset_id, "evicted least recently used thumbnail");
        }
    }
    if let Some(snapshot) = snapshot {
        persist_index(&inner.cache_dir, &snapshot);
    }

    for waiter in pending.waiters {
        waiter(image.clone(), Delivery::Deferred);
    }
}

/// Entry file location for a key: `<cache_dir>/<format>/<asset>.jpg`.
fn entry_path(cache_dir: &Path, key: &CacheKey) -> PathBuf {
    cache_dir
        .join(&key.format_name)
        .join(format!("{}.jpg", key.asset_id))
}

/// Encode the image and move it into place under its final name.
fn write_entry_file(cache_dir: &Path, key: &CacheKey, image: &RgbaImage) -> Result<PathBuf> {
    let path = entry_path(cache_dir, key);
    let dir = path.parent().unwrap_or(cache_dir);
    fs::create_dir_all(dir)?;

    // Alpha is uniformly opaque (the format guarantees it); JPEG wants RGB.
    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(rgb)
        .write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .map_err(std::io::Error::other)?;

    let staged = NamedTempFile::new_in(dir)?;
    fs::write(staged.path(), &bytes)?;
    staged.persist(&path).map_err(|e| e.error)?;
    Ok(path)
}

fn remove_entry_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "leaving stale cache file"),
    }
}

/// Serializable view of the current entry order.
fn index_snapshot(state: &CacheState) -> CacheIndex {
    CacheIndex {
        version: INDEX_VERSION,
        entries: state
            .entries
            .iter()
            .map(|(key, path)| IndexEntry {
                asset_id: key.asset_id,
                format_name: key.format_name.clone(),
                file: path
                    .file_name()
                    .map(|n| format!("{}/{}", key.format_name, n.to_string_lossy()))
                    .unwrap_or_default(),
            })
            .collect(),
    }
}

/// Losing the index is never fatal; the next open starts cold and sweeps.
fn persist_index(cache_dir: &Path, index: &CacheIndex) {
    let result = serde_json::to_vec_pretty(index)
        .map_err(std::io::Error::other)
        .and_then(|bytes| {
            let staged = NamedTempFile::new_in(cache_dir)?;
            fs::write(staged.path(), bytes)?;
            staged
                .persist(cache_dir.join(INDEX_FILE))
                .map_err(|e| e.error)?;
            Ok(())
        });
    if let Err(e) = result {
        warn!(error = %e, "could not write thumbnail cache index");
    }
}

/// Rebuild the LRU from the index, dropping entries whose files are gone.
fn load_index(cache_dir: &Path, capacity: NonZeroUsize) -> LruCache<CacheKey, PathBuf> {
    let mut entries = LruCache::new(capacity);

    let Ok(bytes) = fs::read(cache_dir.join(INDEX_FILE)) else {
        return entries;
    };
    let index: CacheIndex = match serde_json::from_slice(&bytes) {
        Ok(index) => index,
        Err(e) => {
            warn!(error = %e, "discarding unreadable thumbnail cache index");
            return entries;
        }
    };
    if index.version != INDEX_VERSION {
        debug!(version = index.version, "discarding thumbnail cache index from another version");
        return entries;
    }

    // The index holds most-recent-first; replay oldest-first so the LRU
    // order comes out the same.
    for entry in index.entries.iter().rev() {
        let path = cache_dir.join(&entry.file);
        if path.is_file() {
            entries.push(
                CacheKey {
                    asset_id: entry.asset_id,
                    format_name: entry.format_name.clone(),
                },
                path,
            );
        }
    }
    entries
}

/// Delete entry files the index does not reference (interrupted writes,
/// entries evicted after the index was last written).
fn sweep_orphans(cache_dir: &Path, entries: &LruCache<CacheKey, PathBuf>) {
    let referenced: HashSet<&PathBuf> = entries.iter().map(|(_, path)| path).collect();

    let Ok(format_dirs) = fs::read_dir(cache_dir) else {
        return;
    };
    for format_dir in format_dirs.flatten() {
        if !format_dir.path().is_dir() {
            continue;
        }
        let Ok(files) = fs::read_dir(format_dir.path()) else {
            continue;
        };
        for file in files.flatten() {
            let path = file.path();
            if !referenced.contains(&path) {
                debug!(path = %path.display(), "sweeping orphaned cache file");
                remove_entry_file(&path);
            }
        }
    }
}

impl std::fmt::Debug for ThumbnailCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailCache")
            .field("cache_dir", &self.inner.cache_dir)
            .field("ready", &self.ready_count())
            .finish()
    }
}
