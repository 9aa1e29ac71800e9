/// Repository facade
///
/// This module handles:
/// - Bootstrapping the storage root and wiring catalog + thumbnail cache (mod.rs)
/// - Post-commit cleanup after record deletion (reconcile.rs)
mod reconcile;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::RgbaImage;
use tokio::runtime::Handle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::import::scanner::{self, ExtensionClassifier, ImportOutcome, MovieClassifier};
use crate::store::asset::AssetRecord;
use crate::store::catalog::Catalog;
use crate::thumbs::artwork::EmbeddedArtwork;
use crate::thumbs::cache::{Delivery, ThumbnailCache};
use crate::thumbs::format::{GRID_CAPACITY, GRID_THUMBNAIL};

/// Database file name under the storage root.
const DB_FILE: &str = "library.db";
/// Thumbnail store directory under the storage root.
const THUMBNAIL_DIR: &str = "thumbnails";

/// Marks the storage root for backup tools to skip; the catalog and the
/// media files are the user's to back up by other means, deliberately.
const BACKUP_TAG_FILE: &str = "CACHEDIR.TAG";
const BACKUP_TAG_CONTENTS: &str = "Signature: 8a477f597d28d172789f06886806bc55\n\
# Managed storage of the movie library.\n";

struct RepoInner {
    storage_root: PathBuf,
    db_path: PathBuf,
    catalog: Mutex<Catalog>,
    cache: ThumbnailCache,
    classifier: Arc<dyn MovieClassifier>,
    runtime: Handle,
}

/// One media repository over one storage root.
///
/// Owns the durable location of every imported file, its catalog record,
/// and the thumbnail store, and keeps the three consistent under import,
/// deletion and scroll-driven retrieval. Construct one per storage root
/// and clone it wherever it is needed; there is no global instance.
///
/// Must be constructed inside a Tokio runtime; imports, deletions and
/// thumbnail work run on its blocking pool.
#[derive(Clone)]
pub struct Repository {
    inner: Arc<RepoInner>,
}

impl Repository {
    /// Open (creating if needed) the repository at `storage_root`.
    pub fn open(storage_root: &Path) -> Result<Self> {
        fs::create_dir_all(storage_root)?;

        let tag = storage_root.join(BACKUP_TAG_FILE);
        if !tag.exists() {
            fs::write(&tag, BACKUP_TAG_CONTENTS)?;
        }

        let db_path = storage_root.join(DB_FILE);
        let catalog = Catalog::open(&db_path)?;
        let cache = ThumbnailCache::open(
            &storage_root.join(THUMBNAIL_DIR),
            storage_root,
            GRID_CAPACITY,
            Arc::new(EmbeddedArtwork),
        )?;

        info!(root = %storage_root.display(), "repository opened");
        Ok(Repository {
            inner: Arc::new(RepoInner {
                storage_root: storage_root.to_path_buf(),
                db_path,
                catalog: Mutex::new(catalog),
                cache,
                classifier: Arc::new(ExtensionClassifier),
                runtime: Handle::current(),
            }),
        })
    }

    /// Open the repository at its default per-user location.
    pub fn open_default() -> Result<Self> {
        let mut root = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| std::io::Error::other("no user data directory"))?;
        root.push("movie-library");
        root.push("store");
        Self::open(&root)
    }

    /// Where a scan looks by default: the user's downloads, falling back
    /// to their documents.
    pub fn default_scan_location() -> Option<PathBuf> {
        dirs_next::download_dir().or_else(dirs_next::document_dir)
    }

    /// The directory this repository stores media files in.
    pub fn storage_root(&self) -> &Path {
        &self.inner.storage_root
    }

    /// The thumbnail cache serving this repository's assets.
    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.inner.cache
    }

    /// All assets, newest first.
    pub fn assets(&self) -> Result<Vec<AssetRecord>> {
        self.inner.catalog.lock().unwrap().all_assets()
    }

    /// Number of assets in the catalog.
    pub fn asset_count(&self) -> Result<i64> {
        self.inner.catalog.lock().unwrap().asset_count()
    }

    /// Change an asset's user-facing name.
    pub fn rename(&self, id: Uuid, display_name: &str) -> Result<bool> {
        self.inner
            .catalog
            .lock()
            .unwrap()
            .rename_asset(id, display_name)
    }

    /// The on-disk location of a record's media file, if it currently
    /// exists. `None` covers both a deletion in flight and a file lost
    /// out-of-band.
    pub fn asset_file(&self, record: &AssetRecord) -> Option<PathBuf> {
        let path = self.inner.storage_root.join(&record.stored_file_name);
        path.is_file().then_some(path)
    }

    /// Grid-format thumbnail for `asset`; see [`ThumbnailCache::retrieve`].
    pub fn retrieve_thumbnail<F>(&self, asset: &AssetRecord, on_result: F) -> Delivery
    where
        F: FnOnce(Option<Arc<RgbaImage>>, Delivery) + Send + 'static,
    {
        self.inner.cache.retrieve(asset, &GRID_THUMBNAIL, on_result)
    }

    /// Scan `location` and import what it finds, in the background.
    ///
    /// Fire-and-forget: the view layer learns of new assets by re-querying
    /// [`Repository::assets`], not from a return value.
    pub fn import_scan(&self, location: PathBuf) {
        let repo = self.clone();
        self.inner.runtime.spawn_blocking(move || {
            if let Err(e) = repo.import_blocking(&location) {
                warn!(location = %location.display(), error = %e, "import run failed");
            }
        });
    }

    /// Run one scan-and-import pass synchronously on the current thread.
    pub fn import_blocking(&self, location: &Path) -> Result<ImportOutcome> {
        let candidates = scanner::scan(location, self.inner.classifier.as_ref());
        scanner::import(&candidates, &self.inner.storage_root, &self.inner.db_path)
    }

    /// Delete assets in the background: records first (one durable commit),
    /// then files and thumbnails.
    ///
    /// Fire-and-forget: the caller does not wait on cleanup. Cleanup
    /// failures leave at most one orphan file per asset and are only
    /// logged.
    pub fn delete(&self, ids: Vec<Uuid>) {
        let repo = self.clone();
        self.inner.runtime.spawn_blocking(move || {
            if let Err(e) = repo.delete_blocking(&ids) {
                warn!(error = %e, "deletion failed; records unchanged");
            }
        });
    }

    /// Delete assets synchronously on the current thread, returning how
    /// many records were removed.
    pub fn delete_blocking(&self, ids: &[Uuid]) -> Result<usize> {
        // Own connection, like any background unit of work; the shared one
        // stays free for the view layer.
        let mut catalog = Catalog::open(&self.inner.db_path)?;
        let deleted = catalog.delete_assets(ids)?;

        // The commit above is durable; only now may files disappear.
        reconcile::clean_up(&self.inner.storage_root, &self.inner.cache, &deleted);
        Ok(deleted.len())
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("storage_root", &self.inner.storage_root)
            .finish()
    }
}
