//! Post-commit cleanup for deleted asset records.
//!
//! Runs strictly after the deleting transaction is durable. The record is
//! the source of truth: once it is gone, a file or thumbnail that refuses
//! to go is logged and left behind as a bounded anomaly, never surfaced to
//! the user and never retried.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, warn};

use crate::store::asset::AssetRecord;
use crate::thumbs::cache::ThumbnailCache;

/// Remove the stored files and cached thumbnails of deleted records.
///
/// Idempotent: re-running for an already-cleaned asset finds nothing to do.
pub(crate) fn clean_up(storage_root: &Path, cache: &ThumbnailCache, deleted: &[AssetRecord]) {
    for record in deleted {
        let path = storage_root.join(&record.stored_file_name);
        match fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed stored file"),
            // Already gone is success, not an error.
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "could not remove stored file; leaving orphan"
                );
            }
        }

        cache.evict(record.id);
    }
}
