//! Import scanning: find movie files in a scan location and bring them
//! into the storage root.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::mover::{self, RelocateMode};
use crate::error::{Error, Result};
use crate::store::asset::AssetRecord;
use crate::store::catalog::Catalog;

/// Decides whether a path is a movie the library should import.
///
/// Container/codec sniffing is deliberately outside this crate; the
/// classifier is the boundary to whatever type system the platform offers.
pub trait MovieClassifier: Send + Sync {
    fn is_movie(&self, path: &Path) -> bool;
}

/// Common movie container extensions.
const MOVIE_EXTENSIONS: [&str; 12] = [
    "mov", "mp4", "m4v", "avi", "mkv", "wmv", "flv", "webm", "mpeg", "mpg", "3gp", "ogv",
];

/// Default classifier: matches by file extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionClassifier;

impl MovieClassifier for ExtensionClassifier {
    fn is_movie(&self, path: &Path) -> bool {
        match path.extension() {
            Some(extension) => {
                let ext = extension.to_string_lossy().to_lowercase();
                MOVIE_EXTENSIONS.contains(&ext.as_str())
            }
            None => false,
        }
    }
}

/// Result of one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    /// Files moved into the storage root and recorded in the catalog.
    pub imported: usize,
    /// Files skipped because relocation failed; they stay where they were
    /// and the next scan picks them up again.
    pub skipped: usize,
}

/// Recursively enumerate `location` for importable movie files.
pub fn scan(location: &Path, classifier: &dyn MovieClassifier) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    for entry in WalkDir::new(location)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        if classifier.is_movie(&path) {
            candidates.push(path);
        }
    }

    debug!(
        location = %location.display(),
        count = candidates.len(),
        "scan finished"
    );
    candidates
}

/// Import `paths` into `storage_root`, one unit of work per file.
///
/// Each file is moved first and recorded second, so a file exists for every
/// record that is ever committed. Per-file failures are skipped; the
/// records for every successfully moved file commit together in a single
/// transaction, and that commit failing is the only error this returns.
pub fn import(paths: &[PathBuf], storage_root: &Path, db_path: &Path) -> Result<ImportOutcome> {
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for path in paths {
        match mover::relocate(path, storage_root, RelocateMode::Move) {
            Ok(moved) => {
                let stored_file_name = moved
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .into_owned();
                records.push(AssetRecord::for_import(path, stored_file_name));
            }
            Err(Error::NotFound(_)) => {
                // Already moved or removed since the scan; nothing to do.
                debug!(path = %path.display(), "skipping vanished source");
                skipped += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unimportable file");
                skipped += 1;
            }
        }
    }

    // One connection per import run; the catalog's own connection may be
    // busy serving the view layer.
    let mut catalog = Catalog::open(db_path)?;
    catalog.insert_assets(&records)?;

    info!(imported = records.len(), skipped, "import run finished");
    Ok(ImportOutcome {
        imported: records.len(),
        skipped,
    })
}
