//! Name-collision-safe relocation into a directory.
//!
//! Moves or copies an item into a target directory, adjusting the file name
//! as required to avoid a collision: `clip.mov`, `clip 2.mov`, `clip 3.mov`
//! and so on, up to a bounded number of attempts.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result, MAX_NAME_ATTEMPTS};

/// Whether the source is retained after relocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocateMode {
    /// The source is removed.
    Move,
    /// The source is retained.
    Copy,
}

/// Relocate `source` into `into_dir`, renaming on collision.
///
/// Returns the final path of the item. A missing source is
/// [`Error::NotFound`]; running out of candidate names is
/// [`Error::CollisionExhausted`]. In both cases the source (if any) is left
/// untouched and the caller is expected to skip the item.
///
/// Every attempt atomically claims its candidate name before any content
/// lands there, so no partial file is ever visible under a name this
/// function returns. `fs::rename` alone replaces an existing destination on
/// Unix, hence the explicit claims.
pub fn relocate(source: &Path, into_dir: &Path, mode: RelocateMode) -> Result<PathBuf> {
    let metadata = fs::symlink_metadata(source)
        .map_err(|_| Error::NotFound(source.to_path_buf()))?;
    let is_directory = metadata.is_dir();

    let stem = source
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();
    let extension = if is_directory {
        None
    } else {
        source.extension().map(|e| e.to_os_string())
    };

    for counter in 1..=MAX_NAME_ATTEMPTS {
        let name = if counter == 1 {
            stem.clone()
        } else {
            format!("{stem} {counter}")
        };
        let mut candidate = into_dir.join(name);
        if let Some(ext) = &extension {
            candidate.as_mut_os_string().push(".");
            candidate.as_mut_os_string().push(ext);
        }

        let claimed = if is_directory {
            claim_directory(source, &candidate, mode)?
        } else {
            claim_file(source, &candidate, mode)?
        };

        if claimed {
            debug!(
                from = %source.display(),
                to = %candidate.display(),
                ?mode,
                "relocated item"
            );
            return Ok(candidate);
        }
    }

    Err(Error::CollisionExhausted(source.to_path_buf()))
}

/// Claim `candidate` for a file and fill it. `Ok(false)` means the name was
/// already taken and the next candidate should be tried.
fn claim_file(source: &Path, candidate: &Path, mode: RelocateMode) -> Result<bool> {
    // Reserve the name. Failing with AlreadyExists is the harmless outcome
    // the retry loop is built around.
    match OpenOptions::new().write(true).create_new(true).open(candidate) {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e.into()),
    }

    let filled = match mode {
        RelocateMode::Move => match fs::rename(source, candidate) {
            Ok(()) => Ok(()),
            // Cross-device move: stage a copy next to the destination,
            // publish it over our placeholder, then drop the source.
            Err(_) => stage_copy(source, candidate).and_then(|()| fs::remove_file(source)),
        },
        RelocateMode::Copy => stage_copy(source, candidate),
    };

    match filled {
        Ok(()) => Ok(true),
        Err(e) => {
            // Give the claimed name back before reporting the failure.
            let _ = fs::remove_file(candidate);
            Err(e.into())
        }
    }
}

/// Copy `source`'s bytes to a temporary sibling of `candidate`, then rename
/// it into place. The rename replaces only the placeholder we created, so
/// the content appears under the final name in one step.
fn stage_copy(source: &Path, candidate: &Path) -> std::io::Result<()> {
    let dir = candidate.parent().unwrap_or_else(|| Path::new("."));
    let staged = NamedTempFile::new_in(dir)?;
    fs::copy(source, staged.path())?;
    staged.persist(candidate).map_err(|e| e.error)?;
    Ok(())
}

/// Claim `candidate` for a directory and fill it.
fn claim_directory(source: &Path, candidate: &Path, mode: RelocateMode) -> Result<bool> {
    // An empty directory is the claim; create_dir fails if the name exists.
    match fs::create_dir(candidate) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e.into()),
    }

    let filled = match mode {
        // Renaming a directory over the empty one we just created succeeds
        // and takes its place.
        RelocateMode::Move => fs::rename(source, candidate),
        RelocateMode::Copy => copy_dir_contents(source, candidate),
    };

    match filled {
        Ok(()) => Ok(true),
        Err(e) => {
            let _ = fs::remove_dir_all(candidate);
            Err(e.into())
        }
    }
}

/// Recursively copy the contents of `from` into the existing directory `to`.
fn copy_dir_contents(from: &Path, to: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            fs::create_dir(&target)?;
            copy_dir_contents(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
