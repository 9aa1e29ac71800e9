//! Error types for the library core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while importing, cataloging or cleaning up assets.
///
/// `NotFound` and `CollisionExhausted` are benign per-file outcomes: the
/// import pipeline skips the file and a later scan picks it up again.
#[derive(Debug, Error)]
pub enum Error {
    /// The source item does not exist.
    #[error("no file at {0}")]
    NotFound(PathBuf),

    /// No free destination name within the attempt bound.
    #[error("no free destination name for {0}")]
    CollisionExhausted(PathBuf),

    /// The catalog database rejected an operation.
    #[error("catalog error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// Underlying file system failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Naming attempts before a relocation gives up on a destination directory.
pub const MAX_NAME_ATTEMPTS: u32 = 100;
