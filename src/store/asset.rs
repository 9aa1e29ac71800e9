/// Shared data structures for the asset catalog
///
/// These structs represent the data model that flows between
/// the database layer and the view layer.
use std::path::Path;

use chrono::Utc;
use uuid::Uuid;

/// One imported media file.
///
/// The `id` is assigned at import and never changes; it is the joining key
/// to the thumbnail store. `stored_file_name` is the leaf name under the
/// repository's storage root and is never reused after deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    /// Stable unique identifier, assigned at import.
    pub id: Uuid,
    /// User-facing name; the only mutable field.
    pub display_name: String,
    /// Leaf file name under the storage root.
    pub stored_file_name: String,
    /// Import time, seconds since the Unix epoch.
    pub imported_at: i64,
}

impl AssetRecord {
    /// Build the record for a freshly moved file.
    ///
    /// The display name is the original source's base name with the
    /// extension stripped; the stored name is whatever leaf the mover
    /// settled on after collision handling.
    pub fn for_import(source: &Path, stored_file_name: String) -> Self {
        let display_name = source
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();

        AssetRecord {
            id: Uuid::new_v4(),
            display_name,
            stored_file_name,
            imported_at: Utc::now().timestamp(),
        }
    }
}
