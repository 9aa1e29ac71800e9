//! Personal video library core.
//!
//! Imports movie files dropped into a scan location, stores them durably
//! under a storage root, records them in a SQLite catalog, and serves
//! fixed-format thumbnails to a scrolling grid from a bounded disk cache.
//!
//! Three independent lifecycles are kept consistent under concurrent
//! mutation: the catalog record, the stored file, and the cached
//! thumbnail. A file always exists before its record does (imports move
//! first, record second), records always outlive cleanup (deletion commits
//! first, removes files second), and thumbnail results delivered late are
//! revalidated against [`slot`] tokens before a grid cell applies them.
//!
//! The view layer talks to a [`Repository`]; everything underneath is
//! reachable for direct use and for tests.

pub mod error;
pub mod import;
pub mod repo;
pub mod slot;
pub mod store;
pub mod thumbs;

pub use error::{Error, Result};
pub use import::scanner::ImportOutcome;
pub use repo::Repository;
pub use slot::{SlotState, SlotToken};
pub use store::asset::AssetRecord;
pub use thumbs::cache::{Delivery, ThumbnailCache};
pub use thumbs::format::{ThumbnailFormat, GRID_THUMBNAIL};
