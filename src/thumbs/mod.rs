/// Thumbnail subsystem
///
/// This module handles:
/// - Extracting embedded artwork from movie files (artwork.rs)
/// - Fixed-geometry thumbnail formats (format.rs)
/// - The disk-backed, capacity-bounded cache (cache.rs)
/// - The droppable in-memory hot layer (hot.rs)
pub mod artwork;
pub mod cache;
pub mod format;
mod hot;
