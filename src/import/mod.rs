/// Import pipeline
///
/// This module handles:
/// - Relocating files into the storage root without name collisions (mover.rs)
/// - Finding and importing movie files from a scan location (scanner.rs)
pub mod mover;
pub mod scanner;
