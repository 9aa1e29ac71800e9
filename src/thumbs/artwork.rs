//! Thumbnail source extraction from embedded movie artwork.
//!
//! Movie containers carry their cover art as embedded JPEG data. Extraction
//! scans a bounded window of the file for JPEG markers before falling back
//! to the whole file, so the common case never reads a multi-gigabyte
//! container end to end.

use std::io::Read;
use std::path::Path;

use image::{DynamicImage, ImageFormat};
use tracing::debug;

/// Produces the thumbnail source image for a media file.
///
/// Implementations take the first decodable artwork and discard the rest;
/// `None` means the file is unreadable, corrupt, or simply has no artwork.
/// All of those are benign per-asset misses, never errors.
pub trait ArtworkSource: Send + Sync {
    fn extract_cover(&self, path: &Path) -> Option<DynamicImage>;
}

/// Default source: tiered scan for embedded JPEG artwork.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedArtwork;

impl ArtworkSource for EmbeddedArtwork {
    fn extract_cover(&self, path: &Path) -> Option<DynamicImage> {
        // Tier 1: fast window near the head, where most containers keep
        // their metadata atoms.
        if let Some(image) = scan_window(path, 256 * 1024, 20_000) {
            return Some(image);
        }

        // Tier 2: extended window.
        if let Some(image) = scan_window(path, 1024 * 1024, 10_000) {
            debug!(path = %path.display(), "artwork found in extended window");
            return Some(image);
        }

        // Tier 3: whole file, largest candidate first.
        let data = read_window(path, usize::MAX)?;
        for candidate in jpeg_candidates(&data, 0) {
            if let Ok(image) = image::load_from_memory_with_format(candidate, ImageFormat::Jpeg) {
                debug!(path = %path.display(), "artwork found via full scan");
                return Some(image);
            }
        }

        None
    }
}

/// Scan the first `max_bytes` of the file for a decodable JPEG of at least
/// `min_size` bytes.
fn scan_window(path: &Path, max_bytes: usize, min_size: usize) -> Option<DynamicImage> {
    let data = read_window(path, max_bytes)?;
    for candidate in jpeg_candidates(&data, min_size) {
        if let Ok(image) = image::load_from_memory_with_format(candidate, ImageFormat::Jpeg) {
            return Some(image);
        }
    }
    None
}

/// Read up to `max_bytes` from the start of the file.
fn read_window(path: &Path, max_bytes: usize) -> Option<Vec<u8>> {
    let file = std::fs::File::open(path).ok()?;
    let mut data = Vec::new();
    file.take(max_bytes as u64).read_to_end(&mut data).ok()?;
    Some(data)
}

/// All JPEG byte ranges in `data` (SOI through EOI) of at least `min_size`
/// bytes, largest first. Bounded to the first handful of start markers so a
/// pathological file cannot turn the scan quadratic.
fn jpeg_candidates(data: &[u8], min_size: usize) -> Vec<&[u8]> {
    const SOI: [u8; 2] = [0xFF, 0xD8];
    const EOI: [u8; 2] = [0xFF, 0xD9];
    const MAX_STARTS: usize = 6;

    let mut starts = Vec::new();
    for (i, window) in data.windows(2).enumerate() {
        if window == SOI {
            starts.push(i);
            if starts.len() >= MAX_STARTS {
                break;
            }
        }
    }

    let mut candidates: Vec<&[u8]> = Vec::new();
    for &start in &starts {
        if let Some(end_offset) = data[start..].windows(2).position(|w| w == EOI) {
            let end = start + end_offset + 2;
            if end - start >= min_size {
                candidates.push(&data[start..end]);
            }
        }
    }

    candidates.sort_by_key(|c| std::cmp::Reverse(c.len()));
    candidates
}
