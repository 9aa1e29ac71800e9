//! Helpers shared by the integration tests.
#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use movie_library::{AssetRecord, Delivery, Repository};

/// Install the test tracing subscriber; safe to call from every test.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Bytes of a movie-shaped file with a JPEG cover embedded in its
/// metadata region, the way real containers carry artwork.
pub fn movie_with_artwork() -> Vec<u8> {
    let cover = RgbImage::from_fn(48, 48, |x, y| {
        image::Rgb([(x * 5) as u8, (y * 5) as u8, 128])
    });
    let mut jpeg = Vec::new();
    DynamicImage::ImageRgb8(cover)
        .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
        .unwrap();

    let mut bytes = vec![0u8; 2048];
    bytes.extend_from_slice(&jpeg);
    bytes.extend_from_slice(&[0u8; 8192]);
    bytes
}

/// Bytes of a movie-shaped file with no embedded artwork at all.
pub fn movie_without_artwork() -> Vec<u8> {
    vec![0u8; 4096]
}

/// Issue a grid-thumbnail retrieve and wait for its callback.
///
/// Returns the image, the delivery flag the callback saw, and the flag
/// `retrieve` returned.
pub fn retrieve_blocking(
    repo: &Repository,
    asset: &AssetRecord,
) -> (Option<Arc<RgbaImage>>, Delivery, Delivery) {
    let (tx, rx) = mpsc::channel();
    let returned = repo.retrieve_thumbnail(asset, move |image, delivery| {
        tx.send((image, delivery)).unwrap();
    });
    let (image, delivered) = rx.recv_timeout(Duration::from_secs(10)).unwrap();
    (image, delivered, returned)
}
