//! End-to-end thumbnail retrieval over imported movies, including the
//! grid's slot-revalidation contract for deferred results.

mod common;

use std::fs;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use movie_library::{Delivery, Repository, SlotState, GRID_THUMBNAIL};

#[tokio::test(flavor = "multi_thread")]
async fn retrieve_extracts_embedded_artwork_at_grid_geometry() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let incoming = dir.path().join("incoming");
    fs::create_dir_all(&incoming).unwrap();
    fs::write(incoming.join("clip.mov"), common::movie_with_artwork()).unwrap();

    let repo = Repository::open(&dir.path().join("store")).unwrap();
    repo.import_blocking(&incoming).unwrap();
    let asset = repo.assets().unwrap().remove(0);

    let (image, delivered, returned) = common::retrieve_blocking(&repo, &asset);
    let image = image.unwrap();
    assert_eq!(
        image.dimensions(),
        (GRID_THUMBNAIL.width, GRID_THUMBNAIL.height)
    );
    assert_eq!(delivered, Delivery::Deferred);
    assert_eq!(returned, Delivery::Deferred);

    // Now warm: the image arrives before retrieve returns.
    let (image, delivered, returned) = common::retrieve_blocking(&repo, &asset);
    assert!(image.is_some());
    assert_eq!(delivered, Delivery::Immediate);
    assert_eq!(returned, Delivery::Immediate);
}

#[tokio::test(flavor = "multi_thread")]
async fn artworkless_movie_is_a_benign_miss() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let incoming = dir.path().join("incoming");
    fs::create_dir_all(&incoming).unwrap();
    fs::write(incoming.join("plain.mov"), common::movie_without_artwork()).unwrap();

    let repo = Repository::open(&dir.path().join("store")).unwrap();
    repo.import_blocking(&incoming).unwrap();
    let asset = repo.assets().unwrap().remove(0);

    let (image, delivered, _) = common::retrieve_blocking(&repo, &asset);
    assert!(image.is_none());
    assert_eq!(delivered, Delivery::Deferred);
    assert_eq!(repo.thumbnails().ready_count(), 0);

    // Fix the file in place; the retry extracts instead of serving a
    // remembered miss.
    let stored = repo.storage_root().join(&asset.stored_file_name);
    fs::write(&stored, common::movie_with_artwork()).unwrap();
    let (image, _, _) = common::retrieve_blocking(&repo, &asset);
    assert!(image.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn thumbnails_survive_reopen_without_reextraction() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let incoming = dir.path().join("incoming");
    let store = dir.path().join("store");
    fs::create_dir_all(&incoming).unwrap();
    fs::write(incoming.join("clip.mov"), common::movie_with_artwork()).unwrap();

    {
        let repo = Repository::open(&store).unwrap();
        repo.import_blocking(&incoming).unwrap();
        let asset = repo.assets().unwrap().remove(0);
        common::retrieve_blocking(&repo, &asset);
        assert_eq!(repo.thumbnails().ready_count(), 1);
    }

    let repo = Repository::open(&store).unwrap();
    assert_eq!(repo.thumbnails().ready_count(), 1);

    // Remove the media file: a disk-cached thumbnail still serves, because
    // only deletion or eviction invalidates an entry.
    let asset = repo.assets().unwrap().remove(0);
    fs::remove_file(repo.storage_root().join(&asset.stored_file_name)).unwrap();
    let (image, delivered, _) = common::retrieve_blocking(&repo, &asset);
    assert!(image.is_some());
    assert_eq!(delivered, Delivery::Deferred);
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_slot_token_drops_deferred_result() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let incoming = dir.path().join("incoming");
    fs::create_dir_all(&incoming).unwrap();
    fs::write(incoming.join("first.mov"), common::movie_with_artwork()).unwrap();
    fs::write(incoming.join("second.mov"), common::movie_with_artwork()).unwrap();

    let repo = Repository::open(&dir.path().join("store")).unwrap();
    repo.import_blocking(&incoming).unwrap();
    let assets = repo.assets().unwrap();
    let (first, second) = (assets[0].clone(), assets[1].clone());

    // One reusable grid cell. What lands in it, keyed by generation.
    let slot = Arc::new(SlotState::new());
    let applied = Arc::new(Mutex::new(Vec::new()));
    let (tx, rx) = mpsc::channel();
    // Holds the first result back until the cell has been reassigned, so
    // the test deterministically exercises the stale-delivery ordering.
    let (reassigned_tx, reassigned_rx) = mpsc::channel::<()>();

    let token = slot.assign(first.id);
    {
        let slot = Arc::clone(&slot);
        let applied = Arc::clone(&applied);
        let tx = tx.clone();
        repo.retrieve_thumbnail(&first, move |image, _| {
            reassigned_rx.recv_timeout(Duration::from_secs(10)).unwrap();
            if slot.is_current(&token) {
                applied.lock().unwrap().push(("first", image.is_some()));
            }
            tx.send(()).unwrap();
        });
    }

    // The cell scrolls to a different asset before the result lands.
    let token2 = slot.assign(second.id);
    {
        let slot = Arc::clone(&slot);
        let applied = Arc::clone(&applied);
        repo.retrieve_thumbnail(&second, move |image, _| {
            if slot.is_current(&token2) {
                applied.lock().unwrap().push(("second", image.is_some()));
            }
            tx.send(()).unwrap();
        });
    }
    reassigned_tx.send(()).unwrap();

    rx.recv_timeout(Duration::from_secs(10)).unwrap();
    rx.recv_timeout(Duration::from_secs(10)).unwrap();

    // Only the current assignment painted the cell; the stale result was
    // dropped even though its extraction completed normally.
    assert_eq!(*applied.lock().unwrap(), vec![("second", true)]);
}
