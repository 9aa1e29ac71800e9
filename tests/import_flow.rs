//! End-to-end import: scan a folder, move files into the storage root,
//! and commit their catalog records.

mod common;

use std::fs;

use movie_library::Repository;

#[tokio::test(flavor = "multi_thread")]
async fn import_scan_moves_files_and_creates_records() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let incoming = dir.path().join("incoming");
    fs::create_dir_all(incoming.join("phone")).unwrap();
    fs::write(incoming.join("a.mov"), "first a").unwrap();
    fs::write(incoming.join("phone/a.mov"), "second a").unwrap();
    fs::write(incoming.join("b.mov"), "b bytes").unwrap();
    fs::write(incoming.join("notes.txt"), "not a movie").unwrap();

    let repo = Repository::open(&dir.path().join("store")).unwrap();
    let outcome = repo.import_blocking(&incoming).unwrap();
    assert_eq!(outcome.imported, 3);
    assert_eq!(outcome.skipped, 0);

    let assets = repo.assets().unwrap();
    assert_eq!(assets.len(), 3);

    // Identical base names got distinct stored names, " 2" suffixed.
    let mut stored: Vec<_> = assets.iter().map(|a| a.stored_file_name.clone()).collect();
    stored.sort();
    assert_eq!(stored, vec!["a 2.mov", "a.mov", "b.mov"]);

    // Every record points at a real file whose content survived the move,
    // and every source is gone.
    let contents: Vec<String> = assets
        .iter()
        .map(|a| fs::read_to_string(repo.asset_file(a).unwrap()).unwrap())
        .collect();
    for expected in ["first a", "second a", "b bytes"] {
        assert!(contents.iter().any(|c| c == expected), "missing {expected}");
    }
    assert!(!incoming.join("a.mov").exists());
    assert!(!incoming.join("phone/a.mov").exists());
    assert!(!incoming.join("b.mov").exists());

    // The non-movie stayed put and was never recorded.
    assert!(incoming.join("notes.txt").exists());

    // Display names are the source stems; both "a" variants share one.
    let mut names: Vec<_> = assets.iter().map(|a| a.display_name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["a", "a", "b"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn rescan_after_import_finds_nothing_new() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let incoming = dir.path().join("incoming");
    fs::create_dir_all(&incoming).unwrap();
    fs::write(incoming.join("a.mov"), "a").unwrap();

    let repo = Repository::open(&dir.path().join("store")).unwrap();
    repo.import_blocking(&incoming).unwrap();

    let outcome = repo.import_blocking(&incoming).unwrap();
    assert_eq!(outcome.imported, 0);
    assert_eq!(outcome.skipped, 0);
    assert_eq!(repo.asset_count().unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn records_survive_reopen() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let incoming = dir.path().join("incoming");
    let store = dir.path().join("store");
    fs::create_dir_all(&incoming).unwrap();
    fs::write(incoming.join("keeper.mov"), "kept").unwrap();

    {
        let repo = Repository::open(&store).unwrap();
        repo.import_blocking(&incoming).unwrap();
    }

    let repo = Repository::open(&store).unwrap();
    let assets = repo.assets().unwrap();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].display_name, "keeper");
    assert!(repo.asset_file(&assets[0]).is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn rename_changes_only_the_display_name() {
    common::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let incoming = dir.path().join("incoming");
    fs::create_dir_all(&incoming).unwrap();
    fs::write(incoming.join("raw take.mov"), "x").unwrap();

    let repo = Repository::open(&dir.path().join("store")).unwrap();
    repo.import_blocking(&incoming).unwrap();

    let before = repo.assets().unwrap().remove(0);
    assert!(repo.rename(before.id, "Final Cut").unwrap());

    let after = repo.assets().unwrap().remove(0);
    assert_eq!(after.display_name, "Final Cut");
    assert_eq!(after.stored_file_name, before.stored_file_name);
    assert_eq!(after.id, before.id);
}
