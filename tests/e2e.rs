//! End-to-end tests for the archiving pipeline.
//!
//! These drive the whole flow: a file tree on disk, a session with a size
//! limit, the batch feeder, and the background writer, then check the
//! finalized archive against the prediction.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tarcap::config::ArchiveConfig;
use tarcap::estimate::{predict_archive_size, predict_entry_size};
use tarcap::feed::{FeedPolicy, RejectReason, Rejection};
use tarcap::humanize::ByteSize;
use tarcap::session::TarSession;
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, len: usize) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, vec![b'x'; len]).unwrap();
    path
}

fn archive_entry_names(archive_path: &Path) -> Vec<PathBuf> {
    let mut archive = tar::Archive::new(fs::File::open(archive_path).unwrap());
    archive
        .entries()
        .unwrap()
        .map(|entry| {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().into_owned();
            let mut sink = Vec::new();
            entry.read_to_end(&mut sink).unwrap();
            name
        })
        .collect()
}

/// Member names lose their leading `/`; map back for comparisons.
fn member_name(path: &Path) -> PathBuf {
    path.strip_prefix("/").unwrap_or(path).to_path_buf()
}

#[test]
fn archive_stays_under_limit_and_matches_prediction() {
    let dir = TempDir::new().unwrap();
    let small_a = write_file(dir.path(), "small_a.bin", 1000);
    let big = write_file(dir.path(), "big.bin", 60_000);
    let small_b = write_file(dir.path(), "small_b.bin", 2000);

    let out = dir.path().join("out.tar");
    let cfg = ArchiveConfig {
        size_limit: Some(ByteSize(20 * 1024)),
        block_len: ByteSize(10240),
    };
    let session = TarSession::spawn(fs::File::create(&out).unwrap(), &cfg);

    let rejected: Vec<Rejection> = session
        .add_paths(
            vec![small_a.clone(), big.clone(), small_b.clone()],
            FeedPolicy::default(),
        )
        .collect();

    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].path, big);
    assert_eq!(rejected[0].reason, RejectReason::SizeLimit);

    let predicted = session.size();
    let written = session.close().unwrap();
    assert_eq!(written, predicted);

    let on_disk = fs::metadata(&out).unwrap().len();
    assert_eq!(on_disk, predicted);
    assert!(on_disk <= 20 * 1024);

    let names = archive_entry_names(&out);
    assert_eq!(names, vec![member_name(&small_a), member_name(&small_b)]);
}

#[test]
fn long_names_and_non_regular_entries_are_predicted_exactly() {
    let dir = TempDir::new().unwrap();
    let long_name = "n".repeat(120);
    let long = write_file(dir.path(), &long_name, 777);
    let plain = write_file(dir.path(), "plain.bin", 4096);
    let subdir = dir.path().join("subdir");
    fs::create_dir(&subdir).unwrap();

    let mut inputs = vec![long.clone(), plain.clone(), subdir.clone()];
    #[cfg(unix)]
    {
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&plain, &link).unwrap();
        inputs.push(link);
    }

    let out = dir.path().join("out.tar");
    let cfg = ArchiveConfig {
        size_limit: None,
        block_len: ByteSize(10240),
    };
    let session = TarSession::spawn(fs::File::create(&out).unwrap(), &cfg);

    let mut expected_data = 0;
    for path in &inputs {
        expected_data += predict_entry_size(path).unwrap();
        session.add_path(path).unwrap();
    }
    assert!(predict_entry_size(&long).unwrap() >= 512 + 512 + 512 + 1024);

    assert_eq!(session.data_size(), expected_data);
    let predicted = session.size();
    assert_eq!(predicted, predict_archive_size(expected_data, 10240));

    let written = session.close().unwrap();
    assert_eq!(written, predicted);
    assert_eq!(fs::metadata(&out).unwrap().len(), predicted);

    let names = archive_entry_names(&out);
    assert_eq!(names.len(), inputs.len());
    assert_eq!(names[0], member_name(&long));
}

#[test]
fn halting_feed_returns_exact_remaining_worklist() {
    let dir = TempDir::new().unwrap();
    let fits = write_file(dir.path(), "fits.bin", 100);
    let too_big = write_file(dir.path(), "too_big.bin", 50_000);
    let also_fits = write_file(dir.path(), "also_fits.bin", 100);

    let out = dir.path().join("out.tar");
    let cfg = ArchiveConfig {
        size_limit: Some(ByteSize(10240)),
        block_len: ByteSize(10240),
    };
    let session = TarSession::spawn(fs::File::create(&out).unwrap(), &cfg);

    let policy = FeedPolicy {
        halt_on_size_limit: true,
        ..FeedPolicy::default()
    };
    let rejected: Vec<PathBuf> = session
        .add_paths(
            vec![fits.clone(), too_big.clone(), also_fits.clone()],
            policy,
        )
        .map(|r| r.path)
        .collect();

    // The trigger plus everything after it, in input order.
    assert_eq!(rejected, vec![too_big, also_fits]);

    session.close().unwrap();
    assert_eq!(archive_entry_names(&out), vec![member_name(&fits)]);
}
