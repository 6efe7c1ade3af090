// Tests for the synchronizer cycle and outer loop

use std::fs::{self, File};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dirmirror::{ComparatorKind, SyncState};

use crate::common::{tree, write, Fixture};

#[tokio::test]
async fn test_copies_new_file() {
    let fx = Fixture::new();
    write(&fx.source, "a.txt", b"hello");
    let (engine, _logger) = fx.engine(ComparatorKind::Binary, false);

    let stats = engine.run_cycle().await;

    assert_eq!(fs::read(fx.replica.join("a.txt")).unwrap(), b"hello");
    assert_eq!(stats.files_copied, 1);
    assert_eq!(stats.errors, 0);
}

#[tokio::test]
async fn test_removes_stale_file() {
    let fx = Fixture::new();
    write(&fx.replica, "stale.txt", b"old");
    let (engine, _logger) = fx.engine(ComparatorKind::Binary, false);

    let stats = engine.run_cycle().await;

    assert!(!fx.replica.join("stale.txt").exists());
    assert_eq!(stats.files_deleted, 1);
}

#[tokio::test]
async fn test_one_cycle_mirrors_whole_tree_and_second_is_noop() {
    let fx = Fixture::new();
    write(&fx.source, "top.txt", b"top");
    write(&fx.source, "docs/readme.md", b"# readme");
    write(&fx.source, "docs/deep/er/data.bin", &[0u8, 1, 2, 3, 255]);
    write(&fx.source, "empty.txt", b"");
    fs::create_dir_all(fx.source.join("empty_dir/inner")).unwrap();

    write(&fx.replica, "docs/readme.md", b"outdated readme");
    write(&fx.replica, "extra/junk.txt", b"junk");

    let (engine, _logger) = fx.engine(ComparatorKind::Sha256, false);

    let first = engine.run_cycle().await;
    assert_eq!(first.errors, 0);
    assert_eq!(tree(&fx.source), tree(&fx.replica));

    let second = engine.run_cycle().await;
    assert!(second.is_noop(), "second cycle did work: {:?}", second);
    assert_eq!(tree(&fx.source), tree(&fx.replica));
}

#[tokio::test]
async fn test_idempotent_with_every_comparator() {
    for comparator in [
        ComparatorKind::None,
        ComparatorKind::Binary,
        ComparatorKind::Md5,
        ComparatorKind::Sha256,
    ] {
        let fx = Fixture::new();
        write(&fx.source, "a/b.txt", b"content");
        write(&fx.source, "c.txt", b"more content");
        let (engine, _logger) = fx.engine(comparator, false);

        engine.run_cycle().await;
        let second = engine.run_cycle().await;
        assert!(second.is_noop(), "{} comparator repeated work: {:?}", comparator, second);
    }
}

#[tokio::test]
async fn test_nested_replica_only_directories_are_removed() {
    let fx = Fixture::new();
    write(&fx.source, "keep/file.txt", b"keep");
    fs::create_dir_all(fx.replica.join("gone/a/b/c")).unwrap();
    write(&fx.replica, "gone/a/b/c/f.txt", b"x");
    fs::create_dir_all(fx.replica.join("keep/orphan/sub")).unwrap();

    let (engine, _logger) = fx.engine(ComparatorKind::Binary, false);
    let stats = engine.run_cycle().await;

    assert_eq!(stats.errors, 0);
    assert!(!fx.replica.join("gone").exists());
    assert!(!fx.replica.join("keep/orphan").exists());
    assert_eq!(fs::read(fx.replica.join("keep/file.txt")).unwrap(), b"keep");
}

#[tokio::test]
async fn test_changed_size_is_recopied() {
    let fx = Fixture::new();
    write(&fx.source, "a.txt", b"v1");
    let (engine, _logger) = fx.engine(ComparatorKind::None, false);
    engine.run_cycle().await;

    write(&fx.source, "a.txt", b"version two");
    let stats = engine.run_cycle().await;

    assert_eq!(stats.files_copied, 1);
    assert_eq!(fs::read(fx.replica.join("a.txt")).unwrap(), b"version two");
}

#[tokio::test]
async fn test_same_size_different_content_depends_on_comparator() {
    let older = SystemTime::now() - Duration::from_secs(600);

    for (comparator, expect_copy) in [
        (ComparatorKind::Binary, true),
        (ComparatorKind::Md5, true),
        (ComparatorKind::Sha256, true),
        (ComparatorKind::None, false),
    ] {
        let fx = Fixture::new();
        write(&fx.source, "a.txt", b"aaaa");
        write(&fx.replica, "a.txt", b"bbbb");
        // Source older than replica, so only content can trigger a copy
        File::options()
            .write(true)
            .open(fx.source.join("a.txt"))
            .unwrap()
            .set_modified(older)
            .unwrap();

        let (engine, _logger) = fx.engine(comparator, false);
        let stats = engine.run_cycle().await;

        let expected: &[u8] = if expect_copy { b"aaaa" } else { b"bbbb" };
        assert_eq!(fs::read(fx.replica.join("a.txt")).unwrap(), expected, "{}", comparator);
        assert_eq!(stats.files_copied, expect_copy as u64, "{}", comparator);
    }
}

#[tokio::test]
async fn test_newer_source_is_copied_even_with_none_comparator() {
    let fx = Fixture::new();
    write(&fx.replica, "a.txt", b"bbbb");
    write(&fx.source, "a.txt", b"aaaa");
    File::options()
        .write(true)
        .open(fx.replica.join("a.txt"))
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(600))
        .unwrap();

    let (engine, _logger) = fx.engine(ComparatorKind::None, false);
    engine.run_cycle().await;

    assert_eq!(fs::read(fx.replica.join("a.txt")).unwrap(), b"aaaa");
}

#[tokio::test]
async fn test_replica_root_is_created() {
    let fx = Fixture::new();
    write(&fx.source, "x/y.txt", b"y");
    assert!(!fx.replica.exists());

    let (engine, _logger) = fx.engine(ComparatorKind::Binary, false);
    engine.run_cycle().await;

    assert!(fx.replica.is_dir());
    assert_eq!(tree(&fx.source), tree(&fx.replica));
}

#[tokio::test]
async fn test_type_conflicts_are_resolved() {
    let fx = Fixture::new();
    write(&fx.source, "was_dir", b"now a file");
    fs::create_dir_all(fx.source.join("was_file")).unwrap();
    write(&fx.replica, "was_dir/inner.txt", b"x");
    write(&fx.replica, "was_file", b"old file");

    let (engine, _logger) = fx.engine(ComparatorKind::Binary, false);
    let stats = engine.run_cycle().await;

    assert_eq!(stats.errors, 0);
    assert_eq!(tree(&fx.source), tree(&fx.replica));
}

#[tokio::test]
async fn test_missing_source_fragile_stops_engine() {
    let fx = Fixture::new();
    fs::remove_dir_all(&fx.source).unwrap();
    let (engine, logger) = fx.engine(ComparatorKind::Binary, true);

    let result = tokio::time::timeout(Duration::from_secs(5), engine.start())
        .await
        .expect("fragile engine should stop on its own");

    assert!(result.is_ok());
    assert_eq!(engine.state(), SyncState::Stopped);
    assert!(engine.cancellation().is_cancelled());

    logger.shutdown();
    let log = fx.log_text();
    assert!(log.contains("ERROR: Source directory does not exist"));
    assert!(log.contains("Fragile mode is enabled"));
}

#[tokio::test]
async fn test_missing_source_non_fragile_keeps_polling() {
    let fx = Fixture::new();
    fs::remove_dir_all(&fx.source).unwrap();
    let (engine, logger) = fx.engine(ComparatorKind::Binary, false);
    let engine = Arc::new(engine);

    let runner = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.start().await })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_ne!(engine.state(), SyncState::Stopped);
    assert!(!engine.cancellation().is_cancelled());

    engine.stop();
    let result = tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("engine should stop after stop()")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(engine.state(), SyncState::Stopped);

    logger.shutdown();
    let misses = fx
        .log_text()
        .lines()
        .filter(|line| line.contains("ERROR: Source directory does not exist"))
        .count();
    assert!(misses >= 2, "expected repeated polling, saw {} misses", misses);
}

#[tokio::test]
async fn test_source_reappearing_is_picked_up() {
    let fx = Fixture::new();
    fs::remove_dir_all(&fx.source).unwrap();
    let (engine, _logger) = fx.engine(ComparatorKind::Binary, false);

    let skipped = engine.run_cycle().await;
    assert!(skipped.skipped);

    write(&fx.source, "back.txt", b"back");
    let stats = engine.run_cycle().await;
    assert!(!stats.skipped);
    assert_eq!(fs::read(fx.replica.join("back.txt")).unwrap(), b"back");
}

#[tokio::test]
async fn test_stop_during_wait_ends_loop_quietly() {
    let fx = Fixture::new();
    write(&fx.source, "a.txt", b"a");
    let (engine, logger) = fx.engine(ComparatorKind::Binary, false);
    let engine = Arc::new(engine);
    let mut states = engine.subscribe();

    let runner = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.start().await })
    };

    tokio::time::timeout(
        Duration::from_secs(5),
        states.wait_for(|state| *state == SyncState::Waiting),
    )
    .await
    .expect("engine never reached Waiting")
    .unwrap();

    engine.stop();
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    logger.shutdown();
    assert!(!fx.log_text().contains("ERROR:"));
    assert_eq!(fs::read(fx.replica.join("a.txt")).unwrap(), b"a");
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let fx = Fixture::new();
    let (engine, _logger) = fx.engine(ComparatorKind::Binary, false);
    engine.stop();

    engine.start().await.unwrap();
    assert_eq!(engine.state(), SyncState::Stopped);
    assert!(engine.start().await.is_err());
}

#[tokio::test]
async fn test_cycle_logs_copies_and_summary() {
    let fx = Fixture::new();
    write(&fx.source, "a.txt", b"hello");
    let (engine, logger) = fx.engine(ComparatorKind::Binary, false);

    engine.run_cycle().await;
    // Already cancelled: start runs no cycle but still logs banner and stop line
    engine.stop();
    engine.start().await.unwrap();
    logger.shutdown();

    let log = fx.log_text();
    assert!(log.contains("Mirroring "));
    assert!(log.contains("Copied "));
    assert!(log.contains("Synchronization stopped"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_replica_symlink_is_replaced_not_written_through() {
    let fx = Fixture::new();
    let outside = fx.dir.path().join("outside.txt");
    fs::write(&outside, b"outside").unwrap();
    fs::create_dir_all(&fx.replica).unwrap();
    std::os::unix::fs::symlink(&outside, fx.replica.join("a.txt")).unwrap();
    write(&fx.source, "a.txt", b"hello");

    let (engine, _logger) = fx.engine(ComparatorKind::Binary, false);
    let first = engine.run_cycle().await;

    assert_eq!(first.errors, 0);
    assert_eq!(fs::read(&outside).unwrap(), b"outside");
    let meta = fs::symlink_metadata(fx.replica.join("a.txt")).unwrap();
    assert!(meta.file_type().is_file());
    assert_eq!(fs::read(fx.replica.join("a.txt")).unwrap(), b"hello");

    let second = engine.run_cycle().await;
    assert!(second.is_noop(), "second cycle did work: {:?}", second);
}

#[cfg(unix)]
#[tokio::test]
async fn test_replica_only_symlinks_are_pruned_without_touching_targets() {
    let fx = Fixture::new();
    write(&fx.source, "keep.txt", b"keep");
    let outside_file = fx.dir.path().join("outside.txt");
    let outside_dir = fx.dir.path().join("outside_dir");
    fs::write(&outside_file, b"outside").unwrap();
    write(&outside_dir, "inner.txt", b"inner");
    fs::create_dir_all(fx.replica.join("nested")).unwrap();
    std::os::unix::fs::symlink(&outside_file, fx.replica.join("junk_link")).unwrap();
    std::os::unix::fs::symlink(&outside_dir, fx.replica.join("nested/dir_link")).unwrap();

    let (engine, _logger) = fx.engine(ComparatorKind::Binary, false);
    let stats = engine.run_cycle().await;

    assert_eq!(stats.errors, 0);
    assert!(fs::symlink_metadata(fx.replica.join("junk_link")).is_err());
    assert!(fs::symlink_metadata(fx.replica.join("nested/dir_link")).is_err());
    assert!(!fx.replica.join("nested").exists());
    assert_eq!(fs::read(&outside_file).unwrap(), b"outside");
    assert_eq!(fs::read(outside_dir.join("inner.txt")).unwrap(), b"inner");
    assert_eq!(tree(&fx.source), tree(&fx.replica));
}

#[cfg(unix)]
#[tokio::test]
async fn test_read_only_file_is_updated_on_later_cycles() {
    use std::os::unix::fs::PermissionsExt;

    let fx = Fixture::new();
    let source_file = fx.source.join("ro.txt");
    fs::write(&source_file, b"v1").unwrap();
    fs::set_permissions(&source_file, fs::Permissions::from_mode(0o444)).unwrap();

    let (engine, _logger) = fx.engine(ComparatorKind::Binary, false);
    assert_eq!(engine.run_cycle().await.errors, 0);

    fs::set_permissions(&source_file, fs::Permissions::from_mode(0o644)).unwrap();
    fs::write(&source_file, b"version two").unwrap();
    fs::set_permissions(&source_file, fs::Permissions::from_mode(0o444)).unwrap();

    let stats = engine.run_cycle().await;

    assert_eq!(stats.errors, 0);
    assert_eq!(stats.files_copied, 1);
    assert_eq!(fs::read(fx.replica.join("ro.txt")).unwrap(), b"version two");
    assert!(engine.run_cycle().await.is_noop());
}

#[cfg(unix)]
#[tokio::test]
async fn test_fragile_unit_error_cancels_after_siblings_finish() {
    use std::os::unix::fs::PermissionsExt;

    let fx = Fixture::new();
    for name in ["a.txt", "b.txt", "c.txt"] {
        write(&fx.source, name, name.as_bytes());
    }
    let locked = fx.source.join("locked.txt");
    fs::write(&locked, b"secret").unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read(&locked).is_ok() {
        // Permission bits are not enforced for this user
        return;
    }

    let (engine, logger) = fx.engine(ComparatorKind::Binary, true);
    let result = tokio::time::timeout(Duration::from_secs(5), engine.start())
        .await
        .expect("fragile engine should stop on its own");

    assert!(result.is_ok());
    assert!(engine.cancellation().is_cancelled());
    assert_eq!(engine.state(), SyncState::Stopped);
    for name in ["a.txt", "b.txt", "c.txt"] {
        assert_eq!(fs::read(fx.replica.join(name)).unwrap(), name.as_bytes());
    }
    assert!(!fx.replica.join("locked.txt").exists());

    logger.shutdown();
    let log = fx.log_text();
    let failure = log
        .lines()
        .find(|line| line.contains("ERROR: Error during synchronization:"))
        .expect("unit failure was not logged");
    assert!(failure.contains("locked.txt"));
    assert_eq!(failure.matches("Permission denied").count(), 1);
    assert!(log.contains("Fragile mode is enabled"));
}
