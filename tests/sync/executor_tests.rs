// Copy cycle tests: retry accounting, idempotence, gating and cancellation.

use data_sync::config::{EntryKind, RetryPolicy, SyncConfig, SyncDirection, SyncType};
use data_sync::error::SyncError;
use data_sync::ext_data::{ExternalData, Role};
use data_sync::fs::LocalTransport;
use data_sync::runtime::StopSignal;
use data_sync::sync::{CycleOutcome, PathFilter, SyncExecutor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::support::{read_data, write_data, FlakyTransport};

fn file_entry(path: &Path, destination: &Path, direction: SyncDirection, retry: RetryPolicy) -> SyncConfig {
    SyncConfig {
        path: path.to_path_buf(),
        destination_path: Some(destination.to_path_buf()),
        description: None,
        direction,
        sync_type: SyncType::Periodic {
            periodicity: Duration::from_secs(1),
        },
        retry,
        kind: EntryKind::File,
        filter: PathFilter::allow_all(),
    }
}

fn retry(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        attempts,
        interval: Duration::from_millis(50),
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    source: PathBuf,
    destination: PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.txt");
    let destination = dir.path().join("destination.txt");
    write_data(&source, "new");
    write_data(&destination, "old");
    Fixture {
        _dir: dir,
        source,
        destination,
    }
}

#[tokio::test]
async fn test_recovers_within_retry_budget() {
    let fx = fixture();
    let transport = Arc::new(FlakyTransport::failing(2));
    let executor = SyncExecutor::new(transport.clone(), ExternalData::new(), StopSignal::new());
    let entry = file_entry(&fx.source, &fx.destination, SyncDirection::Bidirectional, retry(2));

    let outcome = executor.execute_copy(&entry, Role::Unknown).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Copied { files: 1, bytes: 3 });
    assert_eq!(transport.calls(), 3);
    assert_eq!(read_data(&fx.destination), "new");
}

#[tokio::test]
async fn test_exhausted_retries_leave_destination_untouched() {
    let fx = fixture();
    let transport = Arc::new(FlakyTransport::failing(3));
    let executor = SyncExecutor::new(transport.clone(), ExternalData::new(), StopSignal::new());
    let entry = file_entry(&fx.source, &fx.destination, SyncDirection::Bidirectional, retry(2));

    let err = executor.execute_copy(&entry, Role::Active).await.unwrap_err();
    assert!(matches!(err, SyncError::PeerUnreachable { .. }));
    assert_eq!(transport.calls(), 3);
    assert_eq!(read_data(&fx.destination), "old");
}

#[tokio::test]
async fn test_no_retry_means_single_attempt() {
    let fx = fixture();
    let transport = Arc::new(FlakyTransport::failing(1));
    let executor = SyncExecutor::new(transport.clone(), ExternalData::new(), StopSignal::new());
    let entry = file_entry(&fx.source, &fx.destination, SyncDirection::Bidirectional, RetryPolicy::none());

    assert!(executor.execute_copy(&entry, Role::Active).await.is_err());
    assert_eq!(transport.calls(), 1);

    // The next cycle starts with a fresh budget.
    let outcome = executor.execute_copy(&entry, Role::Active).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Copied { .. }));
}

#[tokio::test]
async fn test_gated_off_never_touches_transport() {
    let fx = fixture();
    let transport = Arc::new(FlakyTransport::failing(0));
    let executor = SyncExecutor::new(transport.clone(), ExternalData::new(), StopSignal::new());

    for (direction, role) in [
        (SyncDirection::Active2Passive, Role::Passive),
        (SyncDirection::Active2Passive, Role::Unknown),
        (SyncDirection::Passive2Active, Role::Passive),
        (SyncDirection::Passive2Active, Role::Unknown),
    ] {
        let entry = file_entry(&fx.source, &fx.destination, direction, RetryPolicy::none());
        let outcome = executor.execute_copy(&entry, role).await.unwrap();
        assert_eq!(outcome, CycleOutcome::Skipped);
    }
    assert_eq!(transport.calls(), 0);
    assert_eq!(read_data(&fx.destination), "old");
}

#[tokio::test]
async fn test_second_cycle_is_unchanged() {
    let fx = fixture();
    let executor = SyncExecutor::new(Arc::new(LocalTransport::new()), ExternalData::new(), StopSignal::new());
    let entry = file_entry(&fx.source, &fx.destination, SyncDirection::Active2Passive, RetryPolicy::none());

    let first = executor.execute_copy(&entry, Role::Active).await.unwrap();
    assert_eq!(first, CycleOutcome::Copied { files: 1, bytes: 3 });
    let modified = std::fs::metadata(&fx.destination).unwrap().modified().unwrap();

    let second = executor.execute_copy(&entry, Role::Active).await.unwrap();
    assert_eq!(second, CycleOutcome::Unchanged);
    assert_eq!(std::fs::metadata(&fx.destination).unwrap().modified().unwrap(), modified);
    assert_eq!(read_data(&fx.destination), "new");
}

#[tokio::test]
async fn test_pull_reads_destination_side() {
    let fx = fixture();
    let executor = SyncExecutor::new(Arc::new(LocalTransport::new()), ExternalData::new(), StopSignal::new());
    let entry = file_entry(&fx.source, &fx.destination, SyncDirection::Passive2Active, RetryPolicy::none());

    executor.execute_copy(&entry, Role::Active).await.unwrap();
    assert_eq!(read_data(&fx.source), "old");
    assert_eq!(read_data(&fx.destination), "old");
}

#[tokio::test]
async fn test_missing_source_fails_cycle() {
    let fx = fixture();
    let executor = SyncExecutor::new(Arc::new(LocalTransport::new()), ExternalData::new(), StopSignal::new());
    let entry = file_entry(
        &fx.source.with_file_name("absent.txt"),
        &fx.destination,
        SyncDirection::Bidirectional,
        retry(1),
    );

    let err = executor.execute_copy(&entry, Role::Active).await.unwrap_err();
    assert!(matches!(err, SyncError::Io { .. }));
    assert_eq!(read_data(&fx.destination), "old");
}

#[tokio::test]
async fn test_stop_interrupts_retry_wait() {
    let fx = fixture();
    let stop = StopSignal::new();
    let transport = Arc::new(FlakyTransport::failing(10));
    let executor = SyncExecutor::new(transport.clone(), ExternalData::new(), stop.clone());
    let entry = file_entry(
        &fx.source,
        &fx.destination,
        SyncDirection::Bidirectional,
        RetryPolicy {
            attempts: 5,
            interval: Duration::from_secs(60),
        },
    );

    let stopper = stop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stopper.request_stop();
    });

    let started = Instant::now();
    let err = executor.execute_copy(&entry, Role::Active).await.unwrap_err();
    assert!(matches!(err, SyncError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(transport.calls(), 1);
    assert_eq!(read_data(&fx.destination), "old");
}

#[tokio::test]
async fn test_directory_copy_applies_filter() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("tree");
    let destination = dir.path().join("mirror");
    std::fs::create_dir_all(source.join("logs")).unwrap();
    write_data(&source.join("a.conf"), "a");
    write_data(&source.join("logs/today.log"), "log");

    let entry = SyncConfig {
        path: source.clone(),
        destination_path: Some(destination.clone()),
        description: None,
        direction: SyncDirection::Bidirectional,
        sync_type: SyncType::Immediate,
        retry: RetryPolicy::none(),
        kind: EntryKind::Directory,
        filter: PathFilter::new(&[], &["logs".to_string()]).unwrap(),
    };
    let executor = SyncExecutor::new(Arc::new(LocalTransport::new()), ExternalData::new(), StopSignal::new());

    let outcome = executor.execute_copy(&entry, Role::Passive).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Copied { files: 1, bytes: 1 });
    assert_eq!(read_data(&destination.join("a.conf")), "a");
    assert!(!destination.join("logs").exists());

    let again = executor.execute_copy(&entry, Role::Passive).await.unwrap();
    assert_eq!(again, CycleOutcome::Unchanged);
}

fn directory_entry(source: &Path, destination: &Path) -> SyncConfig {
    SyncConfig {
        path: source.to_path_buf(),
        destination_path: Some(destination.to_path_buf()),
        description: None,
        direction: SyncDirection::Bidirectional,
        sync_type: SyncType::Immediate,
        retry: RetryPolicy::none(),
        kind: EntryKind::Directory,
        filter: PathFilter::allow_all(),
    }
}

fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_failed_directory_attempt_leaves_tree_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("tree");
    let destination = dir.path().join("mirror");
    std::fs::create_dir_all(&source).unwrap();
    std::fs::create_dir_all(&destination).unwrap();
    write_data(&source.join("a"), "new-a");
    write_data(&source.join("b"), "new-b");
    write_data(&destination.join("a"), "old-a");
    write_data(&destination.join("b"), "old-b");

    let transport = Arc::new(FlakyTransport::failing_call(2));
    let executor = SyncExecutor::new(transport.clone(), ExternalData::new(), StopSignal::new());
    let entry = directory_entry(&source, &destination);

    assert!(executor.execute_copy(&entry, Role::Active).await.is_err());
    assert_eq!(read_data(&destination.join("a")), "old-a");
    assert_eq!(read_data(&destination.join("b")), "old-b");
    assert_eq!(dir_names(&destination), ["a", "b"]);

    // The next cycle copies the whole tree.
    let outcome = executor.execute_copy(&entry, Role::Active).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Copied { files: 2, bytes: 10 });
    assert_eq!(read_data(&destination.join("a")), "new-a");
    assert_eq!(read_data(&destination.join("b")), "new-b");
}

#[cfg(unix)]
#[tokio::test]
async fn test_directory_with_symlinked_subdirectory() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("tree");
    let destination = dir.path().join("mirror");
    std::fs::create_dir_all(source.join("real")).unwrap();
    write_data(&source.join("a.conf"), "a");
    write_data(&source.join("real/b"), "b");
    std::os::unix::fs::symlink(source.join("real"), source.join("link")).unwrap();
    write_data(&source.join("z.conf"), "z");

    let executor = SyncExecutor::new(Arc::new(LocalTransport::new()), ExternalData::new(), StopSignal::new());
    let outcome = executor
        .execute_copy(&directory_entry(&source, &destination), Role::Active)
        .await
        .unwrap();

    assert_eq!(outcome, CycleOutcome::Copied { files: 3, bytes: 3 });
    assert_eq!(read_data(&destination.join("real/b")), "b");
    assert_eq!(read_data(&destination.join("z.conf")), "z");
    assert!(std::fs::symlink_metadata(destination.join("link")).is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_directory_with_fifo_neither_blocks_nor_fails() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("tree");
    let destination = dir.path().join("mirror");
    std::fs::create_dir_all(&source).unwrap();
    write_data(&source.join("a.conf"), "a");
    let status = std::process::Command::new("mkfifo").arg(source.join("pipe")).status().unwrap();
    assert!(status.success());

    let executor = SyncExecutor::new(Arc::new(LocalTransport::new()), ExternalData::new(), StopSignal::new());
    let entry = directory_entry(&source, &destination);
    let outcome = tokio::time::timeout(Duration::from_secs(5), executor.execute_copy(&entry, Role::Active))
        .await
        .expect("copy blocked on a fifo")
        .unwrap();

    assert_eq!(outcome, CycleOutcome::Copied { files: 1, bytes: 1 });
    assert_eq!(dir_names(&destination), ["a.conf"]);
}

#[cfg(unix)]
#[tokio::test]
async fn test_fifo_file_entry_fails_without_blocking() {
    let fx = fixture();
    let fifo = fx.source.with_file_name("pipe");
    let status = std::process::Command::new("mkfifo").arg(&fifo).status().unwrap();
    assert!(status.success());

    let executor = SyncExecutor::new(Arc::new(LocalTransport::new()), ExternalData::new(), StopSignal::new());
    let entry = file_entry(&fifo, &fx.destination, SyncDirection::Bidirectional, RetryPolicy::none());
    let result = tokio::time::timeout(Duration::from_secs(5), executor.execute_copy(&entry, Role::Active))
        .await
        .expect("copy blocked on a fifo");

    assert!(matches!(result, Err(SyncError::Io { .. })));
    assert_eq!(read_data(&fx.destination), "old");
}
