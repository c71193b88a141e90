// Scheduler lifecycle tests over the local transport.

use data_sync::config::{EntryKind, RetryPolicy, SyncConfig, SyncDirection, SyncType};
use data_sync::ext_data::ExternalData;
use data_sync::fs::LocalTransport;
use data_sync::runtime::{StopSignal, TaskSet};
use data_sync::sync::{CycleOutcome, PathFilter, SchedulerState, StatusBoard, SyncExecutor, SyncScheduler};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::support::{read_data, wait_for_content, write_data, FlakyTransport};

fn periodic(path: &Path, destination: &Path, period: Duration) -> Arc<SyncConfig> {
    Arc::new(SyncConfig {
        path: path.to_path_buf(),
        destination_path: Some(destination.to_path_buf()),
        description: None,
        direction: SyncDirection::Bidirectional,
        sync_type: SyncType::Periodic { periodicity: period },
        retry: RetryPolicy::none(),
        kind: EntryKind::File,
        filter: PathFilter::allow_all(),
    })
}

#[tokio::test]
async fn test_waits_full_period_before_first_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.txt");
    let destination = dir.path().join("destination.txt");
    write_data(&source, "data");

    let stop = StopSignal::new();
    let status = StatusBoard::new();
    let ext_data = ExternalData::new();
    let executor = Arc::new(SyncExecutor::new(Arc::new(LocalTransport::new()), ext_data.clone(), stop.clone()));
    let tasks = TaskSet::new();
    tasks.spawn(
        SyncScheduler::new(
            periodic(&source, &destination, Duration::from_secs(1)),
            executor,
            ext_data,
            stop.clone(),
            status.clone(),
        )
        .run(),
    );

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!destination.exists());
    assert_eq!(status.get(&source).unwrap().state, SchedulerState::Waiting);
    assert_eq!(status.get(&source).unwrap().cycles, 0);

    assert!(wait_for_content(&destination, "data", Duration::from_secs(3)).await);

    stop.request_stop();
    tasks.join_all().await;
    assert_eq!(status.get(&source).unwrap().state, SchedulerState::Stopped);
}

#[tokio::test]
async fn test_failing_entry_does_not_affect_others() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.txt");
    let good_dest = dir.path().join("good.copy");
    let missing = dir.path().join("missing.txt");
    let missing_dest = dir.path().join("missing.copy");
    write_data(&good, "good");

    let stop = StopSignal::new();
    let status = StatusBoard::new();
    let ext_data = ExternalData::new();
    let executor = Arc::new(SyncExecutor::new(Arc::new(LocalTransport::new()), ext_data.clone(), stop.clone()));
    let tasks = TaskSet::new();
    for (path, dest) in [(&good, &good_dest), (&missing, &missing_dest)] {
        let scheduler = SyncScheduler::new(
            periodic(path, dest, Duration::from_millis(200)),
            executor.clone(),
            ext_data.clone(),
            stop.clone(),
            status.clone(),
        );
        tasks.spawn(scheduler.run());
    }

    tokio::time::sleep(Duration::from_millis(1100)).await;
    stop.request_stop();
    tasks.join_all().await;

    assert_eq!(read_data(&good_dest), "good");
    assert!(!missing_dest.exists());

    let failing = status.get(&missing).unwrap();
    assert!(failing.failures >= 2);
    assert!(failing.last_outcome.as_ref().is_some_and(CycleOutcome::is_failure));
    assert!(failing.last_error.is_some());

    let healthy = status.get(&good).unwrap();
    assert_eq!(healthy.failures, 0);
    assert!(healthy.last_success.is_some());
}

#[tokio::test]
async fn test_failed_cycle_recovers_on_next_tick() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.txt");
    let destination = dir.path().join("destination.txt");
    write_data(&source, "data");

    let stop = StopSignal::new();
    let status = StatusBoard::new();
    let ext_data = ExternalData::new();
    let executor = Arc::new(SyncExecutor::new(
        Arc::new(FlakyTransport::failing(1)),
        ext_data.clone(),
        stop.clone(),
    ));
    let tasks = TaskSet::new();
    tasks.spawn(
        SyncScheduler::new(
            periodic(&source, &destination, Duration::from_millis(200)),
            executor,
            ext_data,
            stop.clone(),
            status.clone(),
        )
        .run(),
    );

    assert!(wait_for_content(&destination, "data", Duration::from_secs(3)).await);
    stop.request_stop();
    tasks.join_all().await;

    let entry = status.get(&source).unwrap();
    assert_eq!(entry.failures, 1);
    assert_eq!(entry.consecutive_failures, 0);
    assert!(entry.last_success.is_some());
}
