use std::fs;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use harvester_core::StopReason;
use harvester_engine::replay::{FixtureFile, FixtureItem, PortalFixture, ReplayDriver};
use harvester_engine::{
    harvest, ChannelProgressSink, FailureKind, FailurePolicy, HarvestEvent, HarvesterConfig,
    ItemStage, NullProgressSink, ProgressSink,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn config(workdir: &TempDir) -> HarvesterConfig {
    engine_logging::initialize_for_tests();
    let mut config = HarvesterConfig::default();
    config.session.username = "ops@example.com".to_string();
    config.session.password = "secret".to_string();
    config.session.timeout = Duration::from_millis(100);

    let harvest = &mut config.harvest;
    harvest.title_prefix = "Received".to_string();
    harvest.name_suffix = "OptimAI.xlsx".to_string();
    harvest.navigation_timeout = Duration::from_millis(100);
    harvest.selector_timeout = Duration::from_millis(100);
    harvest.download_timeout = Duration::from_millis(50);
    harvest.settle_delay = Duration::from_millis(1);
    harvest.poll_interval = Duration::from_millis(2);
    harvest.max_scroll_attempts = 5;
    harvest.max_hidden_retries = 3;
    harvest.scroll_delta_px = 100;
    harvest.download_dir = workdir.path().join("downloads");
    harvest.logs_dir = workdir.path().join("logs");
    config
}

fn cutoff() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 2, 0, 0, 0).unwrap()
}

fn fixture(items: Vec<FixtureItem>) -> PortalFixture {
    PortalFixture {
        items,
        ..PortalFixture::default()
    }
}

fn batch(title: &str, timestamp: &str) -> FixtureItem {
    FixtureItem::new(title, "from partner", timestamp).with_files(vec![
        FixtureFile::new("a_OptimAI.xlsx", "alpha"),
        FixtureFile::new("notes.csv", "skip me"),
        FixtureFile::new("b_OptimAI.xlsx", "beta"),
    ])
}

async fn run(
    driver: &Arc<ReplayDriver>,
    config: &HarvesterConfig,
    sink: &dyn ProgressSink,
) -> Result<harvester_core::HarvestReport, harvester_engine::HarvestError> {
    harvest(
        driver.clone(),
        config,
        cutoff(),
        sink,
        &CancellationToken::new(),
    )
    .await
}

#[tokio::test]
async fn harvests_until_the_cutoff_entry() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let driver = Arc::new(ReplayDriver::new(
        fixture(vec![
            batch("Received batch A", "2025-11-03T09:30:00Z"),
            batch("Received batch B", "2025-11-01T09:30:00Z"),
            batch("Other", "2025-11-05T09:30:00Z"),
        ]),
        config.harvest.selectors.clone(),
    ));

    let report = run(&driver, &config, &NullProgressSink).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::CutoffReached);
    assert_eq!(
        driver.opened_titles(),
        vec!["Received batch A".to_string(), "Received batch B".to_string()]
    );
    let names: Vec<_> = report.files.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(names, vec!["a_OptimAI.xlsx", "b_OptimAI.xlsx"]);

    let provenance = Utc.with_ymd_and_hms(2025, 11, 3, 9, 30, 0).unwrap();
    assert!(report.files.iter().all(|f| f.updated_at == provenance));
    assert_eq!(report.files[0].data, b"alpha");
    assert_eq!(report.stats.items_processed, 1);
    assert!(driver.is_closed());

    let downloads = config.harvest.download_dir;
    assert!(!downloads.join("transfer-0.zip").exists());
    assert!(downloads.join("transfer-0").join("a_OptimAI.xlsx").is_file());
    assert!(!downloads.join("transfer-0").join("notes.csv").exists());
}

#[tokio::test]
async fn single_matching_file_downloads_directly_without_records() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let item = FixtureItem::new("Received single", "", "2025-11-03 10:00").with_files(vec![
        FixtureFile::new("a_OptimAI.xlsx", "alpha"),
        FixtureFile::new("b.csv", "csv"),
    ]);
    let driver = Arc::new(ReplayDriver::new(
        fixture(vec![item]),
        config.harvest.selectors.clone(),
    ));

    let report = run(&driver, &config, &NullProgressSink).await.unwrap();

    assert!(report.files.is_empty());
    assert_eq!(report.stats.items_processed, 1);
    let downloads = &config.harvest.download_dir;
    assert_eq!(fs::read(downloads.join("a_OptimAI.xlsx")).unwrap(), b"alpha");
    assert!(!downloads.join("b.csv").exists());
}

#[tokio::test]
async fn direct_downloads_become_records_when_enabled() {
    let workdir = TempDir::new().unwrap();
    let mut config = config(&workdir);
    config.harvest.materialize_direct_downloads = true;
    let item = FixtureItem::new("Received single", "", "2025-11-03 10:00").with_files(vec![
        FixtureFile::new("a_OptimAI.xlsx", "alpha"),
        FixtureFile::new("b.csv", "csv"),
    ]);
    let driver = Arc::new(ReplayDriver::new(
        fixture(vec![item]),
        config.harvest.selectors.clone(),
    ));

    let report = run(&driver, &config, &NullProgressSink).await.unwrap();

    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].file_name, "a_OptimAI.xlsx");
    assert_eq!(
        report.files[0].updated_at,
        Utc.with_ymd_and_hms(2025, 11, 3, 10, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn single_file_served_as_archive_is_extracted() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let mut item = FixtureItem::new("Received zipped", "", "2025-11-03T08:00:00Z").with_files(vec![
        FixtureFile::new("a_OptimAI.xlsx", "alpha"),
        FixtureFile::new("b.csv", "csv"),
    ]);
    item.archive_name = Some("Transfer Files.ZIP".to_string());
    item.gate = true;
    let driver = Arc::new(ReplayDriver::new(
        fixture(vec![item]),
        config.harvest.selectors.clone(),
    ));

    let report = run(&driver, &config, &NullProgressSink).await.unwrap();

    let names: Vec<_> = report.files.iter().map(|f| f.file_name.as_str()).collect();
    assert_eq!(names, vec!["a_OptimAI.xlsx"]);
}

#[tokio::test]
async fn no_matching_titles_is_an_empty_success() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let driver = Arc::new(ReplayDriver::new(
        fixture(vec![
            batch("Sent batch", "2025-11-03T09:30:00Z"),
            batch("Shared folder", "2025-11-04T09:30:00Z"),
        ]),
        config.harvest.selectors.clone(),
    ));

    let report = run(&driver, &config, &NullProgressSink).await.unwrap();

    assert!(report.files.is_empty());
    assert_eq!(report.stop_reason, StopReason::AttemptsExhausted);
    assert_eq!(report.stats.passes, 5);
    assert!(driver.opened_titles().is_empty());
}

#[tokio::test]
async fn empty_feed_ends_without_error() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let driver = Arc::new(ReplayDriver::new(
        fixture(Vec::new()),
        config.harvest.selectors.clone(),
    ));

    let report = run(&driver, &config, &NullProgressSink).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::EmptyFeed);
    assert!(driver.is_closed());
}

#[tokio::test]
async fn hidden_feed_is_retried_a_bounded_number_of_times() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let mut portal = fixture(vec![batch("Received batch A", "2025-11-03T09:30:00Z")]);
    portal.feed_hidden = true;
    let driver = Arc::new(ReplayDriver::new(portal, config.harvest.selectors.clone()));

    let report = run(&driver, &config, &NullProgressSink).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::FeedUnavailable);
    assert_eq!(report.stats.passes, 0);
    assert!(report.files.is_empty());
}

#[tokio::test]
async fn briefly_hidden_feed_recovers() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let mut portal = fixture(vec![
        batch("Received batch A", "2025-11-03T09:30:00Z"),
        batch("Received batch B", "2025-11-01T09:30:00Z"),
    ]);
    portal.hidden_reads = 2;
    let driver = Arc::new(ReplayDriver::new(portal, config.harvest.selectors.clone()));

    let report = run(&driver, &config, &NullProgressSink).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::CutoffReached);
    assert_eq!(report.files.len(), 2);
}

#[tokio::test]
async fn scrolls_to_reveal_entries_beyond_the_window() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let mut items: Vec<_> = (1..=5)
        .map(|day| batch(&format!("Received day {day}"), &format!("2025-11-{:02}T12:00:00Z", 10 - day)))
        .collect();
    items.push(batch("Received stale", "2025-10-30T12:00:00Z"));
    let mut portal = fixture(items);
    portal.window = 2;
    let driver = Arc::new(ReplayDriver::new(portal, config.harvest.selectors.clone()));

    let report = run(&driver, &config, &NullProgressSink).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::CutoffReached);
    assert_eq!(driver.opened_titles().len(), 6);
    assert_eq!(driver.opened_titles()[5], "Received stale");
    assert_eq!(report.stats.items_processed, 5);
    assert_eq!(report.files.len(), 10);
    assert!(report.stats.scrolls > 0);
}

#[tokio::test]
async fn long_feed_is_harvested_past_the_attempt_budget() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let mut items: Vec<_> = (0..12)
        .map(|i| batch(&format!("Received item {i}"), &format!("2025-11-{:02}T12:00:00Z", 20 - i)))
        .collect();
    items.push(batch("Received stale", "2025-10-30T12:00:00Z"));
    let mut portal = fixture(items);
    portal.window = 2;
    let driver = Arc::new(ReplayDriver::new(portal, config.harvest.selectors.clone()));

    let report = run(&driver, &config, &NullProgressSink).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::CutoffReached);
    assert_eq!(report.stats.items_processed, 12);
    assert_eq!(report.files.len(), 24);
    assert_eq!(driver.opened_titles().len(), 13);
}

#[tokio::test]
async fn items_sharing_an_archive_name_keep_their_own_files() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let mut first = FixtureItem::new("Received A", "", "2025-11-04T09:00:00Z").with_files(vec![
        FixtureFile::new("a_OptimAI.xlsx", "a"),
        FixtureFile::new("a2_OptimAI.xlsx", "a2"),
    ]);
    first.archive_name = Some("files.zip".to_string());
    let mut second = FixtureItem::new("Received B", "", "2025-11-03T09:00:00Z").with_files(vec![
        FixtureFile::new("b_OptimAI.xlsx", "b"),
        FixtureFile::new("b2_OptimAI.xlsx", "b2"),
    ]);
    second.archive_name = Some("files.zip".to_string());
    let driver = Arc::new(ReplayDriver::new(
        fixture(vec![first, second, batch("Received old", "2025-11-01T09:00:00Z")]),
        config.harvest.selectors.clone(),
    ));

    let report = run(&driver, &config, &NullProgressSink).await.unwrap();

    let files: Vec<_> = report
        .files
        .iter()
        .map(|f| (f.file_name.as_str(), f.updated_at.format("%m-%d").to_string()))
        .collect();
    assert_eq!(
        files,
        vec![
            ("a2_OptimAI.xlsx", "11-04".to_string()),
            ("a_OptimAI.xlsx", "11-04".to_string()),
            ("b2_OptimAI.xlsx", "11-03".to_string()),
            ("b_OptimAI.xlsx", "11-03".to_string()),
        ]
    );
}

#[tokio::test]
async fn failed_login_is_fatal_and_leaves_a_screenshot() {
    let workdir = TempDir::new().unwrap();
    let mut config = config(&workdir);
    config.session.password = "wrong".to_string();
    let driver = Arc::new(ReplayDriver::new(
        fixture(vec![batch("Received batch A", "2025-11-03T09:30:00Z")]),
        config.harvest.selectors.clone(),
    ));

    let err = run(&driver, &config, &NullProgressSink).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::Authentication);
    assert!(err.message.contains("Incorrect email or password"));
    assert!(driver.is_closed());
    let shots = driver.screenshots();
    assert_eq!(shots.len(), 1);
    assert!(shots[0].starts_with(&config.harvest.logs_dir));
    assert!(shots[0].is_file());
}

#[tokio::test]
async fn stalled_download_aborts_the_harvest_by_default() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let mut stalled = batch("Received stalled", "2025-11-04T09:30:00Z");
    stalled.stall_download = true;
    let driver = Arc::new(ReplayDriver::new(
        fixture(vec![stalled, batch("Received batch A", "2025-11-03T09:30:00Z")]),
        config.harvest.selectors.clone(),
    ));

    let err = run(&driver, &config, &NullProgressSink).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::DownloadTimeout);
    assert_eq!(driver.opened_titles(), vec!["Received stalled".to_string()]);
    assert_eq!(driver.screenshots().len(), 1);
    assert!(driver.is_closed());
}

#[tokio::test]
async fn collect_policy_records_failures_and_keeps_scanning() {
    let workdir = TempDir::new().unwrap();
    let mut config = config(&workdir);
    config.harvest.failure_policy = FailurePolicy::CollectAndContinue;
    let mut stalled = batch("Received stalled", "2025-11-04T09:30:00Z");
    stalled.stall_download = true;
    let mut corrupt = batch("Received corrupt", "2025-11-03T12:00:00Z");
    corrupt.corrupt_archive = true;
    let driver = Arc::new(ReplayDriver::new(
        fixture(vec![
            stalled,
            corrupt,
            batch("Received batch A", "2025-11-03T09:30:00Z"),
            batch("Received batch B", "2025-11-01T09:30:00Z"),
        ]),
        config.harvest.selectors.clone(),
    ));

    let report = run(&driver, &config, &NullProgressSink).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::CutoffReached);
    assert_eq!(report.files.len(), 2);
    let failed: Vec<_> = report.failures.iter().map(|f| f.identity.as_str()).collect();
    assert_eq!(
        failed,
        vec![
            "Received stalled::from partner",
            "Received corrupt::from partner"
        ]
    );
    assert!(report.failures[0].reason.starts_with("download did not start"));
    assert!(report.failures[1].reason.starts_with("extraction failed"));
    assert!(driver.screenshots().is_empty());
}

#[tokio::test]
async fn unreadable_detail_view_is_an_item_detail_failure() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let mut broken = batch("Received broken", "2025-11-04T09:30:00Z");
    broken.broken_detail = true;
    let driver = Arc::new(ReplayDriver::new(
        fixture(vec![broken]),
        config.harvest.selectors.clone(),
    ));

    let err = run(&driver, &config, &NullProgressSink).await.unwrap_err();

    assert_eq!(err.kind, FailureKind::ItemDetail);
}

#[tokio::test]
async fn unparseable_detail_timestamp_skips_the_item() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let driver = Arc::new(ReplayDriver::new(
        fixture(vec![
            batch("Received odd", "sometime last week"),
            batch("Received batch A", "2025-11-03T09:30:00Z"),
            batch("Received batch B", "2025-11-01T09:30:00Z"),
        ]),
        config.harvest.selectors.clone(),
    ));

    let report = run(&driver, &config, &NullProgressSink).await.unwrap();

    assert_eq!(report.stats.unparseable_timestamps, 1);
    assert_eq!(report.files.len(), 2);
    assert_eq!(driver.opened_titles().len(), 3);
}

#[tokio::test]
async fn missing_download_button_yields_no_files() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let mut item = batch("Received batch A", "2025-11-03T09:30:00Z");
    item.no_download_button = true;
    let driver = Arc::new(ReplayDriver::new(
        fixture(vec![item]),
        config.harvest.selectors.clone(),
    ));

    let report = run(&driver, &config, &NullProgressSink).await.unwrap();

    assert!(report.files.is_empty());
    assert_eq!(report.stats.items_processed, 1);
}

#[tokio::test]
async fn progress_events_follow_the_item_lifecycle() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let driver = Arc::new(ReplayDriver::new(
        fixture(vec![
            batch("Received batch A", "2025-11-03T09:30:00Z"),
            batch("Received batch B", "2025-11-01T09:30:00Z"),
        ]),
        config.harvest.selectors.clone(),
    ));
    let (tx, rx) = mpsc::channel();
    let sink = ChannelProgressSink::new(tx);

    run(&driver, &config, &sink).await.unwrap();
    let events: Vec<HarvestEvent> = rx.try_iter().collect();

    let stages: Vec<ItemStage> = events
        .iter()
        .filter_map(|event| match event {
            HarvestEvent::ItemStage { identity, stage } if identity.starts_with("Received batch A") => {
                Some(*stage)
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        stages,
        vec![
            ItemStage::DetailOpened,
            ItemStage::FilesEnumerated,
            ItemStage::FilesSelected,
            ItemStage::DownloadTriggered,
            ItemStage::DownloadSaved,
            ItemStage::Materialized,
            ItemStage::Done,
        ]
    );
    assert_eq!(
        events.last(),
        Some(&HarvestEvent::Finished {
            reason: StopReason::CutoffReached,
            files: 2
        })
    );
}

struct CancelAfterFirstItem {
    token: CancellationToken,
}

impl ProgressSink for CancelAfterFirstItem {
    fn emit(&self, event: HarvestEvent) {
        if matches!(event, HarvestEvent::ItemHarvested { .. }) {
            self.token.cancel();
        }
    }
}

#[tokio::test]
async fn cancellation_keeps_what_was_collected() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let driver = Arc::new(ReplayDriver::new(
        fixture(vec![
            batch("Received batch A", "2025-11-04T09:30:00Z"),
            batch("Received batch B", "2025-11-03T09:30:00Z"),
        ]),
        config.harvest.selectors.clone(),
    ));
    let token = CancellationToken::new();
    let sink = CancelAfterFirstItem {
        token: token.clone(),
    };

    let report = harvest(driver.clone(), &config, cutoff(), &sink, &token)
        .await
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::Cancelled);
    assert_eq!(report.files.len(), 2);
    assert_eq!(driver.opened_titles(), vec!["Received batch A".to_string()]);
    assert!(driver.screenshots().is_empty());
    assert!(driver.is_closed());
}

#[tokio::test]
async fn cancelling_a_stalled_sign_in_returns_promptly() {
    let workdir = TempDir::new().unwrap();
    let mut config = config(&workdir);
    config.session.timeout = Duration::from_secs(60);
    let mut portal = fixture(vec![batch("Received batch A", "2025-11-03T09:30:00Z")]);
    portal.stall_sign_in = true;
    let driver = Arc::new(ReplayDriver::new(portal, config.harvest.selectors.clone()));
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        harvest(driver.clone(), &config, cutoff(), &NullProgressSink, &token),
    )
    .await
    .expect("harvest returns promptly once cancelled")
    .unwrap();

    assert_eq!(report.stop_reason, StopReason::Cancelled);
    assert!(report.files.is_empty());
    assert!(driver.opened_titles().is_empty());
    assert!(driver.screenshots().is_empty());
    assert!(driver.is_closed());
}
