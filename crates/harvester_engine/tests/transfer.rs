use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use harvester_engine::replay::{PortalFixture, ReplayDriver};
use harvester_engine::{
    send, CompletionMonitor, CompletionOutcome, FailureKind, HarvesterConfig, UiDriver,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn config(workdir: &TempDir) -> HarvesterConfig {
    let mut config = HarvesterConfig::default();
    config.session.username = "ops@example.com".to_string();
    config.session.password = "secret".to_string();
    config.session.recipient = Some("finance@example.com".to_string());
    config.session.timeout = Duration::from_millis(100);
    config.harvest.selector_timeout = Duration::from_millis(100);
    config.harvest.navigation_timeout = Duration::from_millis(100);
    config.harvest.completion_appear_timeout = Duration::from_millis(20);
    config.harvest.completion_timeout = Duration::from_millis(200);
    config.harvest.poll_interval = Duration::from_millis(2);
    config.harvest.logs_dir = workdir.path().join("logs");
    config
}

fn outgoing(workdir: &TempDir, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = workdir.path().join(name);
            fs::write(&path, name.as_bytes()).unwrap();
            path
        })
        .collect()
}

async fn send_with(
    portal: PortalFixture,
    config: &HarvesterConfig,
    files: &[PathBuf],
) -> (Arc<ReplayDriver>, Result<CompletionOutcome, harvester_engine::HarvestError>) {
    let driver = Arc::new(ReplayDriver::new(portal, config.harvest.selectors.clone()));
    let result = send(driver.clone(), config, files, &CancellationToken::new()).await;
    (driver, result)
}

#[tokio::test]
async fn completed_status_confirms_the_transfer() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let files = outgoing(&workdir, &["results_OptimAI.xlsx", "summary.pdf"]);

    let (driver, outcome) = send_with(PortalFixture::default(), &config, &files).await;

    assert_eq!(
        outcome.unwrap(),
        CompletionOutcome::Completed {
            status: "Transfer completed".to_string()
        }
    );
    assert_eq!(driver.sent_files(), files);
    assert_eq!(driver.recipient().as_deref(), Some("finance@example.com"));
    assert!(driver.is_closed());
}

#[tokio::test]
async fn failed_status_is_an_error() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let files = outgoing(&workdir, &["results.xlsx"]);
    let portal = PortalFixture {
        transfer_status: Some("Upload failed: quota exceeded".to_string()),
        ..PortalFixture::default()
    };

    let (driver, outcome) = send_with(portal, &config, &files).await;

    let err = outcome.unwrap_err();
    assert_eq!(err.kind, FailureKind::CompletionFailed);
    assert!(err.message.contains("quota exceeded"));
    assert_eq!(driver.screenshots().len(), 1);
}

#[tokio::test]
async fn status_that_never_settles_times_out() {
    let workdir = TempDir::new().unwrap();
    let mut config = config(&workdir);
    config.harvest.completion_timeout = Duration::from_millis(30);
    let files = outgoing(&workdir, &["results.xlsx"]);
    let portal = PortalFixture {
        status_pending_reads: u32::MAX,
        ..PortalFixture::default()
    };

    let (_driver, outcome) = send_with(portal, &config, &files).await;

    assert_eq!(outcome.unwrap_err().kind, FailureKind::Timeout);
}

#[tokio::test]
async fn error_text_fails_when_no_indicator_appears() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let files = outgoing(&workdir, &["results.xlsx"]);
    let portal = PortalFixture {
        transfer_status: None,
        transfer_error: Some("Unable to deliver transfer".to_string()),
        ..PortalFixture::default()
    };

    let (_driver, outcome) = send_with(portal, &config, &files).await;

    assert_eq!(outcome.unwrap_err().kind, FailureKind::CompletionFailed);
}

#[tokio::test]
async fn silence_is_assumed_success() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let files = outgoing(&workdir, &["results.xlsx"]);
    let portal = PortalFixture {
        transfer_status: None,
        ..PortalFixture::default()
    };

    let (driver, outcome) = send_with(portal, &config, &files).await;

    assert_eq!(outcome.unwrap(), CompletionOutcome::AssumedSuccess);
    assert!(driver.screenshots().is_empty());
}

#[tokio::test]
async fn missing_recipient_is_rejected_before_signing_in() {
    let workdir = TempDir::new().unwrap();
    let mut config = config(&workdir);
    config.session.recipient = None;
    let files = outgoing(&workdir, &["results.xlsx"]);

    let (driver, outcome) = send_with(PortalFixture::default(), &config, &files).await;

    assert_eq!(outcome.unwrap_err().kind, FailureKind::InvalidRequest);
    assert!(!driver.is_closed());
}

#[tokio::test]
async fn empty_file_list_is_rejected() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);

    let (driver, outcome) = send_with(PortalFixture::default(), &config, &[]).await;

    assert_eq!(outcome.unwrap_err().kind, FailureKind::InvalidRequest);
    assert!(driver.sent_files().is_empty());
    assert!(driver.is_closed());
}

#[tokio::test]
async fn single_file_chooser_rejects_batches() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let files = outgoing(&workdir, &["a.xlsx", "b.xlsx"]);
    let portal = PortalFixture {
        chooser_multiple: false,
        ..PortalFixture::default()
    };

    let (driver, outcome) = send_with(portal, &config, &files).await;

    assert_eq!(outcome.unwrap_err().kind, FailureKind::InvalidRequest);
    assert!(driver.sent_files().is_empty());
}

#[tokio::test]
async fn closed_session_is_not_assumed_successful() {
    let workdir = TempDir::new().unwrap();
    let config = config(&workdir);
    let driver = ReplayDriver::new(PortalFixture::default(), config.harvest.selectors.clone());
    driver.close().await.unwrap();
    let cancel = CancellationToken::new();

    let err = CompletionMonitor::new(&driver, &config.harvest, &cancel)
        .await_completion(Duration::from_millis(50))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::Driver);
}

#[tokio::test]
async fn cancelling_during_sign_in_stops_the_send() {
    let workdir = TempDir::new().unwrap();
    let mut config = config(&workdir);
    config.session.timeout = Duration::from_secs(60);
    let files = outgoing(&workdir, &["results_OptimAI.xlsx"]);
    let portal = PortalFixture {
        stall_sign_in: true,
        ..PortalFixture::default()
    };
    let driver = Arc::new(ReplayDriver::new(portal, config.harvest.selectors.clone()));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        send(driver.clone(), &config, &files, &cancel),
    )
    .await
    .expect("send returns promptly once cancelled")
    .unwrap_err();

    assert_eq!(err.kind, FailureKind::Cancelled);
    assert!(driver.sent_files().is_empty());
    assert!(driver.screenshots().is_empty());
    assert!(driver.is_closed());
}
