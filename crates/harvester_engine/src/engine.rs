use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use engine_logging::{engine_debug, engine_info, engine_warn};
use harvester_core::{
    update, DownloadedFile, Effect, EntryIdentity, FilterCriteria, HarvestReport, Msg, ScanState,
};
use tokio_util::sync::CancellationToken;

use crate::completion::CompletionOutcome;
use crate::driver::{ElementHandle, UiDriver};
use crate::materialize::ArchiveMaterializer;
use crate::orchestrator::ItemDownloadOrchestrator;
use crate::paginator::FeedPaginator;
use crate::progress::{HarvestEvent, ItemStage, ProgressSink};
use crate::session::with_session;
use crate::transfer::send_transfer;
use crate::wait::or_cancel;
use crate::{FailureKind, FailurePolicy, HarvestError, HarvestSettings, HarvesterConfig, SessionConfig};

/// Harvest every matched feed item newer than `last_sync`.
///
/// Signs in, scans, and always closes the session. Cancelling `cancel`
/// ends the scan early with the files collected so far.
pub async fn harvest(
    driver: Arc<dyn UiDriver>,
    config: &HarvesterConfig,
    last_sync: DateTime<Utc>,
    sink: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<HarvestReport, HarvestError> {
    let criteria = FilterCriteria::new(config.harvest.title_prefix.clone(), last_sync);
    engine_info!(
        "Harvesting entries titled {:?} newer than {}",
        criteria.title_prefix,
        criteria.cutoff
    );
    let limits = config.harvest.scan_limits();
    let scan_criteria = criteria.clone();
    let outcome = with_session(driver, &config.session, &config.harvest, cancel, |driver| async move {
        Harvester::new(driver.as_ref(), &config.session, &config.harvest, sink, cancel)
            .run(scan_criteria)
            .await
    })
    .await;
    match outcome {
        // Cancelled before the scan began: nothing was collected.
        Err(err) if err.kind == FailureKind::Cancelled => {
            let report = ScanState::new(criteria, limits).into_report();
            sink.emit(HarvestEvent::Finished {
                reason: report.stop_reason,
                files: 0,
            });
            Ok(report)
        }
        other => other,
    }
}

/// Send local files to the configured recipient in their own session.
pub async fn send(
    driver: Arc<dyn UiDriver>,
    config: &HarvesterConfig,
    files: &[PathBuf],
    cancel: &CancellationToken,
) -> Result<CompletionOutcome, HarvestError> {
    let recipient = config
        .session
        .recipient
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| HarvestError::new(FailureKind::InvalidRequest, "no recipient configured"))?;
    with_session(driver, &config.session, &config.harvest, cancel, |driver| async move {
        send_transfer(driver.as_ref(), &config.harvest, recipient, files, cancel).await
    })
    .await
}

/// Executes the effects produced by the scan state machine against one
/// signed-in session.
pub struct Harvester<'a> {
    driver: &'a dyn UiDriver,
    session: &'a SessionConfig,
    settings: &'a HarvestSettings,
    sink: &'a dyn ProgressSink,
    cancel: &'a CancellationToken,
    paginator: FeedPaginator<'a>,
    orchestrator: ItemDownloadOrchestrator<'a>,
    materializer: ArchiveMaterializer,
    /// Rows of the most recent pass, for opening the chosen candidate.
    handles: HashMap<EntryIdentity, ElementHandle>,
    passes: u32,
}

impl<'a> Harvester<'a> {
    pub fn new(
        driver: &'a dyn UiDriver,
        session: &'a SessionConfig,
        settings: &'a HarvestSettings,
        sink: &'a dyn ProgressSink,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            driver,
            session,
            settings,
            sink,
            cancel,
            paginator: FeedPaginator::new(
                driver,
                &settings.selectors,
                settings.scroll_delta_px,
                settings.settle_delay,
            ),
            orchestrator: ItemDownloadOrchestrator::new(driver, session, settings, sink, cancel),
            materializer: ArchiveMaterializer::from_settings(settings),
            handles: HashMap::new(),
            passes: 0,
        }
    }

    pub async fn run(mut self, criteria: FilterCriteria) -> Result<HarvestReport, HarvestError> {
        let mut state = ScanState::new(criteria, self.settings.scan_limits());
        let mut queue: VecDeque<Effect> = VecDeque::new();
        let mut pending = match self.open_feed().await {
            Ok(()) => Some(Msg::Start),
            Err(err) if err.kind == FailureKind::Cancelled => Some(Msg::Cancelled),
            Err(err) => return Err(err),
        };

        loop {
            if let Some(msg) = pending.take() {
                let (next, effects) = update(state, msg);
                state = next;
                if state.is_finished() {
                    queue.clear();
                }
                queue.extend(effects);
            }
            let Some(effect) = queue.pop_front() else {
                break;
            };

            if self.cancel.is_cancelled() && !matches!(effect, Effect::Finish { .. }) {
                pending = Some(Msg::Cancelled);
                continue;
            }
            match self.execute(effect, state.files().len()).await {
                Ok(msg) => pending = msg,
                Err(err) if err.kind == FailureKind::Cancelled => {
                    engine_warn!("Harvest cancelled; keeping {} file(s)", state.files().len());
                    pending = Some(Msg::Cancelled);
                }
                Err(err) => return Err(err),
            }
        }

        let report = state.into_report();
        engine_info!(
            "Harvest finished ({}): {} file(s), {} item(s), {} pass(es)",
            report.stop_reason,
            report.files.len(),
            report.stats.items_processed,
            report.stats.passes
        );
        Ok(report)
    }

    async fn open_feed(&self) -> Result<(), HarvestError> {
        let feed_url = self.session.page_url(&self.settings.feed_path)?;
        or_cancel(self.cancel, self.driver.open(feed_url.as_str()))
            .await?
            .map_err(|err| HarvestError::from_driver(FailureKind::PaginationStall, "open feed", err))
    }

    async fn execute(
        &mut self,
        effect: Effect,
        collected: usize,
    ) -> Result<Option<Msg>, HarvestError> {
        match effect {
            Effect::ReadPass => self.read_pass().await,
            Effect::RetryPass => {
                self.paginator.settle(self.cancel).await?;
                self.read_pass().await
            }
            Effect::Scroll => {
                self.paginator.advance(self.cancel).await?;
                Ok(None)
            }
            Effect::OpenEntry { identity } => {
                let Some(row) = self.handles.get(&identity).cloned() else {
                    return self.absorb(
                        &identity,
                        HarvestError::new(FailureKind::ItemDetail, format!("row for {identity} vanished")),
                    );
                };
                match self.orchestrator.open_detail(&identity, &row).await {
                    Ok(raw_timestamp) => Ok(Some(Msg::DetailOpened {
                        identity,
                        raw_timestamp,
                    })),
                    Err(err) => self.absorb(&identity, err),
                }
            }
            Effect::Download {
                identity,
                timestamp,
            } => match self.harvest_item(&identity, timestamp).await {
                Ok(files) => {
                    self.sink.emit(HarvestEvent::ItemHarvested {
                        identity: identity.to_string(),
                        files: files.len(),
                    });
                    Ok(Some(Msg::ItemHarvested { identity, files }))
                }
                Err(err) => self.absorb(&identity, err),
            },
            Effect::ReturnToFeed => {
                self.orchestrator.return_to_feed().await?;
                Ok(None)
            }
            Effect::Finish { reason } => {
                self.sink.emit(HarvestEvent::Finished {
                    reason,
                    files: collected,
                });
                Ok(None)
            }
        }
    }

    async fn read_pass(&mut self) -> Result<Option<Msg>, HarvestError> {
        let Some(visible) = self.paginator.next_pass().await? else {
            engine_debug!("Feed not visible on this pass");
            return Ok(Some(Msg::FeedHidden));
        };
        self.passes += 1;
        self.sink.emit(HarvestEvent::PassObserved {
            pass: self.passes,
            visible: visible.len(),
        });

        self.handles.clear();
        let mut entries = Vec::with_capacity(visible.len());
        for item in visible {
            self.handles.insert(item.entry.identity(), item.handle);
            entries.push(item.entry);
        }
        Ok(Some(Msg::PassObserved { entries }))
    }

    async fn harvest_item(
        &self,
        identity: &EntryIdentity,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<DownloadedFile>, HarvestError> {
        let Some(saved) = self.orchestrator.download(identity).await? else {
            self.orchestrator.stage(identity, ItemStage::Done);
            return Ok(Vec::new());
        };
        let files = self.materializer.materialize(&saved, timestamp)?;
        self.orchestrator.stage(identity, ItemStage::Materialized);
        self.orchestrator.stage(identity, ItemStage::Done);
        Ok(files)
    }

    /// Apply the failure policy to an item-level error.
    fn absorb(&self, identity: &EntryIdentity, err: HarvestError) -> Result<Option<Msg>, HarvestError> {
        if err.kind == FailureKind::Cancelled {
            return Err(err);
        }
        self.orchestrator.stage(identity, ItemStage::Failed);
        match self.settings.failure_policy {
            FailurePolicy::FailFast => Err(err),
            FailurePolicy::CollectAndContinue => Ok(Some(Msg::ItemFailed {
                identity: identity.clone(),
                reason: err.to_string(),
            })),
        }
    }
}
