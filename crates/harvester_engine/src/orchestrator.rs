use std::path::PathBuf;

use engine_logging::{engine_debug, engine_info, engine_warn};
use harvester_core::{EntryIdentity, FileFilter};
use tokio_util::sync::CancellationToken;

use crate::driver::{first_visible, text_within, ClickModifiers, DriverEvent, ElementHandle, EventKind, UiDriver};
use crate::filename::safe_file_name;
use crate::persist::ensure_output_dir;
use crate::progress::{HarvestEvent, ItemStage, ProgressSink};
use crate::wait::{or_cancel, poll_until};
use crate::{FailureKind, HarvestError, HarvestSettings, SessionConfig};

/// Drives one matched feed item from its detail view to a saved download.
pub struct ItemDownloadOrchestrator<'a> {
    driver: &'a dyn UiDriver,
    session: &'a SessionConfig,
    settings: &'a HarvestSettings,
    filter: FileFilter,
    sink: &'a dyn ProgressSink,
    cancel: &'a CancellationToken,
}

impl<'a> ItemDownloadOrchestrator<'a> {
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
            filter: FileFilter::new(settings.name_suffix.clone()),
            sink,
            cancel,
        }
    }

    pub(crate) fn stage(&self, identity: &EntryIdentity, stage: ItemStage) {
        self.sink.emit(HarvestEvent::ItemStage {
            identity: identity.to_string(),
            stage,
        });
    }

    /// Open the item's detail view and return its timestamp text.
    pub async fn open_detail(
        &self,
        identity: &EntryIdentity,
        row: &ElementHandle,
    ) -> Result<Option<String>, HarvestError> {
        let selectors = &self.settings.selectors;
        let detail = |context: &str, err| HarvestError::from_driver(FailureKind::ItemDetail, context, err);

        self.driver
            .click(row, ClickModifiers::NONE)
            .await
            .map_err(|err| detail("open entry", err))?;

        if let Some(gate) = first_visible(self.driver, &selectors.transfer_gate)
            .await
            .map_err(|err| detail("probe gate", err))?
        {
            engine_debug!("Dismissing interstitial for {}", identity);
            self.driver
                .click(&gate, ClickModifiers::NONE)
                .await
                .map_err(|err| detail("dismiss gate", err))?;
        }

        let stamp = or_cancel(
            self.cancel,
            self.driver
                .wait_for_selector(&selectors.detail_timestamp, self.settings.navigation_timeout),
        )
        .await?
        .map_err(|err| detail("detail view", err))?;
        let text = self
            .driver
            .text_content(&stamp)
            .await
            .map_err(|err| detail("read timestamp", err))?
            .map(|text| text.trim().to_string());

        self.stage(identity, ItemStage::DetailOpened);
        Ok(text)
    }

    /// Select the matching nested files and save their download.
    ///
    /// `Ok(None)` when nothing matched or the selection UI was missing.
    pub async fn download(&self, identity: &EntryIdentity) -> Result<Option<PathBuf>, HarvestError> {
        let selectors = &self.settings.selectors;
        let detail = |context: &str, err| HarvestError::from_driver(FailureKind::ItemDetail, context, err);

        let open = or_cancel(
            self.cancel,
            self.driver
                .wait_for_selector(&selectors.open_downloads, self.settings.selector_timeout),
        )
        .await?
        .map_err(|err| detail("downloads link", err))?;
        self.driver
            .click(&open, ClickModifiers::NONE)
            .await
            .map_err(|err| detail("open downloads", err))?;

        let driver = self.driver;
        let marker = selectors.downloads_url_marker.as_str();
        poll_until(
            "download surface",
            self.settings.navigation_timeout,
            self.settings.poll_interval,
            FailureKind::ItemDetail,
            self.cancel,
            move || async move {
                let url = driver
                    .current_url()
                    .await
                    .map_err(|err| HarvestError::from_driver(FailureKind::ItemDetail, "read url", err))?;
                Ok(url.contains(marker).then_some(()))
            },
        )
        .await?;

        let list = or_cancel(
            self.cancel,
            self.driver
                .wait_for_selector(&selectors.file_list, self.settings.navigation_timeout),
        )
        .await?
        .map_err(|err| detail("file list", err))?;

        let mut matched = Vec::new();
        for row in self
            .driver
            .locate_within(&list, &selectors.file_row)
            .await
            .map_err(|err| detail("file rows", err))?
        {
            let name = text_within(self.driver, &row, &selectors.file_name)
                .await
                .map_err(|err| detail("file name", err))?
                .unwrap_or_default();
            if self.filter.matches(&name) {
                engine_debug!("Selecting nested file {}", name);
                matched.push(row);
            }
        }
        self.stage(identity, ItemStage::FilesEnumerated);

        if matched.is_empty() {
            engine_warn!(
                "{}: no files ending with {:?} under {}",
                FailureKind::Selection,
                self.filter.name_suffix,
                identity
            );
            return Ok(None);
        }

        for row in &matched {
            self.driver
                .click(row, ClickModifiers::MULTI_SELECT)
                .await
                .map_err(|err| detail("select file", err))?;
        }
        self.stage(identity, ItemStage::FilesSelected);

        let Some(trigger) = first_visible(self.driver, &selectors.download_selected)
            .await
            .map_err(|err| detail("download button", err))?
        else {
            engine_warn!("{}: download button missing for {}", FailureKind::Selection, identity);
            return Ok(None);
        };
        self.driver
            .click(&trigger, ClickModifiers::NONE)
            .await
            .map_err(|err| detail("trigger download", err))?;
        self.stage(identity, ItemStage::DownloadTriggered);

        let event = or_cancel(
            self.cancel,
            self.driver
                .wait_for_event(EventKind::DownloadStarted, self.settings.download_timeout),
        )
        .await?
        .map_err(|err| {
            let kind = if err.is_timeout() {
                FailureKind::DownloadTimeout
            } else {
                FailureKind::Driver
            };
            HarvestError::from_driver(kind, "download start", err)
        })?;
        let pending = match event {
            DriverEvent::DownloadStarted(pending) => pending,
            other => {
                return Err(HarvestError::new(
                    FailureKind::DownloadTimeout,
                    format!("expected a download, got {:?}", other.kind()),
                ))
            }
        };

        ensure_output_dir(&self.settings.download_dir)?;
        let dest = self
            .settings
            .download_dir
            .join(safe_file_name(&pending.suggested_filename));
        self.driver
            .save_download(&pending, &dest)
            .await
            .map_err(|err| HarvestError::from_driver(FailureKind::Io, "save download", err))?;
        engine_info!(
            "Saved {} file(s) of {} as {:?}",
            matched.len(),
            identity,
            dest
        );
        self.stage(identity, ItemStage::DownloadSaved);
        Ok(Some(dest))
    }

    /// Reopen the feed so scanning can continue.
    pub async fn return_to_feed(&self) -> Result<(), HarvestError> {
        let stall = |context: &str, err| HarvestError::from_driver(FailureKind::PaginationStall, context, err);
        let url = self.session.page_url(&self.settings.feed_path)?;
        or_cancel(self.cancel, self.driver.open(url.as_str()))
            .await?
            .map_err(|err| stall("open feed", err))?;
        or_cancel(
            self.cancel,
            self.driver
                .wait_for_selector(&self.settings.selectors.feed_container, self.settings.navigation_timeout),
        )
        .await?
        .map_err(|err| stall("feed container", err))?;
        Ok(())
    }
}
