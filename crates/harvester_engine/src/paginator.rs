use std::time::Duration;

use engine_logging::{engine_debug, engine_trace};
use harvester_core::ActivityEntry;
use tokio_util::sync::CancellationToken;

use crate::driver::{text_within, DriverError, ElementHandle, UiDriver};
use crate::wait::sleep_or_cancel;
use crate::{FailureKind, HarvestError, PortalSelectors};

/// An entry from the current pass together with the row it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleEntry {
    pub entry: ActivityEntry,
    pub handle: ElementHandle,
}

/// Reads the virtualized activity feed one rendered window at a time.
pub struct FeedPaginator<'a> {
    driver: &'a dyn UiDriver,
    selectors: &'a PortalSelectors,
    scroll_delta_px: i64,
    settle_delay: Duration,
}

impl<'a> FeedPaginator<'a> {
    pub fn new(
        driver: &'a dyn UiDriver,
        selectors: &'a PortalSelectors,
        scroll_delta_px: i64,
        settle_delay: Duration,
    ) -> Self {
        Self {
            driver,
            selectors,
            scroll_delta_px,
            settle_delay,
        }
    }

    /// Entries currently rendered, in visible order.
    ///
    /// `Ok(None)` means the feed container is not visible right now, or the
    /// rows re-rendered while being read; the caller retries the pass.
    pub async fn next_pass(&self) -> Result<Option<Vec<VisibleEntry>>, HarvestError> {
        match self.read_rows().await {
            Ok(rows) => Ok(rows),
            Err(err) if err.is_transient() => {
                engine_debug!("Feed re-rendered during pass: {}", err);
                Ok(None)
            }
            Err(err) => Err(HarvestError::from_driver(
                FailureKind::Driver,
                "read feed",
                err,
            )),
        }
    }

    async fn read_rows(&self) -> Result<Option<Vec<VisibleEntry>>, DriverError> {
        let Some(container) = self.visible_container().await? else {
            return Ok(None);
        };

        let mut entries = Vec::new();
        for row in self
            .driver
            .locate_within(&container, &self.selectors.feed_row)
            .await?
        {
            let title = text_within(self.driver, &row, &self.selectors.row_title)
                .await?
                .unwrap_or_default();
            let subtext = text_within(self.driver, &row, &self.selectors.row_subtext)
                .await?
                .unwrap_or_default();
            if title.is_empty() && subtext.is_empty() {
                engine_trace!("Skipping placeholder row {}", row.id());
                continue;
            }
            let raw_timestamp = text_within(self.driver, &row, &self.selectors.row_timestamp)
                .await?
                .unwrap_or_default();
            entries.push(VisibleEntry {
                entry: ActivityEntry::new(title, subtext, raw_timestamp),
                handle: row,
            });
        }
        Ok(Some(entries))
    }

    async fn visible_container(&self) -> Result<Option<ElementHandle>, DriverError> {
        let Some(container) = self
            .driver
            .locate(&self.selectors.feed_container)
            .await?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };
        if self.driver.is_visible(&container).await? {
            Ok(Some(container))
        } else {
            Ok(None)
        }
    }

    /// Scroll the feed one increment and let it render.
    pub async fn advance(&self, cancel: &CancellationToken) -> Result<(), HarvestError> {
        match self.visible_container().await {
            Ok(Some(container)) => {
                self.driver
                    .scroll(&container, self.scroll_delta_px)
                    .await
                    .map_err(|err| HarvestError::from_driver(FailureKind::Driver, "scroll feed", err))?;
                engine_trace!("Scrolled feed by {}px", self.scroll_delta_px);
            }
            Ok(None) => engine_debug!("Feed hidden; skipping scroll"),
            Err(err) if err.is_transient() => engine_debug!("Feed re-rendered before scroll: {}", err),
            Err(err) => {
                return Err(HarvestError::from_driver(FailureKind::Driver, "scroll feed", err))
            }
        }
        self.settle(cancel).await
    }

    pub async fn settle(&self, cancel: &CancellationToken) -> Result<(), HarvestError> {
        sleep_or_cancel(self.settle_delay, cancel).await
    }
}
