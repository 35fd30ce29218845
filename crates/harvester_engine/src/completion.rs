use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use tokio_util::sync::CancellationToken;

use crate::driver::{first_visible, ElementHandle, UiDriver};
use crate::wait::poll_until;
use crate::{FailureKind, HarvestError, HarvestSettings};

const SUCCESS_MARKERS: [&str; 3] = ["completed", "success", "finished"];
const ERROR_MARKERS: [&str; 4] = ["error", "failed", "failure", "unable"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The progress indicator reported a terminal success marker.
    Completed { status: String },
    /// The indicator never showed and no error text was found.
    AssumedSuccess,
}

/// Status text classification. Error markers win over success markers so
/// "completed with errors" is not read as a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMarker {
    Success,
    Error,
    Pending,
}

pub fn classify_status(text: &str) -> StatusMarker {
    let lower = text.to_lowercase();
    if ERROR_MARKERS.iter().any(|m| lower.contains(m)) {
        StatusMarker::Error
    } else if SUCCESS_MARKERS.iter().any(|m| lower.contains(m)) {
        StatusMarker::Success
    } else {
        StatusMarker::Pending
    }
}

/// Watches a portal operation until it reports a terminal state.
pub struct CompletionMonitor<'a> {
    driver: &'a dyn UiDriver,
    settings: &'a HarvestSettings,
    cancel: &'a CancellationToken,
}

impl<'a> CompletionMonitor<'a> {
    pub fn new(
        driver: &'a dyn UiDriver,
        settings: &'a HarvestSettings,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            driver,
            settings,
            cancel,
        }
    }

    pub async fn await_completion(
        &self,
        timeout: Duration,
    ) -> Result<CompletionOutcome, HarvestError> {
        let selectors = &self.settings.selectors;
        let appeared = tokio::select! {
            _ = self.cancel.cancelled() => return Err(HarvestError::cancelled()),
            found = self.driver.wait_for_selector(
                &selectors.progress_indicator,
                self.settings.completion_appear_timeout,
            ) => found,
        };

        match appeared {
            Ok(indicator) => self.poll_indicator(&indicator, timeout).await,
            Err(err) if err.is_timeout() => {
                engine_debug!("Progress indicator did not appear: {}", err);
                self.probe_error_indicators().await
            }
            Err(err) => Err(HarvestError::from_driver(
                FailureKind::Driver,
                "progress indicator",
                err,
            )),
        }
    }

    async fn poll_indicator(
        &self,
        indicator: &ElementHandle,
        timeout: Duration,
    ) -> Result<CompletionOutcome, HarvestError> {
        let driver = self.driver;
        let status = poll_until(
            "completion status",
            timeout,
            self.settings.poll_interval,
            FailureKind::Timeout,
            self.cancel,
            move || async move {
                let text = driver
                    .text_content(indicator)
                    .await
                    .map_err(|err| {
                        HarvestError::from_driver(FailureKind::Driver, "read progress indicator", err)
                    })?
                    .unwrap_or_default();
                match classify_status(&text) {
                    StatusMarker::Pending => Ok(None),
                    StatusMarker::Error => Err(HarvestError::new(
                        FailureKind::CompletionFailed,
                        text.trim().to_string(),
                    )),
                    StatusMarker::Success => Ok(Some(text.trim().to_string())),
                }
            },
        )
        .await?;
        engine_info!("Operation completed: {}", status);
        Ok(CompletionOutcome::Completed { status })
    }

    async fn probe_error_indicators(&self) -> Result<CompletionOutcome, HarvestError> {
        for selector in &self.settings.selectors.error_indicators {
            let handle = match first_visible(self.driver, selector).await {
                Ok(Some(handle)) => handle,
                Ok(None) => continue,
                Err(err) => {
                    engine_debug!("Error probe {} failed: {}", selector, err);
                    continue;
                }
            };
            let text = self
                .driver
                .text_content(&handle)
                .await
                .ok()
                .flatten()
                .unwrap_or_default();
            if classify_status(&text) == StatusMarker::Error {
                return Err(HarvestError::new(
                    FailureKind::CompletionFailed,
                    text.trim().to_string(),
                ));
            }
        }
        engine_warn!(
            "{}: no progress indicator and no error text; assuming success",
            FailureKind::CompletionUnknown
        );
        Ok(CompletionOutcome::AssumedSuccess)
    }
}
