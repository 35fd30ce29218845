use std::path::PathBuf;

use engine_logging::{engine_debug, engine_info};
use tokio_util::sync::CancellationToken;

use crate::completion::{CompletionMonitor, CompletionOutcome};
use crate::driver::{ClickModifiers, DriverEvent, EventKind, UiDriver};
use crate::wait::or_cancel;
use crate::{FailureKind, HarvestError, HarvestSettings};

/// Upload `files` to `recipient` through the portal compose surface and wait
/// for the portal to confirm the transfer.
pub async fn send_transfer(
    driver: &dyn UiDriver,
    settings: &HarvestSettings,
    recipient: &str,
    files: &[PathBuf],
    cancel: &CancellationToken,
) -> Result<CompletionOutcome, HarvestError> {
    if files.is_empty() {
        return Err(HarvestError::new(
            FailureKind::InvalidRequest,
            "no files to send",
        ));
    }
    if recipient.trim().is_empty() {
        return Err(HarvestError::new(
            FailureKind::InvalidRequest,
            "recipient is empty",
        ));
    }
    if let Some(missing) = files.iter().find(|path| !path.is_file()) {
        return Err(HarvestError::new(
            FailureKind::InvalidRequest,
            format!("{} is not a readable file", missing.display()),
        ));
    }

    let selectors = &settings.selectors;
    let step = |context: &str, err| HarvestError::from_driver(FailureKind::Driver, context, err);

    let compose = or_cancel(
        cancel,
        driver.wait_for_selector(&selectors.compose_button, settings.selector_timeout),
    )
    .await?
    .map_err(|err| step("compose button", err))?;
    driver
        .click(&compose, ClickModifiers::NONE)
        .await
        .map_err(|err| step("open compose", err))?;

    let add_files = or_cancel(
        cancel,
        driver.wait_for_selector(&selectors.add_files_button, settings.selector_timeout),
    )
    .await?
    .map_err(|err| step("add files button", err))?;
    driver
        .click(&add_files, ClickModifiers::NONE)
        .await
        .map_err(|err| step("click add files", err))?;

    let chooser = match or_cancel(
        cancel,
        driver.wait_for_event(EventKind::FileChooser, settings.selector_timeout),
    )
    .await?
    .map_err(|err| step("file chooser", err))?
    {
        DriverEvent::FileChooser(chooser) => chooser,
        other => {
            return Err(HarvestError::new(
                FailureKind::Driver,
                format!("expected a file chooser, got {:?}", other.kind()),
            ))
        }
    };
    if files.len() > 1 && !chooser.multiple {
        return Err(HarvestError::new(
            FailureKind::InvalidRequest,
            "file chooser accepts a single file",
        ));
    }
    driver
        .set_files(&chooser, files)
        .await
        .map_err(|err| step("attach files", err))?;
    engine_debug!("Attached {} file(s)", files.len());

    let recipient_input = or_cancel(
        cancel,
        driver.wait_for_selector(&selectors.recipient_input, settings.selector_timeout),
    )
    .await?
    .map_err(|err| step("recipient field", err))?;
    driver
        .fill(&recipient_input, recipient)
        .await
        .map_err(|err| step("fill recipient", err))?;

    let send = or_cancel(
        cancel,
        driver.wait_for_selector(&selectors.send_button, settings.selector_timeout),
    )
    .await?
    .map_err(|err| step("send button", err))?;
    driver
        .click(&send, ClickModifiers::NONE)
        .await
        .map_err(|err| step("click send", err))?;
    engine_info!("Sending {} file(s) to {}", files.len(), recipient);

    CompletionMonitor::new(driver, settings, cancel)
        .await_completion(settings.completion_timeout)
        .await
}
