use std::future::Future;
use std::sync::Arc;

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use tokio_util::sync::CancellationToken;

use crate::diagnostics::capture_failure_screenshot;
use crate::driver::{first_visible, ClickModifiers, UiDriver};
use crate::wait::or_cancel;
use crate::{FailureKind, HarvestError, HarvestSettings, SessionConfig};

/// Log in with the portal's two-step form: identifier first, then password.
pub async fn authenticate(
    driver: &dyn UiDriver,
    session: &SessionConfig,
    settings: &HarvestSettings,
    cancel: &CancellationToken,
) -> Result<(), HarvestError> {
    let selectors = &settings.selectors;
    let login_url = session.login_url()?;
    let auth = |context: &str, err| HarvestError::from_driver(FailureKind::Authentication, context, err);

    engine_info!("Opening portal at {}", login_url);
    or_cancel(cancel, driver.open(login_url.as_str()))
        .await?
        .map_err(|err| auth("open login page", err))?;

    let username = or_cancel(
        cancel,
        driver.wait_for_selector(&selectors.username_input, settings.navigation_timeout),
    )
    .await?
    .map_err(|err| auth("username field", err))?;
    driver
        .fill(&username, &session.username)
        .await
        .map_err(|err| auth("fill username", err))?;
    let next = or_cancel(
        cancel,
        driver.wait_for_selector(&selectors.continue_button, settings.selector_timeout),
    )
    .await?
    .map_err(|err| auth("continue button", err))?;
    driver
        .click(&next, ClickModifiers::NONE)
        .await
        .map_err(|err| auth("click continue", err))?;

    let password = or_cancel(
        cancel,
        driver.wait_for_selector(&selectors.password_input, settings.selector_timeout),
    )
    .await?
    .map_err(|err| auth("password field", err))?;
    driver
        .fill(&password, &session.password)
        .await
        .map_err(|err| auth("fill password", err))?;
    let submit = or_cancel(
        cancel,
        driver.wait_for_selector(&selectors.sign_in_button, settings.selector_timeout),
    )
    .await?
    .map_err(|err| auth("sign-in button", err))?;
    driver
        .click(&submit, ClickModifiers::NONE)
        .await
        .map_err(|err| auth("click sign in", err))?;

    match or_cancel(
        cancel,
        driver.wait_for_selector(&selectors.feed_container, session.timeout),
    )
    .await?
    {
        Ok(_) => {
            engine_info!("Signed in as {}", session.username);
            Ok(())
        }
        Err(err) => {
            let reason = match first_visible(driver, &selectors.login_error).await {
                Ok(Some(handle)) => driver.text_content(&handle).await.ok().flatten(),
                _ => None,
            };
            Err(HarvestError::new(
                FailureKind::Authentication,
                reason
                    .map(|text| text.trim().to_string())
                    .filter(|text| !text.is_empty())
                    .unwrap_or_else(|| format!("feed did not appear after sign in: {err}")),
            ))
        }
    }
}

/// Run `work` inside an authenticated session.
///
/// The driver is closed on every exit path. On failure a diagnostic
/// screenshot is attempted before the error is returned.
pub async fn with_session<T, F, Fut>(
    driver: Arc<dyn UiDriver>,
    session: &SessionConfig,
    settings: &HarvestSettings,
    cancel: &CancellationToken,
    work: F,
) -> Result<T, HarvestError>
where
    F: FnOnce(Arc<dyn UiDriver>) -> Fut,
    Fut: Future<Output = Result<T, HarvestError>>,
{
    let outcome = match authenticate(driver.as_ref(), session, settings, cancel).await {
        Ok(()) => work(driver.clone()).await,
        Err(err) => Err(err),
    };

    match &outcome {
        Err(err) if err.kind == FailureKind::Cancelled => engine_warn!("Session work cancelled"),
        Err(err) => {
            engine_error!("Session work failed: {}", err);
            capture_failure_screenshot(driver.as_ref(), &settings.logs_dir).await;
        }
        Ok(_) => {}
    }

    match driver.close().await {
        Ok(()) => engine_debug!("Session closed"),
        Err(err) => engine_warn!("Failed to close session cleanly: {}", err),
    }
    outcome
}
