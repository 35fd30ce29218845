//! Bounded waits. Every suspension point observes the cancellation token.
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{FailureKind, HarvestError};

pub(crate) async fn sleep_or_cancel(
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), HarvestError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(HarvestError::cancelled()),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Await `work` unless the token fires first.
pub(crate) async fn or_cancel<T>(
    cancel: &CancellationToken,
    work: impl Future<Output = T>,
) -> Result<T, HarvestError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(HarvestError::cancelled()),
        value = work => Ok(value),
    }
}

/// Run `probe` every `interval` until it yields a value or `timeout` elapses.
///
/// A probe error ends the wait immediately. On timeout the error carries
/// `timeout_kind`.
pub(crate) async fn poll_until<T, F, Fut>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    timeout_kind: FailureKind,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<T, HarvestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, HarvestError>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if cancel.is_cancelled() {
            return Err(HarvestError::cancelled());
        }
        if let Some(value) = probe().await? {
            return Ok(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(HarvestError::new(
                timeout_kind,
                format!("{what} not reached within {timeout:?}"),
            ));
        }
        sleep_or_cancel(interval.min(deadline - now), cancel).await?;
    }
}
