//! The capability set the engine needs from whatever drives the portal UI.
//!
//! Implementations wrap a real browser automation stack; the engine only ever
//! talks to this trait. Calls are made one at a time by a single owner, never
//! concurrently against the same session.
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Opaque reference to a rendered element.
///
/// Handles may go stale when the page re-renders; drivers report that as
/// [`DriverError::StaleHandle`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClickModifiers {
    /// Add to the current selection instead of replacing it (Ctrl/Cmd click).
    pub multi_select: bool,
}

impl ClickModifiers {
    pub const NONE: Self = Self {
        multi_select: false,
    };
    pub const MULTI_SELECT: Self = Self { multi_select: true };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    FileChooser,
    DownloadStarted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChooser {
    pub id: String,
    pub multiple: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDownload {
    pub id: String,
    pub suggested_filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    FileChooser(FileChooser),
    DownloadStarted(PendingDownload),
}

impl DriverEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DriverEvent::FileChooser(_) => EventKind::FileChooser,
            DriverEvent::DownloadStarted(_) => EventKind::DownloadStarted,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },
    #[error("element not found: {0}")]
    NotFound(String),
    #[error("stale element handle: {0}")]
    StaleHandle(String),
    #[error("interaction failed: {0}")]
    Interaction(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout { .. })
    }

    /// Errors caused by the page re-rendering under us rather than by a broken session.
    pub fn is_transient(&self) -> bool {
        matches!(self, DriverError::StaleHandle(_) | DriverError::NotFound(_))
    }
}

#[async_trait::async_trait]
pub trait UiDriver: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    async fn locate(&self, selector: &str) -> Result<Vec<ElementHandle>, DriverError>;

    async fn locate_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DriverError>;

    async fn is_visible(&self, handle: &ElementHandle) -> Result<bool, DriverError>;

    async fn click(
        &self,
        handle: &ElementHandle,
        modifiers: ClickModifiers,
    ) -> Result<(), DriverError>;

    async fn fill(&self, handle: &ElementHandle, text: &str) -> Result<(), DriverError>;

    async fn scroll(&self, container: &ElementHandle, delta_px: i64) -> Result<(), DriverError>;

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<ElementHandle, DriverError>;

    /// Wait for the next event of `kind`.
    ///
    /// Events raised since the previous wait are buffered, so a wait issued
    /// right after the triggering click still observes the event.
    async fn wait_for_event(
        &self,
        kind: EventKind,
        timeout: Duration,
    ) -> Result<DriverEvent, DriverError>;

    async fn text_content(&self, handle: &ElementHandle) -> Result<Option<String>, DriverError>;

    async fn set_files(&self, chooser: &FileChooser, paths: &[PathBuf])
        -> Result<(), DriverError>;

    async fn save_download(
        &self,
        download: &PendingDownload,
        dest: &Path,
    ) -> Result<(), DriverError>;

    async fn screenshot(&self, path: &Path) -> Result<(), DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}

/// Text of the first element matching `selector` under `parent`, trimmed.
pub(crate) async fn text_within(
    driver: &dyn UiDriver,
    parent: &ElementHandle,
    selector: &str,
) -> Result<Option<String>, DriverError> {
    let Some(handle) = driver.locate_within(parent, selector).await?.into_iter().next() else {
        return Ok(None);
    };
    Ok(driver
        .text_content(&handle)
        .await?
        .map(|text| text.trim().to_string()))
}

/// First visible element matching `selector`, if any.
pub(crate) async fn first_visible(
    driver: &dyn UiDriver,
    selector: &str,
) -> Result<Option<ElementHandle>, DriverError> {
    for handle in driver.locate(selector).await? {
        if driver.is_visible(&handle).await? {
            return Ok(Some(handle));
        }
    }
    Ok(None)
}
