use std::fmt;

use crate::driver::DriverError;
use crate::materialize::MaterializeError;
use crate::persist::PersistError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct HarvestError {
    pub kind: FailureKind,
    pub message: String,
}

impl HarvestError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(FailureKind::Cancelled, "harvest cancelled")
    }

    /// Wrap a driver failure under the kind of the step it happened in.
    pub(crate) fn from_driver(kind: FailureKind, context: &str, err: DriverError) -> Self {
        Self::new(kind, format!("{context}: {err}"))
    }

    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Authentication,
    /// The feed surface could not be re-established.
    PaginationStall,
    /// Opening an item or its download surface failed.
    ItemDetail,
    /// No nested files matched, or the selection UI was missing.
    Selection,
    DownloadTimeout,
    Extraction,
    TimestampParse,
    /// Completion could not be confirmed either way.
    CompletionUnknown,
    /// The portal reported an error while completing an operation.
    CompletionFailed,
    Timeout,
    InvalidRequest,
    Settings,
    Driver,
    Io,
    Cancelled,
}

impl FailureKind {
    /// Non-fatal kinds are absorbed where they occur and never abort a harvest.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            FailureKind::Selection | FailureKind::TimestampParse | FailureKind::CompletionUnknown
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Authentication => write!(f, "authentication failed"),
            FailureKind::PaginationStall => write!(f, "feed did not appear"),
            FailureKind::ItemDetail => write!(f, "item detail failed"),
            FailureKind::Selection => write!(f, "nothing to select"),
            FailureKind::DownloadTimeout => write!(f, "download did not start"),
            FailureKind::Extraction => write!(f, "extraction failed"),
            FailureKind::TimestampParse => write!(f, "unparseable timestamp"),
            FailureKind::CompletionUnknown => write!(f, "completion unknown"),
            FailureKind::CompletionFailed => write!(f, "completion failed"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::InvalidRequest => write!(f, "invalid request"),
            FailureKind::Settings => write!(f, "settings error"),
            FailureKind::Driver => write!(f, "driver error"),
            FailureKind::Io => write!(f, "io error"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl From<PersistError> for HarvestError {
    fn from(err: PersistError) -> Self {
        HarvestError::new(FailureKind::Io, err.to_string())
    }
}

impl From<MaterializeError> for HarvestError {
    fn from(err: MaterializeError) -> Self {
        HarvestError::new(FailureKind::Extraction, err.to_string())
    }
}
