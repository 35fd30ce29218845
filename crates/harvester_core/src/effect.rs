use chrono::{DateTime, Utc};

use crate::{EntryIdentity, StopReason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Read the currently rendered entries.
    ReadPass,
    /// Give the feed time to render, then read again without scrolling.
    RetryPass,
    /// Scroll the feed container by one increment and let it settle.
    Scroll,
    /// Open an entry from the latest pass and read its detail timestamp.
    OpenEntry { identity: EntryIdentity },
    /// Download and materialize the files of the opened entry.
    Download {
        identity: EntryIdentity,
        timestamp: DateTime<Utc>,
    },
    /// Navigate back to the feed so scanning can continue.
    ReturnToFeed,
    /// The scan is over.
    Finish { reason: StopReason },
}
