use crate::{ActivityEntry, DownloadedFile, EntryIdentity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// The feed surface is open and the scan can begin.
    Start,
    /// Entries currently rendered by the feed, in visible order.
    PassObserved { entries: Vec<ActivityEntry> },
    /// The feed container was not visible when a pass was attempted.
    FeedHidden,
    /// An entry was opened and its detail timestamp text read (if any).
    DetailOpened {
        identity: EntryIdentity,
        raw_timestamp: Option<String>,
    },
    /// A matched entry finished downloading and materializing.
    ItemHarvested {
        identity: EntryIdentity,
        files: Vec<DownloadedFile>,
    },
    /// A matched entry failed and the failure policy keeps the scan going.
    ItemFailed {
        identity: EntryIdentity,
        reason: String,
    },
    /// The caller asked the harvest to stop.
    Cancelled,
}
