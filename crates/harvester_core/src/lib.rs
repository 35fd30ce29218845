//! Harvester core: pure scan state machine, data model and filters.
//!
//! Nothing in this crate touches the UI driver or the filesystem. The engine
//! feeds observations in as [`Msg`] values and executes the returned
//! [`Effect`]s.
mod criteria;
mod effect;
mod entry;
mod filter;
mod msg;
mod record;
mod state;
mod timestamp;
mod update;

pub use criteria::{FileFilter, FilterCriteria};
pub use effect::Effect;
pub use entry::{ActivityEntry, EntryIdentity};
pub use filter::{classify, judge, Classification, Verdict};
pub use msg::Msg;
pub use record::{DownloadedFile, FileType};
pub use state::{HarvestReport, ItemFailure, ScanLimits, ScanState, ScanStats, StopReason};
pub use timestamp::{parse_activity_timestamp, TimestampParseError};
pub use update::update;
