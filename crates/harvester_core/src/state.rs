use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::{DownloadedFile, EntryIdentity, FilterCriteria};

/// Termination bounds for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLimits {
    /// Unproductive passes allowed before giving up.
    pub max_scroll_attempts: u32,
    /// Consecutive passes that may find the feed hidden.
    pub max_hidden_retries: u32,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            max_scroll_attempts: 50,
            max_hidden_retries: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Reached an entry at or before the cutoff.
    CutoffReached,
    /// Too many passes in a row produced nothing.
    AttemptsExhausted,
    /// The very first pass showed no entries.
    EmptyFeed,
    /// The feed container stayed hidden.
    FeedUnavailable,
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::CutoffReached => write!(f, "cutoff reached"),
            StopReason::AttemptsExhausted => write!(f, "scroll attempts exhausted"),
            StopReason::EmptyFeed => write!(f, "empty feed"),
            StopReason::FeedUnavailable => write!(f, "feed unavailable"),
            StopReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScanStats {
    pub passes: u32,
    pub scrolls: u32,
    pub duplicates_skipped: u32,
    pub unmatched_skipped: u32,
    pub unparseable_timestamps: u32,
    pub items_processed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub identity: String,
    pub reason: String,
}

/// What a finished scan hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    /// Harvested files in feed order.
    pub files: Vec<DownloadedFile>,
    pub stop_reason: StopReason,
    pub stats: ScanStats,
    /// Only populated when the engine runs with a collect-and-continue policy.
    pub failures: Vec<ItemFailure>,
}

/// All mutable state of one harvest scan.
///
/// Lives for a single harvest call; nothing here is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanState {
    criteria: FilterCriteria,
    limits: ScanLimits,
    visited: HashSet<EntryIdentity>,
    scroll_attempts: u32,
    /// Scrolls from the top of the feed to the current read position.
    depth: u32,
    hidden_retries: u32,
    seen_entries: bool,
    stats: ScanStats,
    files: Vec<DownloadedFile>,
    failures: Vec<ItemFailure>,
    stop_reason: Option<StopReason>,
}

impl ScanState {
    pub fn new(criteria: FilterCriteria, limits: ScanLimits) -> Self {
        Self {
            criteria,
            limits,
            visited: HashSet::new(),
            scroll_attempts: 0,
            depth: 0,
            hidden_retries: 0,
            seen_entries: false,
            stats: ScanStats::default(),
            files: Vec::new(),
            failures: Vec::new(),
            stop_reason: None,
        }
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn limits(&self) -> ScanLimits {
        self.limits
    }

    pub fn visited(&self) -> &HashSet<EntryIdentity> {
        &self.visited
    }

    pub fn has_visited(&self, identity: &EntryIdentity) -> bool {
        self.visited.contains(identity)
    }

    pub fn scroll_attempts(&self) -> u32 {
        self.scroll_attempts
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn files(&self) -> &[DownloadedFile] {
        &self.files
    }

    pub fn failures(&self) -> &[ItemFailure] {
        &self.failures
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn is_finished(&self) -> bool {
        self.stop_reason.is_some()
    }

    /// Consume the state into a report. An unfinished scan reports as cancelled.
    pub fn into_report(self) -> HarvestReport {
        HarvestReport {
            files: self.files,
            stop_reason: self.stop_reason.unwrap_or(StopReason::Cancelled),
            stats: self.stats,
            failures: self.failures,
        }
    }

    pub(crate) fn mark_visited(&mut self, identity: EntryIdentity) {
        self.visited.insert(identity);
    }

    pub(crate) fn observe_pass(&mut self, non_empty: bool) -> bool {
        let first = self.stats.passes == 0;
        self.stats.passes += 1;
        self.hidden_retries = 0;
        if non_empty {
            self.seen_entries = true;
        }
        first && !self.seen_entries
    }

    pub(crate) fn note_duplicate(&mut self) {
        self.stats.duplicates_skipped += 1;
    }

    pub(crate) fn note_unmatched(&mut self) {
        self.stats.unmatched_skipped += 1;
    }

    pub(crate) fn note_unparseable(&mut self) {
        self.stats.unparseable_timestamps += 1;
    }

    /// Spend one unit of the attempt budget. Returns false once it is used up.
    pub(crate) fn spend_attempt(&mut self) -> bool {
        self.scroll_attempts += 1;
        self.scroll_attempts < self.limits.max_scroll_attempts
    }

    pub(crate) fn note_scroll(&mut self) {
        self.stats.scrolls += 1;
        self.depth += 1;
    }

    /// Returns false once the hidden-feed retry ceiling is exceeded.
    pub(crate) fn note_hidden(&mut self) -> bool {
        self.hidden_retries += 1;
        self.hidden_retries <= self.limits.max_hidden_retries
    }

    pub(crate) fn record_harvest(&mut self, files: Vec<DownloadedFile>) {
        self.files.extend(files);
        self.stats.items_processed += 1;
        self.scroll_attempts = 0;
    }

    pub(crate) fn record_failure(&mut self, identity: &EntryIdentity, reason: String) {
        self.failures.push(ItemFailure {
            identity: identity.to_string(),
            reason,
        });
    }

    pub(crate) fn finish(&mut self, reason: StopReason) {
        if self.stop_reason.is_none() {
            self.stop_reason = Some(reason);
        }
    }
}
