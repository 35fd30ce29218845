use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::{ActivityEntry, EntryIdentity, FilterCriteria};

/// List-level decision for one visible entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Already visited during this harvest.
    SkipDuplicate,
    /// Title does not carry the wanted prefix. Not recorded as visited.
    SkipNoMatch,
    /// Worth opening; the caller must mark it visited before acting on it.
    Candidate(EntryIdentity),
}

/// Detail-level decision once the entry's real timestamp is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Match,
    /// The feed is newest-first, so everything after this entry is stale too.
    StopScan,
}

pub fn classify(
    entry: &ActivityEntry,
    criteria: &FilterCriteria,
    visited: &HashSet<EntryIdentity>,
) -> Classification {
    let identity = entry.identity();
    if visited.contains(&identity) {
        return Classification::SkipDuplicate;
    }
    if !criteria.title_matches(&entry.title) {
        return Classification::SkipNoMatch;
    }
    Classification::Candidate(identity)
}

pub fn judge(timestamp: DateTime<Utc>, criteria: &FilterCriteria) -> Verdict {
    if criteria.is_stale(timestamp) {
        Verdict::StopScan
    } else {
        Verdict::Match
    }
}
