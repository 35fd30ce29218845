use chrono::{DateTime, Utc};

/// Which feed entries a harvest is interested in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Case-sensitive prefix the entry title must start with.
    pub title_prefix: String,
    /// Last synced instant; entries at or before it were already harvested.
    pub cutoff: DateTime<Utc>,
}

impl FilterCriteria {
    pub fn new(title_prefix: impl Into<String>, cutoff: DateTime<Utc>) -> Self {
        Self {
            title_prefix: title_prefix.into(),
            cutoff,
        }
    }

    pub fn title_matches(&self, title: &str) -> bool {
        title.trim_start().starts_with(&self.title_prefix)
    }

    /// True when `timestamp` is not newer than the cutoff.
    pub fn is_stale(&self, timestamp: DateTime<Utc>) -> bool {
        self.cutoff >= timestamp
    }
}

/// Filter for the nested files listed inside one feed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub name_suffix: String,
}

impl FileFilter {
    pub fn new(name_suffix: impl Into<String>) -> Self {
        Self {
            name_suffix: name_suffix.into(),
        }
    }

    pub fn matches(&self, file_name: &str) -> bool {
        file_name.trim().ends_with(&self.name_suffix)
    }
}
