use std::fmt;

/// One row of the activity feed as read from the currently rendered window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub title: String,
    pub subtext: String,
    /// Whatever date-ish text the row shows. Rows usually carry a relative
    /// label ("2 days ago"), so the authoritative timestamp is read from the
    /// detail view instead.
    pub raw_timestamp_text: String,
    /// Stable id, for drivers that can expose one.
    pub server_id: Option<String>,
}

impl ActivityEntry {
    pub fn new(
        title: impl Into<String>,
        subtext: impl Into<String>,
        raw_timestamp_text: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            subtext: subtext.into(),
            raw_timestamp_text: raw_timestamp_text.into(),
            server_id: None,
        }
    }

    pub fn with_server_id(mut self, id: impl Into<String>) -> Self {
        self.server_id = Some(id.into());
        self
    }

    pub fn identity(&self) -> EntryIdentity {
        match self.server_id.as_deref() {
            Some(id) if !id.trim().is_empty() => EntryIdentity::from_server_id(id),
            _ => EntryIdentity::from_text(&self.title, &self.subtext),
        }
    }
}

/// Identity of a feed item for the duration of one harvest.
///
/// The feed has no ids of its own, so by default the identity is the trimmed
/// `title::subtext` pair. It must be stable across passes over the same
/// scroll position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryIdentity(String);

impl EntryIdentity {
    pub fn from_text(title: &str, subtext: &str) -> Self {
        Self(format!("{}::{}", title.trim(), subtext.trim()))
    }

    pub fn from_server_id(id: &str) -> Self {
        Self(format!("id:{}", id.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
