use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    Input,
}

/// A harvested file ready for upload.
///
/// `updated_at` is the timestamp of the feed activity the file came from,
/// not the time it was downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedFile {
    pub file_name: String,
    pub file_path: PathBuf,
    #[serde(rename = "type")]
    pub file_type: FileType,
    pub status: Option<String>,
    pub status_history: Option<Vec<String>>,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub updated_at: DateTime<Utc>,
}

impl DownloadedFile {
    pub fn input(
        file_name: impl Into<String>,
        file_path: impl Into<PathBuf>,
        data: Vec<u8>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            file_path: file_path.into(),
            file_type: FileType::Input,
            status: None,
            status_history: None,
            data,
            updated_at,
        }
    }
}
