use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Datelike;
use engine_logging::{engine_info, engine_warn};
use harvester_core::{DownloadedFile, HarvestReport};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::filename::safe_file_name;
use crate::persist::{AtomicFileWriter, PersistError};

pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Consumer of harvested files.
pub trait UploadSink {
    /// Store every record and return the keys they were stored under, in order.
    fn publish(&self, files: &[DownloadedFile]) -> Result<Vec<String>, PersistError>;
}

/// Date-partitioned object key: `<prefix>/<YYYY>/<MM>/<DD>/<fileName>`,
/// dated by the activity the file came from.
pub fn storage_key(prefix: &str, file: &DownloadedFile) -> String {
    let date = file.updated_at.date_naive();
    let name = safe_file_name(&file.file_name);
    let partition = format!("{:04}/{:02}/{:02}", date.year(), date.month(), date.day());
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{partition}/{name}")
    } else {
        format!("{prefix}/{partition}/{name}")
    }
}

/// Stores records as files under a local root, one directory per key segment.
#[derive(Debug, Clone)]
pub struct DirectoryUploadSink {
    root: PathBuf,
    prefix: String,
}

impl DirectoryUploadSink {
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
        }
    }
}

impl UploadSink for DirectoryUploadSink {
    fn publish(&self, files: &[DownloadedFile]) -> Result<Vec<String>, PersistError> {
        let writer = AtomicFileWriter::new(self.root.clone());
        let mut keys = Vec::with_capacity(files.len());
        let mut taken = HashSet::with_capacity(files.len());
        for file in files {
            let key = unique_key(storage_key(&self.prefix, file), &taken);
            writer.write_bytes(&key, &file.data)?;
            taken.insert(key.clone());
            keys.push(key);
        }
        engine_info!("Published {} file(s) under {:?}", keys.len(), writer.root());
        Ok(keys)
    }
}

/// Same-named files from the same day would share a key; later ones get a
/// numeric suffix before the extension.
fn unique_key(key: String, taken: &HashSet<String>) -> String {
    if !taken.contains(&key) {
        return key;
    }
    let (dir, name) = key.rsplit_once('/').unwrap_or(("", key.as_str()));
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (name, String::new()),
    };
    let mut n = 2;
    loop {
        let candidate = if dir.is_empty() {
            format!("{stem}-{n}{ext}")
        } else {
            format!("{dir}/{stem}-{n}{ext}")
        };
        if !taken.contains(&candidate) {
            engine_warn!("Key {} already used in this batch; publishing as {}", key, candidate);
            return candidate;
        }
        n += 1;
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Write a JSON manifest describing a finished harvest into `dir`.
pub fn write_manifest(
    dir: &Path,
    report: &HarvestReport,
    filename: &str,
) -> Result<PathBuf, PersistError> {
    let manifest = json!({
        "stop_reason": report.stop_reason,
        "file_count": report.files.len(),
        "stats": report.stats,
        "failures": report.failures,
        "files": report.files.iter().map(|file| {
            json!({
                "fileName": file.file_name,
                "filePath": file.file_path,
                "type": file.file_type,
                "updatedAt": file.updated_at.to_rfc3339(),
                "bytes": file.data.len(),
                "sha256": sha256_hex(&file.data),
            })
        }).collect::<Vec<_>>()
    });
    let pretty =
        serde_json::to_string_pretty(&manifest).map_err(|err| PersistError::Serialize {
            what: "manifest".to_string(),
            message: err.to_string(),
        })?;
    AtomicFileWriter::new(dir.to_path_buf()).write(filename, &pretty)
}
