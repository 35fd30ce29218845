use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use engine_logging::{engine_debug, engine_info, engine_warn};
use harvester_core::DownloadedFile;

use crate::HarvestSettings;

#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("io error on {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("archive {path:?} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error("archive entry {entry:?} escapes the extraction directory")]
    UnsafeEntry { entry: String },
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> MaterializeError + '_ {
    move |source| MaterializeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Turns saved downloads into [`DownloadedFile`] records.
#[derive(Debug, Clone)]
pub struct ArchiveMaterializer {
    archive_extension: String,
    materialize_direct: bool,
}

impl ArchiveMaterializer {
    pub fn new(archive_extension: impl Into<String>, materialize_direct: bool) -> Self {
        Self {
            archive_extension: archive_extension.into(),
            materialize_direct,
        }
    }

    pub fn from_settings(settings: &HarvestSettings) -> Self {
        Self::new(
            settings.archive_extension.clone(),
            settings.materialize_direct_downloads,
        )
    }

    pub fn is_archive(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| {
                name.to_ascii_lowercase()
                    .ends_with(&self.archive_extension.to_ascii_lowercase())
            })
            .unwrap_or(false)
    }

    /// Materialize one saved download, stamping every record with `provenance`.
    ///
    /// Archives are extracted next to themselves into a directory named after
    /// the archive stem, then deleted. The directory may already exist from an
    /// earlier archive with the same name; only the top-level files this
    /// archive wrote become records. Direct downloads produce no records
    /// unless direct materialization is enabled.
    pub fn materialize(
        &self,
        downloaded: &Path,
        provenance: DateTime<Utc>,
    ) -> Result<Vec<DownloadedFile>, MaterializeError> {
        if !self.is_archive(downloaded) {
            if self.materialize_direct {
                return read_record(downloaded, provenance).map(|record| vec![record]);
            }
            engine_warn!(
                "Download {:?} is not an archive; no records produced",
                downloaded
            );
            return Ok(Vec::new());
        }

        let dest = extraction_dir(downloaded);
        fs::create_dir_all(&dest).map_err(io_err(&dest))?;
        let written = extract_all(downloaded, &dest)?;
        fs::remove_file(downloaded).map_err(io_err(downloaded))?;
        engine_info!(
            "Extracted {} entries from {:?} into {:?}",
            written.len(),
            downloaded,
            dest
        );

        let mut top_level: Vec<PathBuf> = written
            .into_iter()
            .filter(|path| path.parent() == Some(dest.as_path()))
            .collect();
        top_level.sort();
        top_level.dedup();
        top_level
            .iter()
            .map(|path| read_record(path, provenance))
            .collect()
    }
}

fn extraction_dir(archive: &Path) -> PathBuf {
    let stem = archive
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "archive".into());
    archive
        .parent()
        .map(|parent| parent.join(&stem))
        .unwrap_or_else(|| PathBuf::from(stem))
}

/// Extract every entry of a zip archive under `dest`. Returns the paths of
/// the files written, in archive order.
pub fn extract_all(archive_path: &Path, dest: &Path) -> Result<Vec<PathBuf>, MaterializeError> {
    let file = File::open(archive_path).map_err(io_err(archive_path))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|err| MaterializeError::Corrupt {
        path: archive_path.to_path_buf(),
        message: err.to_string(),
    })?;

    let mut written = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| MaterializeError::Corrupt {
                path: archive_path.to_path_buf(),
                message: err.to_string(),
            })?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(MaterializeError::UnsafeEntry {
                entry: entry.name().to_string(),
            });
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(io_err(&target))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let mut out = File::create(&target).map_err(io_err(&target))?;
        io::copy(&mut entry, &mut out).map_err(io_err(&target))?;
        engine_debug!("Extracted {:?}", target);
        written.push(target);
    }
    Ok(written)
}

fn read_record(path: &Path, provenance: DateTime<Utc>) -> Result<DownloadedFile, MaterializeError> {
    let data = fs::read(path).map_err(io_err(path))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(DownloadedFile::input(file_name, path, data, provenance))
}
