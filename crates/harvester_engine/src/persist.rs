use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("directory {path:?} is missing or not writable: {message}")]
    OutputDir { path: PathBuf, message: String },
    #[error("cannot write {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("storage key {0:?} must be a relative path inside the root")]
    InvalidKey(String),
    #[error("cannot serialize {what}: {message}")]
    Serialize { what: String, message: String },
}

/// Create `dir` if needed and check that files can be created in it.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    let fail = |message: String| PersistError::OutputDir {
        path: dir.to_path_buf(),
        message,
    };
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => return Err(fail("not a directory".to_string())),
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| fail(e.to_string()))?;
        }
        Err(err) => return Err(fail(err.to_string())),
    }
    NamedTempFile::new_in(dir).map_err(|e| fail(e.to_string()))?;
    Ok(())
}

/// Writes files under a root directory by storage key, atomically: content
/// goes to a temp file in the target directory which is then renamed over
/// the destination.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    root: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a `/`-separated key maps to. Keys may not be absolute or climb
    /// out of the root.
    pub fn resolve(&self, key: &str) -> Result<PathBuf, PersistError> {
        let relative = Path::new(key);
        let plain = !key.is_empty()
            && !key.contains('\\')
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !plain {
            return Err(PersistError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    pub fn write(&self, key: &str, content: &str) -> Result<PathBuf, PersistError> {
        self.write_bytes(key, content.as_bytes())
    }

    pub fn write_bytes(&self, key: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        let target = self.resolve(key)?;
        let dir = target.parent().unwrap_or(&self.root).to_path_buf();
        ensure_output_dir(&dir)?;

        let io_err = |source| PersistError::Io {
            path: target.clone(),
            source,
        };
        let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        tmp.write_all(content).map_err(io_err)?;
        tmp.as_file_mut().sync_all().map_err(io_err)?;

        // Rename does not replace an existing file on every platform.
        if target.exists() {
            fs::remove_file(&target).map_err(io_err)?;
        }
        tmp.persist(&target).map_err(|e| io_err(e.error))?;
        Ok(target)
    }
}
