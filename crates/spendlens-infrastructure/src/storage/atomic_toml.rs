//! TOML documents that are only ever replaced whole.
//!
//! A save writes a hidden sibling (`.<name>.tmp`), fsyncs it, and renames it
//! over the target, so a reader sees either the old or the new document.
//! Read-modify-write cycles hold an exclusive `fs2` lock on `<name>.lock`.

use serde::{Serialize, de::DeserializeOwned};
use spendlens_core::SpendError;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Failure of a [`AtomicTomlFile`] operation, carrying the affected path.
#[derive(Debug)]
pub enum AtomicTomlError {
    Read { path: PathBuf, source: io::Error },
    Write { path: PathBuf, source: io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    Encode(toml::ser::Error),
    Lock { path: PathBuf, message: String },
    /// The update closure refused the change.
    Aborted(String),
}

impl AtomicTomlError {
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::Aborted(reason.into())
    }
}

impl std::fmt::Display for AtomicTomlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => write!(f, "Failed to read {}: {}", path.display(), source),
            Self::Write { path, source } => {
                write!(f, "Failed to write {}: {}", path.display(), source)
            }
            Self::Parse { path, source } => {
                write!(f, "{} is not valid TOML: {}", path.display(), source)
            }
            Self::Encode(e) => write!(f, "Failed to encode TOML: {}", e),
            Self::Lock { path, message } => write!(f, "Failed to lock {}: {}", path.display(), message),
            Self::Aborted(reason) => write!(f, "Update aborted: {}", reason),
        }
    }
}

impl std::error::Error for AtomicTomlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } | Self::Write { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Encode(e) => Some(e),
            Self::Lock { .. } | Self::Aborted(_) => None,
        }
    }
}

impl From<AtomicTomlError> for SpendError {
    fn from(err: AtomicTomlError) -> Self {
        match err {
            AtomicTomlError::Parse { source, .. } => source.into(),
            AtomicTomlError::Encode(source) => source.into(),
            AtomicTomlError::Read { .. } | AtomicTomlError::Write { .. } => {
                SpendError::io(err.to_string())
            }
            AtomicTomlError::Lock { .. } | AtomicTomlError::Aborted(_) => {
                SpendError::storage(err.to_string())
            }
        }
    }
}

/// A handle to a TOML file that is only ever replaced atomically.
pub struct AtomicTomlFile<T> {
    path: PathBuf,
    /// Unix permission bits applied to every written file.
    mode: Option<u32>,
    _document: PhantomData<T>,
}

impl<T> AtomicTomlFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            mode: None,
            _document: PhantomData,
        }
    }

    /// Restricts written files to `mode` (e.g. `0o600`). Ignored off Unix.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the document.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: the parsed document
    /// - `Ok(None)`: no file, or a blank one
    /// - `Err`: unreadable or not valid TOML for `T`
    pub fn load(&self) -> Result<Option<T>, AtomicTomlError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(AtomicTomlError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if content.trim().is_empty() {
            return Ok(None);
        }

        toml::from_str(&content)
            .map(Some)
            .map_err(|source| AtomicTomlError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    /// Replaces the file with `document`, creating parent directories.
    pub fn save(&self, document: &T) -> Result<(), AtomicTomlError> {
        let encoded = toml::to_string_pretty(document).map_err(AtomicTomlError::Encode)?;
        let tmp_path = self.temp_path()?;

        self.write_temp(&tmp_path, encoded.as_bytes())
            .and_then(|()| fs::rename(&tmp_path, &self.path))
            .map_err(|source| {
                let _ = fs::remove_file(&tmp_path);
                AtomicTomlError::Write {
                    path: self.path.clone(),
                    source,
                }
            })
    }

    /// Loads (or starts from `default_value`), applies `f`, and saves, all
    /// under the exclusive lock. Nothing is written if `f` fails.
    ///
    /// Returns the saved document.
    pub fn update<F>(&self, default_value: T, f: F) -> Result<T, AtomicTomlError>
    where
        F: FnOnce(&mut T) -> Result<(), AtomicTomlError>,
    {
        let _lock = FileLock::acquire(&self.path)?;

        let mut document = self.load()?.unwrap_or(default_value);
        f(&mut document)?;
        self.save(&document)?;

        Ok(document)
    }

    /// Deletes the file. A missing file is not an error.
    pub fn remove(&self) -> Result<(), AtomicTomlError> {
        let _lock = FileLock::acquire(&self.path)?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(AtomicTomlError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn temp_path(&self) -> Result<PathBuf, AtomicTomlError> {
        let file_name = self.path.file_name().ok_or_else(|| AtomicTomlError::Write {
            path: self.path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        })?;
        Ok(self
            .path
            .with_file_name(format!(".{}.tmp", file_name.to_string_lossy())))
    }

    fn write_temp(&self, tmp_path: &Path, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = tmp_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(tmp_path)?;
        self.apply_mode(&file)?;
        file.write_all(bytes)?;
        file.sync_all()
    }

    #[cfg(unix)]
    fn apply_mode(&self, file: &File) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        match self.mode {
            Some(mode) => file.set_permissions(fs::Permissions::from_mode(mode)),
            None => Ok(()),
        }
    }

    #[cfg(not(unix))]
    fn apply_mode(&self, _file: &File) -> io::Result<()> {
        Ok(())
    }
}

/// Exclusive advisory lock on `<path>.lock`, released on drop.
struct FileLock {
    _file: File,
    lock_path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self, AtomicTomlError> {
        let lock_path = path.with_extension("lock");
        let lock_error = |message: String| AtomicTomlError::Lock {
            path: lock_path.clone(),
            message,
        };

        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|e| lock_error(e.to_string()))?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| lock_error(e.to_string()))?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()
                .map_err(|e| lock_error(e.to_string()))?;
        }

        Ok(FileLock {
            _file: file,
            lock_path,
        })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}
