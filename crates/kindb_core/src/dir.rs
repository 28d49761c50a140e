//! Store directory management.
//!
//! A persistent store is a directory:
//!
//! ```text
//! <path>/
//! ├─ lock          # Advisory lock for the single writer
//! ├─ backend.txt   # Engine and payload format, written at creation
//! └─ kindb.redb    # or sqlite.db, depending on the engine
//! ```
//!
//! The lock file is removed on clean close. A read-only open takes no
//! lock and creates nothing.

use crate::config::BackendKind;
use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use kindb_codec::Serializer;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "lock";
const LAYOUT_FILE: &str = "backend.txt";
const LAYOUT_TEMP: &str = "backend.txt.tmp";

/// Engine and payload format recorded for an existing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Physical engine.
    pub backend: BackendKind,
    /// Payload format.
    pub serializer: Serializer,
}

/// Owns a store directory and, for writers, its lock.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    lock: Option<File>,
}

impl StoreDir {
    /// Opens or creates a store directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (`DatabaseLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool, read_only: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing && !read_only {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }
        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock = if read_only {
            None
        } else {
            let lock_path = path.join(LOCK_FILE);
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&lock_path)?;
            if file.try_lock_exclusive().is_err() {
                return Err(CoreError::DatabaseLocked {
                    path: lock_path.display().to_string(),
                });
            }
            Some(file)
        };

        Ok(Self {
            path: path.to_path_buf(),
            lock,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the engine file for `backend`.
    #[must_use]
    pub fn engine_path(&self, backend: BackendKind) -> PathBuf {
        self.path.join(backend.file_name())
    }

    /// Path of the lock file.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.path.join(LOCK_FILE)
    }

    /// Reads the recorded layout, or `None` for a new directory.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the file names an unknown engine or format.
    pub fn load_layout(&self) -> CoreResult<Option<Layout>> {
        let path = self.path.join(LAYOUT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        let backend = lines
            .next()
            .ok_or_else(|| CoreError::invalid_format("backend.txt is empty"))?
            .parse::<BackendKind>()?;
        let serializer = match lines.next() {
            Some(name) => name
                .parse::<Serializer>()
                .map_err(|e| CoreError::invalid_format(e.to_string()))?,
            None => Serializer::Blob,
        };
        Ok(Some(Layout {
            backend,
            serializer,
        }))
    }

    /// Records the layout with a write-then-rename.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn save_layout(&self, layout: Layout) -> CoreResult<()> {
        let temp = self.path.join(LAYOUT_TEMP);
        let mut file = File::create(&temp)?;
        writeln!(file, "{}", layout.backend.name())?;
        writeln!(file, "{}", layout.serializer.name())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp, self.path.join(LAYOUT_FILE))?;
        Ok(())
    }

    /// Unlocks and deletes the lock file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the lock file cannot be removed.
    pub fn release(&mut self) -> CoreResult<()> {
        if let Some(file) = self.lock.take() {
            // Closing the handle drops the OS lock as well.
            let _ = file.unlock();
            drop(file);
            match fs::remove_file(self.lock_path()) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// True if this handle holds the writer lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_new_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("tree");
        let dir = StoreDir::open(&path, true, false).unwrap();
        assert!(path.is_dir());
        assert!(dir.lock_path().exists());
        assert!(dir.is_locked());
    }

    #[test]
    fn missing_directory_without_create() {
        let temp = tempdir().unwrap();
        let result = StoreDir::open(&temp.path().join("nope"), false, false);
        assert!(matches!(result, Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn second_writer_is_refused() {
        let temp = tempdir().unwrap();
        let _first = StoreDir::open(temp.path(), true, false).unwrap();
        let second = StoreDir::open(temp.path(), true, false);
        assert!(matches!(second, Err(CoreError::DatabaseLocked { .. })));
    }

    #[test]
    fn read_only_takes_no_lock() {
        let temp = tempdir().unwrap();
        let _writer = StoreDir::open(temp.path(), true, false).unwrap();
        let reader = StoreDir::open(temp.path(), false, true).unwrap();
        assert!(!reader.is_locked());
    }

    #[test]
    fn release_removes_lock_file() {
        let temp = tempdir().unwrap();
        let mut dir = StoreDir::open(temp.path(), true, false).unwrap();
        dir.release().unwrap();
        assert!(!dir.lock_path().exists());
        let _again = StoreDir::open(temp.path(), true, false).unwrap();
    }

    #[test]
    fn layout_round_trip() {
        let temp = tempdir().unwrap();
        let dir = StoreDir::open(temp.path(), true, false).unwrap();
        assert_eq!(dir.load_layout().unwrap(), None);
        let layout = Layout {
            backend: BackendKind::Sqlite,
            serializer: Serializer::Json,
        };
        dir.save_layout(layout).unwrap();
        assert_eq!(dir.load_layout().unwrap(), Some(layout));
    }
}
