//! JSON file history store.
//!
//! Commits write a sibling temp file and rename it over the target, so a
//! reader never sees a half-written document.

use crate::domain::error::NavsyncError;
use crate::domain::store::Store;
use crate::ports::store_port::StorePort;
use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub struct JsonStoreAdapter {
    path: PathBuf,
}

impl JsonStoreAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corrupt(&self, reason: impl ToString) -> NavsyncError {
        NavsyncError::StoreCorrupt {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    fn write_error(&self, reason: impl ToString) -> NavsyncError {
        NavsyncError::StoreWrite {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl StorePort for JsonStoreAdapter {
    fn load(&self) -> Result<Option<Store>, NavsyncError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.corrupt(format!("unreadable: {e}"))),
        };

        let store: Store = serde_json::from_str(&content).map_err(|e| self.corrupt(e))?;
        store.validate().map_err(|e| self.corrupt(e))?;
        Ok(Some(store))
    }

    fn commit(&self, store: &Store) -> Result<(), NavsyncError> {
        let dir = self.parent_dir();
        fs::create_dir_all(&dir).map_err(|e| self.write_error(e))?;

        let tmp = NamedTempFile::new_in(&dir).map_err(|e| self.write_error(e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, store).map_err(|e| self.write_error(e))?;
            writer.write_all(b"\n").map_err(|e| self.write_error(e))?;
            writer.flush().map_err(|e| self.write_error(e))?;
        }
        tmp.as_file().sync_all().map_err(|e| self.write_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.write_error(e.error))?;
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
