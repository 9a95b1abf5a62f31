use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

/// A single named slot holding the serialized schedule.
pub trait ScheduleStore {
    /// `Ok(None)` when nothing has been stored yet.
    fn read_slot(&self) -> Result<Option<String>>;
    fn write_slot(&mut self, content: &str) -> Result<()>;
}

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScheduleStore for FileStore {
    fn read_slot(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err)
                .with_context(|| format!("unable to read schedule file {}", self.path.display())),
        }
    }

    fn write_slot(&mut self, content: &str) -> Result<()> {
        fs::write(&self.path, format!("{content}\n"))
            .with_context(|| format!("unable to write schedule file {}", self.path.display()))?;
        debug!(path = %self.path.display(), "schedule written");
        Ok(())
    }
}

/// In-memory slot that counts writes.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    slot: Option<String>,
    writes: usize,
}

#[cfg(test)]
impl MemoryStore {
    pub fn with_content(content: impl Into<String>) -> Self {
        Self {
            slot: Some(content.into()),
            writes: 0,
        }
    }

    pub fn content(&self) -> Option<&str> {
        self.slot.as_deref()
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

#[cfg(test)]
impl ScheduleStore for MemoryStore {
    fn read_slot(&self) -> Result<Option<String>> {
        Ok(self.slot.clone())
    }

    fn write_slot(&mut self, content: &str) -> Result<()> {
        self.slot = Some(content.to_string());
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_file_reads_as_empty_slot() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().join("quarts.json"));
        assert_eq!(store.read_slot().expect("read"), None);
    }

    #[test]
    fn file_slot_keeps_last_write() {
        let dir = tempdir().expect("tempdir");
        let mut store = FileStore::new(dir.path().join("quarts.json"));
        store.write_slot("[1]").expect("first write");
        store.write_slot("[2]").expect("second write");
        assert_eq!(store.read_slot().expect("read").as_deref(), Some("[2]\n"));
    }

    #[test]
    fn unreadable_path_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let store = FileStore::new(dir.path());
        assert!(store.read_slot().is_err());
    }
}
