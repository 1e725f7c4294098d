//! File access for the build.
//!
//! Everything the scheduler reads or writes goes through a [`FileStore`], so builds can run
//! against the disk or against an in-memory tree with a clock the test controls.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

pub trait FileStore: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<String>;

    /// Writes `contents`, creating parent directories as needed.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    fn last_modified(&self, path: &Path) -> Option<SystemTime>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFileStore;

impl FileStore for DiskFileStore {
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn last_modified(&self, path: &Path) -> Option<SystemTime> {
        std::fs::metadata(path).and_then(|m| m.modified()).ok()
    }
}

#[derive(Debug)]
struct MemoryState {
    now: SystemTime,
    files: BTreeMap<PathBuf, (String, SystemTime)>,
}

/// Files held in memory. Every write is stamped with the store's clock, which only moves
/// when [`MemoryFileStore::advance`] is called.
#[derive(Debug)]
pub struct MemoryFileStore {
    state: Mutex<MemoryState>,
}

impl Default for MemoryFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFileStore {
    pub fn new() -> Self {
        MemoryFileStore {
            state: Mutex::new(MemoryState {
                now: SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000),
                files: BTreeMap::new(),
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn advance(&self, by: Duration) {
        let mut state = self.state();
        state.now += by;
    }

    pub fn now(&self) -> SystemTime {
        self.state().now
    }

    /// Every stored path, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.state().files.keys().cloned().collect()
    }

    pub fn remove(&self, path: &Path) -> bool {
        self.state().files.remove(path).is_some()
    }
}

impl FileStore for MemoryFileStore {
    fn read(&self, path: &Path) -> io::Result<String> {
        self.state()
            .files
            .get(path)
            .map(|(contents, _)| contents.clone())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} does not exist", path.display()),
                )
            })
    }

    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let mut state = self.state();
        let now = state.now;
        state
            .files
            .insert(path.to_path_buf(), (contents.to_string(), now));
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.state().files.contains_key(path)
    }

    fn last_modified(&self, path: &Path) -> Option<SystemTime> {
        self.state().files.get(path).map(|(_, modified)| *modified)
    }
}
