// Low level helpers shared by every persisted file (schedule config, alarm index).
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(not(target_os = "android"))]
use fs2::FileExt;

#[cfg(target_os = "android")]
use std::collections::HashMap;
#[cfg(target_os = "android")]
use std::sync::{Arc, Mutex, OnceLock};

// Android sandboxes do not support advisory locks reliably; serialize in-process instead.
#[cfg(target_os = "android")]
static PROCESS_FILE_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

pub struct FileStore;

impl FileStore {
    /// `schedule.toml` -> `schedule.toml.lock`
    pub fn lock_path(file_path: &Path) -> PathBuf {
        let mut name = file_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        file_path.with_file_name(name)
    }

    /// Runs `f` while holding an exclusive lock tied to `file_path`.
    #[cfg(not(target_os = "android"))]
    pub fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let lock_path = Self::lock_path(file_path);
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {:?}", lock_path))?;

        file.lock_exclusive()?;
        let result = f();
        file.unlock()?;
        result
    }

    #[cfg(target_os = "android")]
    pub fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let map = PROCESS_FILE_LOCKS.get_or_init(|| Mutex::new(HashMap::new()));
        let key = file_path
            .canonicalize()
            .unwrap_or_else(|_| file_path.to_path_buf());

        let file_mutex = {
            let mut guard = map
                .lock()
                .map_err(|_| anyhow::anyhow!("File lock registry poisoned"))?;
            guard
                .entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let _held = file_mutex
            .lock()
            .map_err(|_| anyhow::anyhow!("File lock poisoned for {:?}", file_path))?;
        f()
    }

    /// Atomic write: write to a sibling `.tmp` file then rename over the target.
    pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, contents)
            .with_context(|| format!("Failed to write {:?}", tmp_path))?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to move {:?} into place", tmp_path))?;
        Ok(())
    }

    /// Reads `path` under its lock. Returns `None` if the file does not exist.
    pub fn read_locked(path: &Path) -> Result<Option<String>> {
        if !path.exists() {
            return Ok(None);
        }
        Self::with_lock(path, || {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            Ok(Some(content))
        })
    }

    /// Replaces `path` with `contents` under its lock.
    pub fn write_locked(path: &Path, contents: String) -> Result<()> {
        Self::with_lock(path, || Self::atomic_write(path, contents))
    }
}
