//! Node options record, serialized through a companion advisory lock file.

use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;

use anyhow::{Context, Result};
use fs2::FileExt;
use nodeops_core::config::NodePaths;
use nodeops_core::options::NodeOptions;

use crate::store;

pub struct OptionsStore {
    path: PathBuf,
    lock_path: PathBuf,
}

/// Exclusive hold on the lock file; released on drop.
struct LockGuard(File);

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

impl OptionsStore {
    pub fn new(paths: &NodePaths) -> Self {
        Self {
            path: paths.node_options(),
            lock_path: paths.node_options_lock(),
        }
    }

    fn lock(&self) -> Result<LockGuard> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)
            .with_context(|| format!("Failed to open {}", self.lock_path.display()))?;
        file.lock_exclusive()
            .with_context(|| format!("Failed to lock {}", self.lock_path.display()))?;
        Ok(LockGuard(file))
    }

    /// Current options; the record is created empty on first touch.
    pub fn load(&self) -> Result<NodeOptions> {
        let _guard = self.lock()?;
        self.load_unlocked()
    }

    fn load_unlocked(&self) -> Result<NodeOptions> {
        match store::read_json(&self.path)? {
            Some(opts) => Ok(opts),
            None => {
                let opts = NodeOptions::default();
                store::write_json(&self.path, &opts)?;
                Ok(opts)
            }
        }
    }

    /// Read-modify-write under the lock.
    pub fn update(&self, f: impl FnOnce(&mut NodeOptions) -> Result<()>) -> Result<NodeOptions> {
        let _guard = self.lock()?;
        let mut opts = self.load_unlocked()?;
        f(&mut opts)?;
        store::write_json(&self.path, &opts)?;
        Ok(opts)
    }

    pub fn replace(&self, opts: &NodeOptions) -> Result<()> {
        let _guard = self.lock()?;
        store::write_json(&self.path, opts)
    }
}
