//! Snapshot persistence: periodic atomic save of the whole store, restore
//! at startup.
//!
//! The on-disk document is versioned JSON:
//!
//! ```json
//! { "version": 1, "savedAt": 1706000000, "orders": [ ... ] }
//! ```
//!
//! Saves are written to `<path>.tmp` and renamed onto `<path>`, so a crash
//! mid-write never corrupts the canonical file. Loading is forgiving:
//! a missing file, a malformed document, or a malformed individual record
//! is never fatal; bad records are skipped with a warning.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;

use blotter_core::time::unix_seconds;
use blotter_core::types::OrderRecord;

use crate::store::OrderStore;

/// Current on-disk document version.
const SNAPSHOT_VERSION: u64 = 1;

/// Periodic, atomic snapshot-to-file persistence for an [`OrderStore`].
pub struct Persistence {
    path: PathBuf,
    save_interval: Duration,
    running: AtomicBool,
    save_count: AtomicU64,
    last_save_unix: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Persistence {
    /// Create a persistence manager for `path`, saving every `save_interval`.
    pub fn new(path: impl Into<PathBuf>, save_interval: Duration) -> Self {
        Self {
            path: path.into(),
            save_interval,
            running: AtomicBool::new(false),
            save_count: AtomicU64::new(0),
            last_save_unix: AtomicU64::new(0),
            worker: Mutex::new(None),
        }
    }

    /// Load the snapshot file, passing each well-formed order entry to
    /// `loader` (typically `OrderStore::upsert`). Returns the number of
    /// records loaded; missing or malformed files load zero records.
    pub fn load<F>(&self, mut loader: F) -> Result<usize>
    where
        F: FnMut(OrderRecord),
    {
        if !self.path.exists() {
            return Ok(0);
        }

        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read snapshot at {}", self.path.display()))?;

        let doc: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(error = %e, path = %self.path.display(), "snapshot file is malformed, starting empty");
                return Ok(0);
            }
        };

        let Some(orders) = doc.get("orders").and_then(|o| o.as_array()) else {
            tracing::warn!(path = %self.path.display(), "snapshot has no orders array, starting empty");
            return Ok(0);
        };

        let mut count = 0;
        for (i, entry) in orders.iter().enumerate() {
            match serde_json::from_value::<OrderRecord>(entry.clone()) {
                Ok(record) if !record.cl_ord_id.is_empty() => {
                    loader(record);
                    count += 1;
                }
                Ok(_) => {
                    tracing::warn!(index = i, "skipping snapshot record with empty clOrdId");
                }
                Err(e) => {
                    tracing::warn!(index = i, error = %e, "skipping malformed snapshot record");
                }
            }
        }

        tracing::info!(count, path = %self.path.display(), "loaded persisted orders");
        Ok(count)
    }

    /// Save the store immediately: serialize, write `<path>.tmp`, rename.
    pub fn save_now(&self, store: &OrderStore) -> Result<()> {
        let doc = serde_json::json!({
            "version": SNAPSHOT_VERSION,
            "savedAt": unix_seconds(),
            "orders": store.snapshot(),
        });

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
        }

        let tmp_path = tmp_path_for(&self.path);
        let body = serde_json::to_string_pretty(&doc).context("failed to serialize snapshot")?;
        std::fs::write(&tmp_path, body)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "failed to rename {} onto {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;

        self.save_count.fetch_add(1, Ordering::Relaxed);
        self.last_save_unix
            .store(unix_seconds() as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Start the background save worker. A failed cycle is logged and
    /// retried naturally on the next interval.
    pub fn start(self: &Arc<Self>, store: Arc<OrderStore>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let this = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("persistence".into())
            .spawn(move || {
                while this.running.load(Ordering::SeqCst) {
                    // Sleep in 100 ms increments to allow prompt shutdown.
                    let steps = (this.save_interval.as_millis() / 100).max(1);
                    for _ in 0..steps {
                        if !this.running.load(Ordering::SeqCst) {
                            break;
                        }
                        std::thread::sleep(Duration::from_millis(100));
                    }

                    if this.running.load(Ordering::SeqCst) {
                        if let Err(e) = this.save_now(&store) {
                            tracing::error!(error = %e, "snapshot save failed, will retry");
                        }
                    }
                }

                // Final save on shutdown.
                if let Err(e) = this.save_now(&store) {
                    tracing::error!(error = %e, "final snapshot save failed");
                } else {
                    tracing::info!("final snapshot save complete");
                }
            })
            .expect("failed to spawn persistence thread");

        *self.worker.lock() = Some(handle);
    }

    /// Stop the worker, joining it after its final save.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }
    }

    /// Number of completed saves since construction.
    pub fn save_count(&self) -> u64 {
        self.save_count.load(Ordering::Relaxed)
    }

    /// Unix time of the last completed save (0 = never).
    pub fn last_save_unix(&self) -> u64 {
        self.last_save_unix.load(Ordering::Relaxed)
    }

    /// Canonical snapshot path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}
