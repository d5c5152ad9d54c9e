//! On-disk queue operations
//!
//! Disk states for a delivery are exactly: absent (acked), `<id>.tmp`
//! (being written, never read), `<id>.json` (ready), or under `failed/`
//! (dead). Enqueue writes the tmp file, fsyncs it, then renames — the rename
//! is the commit point.

use crate::types::QueuedDelivery;
use selkie_core::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

/// The on-disk delivery queue
pub struct DeliveryQueue {
    queue_dir: PathBuf,
}

impl DeliveryQueue {
    /// Open the queue, creating `queue_dir` and `failed/`
    pub fn open(queue_dir: impl AsRef<Path>) -> Result<Self> {
        let queue_dir = queue_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(queue_dir.join("failed")).map_err(|e| {
            Error::storage_write_failed(queue_dir.display().to_string(), e.to_string())
        })?;
        Ok(Self { queue_dir })
    }

    /// Queue directory path
    pub fn dir(&self) -> &Path {
        &self.queue_dir
    }

    fn live_path(&self, id: &str) -> PathBuf {
        self.queue_dir.join(format!("{}.json", id))
    }

    fn tmp_path(&self, id: &str) -> PathBuf {
        self.queue_dir.join(format!("{}.tmp", id))
    }

    fn failed_path(&self, id: &str) -> PathBuf {
        self.queue_dir.join("failed").join(format!("{}.json", id))
    }

    /// Durably write a delivery: tmp + fsync + atomic rename
    ///
    /// Used both for the initial enqueue and for retry-state updates. On any
    /// error the tmp file is removed and the error returned.
    pub fn write(&self, delivery: &QueuedDelivery) -> Result<()> {
        assert!(
            delivery.retry_count <= delivery.max_retries,
            "retry_count must not exceed max_retries"
        );

        let tmp = self.tmp_path(&delivery.id);
        let live = self.live_path(&delivery.id);

        let result = (|| -> Result<()> {
            let payload = serde_json::to_vec_pretty(delivery)?;
            let mut file = std::fs::File::create(&tmp).map_err(|e| {
                Error::storage_write_failed(tmp.display().to_string(), e.to_string())
            })?;
            file.write_all(&payload).map_err(|e| {
                Error::storage_write_failed(tmp.display().to_string(), e.to_string())
            })?;
            file.sync_all().map_err(|e| {
                Error::storage_write_failed(tmp.display().to_string(), e.to_string())
            })?;
            std::fs::rename(&tmp, &live).map_err(|e| {
                Error::storage_write_failed(live.display().to_string(), e.to_string())
            })?;
            Ok(())
        })();

        if result.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        result
    }

    /// Enqueue a new delivery
    pub fn enqueue(&self, delivery: &QueuedDelivery) -> Result<()> {
        self.write(delivery)?;
        tracing::debug!(id = %delivery.id, channel = %delivery.channel, "delivery enqueued");
        Ok(())
    }

    /// Remove a delivered entry (ack)
    pub fn ack(&self, id: &str) -> Result<()> {
        let path = self.live_path(id);
        std::fs::remove_file(&path)
            .map_err(|e| Error::storage_write_failed(path.display().to_string(), e.to_string()))
    }

    /// Move a delivery to the dead-letter directory
    pub fn dead_letter(&self, id: &str) -> Result<()> {
        let live = self.live_path(id);
        let dead = self.failed_path(id);
        std::fs::rename(&live, &dead)
            .map_err(|e| Error::storage_write_failed(dead.display().to_string(), e.to_string()))?;
        tracing::warn!(id, "delivery dead-lettered");
        Ok(())
    }

    /// All live deliveries, in directory-listing order
    ///
    /// Unreadable files are logged and left in place for the next scan.
    pub fn scan(&self) -> Result<Vec<QueuedDelivery>> {
        let mut deliveries = Vec::new();
        let read_dir = std::fs::read_dir(&self.queue_dir).map_err(|e| {
            Error::storage_read_failed(self.queue_dir.display().to_string(), e.to_string())
        })?;

        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") || !path.is_file() {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(raw) => match serde_json::from_str::<QueuedDelivery>(&raw) {
                    Ok(delivery) => deliveries.push(delivery),
                    Err(e) => {
                        tracing::error!(path = %path.display(), error = %e, "unreadable delivery file");
                    }
                },
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "cannot read delivery file");
                }
            }
        }
        Ok(deliveries)
    }

    /// Startup recovery: delete leftover `.tmp` files, return live deliveries
    pub fn recover(&self) -> Result<Vec<QueuedDelivery>> {
        let read_dir = std::fs::read_dir(&self.queue_dir).map_err(|e| {
            Error::storage_read_failed(self.queue_dir.display().to_string(), e.to_string())
        })?;

        let mut removed_tmp = 0;
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("tmp") {
                let _ = std::fs::remove_file(&path);
                removed_tmp += 1;
            }
        }
        if removed_tmp > 0 {
            tracing::info!(removed_tmp, "removed interrupted queue writes");
        }

        let live = self.scan()?;
        tracing::info!(pending = live.len(), "delivery queue recovered");
        Ok(live)
    }

    /// Count of live deliveries
    pub fn len(&self) -> usize {
        self.scan().map(|d| d.len()).unwrap_or(0)
    }

    /// Whether the live queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count of dead-lettered deliveries
    pub fn failed_len(&self) -> usize {
        std::fs::read_dir(self.queue_dir.join("failed"))
            .map(|entries| {
                entries
                    .flatten()
                    .filter(|e| {
                        e.path().extension().and_then(|x| x.to_str()) == Some("json")
                    })
                    .count()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery() -> QueuedDelivery {
        QueuedDelivery::new("tg", "42", "hello", "main", "agent:main:tg:42")
    }

    #[test]
    fn test_enqueue_creates_live_file_without_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DeliveryQueue::open(dir.path()).unwrap();
        let d = delivery();
        queue.enqueue(&d).unwrap();

        assert!(dir.path().join(format!("{}.json", d.id)).exists());
        assert!(!dir.path().join(format!("{}.tmp", d.id)).exists());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_scan_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DeliveryQueue::open(dir.path()).unwrap();
        let d = delivery();
        queue.enqueue(&d).unwrap();

        let scanned = queue.scan().unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0], d);
    }

    #[test]
    fn test_ack_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DeliveryQueue::open(dir.path()).unwrap();
        let d = delivery();
        queue.enqueue(&d).unwrap();
        queue.ack(&d.id).unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dead_letter_moves_file() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DeliveryQueue::open(dir.path()).unwrap();
        let d = delivery();
        queue.enqueue(&d).unwrap();
        queue.dead_letter(&d.id).unwrap();

        assert!(queue.is_empty());
        assert_eq!(queue.failed_len(), 1);
        assert!(dir
            .path()
            .join("failed")
            .join(format!("{}.json", d.id))
            .exists());
    }

    #[test]
    fn test_recover_deletes_tmp_and_loads_live() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DeliveryQueue::open(dir.path()).unwrap();
        let d = delivery();
        queue.enqueue(&d).unwrap();

        // Simulate a crash mid-write
        std::fs::write(dir.path().join("half-written.tmp"), b"{\"partial").unwrap();

        let recovered = queue.recover().unwrap();
        assert_eq!(recovered.len(), 1);
        assert!(!dir.path().join("half-written.tmp").exists());
    }

    #[test]
    fn test_scan_skips_corrupt_files_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DeliveryQueue::open(dir.path()).unwrap();
        queue.enqueue(&delivery()).unwrap();

        std::fs::write(dir.path().join("corrupt.json"), b"{nope").unwrap();

        let scanned = queue.scan().unwrap();
        assert_eq!(scanned.len(), 1);
        // The corrupt file stays for the next tick rather than being deleted
        assert!(dir.path().join("corrupt.json").exists());
    }

    #[test]
    fn test_write_updates_retry_state_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let queue = DeliveryQueue::open(dir.path()).unwrap();
        let mut d = delivery();
        queue.enqueue(&d).unwrap();

        d.record_failure("boom");
        queue.write(&d).unwrap();

        let scanned = queue.scan().unwrap();
        assert_eq!(scanned[0].retry_count, 1);
        assert_eq!(scanned[0].last_error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_queue_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let d = delivery();
        {
            let queue = DeliveryQueue::open(dir.path()).unwrap();
            queue.enqueue(&d).unwrap();
        }
        let queue = DeliveryQueue::open(dir.path()).unwrap();
        let recovered = queue.recover().unwrap();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].id, d.id);
    }
}
