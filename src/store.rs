//! Transfer session store and event fan-out.
//!
//! Tracks outbound downloads, inbound uploads, and client-side remote
//! downloads. Every mutation republishes a full snapshot through a
//! `watch` channel: latest-wins delivery, so slow subscribers never
//! block the request handlers producing progress.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

/// Unique per-request transfer id. Two clients pulling the same file get
/// two independent ids.
pub type TransferId = u64;

/// Instantaneous speed is recomputed from a sliding sample at this
/// cadence, not on every chunk.
const SPEED_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// Live progress record for one transfer (outbound or remote).
#[derive(Debug, Clone)]
struct ProgressEntry {
    file_name: String,
    total_size: u64,
    bytes: u64,
    peer: String,
    started_at: Instant,
    last_sample_at: Instant,
    last_sample_bytes: u64,
    speed_bps: f64,
    complete: bool,
}

impl ProgressEntry {
    fn new(file_name: String, total_size: u64, peer: String) -> Self {
        let now = Instant::now();
        Self {
            file_name,
            total_size,
            bytes: 0,
            peer,
            started_at: now,
            last_sample_at: now,
            last_sample_bytes: 0,
            speed_bps: 0.0,
            complete: false,
        }
    }

    /// Monotonic, clamped progress update. Entries are frozen once
    /// complete; regressions from out-of-order reports are ignored.
    fn report(&mut self, bytes_so_far: u64, sample_interval: Duration) {
        if self.complete {
            return;
        }
        // total_size 0 means the size was never announced: no clamp then
        let ceiling = if self.total_size == 0 {
            u64::MAX
        } else {
            self.total_size
        };
        let bytes = bytes_so_far.min(ceiling).max(self.bytes);
        self.bytes = bytes;

        let elapsed = self.last_sample_at.elapsed();
        if elapsed >= sample_interval && !elapsed.is_zero() {
            let delta = bytes.saturating_sub(self.last_sample_bytes);
            self.speed_bps = delta as f64 / elapsed.as_secs_f64();
            self.last_sample_at = Instant::now();
            self.last_sample_bytes = bytes;
        }
    }

    fn snapshot(&self, id: TransferId) -> TransferSnapshot {
        let eta_secs = if self.complete || self.speed_bps <= 0.0 || self.total_size == 0 {
            None // indeterminate, never a division by zero
        } else {
            let remaining = self.total_size.saturating_sub(self.bytes) as f64;
            Some((remaining / self.speed_bps).ceil() as u64)
        };
        TransferSnapshot {
            id,
            file_name: self.file_name.clone(),
            total_size: self.total_size,
            bytes: self.bytes,
            speed_bps: self.speed_bps,
            eta_secs,
            peer: self.peer.clone(),
            elapsed_secs: self.started_at.elapsed().as_secs(),
            complete: self.complete,
        }
    }
}

/// Point-in-time view of one transfer, safe to hand to any observer.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransferSnapshot {
    pub id: TransferId,
    pub file_name: String,
    /// 0 when the sender never announced a size.
    pub total_size: u64,
    pub bytes: u64,
    pub speed_bps: f64,
    /// `None` while speed is zero or the transfer is done.
    pub eta_secs: Option<u64>,
    pub peer: String,
    pub elapsed_secs: u64,
    pub complete: bool,
}

/// Record of a file accepted via `/upload`. Removing the record never
/// deletes the file on disk.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedFile {
    pub file_name: String,
    pub stored_path: PathBuf,
    pub sender: String,
    pub size: u64,
    /// Seconds since the Unix epoch.
    pub received_at: u64,
}

/// Full state published to subscribers on every mutation.
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub downloads: Vec<TransferSnapshot>,
    pub received: Vec<ReceivedFile>,
    pub remote: Vec<TransferSnapshot>,
}

#[derive(Default)]
struct Inner {
    next_id: TransferId,
    downloads: BTreeMap<TransferId, ProgressEntry>,
    received: Vec<ReceivedFile>,
    remote: BTreeMap<TransferId, ProgressEntry>,
}

impl Inner {
    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            downloads: self
                .downloads
                .iter()
                .map(|(id, e)| e.snapshot(*id))
                .collect(),
            received: self.received.clone(),
            remote: self.remote.iter().map(|(id, e)| e.snapshot(*id)).collect(),
        }
    }
}

/// Thread-safe store of in-flight and finished transfers.
///
/// All mutation goes through the store's own operations; snapshots are
/// built under the lock so observers never see a half-applied update.
#[derive(Clone)]
pub struct TransferStore {
    inner: Arc<RwLock<Inner>>,
    publisher: watch::Sender<StoreSnapshot>,
    sample_interval: Duration,
}

impl Default for TransferStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferStore {
    pub fn new() -> Self {
        Self::with_sample_interval(SPEED_SAMPLE_INTERVAL)
    }

    /// Store with a custom speed-sampling cadence.
    pub fn with_sample_interval(sample_interval: Duration) -> Self {
        let (publisher, _) = watch::channel(StoreSnapshot::default());
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            publisher,
            sample_interval,
        }
    }

    /// Subscribe to snapshot updates. The receiver holds the current
    /// snapshot immediately and observes every later one latest-wins.
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.publisher.subscribe()
    }

    /// Consistent point-in-time copy of the whole store.
    pub fn snapshot(&self) -> StoreSnapshot {
        self.read(|inner| inner.snapshot())
    }

    //-- outbound downloads

    pub fn begin_download(&self, file_name: &str, total_size: u64, peer: &str) -> TransferId {
        self.mutate(|inner| {
            let id = inner.next_id;
            inner.next_id += 1;
            inner.downloads.insert(
                id,
                ProgressEntry::new(file_name.to_string(), total_size, peer.to_string()),
            );
            tracing::debug!(id, file_name, total_size, peer, "download started");
            id
        })
    }

    pub fn report_download_progress(&self, id: TransferId, bytes_so_far: u64) {
        let interval = self.sample_interval;
        self.mutate(|inner| {
            if let Some(entry) = inner.downloads.get_mut(&id) {
                entry.report(bytes_so_far, interval);
            }
        });
    }

    /// Mark a download finished. The entry stays queryable (final byte
    /// count remains visible) until `clear_downloads`.
    pub fn complete_download(&self, id: TransferId) {
        self.mutate(|inner| {
            if let Some(entry) = inner.downloads.get_mut(&id) {
                entry.complete = true;
                tracing::debug!(id, bytes = entry.bytes, "download complete");
            }
        });
    }

    pub fn clear_downloads(&self) {
        self.mutate(|inner| inner.downloads.clear());
    }

    //-- received uploads

    pub fn record_received(&self, file_name: &str, stored_path: PathBuf, sender: &str, size: u64) {
        let received_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.mutate(|inner| {
            tracing::info!(file_name, path = %stored_path.display(), sender, size, "upload recorded");
            inner.received.push(ReceivedFile {
                file_name: file_name.to_string(),
                stored_path,
                sender: sender.to_string(),
                size,
                received_at,
            });
        });
    }

    /// Drop one tracking record by stored path. The file itself is
    /// never deleted here.
    pub fn remove_received(&self, stored_path: &std::path::Path) {
        self.mutate(|inner| inner.received.retain(|r| r.stored_path != stored_path));
    }

    pub fn clear_received(&self) {
        self.mutate(|inner| inner.received.clear());
    }

    //-- remote (client-side) downloads

    pub fn begin_remote(&self, file_name: &str, total_size: u64, peer: &str) -> TransferId {
        self.mutate(|inner| {
            let id = inner.next_id;
            inner.next_id += 1;
            inner.remote.insert(
                id,
                ProgressEntry::new(file_name.to_string(), total_size, peer.to_string()),
            );
            tracing::debug!(id, file_name, total_size, peer, "remote download started");
            id
        })
    }

    pub fn report_remote_progress(&self, id: TransferId, bytes_so_far: u64) {
        let interval = self.sample_interval;
        self.mutate(|inner| {
            if let Some(entry) = inner.remote.get_mut(&id) {
                entry.report(bytes_so_far, interval);
            }
        });
    }

    pub fn complete_remote(&self, id: TransferId) {
        self.mutate(|inner| {
            if let Some(entry) = inner.remote.get_mut(&id) {
                entry.complete = true;
                tracing::debug!(id, bytes = entry.bytes, "remote download complete");
            }
        });
    }

    pub fn clear_remote(&self) {
        self.mutate(|inner| inner.remote.clear());
    }

    //-- lock plumbing

    /// Apply a mutation and publish the resulting snapshot while still
    /// inside the critical section, so subscribers observe snapshots in
    /// mutation order with no interleaving.
    fn mutate<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("store lock poisoned during write, recovering");
                poisoned.into_inner()
            }
        };
        let result = f(&mut inner);
        self.publisher.send_replace(inner.snapshot());
        result
    }

    fn read<R>(&self, f: impl FnOnce(&Inner) -> R) -> R {
        let inner = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("store lock poisoned during read, recovering");
                poisoned.into_inner()
            }
        };
        f(&inner)
    }
}
