//! Session counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording session progress
#[derive(Debug, Default)]
pub struct Metrics {
    paths_admitted: AtomicU64,
    paths_rejected: AtomicU64,
    entries_written: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path_admitted(&self) {
        self.paths_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn path_rejected(&self) {
        self.paths_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn entry_written(&self) {
        self.entries_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            paths_admitted: self.paths_admitted.load(Ordering::Relaxed),
            paths_rejected: self.paths_rejected.load(Ordering::Relaxed),
            entries_written: self.entries_written.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub paths_admitted: u64,
    pub paths_rejected: u64,
    pub entries_written: u64,
}
