use crate::catalog::model::RunCounters;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Which bucket a finished file lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    New,
    Unchanged,
    Changed,
    Error,
}

/// Shared run counters. Discovery totals are set once by the orchestrator;
/// per-file outcomes are recorded by the writer as batches land, so the
/// numbers never run ahead of what is committed.
pub struct ProgressTracker {
    started: Instant,
    files_discovered: AtomicU64,
    media_files_discovered: AtomicU64,
    sidecar_files_discovered: AtomicU64,
    albums_total: AtomicU64,
    processed: AtomicU64,
    new_files: AtomicU64,
    unchanged_files: AtomicU64,
    changed_files: AtomicU64,
    error_files: AtomicU64,
    missing_files: AtomicU64,
    inconsistent_files: AtomicU64,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        ProgressTracker {
            started: Instant::now(),
            files_discovered: AtomicU64::new(0),
            media_files_discovered: AtomicU64::new(0),
            sidecar_files_discovered: AtomicU64::new(0),
            albums_total: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            new_files: AtomicU64::new(0),
            unchanged_files: AtomicU64::new(0),
            changed_files: AtomicU64::new(0),
            error_files: AtomicU64::new(0),
            missing_files: AtomicU64::new(0),
            inconsistent_files: AtomicU64::new(0),
        }
    }
}

impl ProgressTracker {
    pub fn set_discovery(&self, files: u64, media: u64, sidecars: u64) {
        self.files_discovered.store(files, Ordering::Relaxed);
        self.media_files_discovered.store(media, Ordering::Relaxed);
        self.sidecar_files_discovered.store(sidecars, Ordering::Relaxed);
    }

    pub fn set_albums_total(&self, n: u64) {
        self.albums_total.store(n, Ordering::Relaxed);
    }

    pub fn set_missing(&self, n: u64) {
        self.missing_files.store(n, Ordering::Relaxed);
    }

    pub fn set_inconsistent(&self, n: u64) {
        self.inconsistent_files.store(n, Ordering::Relaxed);
    }

    /// Record one finished file; returns the running processed count.
    pub fn on_processed(&self, outcome: Outcome) -> u64 {
        match outcome {
            Outcome::New => self.new_files.fetch_add(1, Ordering::Relaxed),
            Outcome::Unchanged => self.unchanged_files.fetch_add(1, Ordering::Relaxed),
            Outcome::Changed => self.changed_files.fetch_add(1, Ordering::Relaxed),
            Outcome::Error => self.error_files.fetch_add(1, Ordering::Relaxed),
        };
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// INFO line every 100 files: rate, queue depths, ETA.
    pub fn maybe_log(&self, processed: u64, work_depth: usize, results_depth: usize) {
        if processed == 0 || processed % 100 != 0 {
            return;
        }
        let total = self.media_files_discovered.load(Ordering::Relaxed);
        let elapsed = self.started.elapsed().as_secs_f64();
        let rate = if elapsed > 0.0 {
            processed as f64 / elapsed
        } else {
            0.0
        };
        let eta_secs = if rate > 0.0 && total > processed {
            ((total - processed) as f64 / rate).round() as u64
        } else {
            0
        };
        tracing::info!(
            "processed {}/{} files ({:.1}/s, work queue {}, results queue {}, eta {}s)",
            processed,
            total,
            rate,
            work_depth,
            results_depth,
            eta_secs
        );
    }

    pub fn snapshot(&self) -> RunCounters {
        RunCounters {
            files_discovered: self.files_discovered.load(Ordering::Relaxed),
            media_files_discovered: self.media_files_discovered.load(Ordering::Relaxed),
            sidecar_files_discovered: self.sidecar_files_discovered.load(Ordering::Relaxed),
            files_processed: self.processed.load(Ordering::Relaxed),
            new_files: self.new_files.load(Ordering::Relaxed),
            unchanged_files: self.unchanged_files.load(Ordering::Relaxed),
            changed_files: self.changed_files.load(Ordering::Relaxed),
            missing_files: self.missing_files.load(Ordering::Relaxed),
            error_files: self.error_files.load(Ordering::Relaxed),
            inconsistent_files: self.inconsistent_files.load(Ordering::Relaxed),
            albums_total: self.albums_total.load(Ordering::Relaxed),
        }
    }
}
