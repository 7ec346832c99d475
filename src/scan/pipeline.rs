use crate::catalog::model::{RunStatus, ScanSummary};
use crate::catalog::repository;
use crate::config::Config;
use crate::db;
use crate::error::FatalError;
use crate::media::probe;
use crate::scan::progress::ProgressTracker;
use crate::scan::worker::{self, WorkerContext};
use crate::scan::writer::{self, WriterParams};
use crate::scan::{linkers, reconcile};
use crate::takeout::{albums, discover};
use chrono::Utc;
use crossbeam_channel::bounded;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Accept the `…/Takeout/Google Photos` folder itself or an ancestor that
/// contains it.
fn resolve_takeout_root(root: &Path) -> Result<PathBuf, FatalError> {
    if !root.exists() {
        return Err(FatalError::RootMissing(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(FatalError::RootNotADirectory(root.to_path_buf()));
    }
    let nested = root.join("Takeout").join("Google Photos");
    if nested.is_dir() {
        return Ok(nested);
    }
    let half = root.join("Google Photos");
    if half.is_dir() {
        return Ok(half);
    }
    Ok(root.to_path_buf())
}

/// Run one scan over the takeout tree: discover albums and files, drive the
/// parallel pipeline, reconcile, link, and finalize the run row. Returns the
/// run summary; per-item failures are inside the catalog, fatal ones here.
pub fn run_scan(root: &Path, config: &Config) -> Result<ScanSummary, FatalError> {
    config.validate()?;
    probe::ensure_tools(config.use_exiftool, config.use_ffprobe)?;
    let scan_root = resolve_takeout_root(root)?;

    let catalog_path = config.resolved_catalog_path();
    let conn = db::open_connection(&catalog_path, config.db_busy_timeout_ms)?;
    db::run_migrations(&conn)?;

    let started_at = Utc::now();
    let stale = repository::fail_stale_running_runs(&conn, started_at)?;
    if stale > 0 {
        tracing::warn!("closed {} stale running scan run(s) as failed", stale);
    }
    let run_id = Uuid::new_v4().to_string();
    repository::insert_scan_run(&conn, &run_id, started_at)?;
    tracing::info!("scan run {} started over {:?}", run_id, scan_root);

    let progress = Arc::new(ProgressTracker::default());
    let (conn, pipeline_result) = execute_pipeline(
        conn,
        &scan_root,
        &catalog_path,
        config,
        &run_id,
        &progress,
    );

    // Reconciliation and finalization run even when the pipeline failed.
    if let Err(e) = reconcile::reconcile(&conn, &run_id, started_at, &progress) {
        tracing::error!("reconciliation failed: {}", e);
    }
    if let Err(e) = linkers::link_edited_variants(&conn, &run_id) {
        tracing::warn!("edited-variant linker failed: {}", e);
    }
    if let Err(e) = linkers::link_live_photos(&conn, &run_id) {
        tracing::warn!("live-photo linker failed: {}", e);
    }

    let status = if pipeline_result.is_ok() {
        RunStatus::Completed
    } else {
        RunStatus::Failed
    };
    repository::finish_scan_run(&conn, &run_id, status, Utc::now(), &progress.snapshot())?;

    let summary = repository::load_summary(&conn, &run_id)?;
    log_summary(&summary);
    pipeline_result?;
    Ok(summary)
}

/// Discovery plus the worker/writer topology. The write connection travels
/// into the writer thread and comes back out for the post-scan passes.
fn execute_pipeline(
    conn: Connection,
    scan_root: &Path,
    catalog_path: &Path,
    config: &Config,
    run_id: &str,
    progress: &Arc<ProgressTracker>,
) -> (Connection, Result<(), FatalError>) {
    // Albums first; media rows reference them.
    let albums = match albums::discover_albums(scan_root) {
        Ok(a) => a,
        Err(e) => return (conn, Err(e)),
    };
    let now = Utc::now();
    for album in &albums {
        if let Err(e) = repository::upsert_album(&conn, &album.record, run_id, now) {
            return (conn, Err(e.into()));
        }
        if let Some(error) = albums::metadata_error_record(album) {
            if let Err(e) = repository::insert_processing_error(&conn, run_id, &error, now) {
                return (conn, Err(e.into()));
            }
        }
    }
    progress.set_albums_total(albums.len() as u64);

    let discovery = discover::discover_files(scan_root, &albums);
    progress.set_discovery(
        discovery.stats.files_discovered,
        discovery.stats.media_files,
        discovery.stats.sidecar_files,
    );
    for error in &discovery.errors {
        if let Err(e) = repository::insert_processing_error(&conn, run_id, error, Utc::now()) {
            return (conn, Err(e.into()));
        }
    }

    // Worker read connections are opened before the write handle moves.
    let mut read_conns = Vec::with_capacity(config.worker_threads);
    for _ in 0..config.worker_threads {
        match db::open_read_connection(catalog_path, config.db_busy_timeout_ms) {
            Ok(c) => read_conns.push(c),
            Err(e) => return (conn, Err(e.into())),
        }
    }

    let pool = match rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_processes)
        .build()
    {
        Ok(p) => Arc::new(p),
        Err(e) => return (conn, Err(FatalError::CpuPool(e.to_string()))),
    };

    let (work_tx, work_rx) = bounded::<discover::FileInfo>(config.queue_maxsize);
    let (results_tx, results_rx) = bounded::<worker::ScanResult>(config.queue_maxsize);
    let shutdown = Arc::new(AtomicBool::new(false));
    // Depth probe only; the writer never receives from the work queue.
    let work_probe = work_rx.clone();

    let writer_handle = {
        let progress = progress.clone();
        let shutdown = shutdown.clone();
        let params = WriterParams {
            run_id: run_id.to_string(),
            batch_size: config.batch_size,
            retry_attempts: config.commit_retry_attempts,
        };
        std::thread::spawn(move || {
            writer::run_writer(conn, results_rx, work_probe, progress, shutdown, params)
        })
    };

    let mut worker_handles = Vec::with_capacity(config.worker_threads);
    for read_conn in read_conns {
        let ctx = WorkerContext {
            work_rx: work_rx.clone(),
            results_tx: results_tx.clone(),
            read_conn,
            pool: pool.clone(),
            shutdown: shutdown.clone(),
            use_exiftool: config.use_exiftool,
            use_ffprobe: config.use_ffprobe,
        };
        worker_handles.push(std::thread::spawn(move || worker::run_worker(ctx)));
    }
    drop(work_rx);
    drop(results_tx);

    // Produce. Backpressure is the queue capacity; send blocks when full.
    for file in discovery.files {
        if shutdown.load(Ordering::SeqCst) {
            tracing::warn!("shutdown requested; discovery stops enqueuing");
            break;
        }
        if work_tx.send(file).is_err() {
            break;
        }
    }
    drop(work_tx);

    // Workers drain the closed queue and exit; spawned CPU tasks each hold
    // their own results sender, so the writer keeps consuming until the
    // last in-flight task reports, then hands the connection back.
    for handle in worker_handles {
        if handle.join().is_err() {
            tracing::error!("i/o worker panicked");
            shutdown.store(true, Ordering::SeqCst);
        }
    }
    match writer_handle.join() {
        Ok((conn, result)) => (conn, result),
        Err(_) => {
            // The writer died with the connection; reopen so the run row can
            // still be finalized.
            match db::open_connection(catalog_path, config.db_busy_timeout_ms) {
                Ok(conn) => (
                    conn,
                    Err(FatalError::ThreadPanic("writer thread".to_string())),
                ),
                Err(e) => {
                    // No connection left to finalize with; surface the panic.
                    panic!("writer thread panicked and catalog cannot be reopened: {e}");
                }
            }
        }
    }
}

fn log_summary(summary: &ScanSummary) {
    let c = &summary.counters;
    tracing::info!(
        "scan {} {}: {} discovered ({} media, {} sidecars), {} processed \
         ({} new, {} unchanged, {} changed, {} missing, {} error, {} inconsistent) \
         across {} albums at {:.1} files/s",
        summary.scan_run_id,
        summary.status.as_str(),
        c.files_discovered,
        c.media_files_discovered,
        c.sidecar_files_discovered,
        c.files_processed,
        c.new_files,
        c.unchanged_files,
        c.changed_files,
        c.missing_files,
        c.error_files,
        c.inconsistent_files,
        c.albums_total,
        summary.files_per_second,
    );
    for (category, count) in &summary.errors_by_category {
        tracing::info!("  errors[{}] = {}", category, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_root_accepts_parent_of_takeout() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("Takeout").join("Google Photos");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(resolve_takeout_root(tmp.path()).unwrap(), nested);
    }

    #[test]
    fn test_resolve_root_accepts_takeout_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let takeout = tmp.path().join("Takeout");
        let nested = takeout.join("Google Photos");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(resolve_takeout_root(&takeout).unwrap(), nested);
    }

    #[test]
    fn test_resolve_root_passthrough() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_takeout_root(tmp.path()).unwrap(),
            tmp.path().to_path_buf()
        );
    }

    #[test]
    fn test_resolve_root_missing() {
        assert!(matches!(
            resolve_takeout_root(Path::new("/no/such/tree")),
            Err(FatalError::RootMissing(_))
        ));
    }
}
