use crate::catalog::model::{MediaStatus, RunCounters};
use crate::catalog::repository;
use crate::error::FatalError;
use crate::scan::progress::{Outcome, ProgressTracker};
use crate::scan::worker::ScanResult;
use crate::takeout::discover::FileInfo;
use chrono::Utc;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use rusqlite::Connection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const FLUSH_INTERVAL: Duration = Duration::from_millis(250);

pub struct WriterParams {
    pub run_id: String,
    pub batch_size: usize,
    pub retry_attempts: u32,
}

/// The writer thread: sole owner of the write connection for the lifetime
/// of the pipeline. Batches results into explicit transactions of up to
/// `batch_size` records (or a flush tick), mirrors the run counters inside
/// each transaction, and hands the connection back for the post-scan
/// passes. Never blocks on input for longer than the flush interval.
pub fn run_writer(
    conn: Connection,
    results_rx: Receiver<ScanResult>,
    work_probe: Receiver<FileInfo>,
    progress: Arc<ProgressTracker>,
    shutdown: Arc<AtomicBool>,
    params: WriterParams,
) -> (Connection, Result<(), FatalError>) {
    let mut buffer: Vec<ScanResult> = Vec::with_capacity(params.batch_size);

    loop {
        match results_rx.recv_timeout(FLUSH_INTERVAL) {
            Ok(result) => {
                buffer.push(result);
                if buffer.len() >= params.batch_size {
                    if let Err(e) = flush(&conn, &mut buffer, &progress, &work_probe, &results_rx, &params)
                    {
                        shutdown.store(true, Ordering::SeqCst);
                        return (conn, Err(e));
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if !buffer.is_empty() {
                    if let Err(e) = flush(&conn, &mut buffer, &progress, &work_probe, &results_rx, &params)
                    {
                        shutdown.store(true, Ordering::SeqCst);
                        return (conn, Err(e));
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                // Producers are gone; drain what is left and stop.
                let result = if buffer.is_empty() {
                    Ok(())
                } else {
                    flush(&conn, &mut buffer, &progress, &work_probe, &results_rx, &params)
                };
                return (conn, result);
            }
        }
    }
}

fn flush(
    conn: &Connection,
    buffer: &mut Vec<ScanResult>,
    progress: &ProgressTracker,
    work_probe: &Receiver<FileInfo>,
    results_rx: &Receiver<ScanResult>,
    params: &WriterParams,
) -> Result<(), FatalError> {
    let batch: Vec<ScanResult> = std::mem::take(buffer);
    let outcomes: Vec<Outcome> = batch.iter().map(outcome_of).collect();

    // Counters inside the transaction must already include this batch;
    // the shared tracker is only advanced once the commit sticks.
    let mut pending = progress.snapshot();
    for o in &outcomes {
        add_outcome(&mut pending, *o);
    }

    let mut attempt = 1u32;
    loop {
        match commit_batch(conn, &batch, &pending, params) {
            Ok(()) => {
                for o in &outcomes {
                    let processed = progress.on_processed(*o);
                    progress.maybe_log(processed, work_probe.len(), results_rx.len());
                }
                return Ok(());
            }
            Err(e) if attempt < params.retry_attempts => {
                let backoff = Duration::from_millis(100 * (1 << (attempt - 1)));
                tracing::warn!(
                    "batch commit failed (attempt {}/{}), retrying in {:?}: {}",
                    attempt,
                    params.retry_attempts,
                    backoff,
                    e
                );
                std::thread::sleep(backoff);
                attempt += 1;
            }
            Err(e) => {
                tracing::warn!(
                    "batch commit failed after {} attempts; retrying records individually: {}",
                    params.retry_attempts,
                    e
                );
                return commit_individually(conn, batch, progress, params, e);
            }
        }
    }
}

fn commit_batch(
    conn: &Connection,
    batch: &[ScanResult],
    pending: &RunCounters,
    params: &WriterParams,
) -> rusqlite::Result<()> {
    conn.execute_batch("BEGIN")?;
    let applied = batch
        .iter()
        .try_for_each(|result| apply_result(conn, result, params))
        .and_then(|_| repository::update_run_counters(conn, &params.run_id, pending));
    match applied {
        Ok(()) => conn.execute_batch("COMMIT"),
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Last-resort recovery: each record in its own transaction, bad ones
/// skipped. A batch where nothing at all can be written is fatal.
fn commit_individually(
    conn: &Connection,
    batch: Vec<ScanResult>,
    progress: &ProgressTracker,
    params: &WriterParams,
    batch_error: rusqlite::Error,
) -> Result<(), FatalError> {
    let mut any_success = false;
    for result in batch {
        let outcome = outcome_of(&result);
        conn.execute_batch("BEGIN")?;
        match apply_result(conn, &result, params) {
            Ok(()) => {
                let mut pending = progress.snapshot();
                add_outcome(&mut pending, outcome);
                let finished = repository::update_run_counters(conn, &params.run_id, &pending)
                    .and_then(|_| conn.execute_batch("COMMIT"));
                match finished {
                    Ok(()) => {
                        any_success = true;
                        progress.on_processed(outcome);
                    }
                    Err(e) => {
                        let _ = conn.execute_batch("ROLLBACK");
                        tracing::warn!("individual commit failed: {}", e);
                    }
                }
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                tracing::warn!("skipping unwritable record: {}", e);
                progress.on_processed(Outcome::Error);
            }
        }
    }
    if any_success {
        Ok(())
    } else {
        Err(FatalError::CommitRetriesExhausted {
            attempts: params.retry_attempts,
            source: batch_error,
        })
    }
}

fn apply_result(conn: &Connection, result: &ScanResult, params: &WriterParams) -> rusqlite::Result<()> {
    let now = Utc::now();
    match result {
        ScanResult::Record { record, outcome } => match outcome {
            Outcome::Changed => repository::update_media_item(
                conn,
                record,
                MediaStatus::Present,
                &params.run_id,
                now,
            ),
            _ => repository::insert_media_item(
                conn,
                record,
                MediaStatus::Present,
                &params.run_id,
                now,
            ),
        },
        ScanResult::UpdateOnly { media_item_id } => {
            repository::touch_media_item(conn, media_item_id, &params.run_id, now)
        }
        ScanResult::Failure {
            error,
            record,
            album_id,
            media_relative_path,
            file_size,
        } => {
            repository::insert_processing_error(conn, &params.run_id, error, now)?;
            match record {
                Some((record, is_update)) => {
                    if *is_update {
                        repository::update_media_item(
                            conn,
                            record,
                            MediaStatus::Error,
                            &params.run_id,
                            now,
                        )
                    } else {
                        repository::insert_media_item(
                            conn,
                            record,
                            MediaStatus::Error,
                            &params.run_id,
                            now,
                        )
                    }
                }
                None => repository::record_media_error(
                    conn,
                    media_relative_path,
                    album_id,
                    *file_size,
                    &params.run_id,
                    now,
                )
                .map(|_| ()),
            }
        }
    }
}

fn outcome_of(result: &ScanResult) -> Outcome {
    match result {
        ScanResult::Record { outcome, .. } => *outcome,
        ScanResult::UpdateOnly { .. } => Outcome::Unchanged,
        ScanResult::Failure { .. } => Outcome::Error,
    }
}

fn add_outcome(counters: &mut RunCounters, outcome: Outcome) {
    counters.files_processed += 1;
    match outcome {
        Outcome::New => counters.new_files += 1,
        Outcome::Unchanged => counters.unchanged_files += 1,
        Outcome::Changed => counters.changed_files += 1,
        Outcome::Error => counters.error_files += 1,
    }
}
