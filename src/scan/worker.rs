use crate::catalog::model::{MediaItemRecord, ProcessingErrorRecord};
use crate::catalog::repository;
use crate::error::ErrorKind;
use crate::media::aggregate;
use crate::scan::cpu;
use crate::scan::progress::Outcome;
use crate::takeout::discover::{FileInfo, SidecarRef};
use crate::takeout::metadata::SidecarMetadata;
use crossbeam_channel::{Receiver, Sender};
use rusqlite::Connection;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// What reaches the writer for one work item.
#[derive(Debug)]
pub enum ScanResult {
    /// Full record to insert (`Outcome::New`) or rewrite (`Outcome::Changed`).
    Record {
        record: Box<MediaItemRecord>,
        outcome: Outcome,
    },
    /// Unchanged file: refresh lifecycle columns only.
    UpdateOnly { media_item_id: String },
    /// Per-item failure. When `record` is present the item itself was
    /// readable (e.g. its sidecar was not) and the row is written with
    /// status `error`; otherwise a minimal error row is kept alive.
    Failure {
        error: ProcessingErrorRecord,
        record: Option<(Box<MediaItemRecord>, bool)>,
        album_id: String,
        media_relative_path: String,
        file_size: i64,
    },
}

pub struct WorkerContext {
    pub work_rx: Receiver<FileInfo>,
    pub results_tx: Sender<ScanResult>,
    pub read_conn: Connection,
    pub pool: Arc<rayon::ThreadPool>,
    pub shutdown: Arc<AtomicBool>,
    pub use_exiftool: bool,
    pub use_ffprobe: bool,
}

/// I/O worker loop: change-detection lookup and sidecar parse on this
/// thread, then a fire-and-forget hand-off to the CPU pool. The pool task
/// sends its result straight to the writer, so this thread is back on
/// `work_rx.recv()` while the hashes are still being computed — the pool
/// stays saturated with many submissions in flight instead of one per
/// worker. Exits when the work queue is drained and closed, when the
/// shutdown flag is raised, or when the writer is gone.
pub fn run_worker(ctx: WorkerContext) {
    while let Ok(file) = ctx.work_rx.recv() {
        if ctx.shutdown.load(Ordering::SeqCst) {
            break;
        }
        dispatch(&ctx, file);
    }
}

fn dispatch(ctx: &WorkerContext, file: FileInfo) {
    match repository::lookup_by_relative_path(&ctx.read_conn, &file.relative_path) {
        Ok(Some(existing)) => {
            // Known path: verify size AND recomputed head+tail fingerprint
            // before declaring it unchanged. No shortcut on size alone.
            match crate::media::fingerprint::content_fingerprint(&file.absolute_path) {
                Ok(current_fp) => {
                    let unchanged = existing.file_size == file.file_size as i64
                        && existing.content_fingerprint.as_deref() == Some(current_fp.as_str());
                    if unchanged {
                        let _ = ctx.results_tx.send(ScanResult::UpdateOnly {
                            media_item_id: existing.id,
                        });
                    } else {
                        submit_full(ctx, file, existing.id, Outcome::Changed);
                    }
                }
                Err(e) => {
                    let error = ProcessingErrorRecord {
                        relative_path: file.relative_path.clone(),
                        error_type: ErrorKind::MediaFile,
                        category: crate::error::ErrorCategory::from_io(&e),
                        message: format!("content fingerprint: {e}"),
                    };
                    let _ = ctx.results_tx.send(failure(&file, error, None));
                }
            }
        }
        Ok(None) => submit_full(ctx, file, Uuid::new_v4().to_string(), Outcome::New),
        Err(e) => {
            // Lookup failure: reprocess as new rather than dropping the file.
            tracing::warn!("change-detection lookup failed for {}: {}", file.relative_path, e);
            submit_full(ctx, file, Uuid::new_v4().to_string(), Outcome::New)
        }
    }
}

/// Parse the sidecar here (it is I/O), then spawn the CPU work. The task
/// owns a results sender, so the writer keeps running until every
/// in-flight submission has reported back.
fn submit_full(ctx: &WorkerContext, file: FileInfo, media_item_id: String, outcome: Outcome) {
    let sidecar = read_sidecar(&file);
    let results_tx = ctx.results_tx.clone();
    let shutdown = ctx.shutdown.clone();
    let (use_exiftool, use_ffprobe) = (ctx.use_exiftool, ctx.use_ffprobe);

    ctx.pool.spawn(move || {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let result = match cpu::process_file(&file.absolute_path, use_exiftool, use_ffprobe) {
            Ok(meta) => {
                let record = aggregate::build_record(
                    media_item_id,
                    &file.relative_path,
                    &file.album_id,
                    file.file_size,
                    &meta,
                    sidecar.metadata.as_ref(),
                    sidecar.path_column,
                    sidecar.fingerprint,
                );
                match sidecar.error {
                    Some(error) => ScanResult::Failure {
                        error,
                        record: Some((Box::new(record), outcome == Outcome::Changed)),
                        album_id: file.album_id.clone(),
                        media_relative_path: file.relative_path.clone(),
                        file_size: file.file_size as i64,
                    },
                    None => ScanResult::Record {
                        record: Box::new(record),
                        outcome,
                    },
                }
            }
            Err(e) => failure(
                &file,
                ProcessingErrorRecord {
                    relative_path: file.relative_path.clone(),
                    error_type: ErrorKind::MediaFile,
                    category: e.category,
                    message: e.message,
                },
                None,
            ),
        };
        let _ = results_tx.send(result);
    });
}

/// Sidecar products gathered on the I/O thread before the CPU hand-off.
#[derive(Default)]
struct SidecarInput {
    metadata: Option<SidecarMetadata>,
    path_column: Option<String>,
    fingerprint: Option<String>,
    error: Option<ProcessingErrorRecord>,
}

fn read_sidecar(file: &FileInfo) -> SidecarInput {
    let mut input = SidecarInput::default();
    let Some(sidecar) = &file.sidecar else {
        return input;
    };
    match crate::takeout::metadata::load_sidecar(&sidecar.absolute_path) {
        Ok(parsed) => {
            input.metadata = Some(parsed);
            if sidecar.owned {
                input.path_column = Some(sidecar_relative_path(file, sidecar));
                input.fingerprint = aggregate::sidecar_fingerprint(&sidecar.absolute_path);
            }
        }
        Err(e) => {
            tracing::warn!("sidecar unreadable for {}: {}", file.relative_path, e);
            input.error = Some(ProcessingErrorRecord {
                relative_path: sidecar_relative_path(file, sidecar),
                error_type: ErrorKind::JsonSidecar,
                category: e.category,
                message: e.message,
            });
        }
    }
    input
}

fn failure(
    file: &FileInfo,
    error: ProcessingErrorRecord,
    record: Option<(Box<MediaItemRecord>, bool)>,
) -> ScanResult {
    ScanResult::Failure {
        error,
        record,
        album_id: file.album_id.clone(),
        media_relative_path: file.relative_path.clone(),
        file_size: file.file_size as i64,
    }
}

fn sidecar_relative_path(file: &FileInfo, sidecar: &SidecarRef) -> String {
    let name = sidecar
        .absolute_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match file.relative_path.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{}", crate::paths::nfc(&name)),
        None => crate::paths::nfc(&name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crossbeam_channel::bounded;
    use std::path::PathBuf;

    #[test]
    fn test_sidecar_relative_path_shares_media_dir() {
        let file = FileInfo {
            absolute_path: PathBuf::from("/root/Album1/a.jpg"),
            relative_path: "Album1/a.jpg".into(),
            album_id: "album".into(),
            album_folder_path: "Album1".into(),
            file_size: 1,
            sidecar: None,
        };
        let sidecar = SidecarRef {
            absolute_path: PathBuf::from("/root/Album1/a.jpg.supplemental-metadata.json"),
            owned: true,
        };
        assert_eq!(
            sidecar_relative_path(&file, &sidecar),
            "Album1/a.jpg.supplemental-metadata.json"
        );
    }

    #[test]
    fn test_worker_returns_to_queue_while_cpu_work_is_in_flight() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog_path = tmp.path().join("catalog.sqlite3");
        let conn = db::open_connection(&catalog_path, 5000).unwrap();
        db::run_migrations(&conn).unwrap();
        drop(conn);

        let media_path = tmp.path().join("a.jpg");
        std::fs::write(&media_path, b"\xFF\xD8\xFF\xE0\x00\x10\xFF\xD9").unwrap();

        let (work_tx, work_rx) = bounded::<FileInfo>(4);
        let (results_tx, results_rx) = bounded::<ScanResult>(4);
        let ctx = WorkerContext {
            work_rx,
            results_tx,
            read_conn: db::open_read_connection(&catalog_path, 5000).unwrap(),
            pool: Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(1)
                    .build()
                    .unwrap(),
            ),
            shutdown: Arc::new(AtomicBool::new(false)),
            use_exiftool: false,
            use_ffprobe: false,
        };

        work_tx
            .send(FileInfo {
                absolute_path: media_path,
                relative_path: "Album1/a.jpg".into(),
                album_id: "album-1".into(),
                album_folder_path: "Album1".into(),
                file_size: 8,
                sidecar: None,
            })
            .unwrap();
        drop(work_tx);

        // The worker exits as soon as the queue closes, even though the
        // spawned CPU task may still be running; its result arrives via
        // the task's own sender clone.
        let handle = std::thread::spawn(move || run_worker(ctx));
        handle.join().unwrap();

        match results_rx.recv().unwrap() {
            ScanResult::Record { record, outcome } => {
                assert_eq!(outcome, Outcome::New);
                assert_eq!(record.relative_path, "Album1/a.jpg");
                assert_eq!(record.crc32.as_ref().unwrap().len(), 8);
            }
            other => panic!("expected a Record result, got {:?}", other),
        }
    }
}
