use crate::catalog::repository;
use crate::scan::progress::ProgressTracker;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

/// Post-scan reconciliation, run after the pipeline fully drains:
/// 1. inconsistency sweep — rows claiming the current run but last seen
///    before it started (a partial-commit or bug guard);
/// 2. missing sweep — present rows the current run never touched;
/// 3. verification — zero present rows may remain from other runs.
pub fn reconcile(
    conn: &Connection,
    run_id: &str,
    scan_started_at: DateTime<Utc>,
    progress: &ProgressTracker,
) -> rusqlite::Result<()> {
    let inconsistent = repository::inconsistency_sweep(conn, run_id, scan_started_at)?;
    if inconsistent > 0 {
        tracing::error!(
            "{} media rows claimed run {} but were last seen before it started; marked inconsistent",
            inconsistent,
            run_id
        );
    }
    progress.set_inconsistent(inconsistent as u64);

    let missing = repository::missing_sweep(conn, run_id)?;
    if missing > 0 {
        tracing::info!("{} media rows no longer on disk; marked missing", missing);
    }
    progress.set_missing(missing as u64);

    let albums_missing = repository::album_missing_sweep(conn, run_id)?;
    if albums_missing > 0 {
        tracing::info!("{} albums no longer on disk; marked missing", albums_missing);
    }

    let leftover = repository::count_present_from_other_runs(conn, run_id)?;
    if leftover != 0 {
        tracing::error!(
            "reconciliation invariant violated: {} present rows from other runs remain",
            leftover
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::{AlbumRecord, AlbumStatus, AlbumType, MediaItemRecord, MediaStatus};
    use crate::db::run_migrations;
    use uuid::Uuid;

    fn setup() -> (Connection, String) {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let run_id = Uuid::new_v4().to_string();
        repository::insert_scan_run(&conn, &run_id, Utc::now()).unwrap();
        let album = AlbumRecord {
            id: "album-1".into(),
            folder_path: "Album1".into(),
            album_type: AlbumType::User,
            title: None,
            description: None,
            created_at: None,
            access_level: None,
            status: AlbumStatus::Present,
        };
        repository::upsert_album(&conn, &album, &run_id, Utc::now()).unwrap();
        (conn, run_id)
    }

    fn insert(conn: &Connection, run_id: &str, path: &str, seen: DateTime<Utc>) {
        let record = MediaItemRecord {
            id: Uuid::new_v4().to_string(),
            relative_path: path.to_string(),
            album_id: "album-1".into(),
            file_size: 1,
            crc32: Some("00000000".into()),
            content_fingerprint: Some("b".repeat(64)),
            ..Default::default()
        };
        repository::insert_media_item(conn, &record, MediaStatus::Present, run_id, seen).unwrap();
    }

    #[test]
    fn test_three_sweeps_together() {
        let (conn, run1) = setup();
        insert(&conn, &run1, "Album1/old.jpg", Utc::now());

        let run2 = Uuid::new_v4().to_string();
        let run2_start = Utc::now();
        repository::insert_scan_run(&conn, &run2, run2_start).unwrap();
        insert(&conn, &run2, "Album1/fresh.jpg", Utc::now());
        // A row stamped with run2 but last seen BEFORE run2 started
        insert(
            &conn,
            &run2,
            "Album1/ghost.jpg",
            run2_start - chrono::Duration::minutes(5),
        );

        let progress = ProgressTracker::default();
        reconcile(&conn, &run2, run2_start, &progress).unwrap();

        let status_of = |path: &str| -> String {
            conn.query_row(
                "SELECT status FROM media_items WHERE relative_path = ?1",
                rusqlite::params![path],
                |row| row.get(0),
            )
            .unwrap()
        };
        assert_eq!(status_of("Album1/fresh.jpg"), "present");
        assert_eq!(status_of("Album1/old.jpg"), "missing");
        assert_eq!(status_of("Album1/ghost.jpg"), "inconsistent");

        assert_eq!(repository::count_present_from_other_runs(&conn, &run2).unwrap(), 0);
        let snap = progress.snapshot();
        assert_eq!(snap.missing_files, 1);
        assert_eq!(snap.inconsistent_files, 1);
    }

    #[test]
    fn test_clean_rescan_reconciles_to_zero() {
        let (conn, run1) = setup();
        let start = Utc::now();
        insert(&conn, &run1, "Album1/a.jpg", Utc::now());
        let progress = ProgressTracker::default();
        reconcile(&conn, &run1, start, &progress).unwrap();
        let snap = progress.snapshot();
        assert_eq!(snap.missing_files, 0);
        assert_eq!(snap.inconsistent_files, 0);
    }
}
