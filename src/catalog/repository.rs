use crate::catalog::model::{
    AlbumRecord, ChangeDetectionRow, MediaItemRecord, MediaStatus, ProcessingErrorRecord,
    RunCounters, RunStatus, ScanSummary,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

// ── Private helpers ───────────────────────────────────────────────────────────

/// Execute a prepared statement, collect all rows with `f`, and return a Vec.
/// Factored out to avoid the repetitive `prepare → query_map → collect` boilerplate.
fn collect_rows<T, F>(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    f: F,
) -> rusqlite::Result<Vec<T>>
where
    F: Fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, f)?;
    rows.collect()
}

fn rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ── Scan runs ─────────────────────────────────────────────────────────────────

/// Any `running` run found at startup is a leftover from a crash; close it
/// out as failed so the single-running-run invariant holds for the new run.
pub fn fail_stale_running_runs(conn: &Connection, now: DateTime<Utc>) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE scan_runs SET status = 'failed', ended_at = ?1 WHERE status = 'running'",
        params![rfc3339(&now)],
    )
}

pub fn insert_scan_run(
    conn: &Connection,
    run_id: &str,
    started_at: DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO scan_runs (id, started_at, status) VALUES (?1, ?2, 'running')",
        params![run_id, rfc3339(&started_at)],
    )?;
    Ok(())
}

/// Mirror the in-memory counters onto the run row. Called inside the same
/// transaction as each writer batch.
pub fn update_run_counters(
    conn: &Connection,
    run_id: &str,
    c: &RunCounters,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE scan_runs SET
             files_discovered = ?2, media_files_discovered = ?3,
             sidecar_files_discovered = ?4, files_processed = ?5,
             new_files = ?6, unchanged_files = ?7, changed_files = ?8,
             missing_files = ?9, error_files = ?10, inconsistent_files = ?11,
             albums_total = ?12
         WHERE id = ?1",
        params![
            run_id,
            c.files_discovered as i64,
            c.media_files_discovered as i64,
            c.sidecar_files_discovered as i64,
            c.files_processed as i64,
            c.new_files as i64,
            c.unchanged_files as i64,
            c.changed_files as i64,
            c.missing_files as i64,
            c.error_files as i64,
            c.inconsistent_files as i64,
            c.albums_total as i64,
        ],
    )?;
    Ok(())
}

/// Transition a run out of `running`: status, end timestamp and final
/// counters land in one statement so the row is never half-finished.
pub fn finish_scan_run(
    conn: &Connection,
    run_id: &str,
    status: RunStatus,
    ended_at: DateTime<Utc>,
    c: &RunCounters,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE scan_runs SET
             status = ?2, ended_at = ?3,
             files_discovered = ?4, media_files_discovered = ?5,
             sidecar_files_discovered = ?6, files_processed = ?7,
             new_files = ?8, unchanged_files = ?9, changed_files = ?10,
             missing_files = ?11, error_files = ?12, inconsistent_files = ?13,
             albums_total = ?14
         WHERE id = ?1",
        params![
            run_id,
            status.as_str(),
            rfc3339(&ended_at),
            c.files_discovered as i64,
            c.media_files_discovered as i64,
            c.sidecar_files_discovered as i64,
            c.files_processed as i64,
            c.new_files as i64,
            c.unchanged_files as i64,
            c.changed_files as i64,
            c.missing_files as i64,
            c.error_files as i64,
            c.inconsistent_files as i64,
            c.albums_total as i64,
        ],
    )?;
    Ok(())
}

/// Load the final summary for a run: row counters plus the error breakdown.
pub fn load_summary(conn: &Connection, run_id: &str) -> rusqlite::Result<ScanSummary> {
    let (status, started_at, ended_at, counters) = conn.query_row(
        "SELECT status, started_at, ended_at,
                files_discovered, media_files_discovered, sidecar_files_discovered,
                files_processed, new_files, unchanged_files, changed_files,
                missing_files, error_files, inconsistent_files, albums_total
         FROM scan_runs WHERE id = ?1",
        params![run_id],
        |row| {
            let status: String = row.get(0)?;
            let started: String = row.get(1)?;
            let ended: Option<String> = row.get(2)?;
            let counters = RunCounters {
                files_discovered: row.get::<_, i64>(3)? as u64,
                media_files_discovered: row.get::<_, i64>(4)? as u64,
                sidecar_files_discovered: row.get::<_, i64>(5)? as u64,
                files_processed: row.get::<_, i64>(6)? as u64,
                new_files: row.get::<_, i64>(7)? as u64,
                unchanged_files: row.get::<_, i64>(8)? as u64,
                changed_files: row.get::<_, i64>(9)? as u64,
                missing_files: row.get::<_, i64>(10)? as u64,
                error_files: row.get::<_, i64>(11)? as u64,
                inconsistent_files: row.get::<_, i64>(12)? as u64,
                albums_total: row.get::<_, i64>(13)? as u64,
            };
            Ok((status, started, ended, counters))
        },
    )?;

    let errors_by_category = collect_rows(
        conn,
        "SELECT error_category, COUNT(*) FROM processing_errors
         WHERE scan_run_id = ?1 GROUP BY error_category ORDER BY error_category",
        params![run_id],
        |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64)),
    )?;

    let started = parse_ts(&started_at).unwrap_or_else(Utc::now);
    let ended = ended_at.as_deref().and_then(parse_ts);
    let elapsed = ended
        .map(|e| (e - started).num_milliseconds() as f64 / 1000.0)
        .unwrap_or(0.0);
    let files_per_second = if elapsed > 0.0 {
        counters.files_processed as f64 / elapsed
    } else {
        0.0
    };

    let status = match status.as_str() {
        "completed" => RunStatus::Completed,
        "failed" => RunStatus::Failed,
        _ => RunStatus::Running,
    };

    Ok(ScanSummary {
        scan_run_id: run_id.to_string(),
        status,
        started_at: started,
        ended_at: ended,
        counters,
        errors_by_category,
        files_per_second,
    })
}

// ── Albums ────────────────────────────────────────────────────────────────────

/// Insert a new album or refresh an existing one (same deterministic id).
/// `first_seen_at` is only ever written once.
pub fn upsert_album(
    conn: &Connection,
    album: &AlbumRecord,
    run_id: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<()> {
    let ts = rfc3339(&now);
    conn.execute(
        "INSERT INTO albums
             (id, folder_path, album_type, title, description, created_at,
              access_level, status, first_seen_at, last_seen_at, scan_run_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, ?10)
         ON CONFLICT(id) DO UPDATE SET
             title = excluded.title,
             description = excluded.description,
             created_at = excluded.created_at,
             access_level = excluded.access_level,
             status = excluded.status,
             last_seen_at = excluded.last_seen_at,
             scan_run_id = excluded.scan_run_id",
        params![
            album.id,
            album.folder_path,
            album.album_type.as_str(),
            album.title,
            album.description,
            album.created_at.as_ref().map(rfc3339),
            album.access_level,
            album.status.as_str(),
            ts,
            run_id,
        ],
    )?;
    Ok(())
}

/// Albums not touched by the current run have disappeared from the tree.
pub fn album_missing_sweep(conn: &Connection, run_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE albums SET status = 'missing'
         WHERE scan_run_id != ?1 AND status != 'missing'",
        params![run_id],
    )
}

// ── Media items ───────────────────────────────────────────────────────────────

/// Change-detection lookup by canonical relative path.
pub fn lookup_by_relative_path(
    conn: &Connection,
    relative_path: &str,
) -> rusqlite::Result<Option<ChangeDetectionRow>> {
    conn.query_row(
        "SELECT id, file_size, content_fingerprint
         FROM media_items WHERE relative_path = ?1",
        params![relative_path],
        |row| {
            Ok(ChangeDetectionRow {
                id: row.get(0)?,
                file_size: row.get(1)?,
                content_fingerprint: row.get(2)?,
            })
        },
    )
    .optional()
}

fn bind_media_columns(
    conn: &Connection,
    sql: &str,
    record: &MediaItemRecord,
    status: MediaStatus,
    run_id: &str,
    seen_at: DateTime<Utc>,
) -> rusqlite::Result<()> {
    let ts = rfc3339(&seen_at);
    conn.execute(
        sql,
        params![
            record.id,
            record.relative_path,
            record.album_id,
            record.mime_type,
            record.file_size,
            record.crc32,
            record.content_fingerprint,
            record.sidecar_fingerprint,
            record.sidecar_path,
            record.width,
            record.height,
            record.duration_secs,
            record.frame_rate,
            record.capture_time.as_ref().map(rfc3339),
            record.title,
            record.description,
            record.gps_latitude,
            record.gps_longitude,
            record.gps_altitude,
            record.exif_capture_time.as_ref().map(rfc3339),
            record.exif_digitized_time.as_ref().map(rfc3339),
            record.exif_gps_latitude,
            record.exif_gps_longitude,
            record.exif_camera_make,
            record.exif_camera_model,
            record.exif_lens_model,
            record.exif_focal_length,
            record.exif_aperture,
            record.exif_exposure_time,
            record.exif_iso,
            record.exif_orientation,
            record.json_creation_time.as_ref().map(rfc3339),
            record.archived as i64,
            record.trashed as i64,
            record.favorited as i64,
            record.origin,
            status.as_str(),
            ts,
            run_id,
        ],
    )?;
    Ok(())
}

/// Insert a freshly discovered media item (plus its people tags).
pub fn insert_media_item(
    conn: &Connection,
    record: &MediaItemRecord,
    status: MediaStatus,
    run_id: &str,
    seen_at: DateTime<Utc>,
) -> rusqlite::Result<()> {
    bind_media_columns(
        conn,
        "INSERT INTO media_items
             (id, relative_path, album_id, mime_type, file_size, crc32,
              content_fingerprint, sidecar_fingerprint, sidecar_path,
              width, height, duration_secs, frame_rate, capture_time,
              title, description, gps_latitude, gps_longitude, gps_altitude,
              exif_capture_time, exif_digitized_time, exif_gps_latitude,
              exif_gps_longitude, exif_camera_make, exif_camera_model,
              exif_lens_model, exif_focal_length, exif_aperture,
              exif_exposure_time, exif_iso, exif_orientation,
              json_creation_time, archived, trashed, favorited, origin,
              status, first_seen_at, last_seen_at, scan_run_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                 ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26,
                 ?27, ?28, ?29, ?30, ?31, ?32, ?33, ?34, ?35, ?36, ?37, ?38,
                 ?38, ?39)",
        record,
        status,
        run_id,
        seen_at,
    )?;
    replace_people_tags(conn, &record.id, &record.people)?;
    Ok(())
}

/// Rewrite an existing row after its content changed. The id and
/// first_seen_at survive; everything else reflects the current file.
pub fn update_media_item(
    conn: &Connection,
    record: &MediaItemRecord,
    status: MediaStatus,
    run_id: &str,
    seen_at: DateTime<Utc>,
) -> rusqlite::Result<()> {
    bind_media_columns(
        conn,
        "UPDATE media_items SET
             relative_path = ?2, album_id = ?3, mime_type = ?4, file_size = ?5,
             crc32 = ?6, content_fingerprint = ?7, sidecar_fingerprint = ?8,
             sidecar_path = ?9, width = ?10, height = ?11, duration_secs = ?12,
             frame_rate = ?13, capture_time = ?14, title = ?15, description = ?16,
             gps_latitude = ?17, gps_longitude = ?18, gps_altitude = ?19,
             exif_capture_time = ?20, exif_digitized_time = ?21,
             exif_gps_latitude = ?22, exif_gps_longitude = ?23,
             exif_camera_make = ?24, exif_camera_model = ?25,
             exif_lens_model = ?26, exif_focal_length = ?27,
             exif_aperture = ?28, exif_exposure_time = ?29, exif_iso = ?30,
             exif_orientation = ?31, json_creation_time = ?32, archived = ?33,
             trashed = ?34, favorited = ?35, origin = ?36,
             status = ?37, last_seen_at = ?38, scan_run_id = ?39
         WHERE id = ?1",
        record,
        status,
        run_id,
        seen_at,
    )?;
    replace_people_tags(conn, &record.id, &record.people)?;
    Ok(())
}

/// Unchanged file: refresh the lifecycle columns and nothing else.
pub fn touch_media_item(
    conn: &Connection,
    media_item_id: &str,
    run_id: &str,
    seen_at: DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE media_items SET status = 'present', last_seen_at = ?2, scan_run_id = ?3
         WHERE id = ?1",
        params![media_item_id, rfc3339(&seen_at), run_id],
    )?;
    Ok(())
}

/// Record a per-file failure: a minimal row (insert or refresh) with
/// status 'error' and a current scan_run_id, so the item stays live.
pub fn record_media_error(
    conn: &Connection,
    relative_path: &str,
    album_id: &str,
    file_size: i64,
    run_id: &str,
    seen_at: DateTime<Utc>,
) -> rusqlite::Result<String> {
    if let Some(existing) = lookup_by_relative_path(conn, relative_path)? {
        conn.execute(
            "UPDATE media_items SET status = 'error', last_seen_at = ?2, scan_run_id = ?3
             WHERE id = ?1",
            params![existing.id, rfc3339(&seen_at), run_id],
        )?;
        return Ok(existing.id);
    }
    let id = Uuid::new_v4().to_string();
    let ts = rfc3339(&seen_at);
    conn.execute(
        "INSERT INTO media_items
             (id, relative_path, album_id, file_size, status,
              first_seen_at, last_seen_at, scan_run_id)
         VALUES (?1, ?2, ?3, ?4, 'error', ?5, ?5, ?6)",
        params![id, relative_path, album_id, file_size, ts, run_id],
    )?;
    Ok(id)
}

// ── People ────────────────────────────────────────────────────────────────────

/// Same name, same person: the id is minted once per distinct name.
pub fn upsert_person(conn: &Connection, name: &str) -> rusqlite::Result<String> {
    if let Some(id) = conn
        .query_row(
            "SELECT id FROM people WHERE name = ?1",
            params![name],
            |row| row.get::<_, String>(0),
        )
        .optional()?
    {
        return Ok(id);
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO people (id, name) VALUES (?1, ?2)",
        params![id, name],
    )?;
    Ok(id)
}

/// Replace the tag set for one media item, preserving sidecar order.
pub fn replace_people_tags(
    conn: &Connection,
    media_item_id: &str,
    names: &[String],
) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM people_tags WHERE media_item_id = ?1",
        params![media_item_id],
    )?;
    let mut order: i64 = 0;
    for name in names {
        let person_id = upsert_person(conn, name)?;
        // A person listed twice in one sidecar collapses to one tag.
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO people_tags (media_item_id, person_id, tag_order)
             VALUES (?1, ?2, ?3)",
            params![media_item_id, person_id, order],
        )?;
        if inserted > 0 {
            order += 1;
        }
    }
    Ok(())
}

// ── Processing errors ─────────────────────────────────────────────────────────

pub fn insert_processing_error(
    conn: &Connection,
    run_id: &str,
    error: &ProcessingErrorRecord,
    occurred_at: DateTime<Utc>,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO processing_errors
             (scan_run_id, relative_path, error_type, error_category, message, occurred_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            run_id,
            error.relative_path,
            error.error_type.as_str(),
            error.category.as_str(),
            error.message,
            rfc3339(&occurred_at),
        ],
    )?;
    Ok(())
}

// ── Reconciliation sweeps ─────────────────────────────────────────────────────

/// Rows claiming the current run but last seen before it started cannot be
/// trusted; mark them inconsistent.
pub fn inconsistency_sweep(
    conn: &Connection,
    run_id: &str,
    scan_started_at: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE media_items SET status = 'inconsistent'
         WHERE scan_run_id = ?1 AND last_seen_at < ?2",
        params![run_id, rfc3339(&scan_started_at)],
    )
}

/// Present rows not touched by the current run are gone from the tree.
pub fn missing_sweep(conn: &Connection, run_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE media_items SET status = 'missing'
         WHERE status = 'present' AND scan_run_id != ?1",
        params![run_id],
    )
}

/// Post-reconciliation check: must be zero.
pub fn count_present_from_other_runs(conn: &Connection, run_id: &str) -> rusqlite::Result<u64> {
    conn.query_row(
        "SELECT COUNT(*) FROM media_items WHERE status = 'present' AND scan_run_id != ?1",
        params![run_id],
        |row| row.get::<_, i64>(0).map(|n| n as u64),
    )
}

// ── Linker queries ────────────────────────────────────────────────────────────

/// (id, relative_path, mime_type) of every row the current run touched and
/// left present; input for the edited-variant and Live-Photo linkers.
pub fn list_run_media(
    conn: &Connection,
    run_id: &str,
) -> rusqlite::Result<Vec<(String, String, Option<String>)>> {
    collect_rows(
        conn,
        "SELECT id, relative_path, mime_type FROM media_items
         WHERE scan_run_id = ?1 AND status = 'present'
         ORDER BY relative_path",
        params![run_id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )
}

pub fn set_original_media_item(
    conn: &Connection,
    edited_id: &str,
    original_id: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE media_items SET original_media_item_id = ?2 WHERE id = ?1",
        params![edited_id, original_id],
    )?;
    Ok(())
}

pub fn set_live_photo_pair(
    conn: &Connection,
    image_id: &str,
    video_id: &str,
    pair_id: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE media_items SET live_photo_pair_id = ?2 WHERE id IN (?1, ?3)",
        params![image_id, pair_id, video_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::{AlbumStatus, AlbumType};
    use crate::db::run_migrations;

    fn setup() -> (Connection, String) {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let run_id = Uuid::new_v4().to_string();
        insert_scan_run(&conn, &run_id, Utc::now()).unwrap();
        (conn, run_id)
    }

    fn test_album(conn: &Connection, run_id: &str) -> AlbumRecord {
        let album = AlbumRecord {
            id: "album-1".into(),
            folder_path: "Album1".into(),
            album_type: AlbumType::User,
            title: Some("Album1".into()),
            description: None,
            created_at: None,
            access_level: None,
            status: AlbumStatus::Present,
        };
        upsert_album(conn, &album, run_id, Utc::now()).unwrap();
        album
    }

    fn minimal_record(album_id: &str, path: &str) -> MediaItemRecord {
        MediaItemRecord {
            id: Uuid::new_v4().to_string(),
            relative_path: path.to_string(),
            album_id: album_id.to_string(),
            mime_type: Some("image/jpeg".into()),
            file_size: 123,
            crc32: Some("0a1b2c3d".into()),
            content_fingerprint: Some("f".repeat(64)),
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_and_lookup_roundtrip() {
        let (conn, run_id) = setup();
        let album = test_album(&conn, &run_id);
        let record = minimal_record(&album.id, "Album1/a.jpg");
        insert_media_item(&conn, &record, MediaStatus::Present, &run_id, Utc::now()).unwrap();

        let row = lookup_by_relative_path(&conn, "Album1/a.jpg")
            .unwrap()
            .expect("row must exist");
        assert_eq!(row.id, record.id);
        assert_eq!(row.file_size, 123);
        assert_eq!(row.content_fingerprint.as_deref(), Some(&"f".repeat(64)[..]));

        assert!(lookup_by_relative_path(&conn, "Album1/missing.jpg")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_touch_updates_lifecycle_only() {
        let (conn, run_id) = setup();
        let album = test_album(&conn, &run_id);
        let record = minimal_record(&album.id, "Album1/a.jpg");
        insert_media_item(&conn, &record, MediaStatus::Present, &run_id, Utc::now()).unwrap();

        let run2 = Uuid::new_v4().to_string();
        insert_scan_run(&conn, &run2, Utc::now()).unwrap();
        touch_media_item(&conn, &record.id, &run2, Utc::now()).unwrap();

        let (status, seen_run): (String, String) = conn
            .query_row(
                "SELECT status, scan_run_id FROM media_items WHERE id = ?1",
                params![record.id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(status, "present");
        assert_eq!(seen_run, run2);
    }

    #[test]
    fn test_people_tags_preserve_order_and_dedupe() {
        let (conn, run_id) = setup();
        let album = test_album(&conn, &run_id);
        let mut record = minimal_record(&album.id, "Album1/a.jpg");
        record.people = vec!["Alice".into(), "Bob".into(), "Alice".into()];
        insert_media_item(&conn, &record, MediaStatus::Present, &run_id, Utc::now()).unwrap();

        let tags: Vec<(String, i64)> = collect_rows(
            &conn,
            "SELECT p.name, t.tag_order FROM people_tags t
             JOIN people p ON p.id = t.person_id
             WHERE t.media_item_id = ?1 ORDER BY t.tag_order",
            params![record.id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
        assert_eq!(tags, vec![("Alice".to_string(), 0), ("Bob".to_string(), 1)]);
    }

    #[test]
    fn test_same_name_same_person() {
        let (conn, _) = setup();
        let a = upsert_person(&conn, "Alice").unwrap();
        let b = upsert_person(&conn, "Alice").unwrap();
        assert_eq!(a, b);
        let c = upsert_person(&conn, "Bob").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_missing_sweep_only_hits_foreign_present_rows() {
        let (conn, run1) = setup();
        let album = test_album(&conn, &run1);
        let old = minimal_record(&album.id, "Album1/old.jpg");
        insert_media_item(&conn, &old, MediaStatus::Present, &run1, Utc::now()).unwrap();

        let run2 = Uuid::new_v4().to_string();
        insert_scan_run(&conn, &run2, Utc::now()).unwrap();
        let fresh = minimal_record(&album.id, "Album1/fresh.jpg");
        insert_media_item(&conn, &fresh, MediaStatus::Present, &run2, Utc::now()).unwrap();

        let swept = missing_sweep(&conn, &run2).unwrap();
        assert_eq!(swept, 1);
        assert_eq!(count_present_from_other_runs(&conn, &run2).unwrap(), 0);

        let status: String = conn
            .query_row(
                "SELECT status FROM media_items WHERE id = ?1",
                params![old.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(status, "missing");
    }

    #[test]
    fn test_inconsistency_sweep() {
        let (conn, run_id) = setup();
        let album = test_album(&conn, &run_id);
        let record = minimal_record(&album.id, "Album1/a.jpg");
        let stale = Utc::now() - chrono::Duration::hours(1);
        insert_media_item(&conn, &record, MediaStatus::Present, &run_id, stale).unwrap();

        let swept = inconsistency_sweep(&conn, &run_id, Utc::now()).unwrap();
        assert_eq!(swept, 1);
    }

    #[test]
    fn test_finish_scan_run_is_atomic_row() {
        let (conn, run_id) = setup();
        let counters = RunCounters {
            files_processed: 7,
            new_files: 7,
            ..Default::default()
        };
        finish_scan_run(&conn, &run_id, RunStatus::Completed, Utc::now(), &counters).unwrap();
        let summary = load_summary(&conn, &run_id).unwrap();
        assert_eq!(summary.status, RunStatus::Completed);
        assert!(summary.ended_at.is_some());
        assert_eq!(summary.counters.files_processed, 7);
    }

    #[test]
    fn test_record_media_error_keeps_item_live() {
        let (conn, run_id) = setup();
        let album = test_album(&conn, &run_id);
        let id =
            record_media_error(&conn, "Album1/bad.jpg", &album.id, 42, &run_id, Utc::now())
                .unwrap();
        // Second failure on the same path reuses the row
        let id2 =
            record_media_error(&conn, "Album1/bad.jpg", &album.id, 42, &run_id, Utc::now())
                .unwrap();
        assert_eq!(id, id2);
        let status: String = conn
            .query_row(
                "SELECT status FROM media_items WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(status, "error");
    }

    #[test]
    fn test_stale_running_runs_failed_on_startup() {
        let (conn, _run) = setup();
        assert_eq!(fail_stale_running_runs(&conn, Utc::now()).unwrap(), 1);
        let open: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM scan_runs WHERE status = 'running'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(open, 0);
    }
}
