use crate::error::FatalError;
use rusqlite::Connection;

/// Migrations, applied in lexicographic name order. Each step must be safe
/// to re-run (guarded by the schema_version row, and IF NOT EXISTS inside).
const MIGRATIONS: &[(&str, &str)] = &[(
    "0001_initial",
    "
    CREATE TABLE IF NOT EXISTS scan_runs (
        id                       TEXT PRIMARY KEY,
        started_at               TEXT NOT NULL,
        ended_at                 TEXT,
        status                   TEXT NOT NULL DEFAULT 'running',
        files_discovered         INTEGER NOT NULL DEFAULT 0,
        media_files_discovered   INTEGER NOT NULL DEFAULT 0,
        sidecar_files_discovered INTEGER NOT NULL DEFAULT 0,
        files_processed          INTEGER NOT NULL DEFAULT 0,
        new_files                INTEGER NOT NULL DEFAULT 0,
        unchanged_files          INTEGER NOT NULL DEFAULT 0,
        changed_files            INTEGER NOT NULL DEFAULT 0,
        missing_files            INTEGER NOT NULL DEFAULT 0,
        error_files              INTEGER NOT NULL DEFAULT 0,
        inconsistent_files       INTEGER NOT NULL DEFAULT 0,
        albums_total             INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS albums (
        id              TEXT PRIMARY KEY,
        folder_path     TEXT NOT NULL UNIQUE,
        album_type      TEXT NOT NULL,
        title           TEXT,
        description     TEXT,
        created_at      TEXT,
        access_level    TEXT,
        status          TEXT NOT NULL DEFAULT 'present',
        first_seen_at   TEXT NOT NULL,
        last_seen_at    TEXT NOT NULL,
        scan_run_id     TEXT NOT NULL REFERENCES scan_runs(id)
    );

    CREATE TABLE IF NOT EXISTS media_items (
        id                     TEXT PRIMARY KEY,
        relative_path          TEXT NOT NULL UNIQUE,
        album_id               TEXT NOT NULL REFERENCES albums(id),
        mime_type              TEXT,
        file_size              INTEGER NOT NULL,
        crc32                  TEXT CHECK (crc32 IS NULL OR length(crc32) = 8),
        content_fingerprint    TEXT CHECK (content_fingerprint IS NULL
                                           OR length(content_fingerprint) = 64),
        sidecar_fingerprint    TEXT,
        sidecar_path           TEXT,
        width                  INTEGER CHECK (width IS NULL OR width >= 0),
        height                 INTEGER CHECK (height IS NULL OR height >= 0),
        duration_secs          REAL,
        frame_rate             REAL CHECK (frame_rate IS NULL OR frame_rate > 0),
        capture_time           TEXT,
        title                  TEXT,
        description            TEXT,
        gps_latitude           REAL CHECK (gps_latitude IS NULL
                                           OR gps_latitude BETWEEN -90 AND 90),
        gps_longitude          REAL CHECK (gps_longitude IS NULL
                                           OR gps_longitude BETWEEN -180 AND 180),
        gps_altitude           REAL,
        exif_capture_time      TEXT,
        exif_digitized_time    TEXT,
        exif_gps_latitude      REAL CHECK (exif_gps_latitude IS NULL
                                           OR exif_gps_latitude BETWEEN -90 AND 90),
        exif_gps_longitude     REAL CHECK (exif_gps_longitude IS NULL
                                           OR exif_gps_longitude BETWEEN -180 AND 180),
        exif_camera_make       TEXT,
        exif_camera_model      TEXT,
        exif_lens_model        TEXT,
        exif_focal_length      REAL,
        exif_aperture          REAL,
        exif_exposure_time     REAL,
        exif_iso               INTEGER,
        exif_orientation       INTEGER CHECK (exif_orientation IS NULL
                                              OR exif_orientation BETWEEN 1 AND 8),
        json_creation_time     TEXT,
        archived               INTEGER NOT NULL DEFAULT 0,
        trashed                INTEGER NOT NULL DEFAULT 0,
        favorited              INTEGER NOT NULL DEFAULT 0,
        origin                 TEXT,
        status                 TEXT NOT NULL DEFAULT 'present',
        original_media_item_id TEXT,
        live_photo_pair_id     TEXT,
        first_seen_at          TEXT NOT NULL,
        last_seen_at           TEXT NOT NULL,
        scan_run_id            TEXT NOT NULL REFERENCES scan_runs(id)
    );

    CREATE TABLE IF NOT EXISTS people (
        id   TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS people_tags (
        media_item_id TEXT NOT NULL REFERENCES media_items(id),
        person_id     TEXT NOT NULL REFERENCES people(id),
        tag_order     INTEGER NOT NULL CHECK (tag_order >= 0),
        UNIQUE (media_item_id, person_id),
        UNIQUE (media_item_id, tag_order)
    );

    CREATE TABLE IF NOT EXISTS processing_errors (
        id             INTEGER PRIMARY KEY,
        scan_run_id    TEXT NOT NULL REFERENCES scan_runs(id),
        relative_path  TEXT NOT NULL,
        error_type     TEXT NOT NULL,
        error_category TEXT NOT NULL,
        message        TEXT NOT NULL,
        occurred_at    TEXT NOT NULL
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_media_relative_path
        ON media_items(relative_path);
    CREATE INDEX IF NOT EXISTS idx_media_scan_run     ON media_items(scan_run_id);
    CREATE INDEX IF NOT EXISTS idx_media_status       ON media_items(status);
    CREATE INDEX IF NOT EXISTS idx_media_size_crc     ON media_items(file_size, crc32);
    CREATE INDEX IF NOT EXISTS idx_media_album_time   ON media_items(album_id, capture_time);
    CREATE INDEX IF NOT EXISTS idx_media_fingerprint  ON media_items(content_fingerprint);
    CREATE INDEX IF NOT EXISTS idx_media_original     ON media_items(original_media_item_id);
    CREATE INDEX IF NOT EXISTS idx_media_live_pair    ON media_items(live_photo_pair_id);
    CREATE INDEX IF NOT EXISTS idx_errors_scan_run    ON processing_errors(scan_run_id);
    ",
)];

/// Apply pending migrations. The single `schema_version` row counts applied
/// steps; a catalog written by a newer build is refused rather than mangled.
pub fn run_migrations(conn: &Connection) -> Result<(), FatalError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);
         INSERT INTO schema_version SELECT 0
             WHERE NOT EXISTS (SELECT 1 FROM schema_version);",
    )?;

    let supported = MIGRATIONS.len() as u32;
    let current = schema_version(conn)?;
    if current > supported {
        return Err(FatalError::SchemaTooNew {
            found: current,
            supported,
        });
    }

    let mut ordered: Vec<&(&str, &str)> = MIGRATIONS.iter().collect();
    ordered.sort_by_key(|(name, _)| *name);

    for (idx, (name, sql)) in ordered.iter().enumerate() {
        let step = (idx + 1) as u32;
        if step <= current {
            continue;
        }
        tracing::info!("applying catalog migration {}", name);
        conn.execute_batch("BEGIN")?;
        let applied = conn
            .execute_batch(sql)
            .and_then(|_| {
                conn.execute("UPDATE schema_version SET version = ?1", [step])
                    .map(|_| ())
            });
        match applied {
            Ok(()) => conn.execute_batch("COMMIT")?,
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(e.into());
            }
        }
    }

    Ok(())
}

pub fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
        row.get(0)
    })
}
