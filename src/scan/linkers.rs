use crate::catalog::repository;
use crate::takeout::sidecar::{parse_media_name, split_stem_ext};
use rusqlite::Connection;
use std::collections::HashMap;
use uuid::Uuid;

const LIVE_IMAGE_EXTS: &[&str] = &["heic", "jpg", "jpeg"];
const LIVE_VIDEO_EXT: &str = "mov";

fn split_dir_name(relative_path: &str) -> (&str, &str) {
    match relative_path.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", relative_path),
    }
}

/// Link edited variants to their originals: strip the localized token and
/// look the original up in the same folder. Cross-folder links are never
/// made; a missing original is a warning and a null link.
pub fn link_edited_variants(conn: &Connection, run_id: &str) -> rusqlite::Result<usize> {
    let rows = repository::list_run_media(conn, run_id)?;

    // (dir, stem lower, ext lower) → media_item_id
    let mut by_key: HashMap<(String, String, String), &str> = HashMap::new();
    for (id, path, _) in &rows {
        let (dir, name) = split_dir_name(path);
        let (stem, ext) = split_stem_ext(name);
        by_key
            .entry((dir.to_string(), stem.to_lowercase(), ext.to_lowercase()))
            .or_insert(id.as_str());
    }

    conn.execute_batch("BEGIN")?;
    let mut linked = 0usize;
    let outcome: rusqlite::Result<()> = (|| {
        for (id, path, _) in &rows {
            let (dir, name) = split_dir_name(path);
            let parsed = parse_media_name(name);
            let Some(stripped) = parsed.stem_without_edited else {
                continue;
            };
            let key = (dir.to_string(), stripped.to_lowercase(), parsed.ext.clone());
            match by_key.get(&key) {
                Some(original_id) if *original_id != id.as_str() => {
                    repository::set_original_media_item(conn, id, original_id)?;
                    linked += 1;
                }
                _ => {
                    tracing::warn!("no original found in folder for edited variant {}", path);
                }
            }
        }
        Ok(())
    })();
    match outcome {
        Ok(()) => {
            conn.execute_batch("COMMIT")?;
            tracing::info!("linked {} edited variants", linked);
            Ok(linked)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

/// Pair Live Photos: a HEIC/JPEG still and a MOV clip sharing the exact
/// base name in the same folder get one fresh shared pair id.
pub fn link_live_photos(conn: &Connection, run_id: &str) -> rusqlite::Result<usize> {
    let rows = repository::list_run_media(conn, run_id)?;

    #[derive(Default)]
    struct Bucket<'a> {
        images: Vec<(&'a str, &'a str)>,
        videos: Vec<(&'a str, &'a str)>,
    }

    let mut buckets: HashMap<(String, String), Bucket> = HashMap::new();
    for (id, path, _) in &rows {
        let (dir, name) = split_dir_name(path);
        let (stem, ext) = split_stem_ext(name);
        let ext = ext.to_lowercase();
        let key = (dir.to_string(), stem.to_lowercase());
        if LIVE_IMAGE_EXTS.contains(&ext.as_str()) {
            buckets.entry(key).or_default().images.push((id, path));
        } else if ext == LIVE_VIDEO_EXT {
            buckets.entry(key).or_default().videos.push((id, path));
        }
    }

    conn.execute_batch("BEGIN")?;
    let mut paired = 0usize;
    let outcome: rusqlite::Result<()> = (|| {
        let mut keys: Vec<_> = buckets.keys().cloned().collect();
        keys.sort();
        for key in keys {
            let bucket = &buckets[&key];
            if bucket.images.is_empty() || bucket.videos.is_empty() {
                continue;
            }
            if bucket.images.len() > 1 || bucket.videos.len() > 1 {
                tracing::warn!(
                    "base name {:?}/{:?} has {} stills and {} clips; not pairing",
                    key.0,
                    key.1,
                    bucket.images.len(),
                    bucket.videos.len()
                );
                continue;
            }
            let pair_id = Uuid::new_v4().to_string();
            repository::set_live_photo_pair(
                conn,
                bucket.images[0].0,
                bucket.videos[0].0,
                &pair_id,
            )?;
            paired += 1;
        }
        Ok(())
    })();
    match outcome {
        Ok(()) => {
            conn.execute_batch("COMMIT")?;
            tracing::info!("paired {} live photos", paired);
            Ok(paired)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::model::{AlbumRecord, AlbumStatus, AlbumType, MediaItemRecord, MediaStatus};
    use crate::db::run_migrations;
    use chrono::Utc;

    fn setup() -> (Connection, String) {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let run_id = Uuid::new_v4().to_string();
        repository::insert_scan_run(&conn, &run_id, Utc::now()).unwrap();
        for (id, path) in [("album-1", "Album1"), ("album-2", "Vacation")] {
            let album = AlbumRecord {
                id: id.into(),
                folder_path: path.into(),
                album_type: AlbumType::User,
                title: None,
                description: None,
                created_at: None,
                access_level: None,
                status: AlbumStatus::Present,
            };
            repository::upsert_album(&conn, &album, &run_id, Utc::now()).unwrap();
        }
        (conn, run_id)
    }

    fn insert(conn: &Connection, run_id: &str, album: &str, path: &str) -> String {
        let record = MediaItemRecord {
            id: Uuid::new_v4().to_string(),
            relative_path: path.to_string(),
            album_id: album.to_string(),
            mime_type: Some("image/jpeg".into()),
            file_size: 1,
            crc32: Some("00000000".into()),
            content_fingerprint: Some("c".repeat(64)),
            ..Default::default()
        };
        repository::insert_media_item(conn, &record, MediaStatus::Present, run_id, Utc::now())
            .unwrap();
        record.id
    }

    fn original_of(conn: &Connection, path: &str) -> Option<String> {
        conn.query_row(
            "SELECT original_media_item_id FROM media_items WHERE relative_path = ?1",
            rusqlite::params![path],
            |row| row.get(0),
        )
        .unwrap()
    }

    fn pair_of(conn: &Connection, path: &str) -> Option<String> {
        conn.query_row(
            "SELECT live_photo_pair_id FROM media_items WHERE relative_path = ?1",
            rusqlite::params![path],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_edited_variant_linked_to_original() {
        let (conn, run_id) = setup();
        let original = insert(&conn, &run_id, "album-1", "Album1/IMG_1234.jpg");
        insert(&conn, &run_id, "album-1", "Album1/IMG_1234-edited.jpg");

        let linked = link_edited_variants(&conn, &run_id).unwrap();
        assert_eq!(linked, 1);
        assert_eq!(
            original_of(&conn, "Album1/IMG_1234-edited.jpg"),
            Some(original)
        );
        assert_eq!(original_of(&conn, "Album1/IMG_1234.jpg"), None);
    }

    #[test]
    fn test_edited_variant_not_linked_across_folders() {
        let (conn, run_id) = setup();
        insert(&conn, &run_id, "album-1", "Album1/IMG_5.jpg");
        insert(&conn, &run_id, "album-2", "Vacation/IMG_5-edited.jpg");

        let linked = link_edited_variants(&conn, &run_id).unwrap();
        assert_eq!(linked, 0);
        assert_eq!(original_of(&conn, "Vacation/IMG_5-edited.jpg"), None);
    }

    #[test]
    fn test_live_photo_pairing() {
        let (conn, run_id) = setup();
        insert(&conn, &run_id, "album-2", "Vacation/IMG_9999.HEIC");
        insert(&conn, &run_id, "album-2", "Vacation/IMG_9999.MOV");
        insert(&conn, &run_id, "album-2", "Vacation/IMG_0001.HEIC");

        let paired = link_live_photos(&conn, &run_id).unwrap();
        assert_eq!(paired, 1);
        let a = pair_of(&conn, "Vacation/IMG_9999.HEIC").expect("still paired");
        let b = pair_of(&conn, "Vacation/IMG_9999.MOV").expect("clip paired");
        assert_eq!(a, b);
        assert!(pair_of(&conn, "Vacation/IMG_0001.HEIC").is_none());
    }

    #[test]
    fn test_live_photo_requires_same_folder() {
        let (conn, run_id) = setup();
        insert(&conn, &run_id, "album-1", "Album1/IMG_7.HEIC");
        insert(&conn, &run_id, "album-2", "Vacation/IMG_7.MOV");
        assert_eq!(link_live_photos(&conn, &run_id).unwrap(), 0);
    }

    #[test]
    fn test_ambiguous_live_group_skipped() {
        let (conn, run_id) = setup();
        insert(&conn, &run_id, "album-2", "Vacation/IMG_3.HEIC");
        insert(&conn, &run_id, "album-2", "Vacation/IMG_3.JPG");
        insert(&conn, &run_id, "album-2", "Vacation/IMG_3.MOV");
        assert_eq!(link_live_photos(&conn, &run_id).unwrap(), 0);
    }
}
