use crate::catalog::model::{AlbumRecord, AlbumStatus, AlbumType};
use crate::error::{ErrorKind, FatalError, ItemError};
use crate::paths;
use crate::takeout::metadata;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use uuid::Uuid;

/// Namespace for deterministic album ids: two catalogs built from the same
/// tree agree on every album id.
const ALBUM_NAMESPACE: Uuid = Uuid::from_bytes([
    0x6f, 0x1c, 0x6e, 0x0d, 0x5a, 0x84, 0x4b, 0x2e, 0x9b, 0x0a, 0x3d, 0x92, 0x47, 0x8e, 0x1f,
    0x55,
]);

fn year_album_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Photos from (\d{4})$").unwrap())
}

/// An album folder found directly under the takeout root.
#[derive(Debug, Clone)]
pub struct DiscoveredAlbum {
    pub record: AlbumRecord,
    pub absolute_path: PathBuf,
    /// Populated when metadata.json existed but could not be used.
    pub metadata_error: Option<ItemError>,
}

/// Deterministic album identity from the canonical folder path.
pub fn album_id_for(folder_path: &str) -> String {
    Uuid::new_v5(&ALBUM_NAMESPACE, paths::nfc(folder_path).as_bytes()).to_string()
}

/// Enumerate album folders: the top-level directories of the takeout root.
/// There is no recursion — Google Photos albums are flat.
pub fn discover_albums(root: &Path) -> Result<Vec<DiscoveredAlbum>, FatalError> {
    if !root.exists() {
        return Err(FatalError::RootMissing(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(FatalError::RootNotADirectory(root.to_path_buf()));
    }

    let mut albums = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if paths::is_hidden_dir_name(&name) {
            continue;
        }
        albums.push(discover_one(root, &entry.path(), &name));
    }

    if albums.is_empty() {
        return Err(FatalError::RootEmpty(root.to_path_buf()));
    }
    albums.sort_by(|a, b| a.record.folder_path.cmp(&b.record.folder_path));
    Ok(albums)
}

fn discover_one(root: &Path, dir: &Path, name: &str) -> DiscoveredAlbum {
    let folder_path = paths::canonical_relative(root, dir);
    let id = album_id_for(&folder_path);

    if let Some(caps) = year_album_re().captures(name) {
        let year: i32 = caps[1].parse().unwrap_or(0);
        if (1900..=2200).contains(&year) {
            return DiscoveredAlbum {
                record: AlbumRecord {
                    id,
                    folder_path,
                    album_type: AlbumType::Year,
                    title: Some(name.to_string()),
                    description: None,
                    created_at: None,
                    access_level: None,
                    status: AlbumStatus::Present,
                },
                absolute_path: dir.to_path_buf(),
                metadata_error: None,
            };
        }
    }

    let metadata_path = dir.join("metadata.json");
    let (title, description, created_at, access_level, status, metadata_error) =
        if metadata_path.exists() {
            match metadata::load_album_metadata(&metadata_path) {
                Ok(meta) => (
                    meta.title.clone().or_else(|| Some(name.to_string())),
                    meta.description,
                    meta.date.as_ref().and_then(|d| d.to_datetime()),
                    meta.access,
                    AlbumStatus::Present,
                    None,
                ),
                Err(e) => {
                    tracing::warn!("album metadata unreadable for {:?}: {}", dir, e);
                    (
                        Some(name.to_string()),
                        None,
                        None,
                        None,
                        AlbumStatus::Error,
                        Some(e),
                    )
                }
            }
        } else {
            // User folder without metadata.json; the folder name is all we have.
            (Some(name.to_string()), None, None, None, AlbumStatus::Present, None)
        };

    DiscoveredAlbum {
        record: AlbumRecord {
            id,
            folder_path,
            album_type: AlbumType::User,
            title,
            description,
            created_at,
            access_level,
            status,
        },
        absolute_path: dir.to_path_buf(),
        metadata_error,
    }
}

/// The processing_errors row for a broken metadata.json.
pub fn metadata_error_record(
    album: &DiscoveredAlbum,
) -> Option<crate::catalog::model::ProcessingErrorRecord> {
    album
        .metadata_error
        .as_ref()
        .map(|e| crate::catalog::model::ProcessingErrorRecord {
            relative_path: format!("{}/metadata.json", album.record.folder_path),
            error_type: ErrorKind::AlbumMetadata,
            category: e.category,
            message: e.message.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_root() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn test_missing_root_fails_fast() {
        match discover_albums(Path::new("/no/such/root")) {
            Err(FatalError::RootMissing(_)) => {}
            other => panic!("expected RootMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_file_root_fails_fast() {
        let tmp = make_root();
        let file = tmp.path().join("not_a_dir");
        std::fs::write(&file, b"x").unwrap();
        match discover_albums(&file) {
            Err(FatalError::RootNotADirectory(_)) => {}
            other => panic!("expected RootNotADirectory, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_root_fails_for_albums() {
        let tmp = make_root();
        match discover_albums(tmp.path()) {
            Err(FatalError::RootEmpty(_)) => {}
            other => panic!("expected RootEmpty, got {:?}", other),
        }
    }

    #[test]
    fn test_year_album_typing() {
        let tmp = make_root();
        std::fs::create_dir(tmp.path().join("Photos from 2019")).unwrap();
        let albums = discover_albums(tmp.path()).unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].record.album_type, AlbumType::Year);
        assert_eq!(albums[0].record.title.as_deref(), Some("Photos from 2019"));
        assert_eq!(albums[0].record.status, AlbumStatus::Present);
    }

    #[test]
    fn test_year_out_of_range_is_user_album() {
        let tmp = make_root();
        std::fs::create_dir(tmp.path().join("Photos from 1850")).unwrap();
        let albums = discover_albums(tmp.path()).unwrap();
        assert_eq!(albums[0].record.album_type, AlbumType::User);
    }

    #[test]
    fn test_user_album_reads_metadata() {
        let tmp = make_root();
        let dir = tmp.path().join("Summer trip");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(
            dir.join("metadata.json"),
            r#"{"title": "Italy 2019", "description": "Two weeks",
                "date": {"timestamp": "1561980000"}, "access": "protected"}"#,
        )
        .unwrap();
        let albums = discover_albums(tmp.path()).unwrap();
        let rec = &albums[0].record;
        assert_eq!(rec.album_type, AlbumType::User);
        assert_eq!(rec.title.as_deref(), Some("Italy 2019"));
        assert_eq!(rec.description.as_deref(), Some("Two weeks"));
        assert_eq!(rec.access_level.as_deref(), Some("protected"));
        assert!(rec.created_at.is_some());
    }

    #[test]
    fn test_broken_metadata_falls_back_to_folder_name() {
        let tmp = make_root();
        let dir = tmp.path().join("Broken");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("metadata.json"), "{ nope").unwrap();
        let albums = discover_albums(tmp.path()).unwrap();
        let album = &albums[0];
        assert_eq!(album.record.status, AlbumStatus::Error);
        assert_eq!(album.record.title.as_deref(), Some("Broken"));
        let err = metadata_error_record(album).expect("error record expected");
        assert_eq!(err.relative_path, "Broken/metadata.json");
        assert_eq!(err.error_type.as_str(), "album_metadata");
    }

    #[test]
    fn test_album_ids_are_deterministic() {
        assert_eq!(album_id_for("Album1"), album_id_for("Album1"));
        assert_ne!(album_id_for("Album1"), album_id_for("Album2"));
        // NFC normalization applies before hashing
        assert_eq!(album_id_for("Caf\u{0065}\u{0301}"), album_id_for("Caf\u{00e9}"));
    }

    #[test]
    fn test_hidden_dirs_and_files_skipped() {
        let tmp = make_root();
        std::fs::create_dir(tmp.path().join(".stash")).unwrap();
        std::fs::create_dir(tmp.path().join("Album1")).unwrap();
        std::fs::write(tmp.path().join("stray.jpg"), b"x").unwrap();
        let albums = discover_albums(tmp.path()).unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].record.folder_path, "Album1");
    }
}
