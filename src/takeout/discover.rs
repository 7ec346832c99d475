use crate::catalog::model::ProcessingErrorRecord;
use crate::error::{ErrorCategory, ErrorKind};
use crate::paths;
use crate::takeout::albums::DiscoveredAlbum;
use crate::takeout::matcher::{self, MatchConflict};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// How a media file relates to its sidecar: owners carry the pairing onto
/// the row; edited variants only borrow the metadata.
#[derive(Debug, Clone)]
pub struct SidecarRef {
    pub absolute_path: PathBuf,
    pub owned: bool,
}

/// One unit of pipeline work.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub absolute_path: PathBuf,
    /// Canonical (NFC, forward-slash) path relative to the takeout root.
    pub relative_path: String,
    pub album_id: String,
    pub album_folder_path: String,
    pub file_size: u64,
    pub sidecar: Option<SidecarRef>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveryStats {
    pub files_discovered: u64,
    pub media_files: u64,
    pub sidecar_files: u64,
}

#[derive(Debug, Default)]
pub struct Discovery {
    pub files: Vec<FileInfo>,
    pub stats: DiscoveryStats,
    /// Matcher stalemates, already logged at ERROR; kept for reporting.
    pub conflicts: Vec<MatchConflict>,
    /// Walk failures (unreadable directories and the like).
    pub errors: Vec<ProcessingErrorRecord>,
}

fn is_sidecar_candidate(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".json") && lower != "metadata.json"
}

/// Walk every album folder, pair media with sidecars folder by folder, and
/// emit work items. JSON files are never work items themselves.
pub fn discover_files(root: &Path, albums: &[DiscoveredAlbum]) -> Discovery {
    let mut discovery = Discovery::default();

    if albums.is_empty() {
        tracing::warn!("no album folders under {:?}; nothing to discover", root);
        return discovery;
    }

    warn_on_stray_root_files(root);

    for album in albums {
        walk_album(root, album, &mut discovery);
    }

    discovery.files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    tracing::info!(
        "discovery complete: {} files ({} media, {} sidecars), {} conflicts",
        discovery.stats.files_discovered,
        discovery.stats.media_files,
        discovery.stats.sidecar_files,
        discovery.conflicts.len()
    );
    discovery
}

/// Files sitting directly under the takeout root belong to no album and are
/// not cataloged.
fn warn_on_stray_root_files(root: &Path) {
    let Ok(entries) = std::fs::read_dir(root) else {
        return;
    };
    for entry in entries.flatten() {
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_file && !paths::is_ignored_file_name(&name) {
            tracing::warn!("skipping file outside any album folder: {:?}", entry.path());
        }
    }
}

fn walk_album(root: &Path, album: &DiscoveredAlbum, discovery: &mut Discovery) {
    // folder → (media names, sidecar names) for the album-scoped matcher
    let mut folders: HashMap<PathBuf, (Vec<String>, Vec<String>)> = HashMap::new();

    for entry in WalkDir::new(&album.absolute_path)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            !(e.file_type().is_dir()
                && paths::is_hidden_dir_name(&e.file_name().to_string_lossy()))
        })
    {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| paths::canonical_relative(root, p))
                    .unwrap_or_else(|| album.record.folder_path.clone());
                tracing::warn!("walk error under {:?}: {}", album.absolute_path, e);
                discovery.errors.push(ProcessingErrorRecord {
                    relative_path: path,
                    error_type: ErrorKind::MediaFile,
                    category: e
                        .io_error()
                        .map(ErrorCategory::from_io)
                        .unwrap_or(ErrorCategory::IoError),
                    message: format!("directory walk: {e}"),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() || entry.path_is_symlink() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if paths::is_ignored_file_name(&name) {
            continue;
        }
        discovery.stats.files_discovered += 1;
        if name.eq_ignore_ascii_case("metadata.json") {
            // Album metadata, consumed by album discovery.
            continue;
        }
        let parent = entry
            .path()
            .parent()
            .unwrap_or(&album.absolute_path)
            .to_path_buf();
        let bucket = folders.entry(parent).or_default();
        if is_sidecar_candidate(&name) {
            discovery.stats.sidecar_files += 1;
            bucket.1.push(name);
        } else {
            discovery.stats.media_files += 1;
            bucket.0.push(name);
        }
    }

    let mut folder_list: Vec<_> = folders.into_iter().collect();
    folder_list.sort_by(|a, b| a.0.cmp(&b.0));

    for (folder, (media_names, sidecar_names)) in folder_list {
        let outcome = matcher::match_folder(&media_names, &sidecar_names);
        discovery.conflicts.extend(outcome.conflicts.clone());

        for media_name in media_names {
            let absolute_path = folder.join(&media_name);
            let file_size = match std::fs::metadata(&absolute_path) {
                Ok(m) => m.len(),
                Err(e) => {
                    tracing::warn!("cannot stat {:?}: {}", absolute_path, e);
                    discovery.errors.push(ProcessingErrorRecord {
                        relative_path: paths::canonical_relative(root, &absolute_path),
                        error_type: ErrorKind::MediaFile,
                        category: ErrorCategory::from_io(&e),
                        message: format!("stat: {e}"),
                    });
                    continue;
                }
            };
            let sidecar = outcome
                .pairs
                .get(&media_name)
                .map(|s| SidecarRef {
                    absolute_path: folder.join(s),
                    owned: true,
                })
                .or_else(|| {
                    outcome.shared.get(&media_name).map(|s| SidecarRef {
                        absolute_path: folder.join(s),
                        owned: false,
                    })
                });

            discovery.files.push(FileInfo {
                relative_path: paths::canonical_relative(root, &absolute_path),
                absolute_path,
                album_id: album.record.id.clone(),
                album_folder_path: album.record.folder_path.clone(),
                file_size,
                sidecar,
            });
        }
    }
}
