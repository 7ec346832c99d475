use crate::media::fingerprint;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::Path;

/// A set of byte-identical media items living at different paths.
#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub file_size: i64,
    pub crc32: String,
    /// (media_item_id, relative_path) of every confirmed member.
    pub members: Vec<(String, String)>,
}

/// Find duplicate media across the catalog.
///
/// Candidates come from the `(file_size, crc32)` index; each candidate group
/// is then confirmed with a full-file SHA-256, since the stored head+tail
/// fingerprint can collide for large files that agree at the edges.
/// Confirmation reads from the live tree under `root`; members whose file is
/// no longer readable are skipped.
pub fn find_duplicates(conn: &Connection, root: &Path) -> rusqlite::Result<Vec<DuplicateGroup>> {
    let mut stmt = conn.prepare(
        "SELECT m.file_size, m.crc32, m.id, m.relative_path
         FROM media_items m
         JOIN (SELECT file_size, crc32 FROM media_items
               WHERE crc32 IS NOT NULL AND status = 'present'
               GROUP BY file_size, crc32
               HAVING COUNT(*) > 1) dup
           ON dup.file_size = m.file_size AND dup.crc32 = m.crc32
         WHERE m.status = 'present'
         ORDER BY m.file_size, m.crc32, m.relative_path",
    )?;
    let rows: Vec<(i64, String, String, String)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?
        .collect::<rusqlite::Result<_>>()?;

    let mut groups: Vec<DuplicateGroup> = Vec::new();
    let mut current: Option<(i64, String, Vec<(String, String)>)> = None;
    for (size, crc, id, rel) in rows {
        match &mut current {
            Some((cur_size, cur_crc, members)) if *cur_size == size && *cur_crc == crc => {
                members.push((id, rel));
            }
            _ => {
                if let Some(group) = current.take() {
                    groups.extend(confirm_group(root, group));
                }
                current = Some((size, crc, vec![(id, rel)]));
            }
        }
    }
    if let Some(group) = current.take() {
        groups.extend(confirm_group(root, group));
    }
    Ok(groups)
}

/// Split one candidate group by full-file hash; only sub-groups with two or
/// more byte-identical members survive.
fn confirm_group(
    root: &Path,
    (file_size, crc32, members): (i64, String, Vec<(String, String)>),
) -> Vec<DuplicateGroup> {
    let mut by_hash: HashMap<String, Vec<(String, String)>> = HashMap::new();
    for (id, rel) in members {
        let path = root.join(&rel);
        match fingerprint::full_sha256(&path) {
            Ok(hash) => by_hash.entry(hash).or_default().push((id, rel)),
            Err(e) => {
                tracing::warn!("duplicate check: cannot hash {}: {}", rel, e);
            }
        }
    }
    by_hash
        .into_values()
        .filter(|v| v.len() > 1)
        .map(|mut members| {
            members.sort_by(|a, b| a.1.cmp(&b.1));
            DuplicateGroup {
                file_size,
                crc32: crc32.clone(),
                members,
            }
        })
        .collect()
}
