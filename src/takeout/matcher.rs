use crate::takeout::sidecar::{
    ext_matches, parse_media_name, parse_sidecar_name, MediaName, SidecarName,
};
use std::collections::HashMap;

/// A media file whose stem matched several plausible sidecars with no
/// unique winner. Both sides stay unmatched.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConflict {
    pub media: String,
    pub candidates: Vec<String>,
}

/// Outcome of matching one album folder.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    /// media file name → sidecar file name; the media file owns the sidecar.
    pub pairs: HashMap<String, String>,
    /// edited variant file name → the original's sidecar file name. The
    /// metadata is shared; the pairing is not owned.
    pub shared: HashMap<String, String>,
    pub unmatched_media: Vec<String>,
    pub unmatched_sidecars: Vec<String>,
    pub conflicts: Vec<MatchConflict>,
}

struct SidecarSlot {
    parsed: SidecarName,
    used: bool,
}

struct Index {
    slots: Vec<SidecarSlot>,
    /// lowercased media stem → slot indices (one entry per interpretation).
    by_stem: HashMap<String, Vec<usize>>,
}

impl Index {
    fn build(sidecar_names: &[String]) -> Self {
        let mut slots = Vec::new();
        let mut by_stem: HashMap<String, Vec<usize>> = HashMap::new();
        for name in sidecar_names {
            let Some(parsed) = parse_sidecar_name(name) else {
                continue;
            };
            let idx = slots.len();
            for key in &parsed.interpretations {
                let bucket = by_stem.entry(key.stem.clone()).or_default();
                if !bucket.contains(&idx) {
                    bucket.push(idx);
                }
            }
            slots.push(SidecarSlot {
                parsed,
                used: false,
            });
        }
        Index { slots, by_stem }
    }

    /// Slot indices whose interpretation matches (stem, ext-prefix) and the
    /// wanted numeric suffix.
    fn candidates(
        &self,
        stem_lower: &str,
        media_ext: &str,
        numeric: Option<u32>,
        include_used: bool,
    ) -> Vec<usize> {
        let Some(bucket) = self.by_stem.get(stem_lower) else {
            return Vec::new();
        };
        bucket
            .iter()
            .copied()
            .filter(|&i| {
                let slot = &self.slots[i];
                if slot.used && !include_used {
                    return false;
                }
                if slot.parsed.numeric_suffix != numeric {
                    return false;
                }
                slot.parsed
                    .interpretations
                    .iter()
                    .any(|k| k.stem == stem_lower && ext_matches(&k.ext, media_ext))
            })
            .collect()
    }

    /// Every unused slot sharing the stem, regardless of suffix. Used for
    /// the ambiguity report.
    fn plausible(&self, stem_lower: &str, media_ext: &str) -> Vec<usize> {
        let Some(bucket) = self.by_stem.get(stem_lower) else {
            return Vec::new();
        };
        bucket
            .iter()
            .copied()
            .filter(|&i| {
                let slot = &self.slots[i];
                !slot.used
                    && slot
                        .parsed
                        .interpretations
                        .iter()
                        .any(|k| k.stem == stem_lower && ext_matches(&k.ext, media_ext))
            })
            .collect()
    }
}

/// Match the media files of one album folder against its sidecars.
///
/// Phases, with exclusion (a consumed sidecar is gone for later media):
/// 1. verbatim stem, sidecar without duplicate suffix, unique winner;
/// 2. numbered duplicates — `(N)` in the media stem against `(N)` after the
///    sidecar's supplemental segment, trying both the end-stripped and the
///    verbatim stem shapes;
/// 3. edited variants — the stripped stem re-runs 1–2 and *shares* the
///    original's sidecar without consuming it;
/// 4. reporting — leftovers at INFO, multi-candidate stalemates at ERROR.
pub fn match_folder(media_names: &[String], sidecar_names: &[String]) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();
    let mut index = Index::build(sidecar_names);

    let mut media: Vec<MediaName> = media_names
        .iter()
        .map(|n| parse_media_name(n))
        .collect();
    media.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    let mut matched: Vec<bool> = vec![false; media.len()];
    let mut conflicted: HashMap<usize, Vec<String>> = HashMap::new();

    // Phase 1: exact stem, unsuffixed sidecar.
    for (i, m) in media.iter().enumerate() {
        if m.edited_token.is_some() {
            continue;
        }
        let stem_lower = m.stem.to_lowercase();
        let found = index.candidates(&stem_lower, &m.ext, None, false);
        match found.len() {
            1 => {
                index.slots[found[0]].used = true;
                outcome.pairs.insert(
                    m.file_name.clone(),
                    index.slots[found[0]].parsed.file_name.clone(),
                );
                matched[i] = true;
            }
            n if n > 1 => {
                conflicted.insert(
                    i,
                    found
                        .iter()
                        .map(|&s| index.slots[s].parsed.file_name.clone())
                        .collect(),
                );
            }
            _ => {}
        }
    }

    // Phase 2: numbered duplicates.
    for (i, m) in media.iter().enumerate() {
        if matched[i] || m.edited_token.is_some() {
            continue;
        }
        let Some(n) = m.numeric_suffix else { continue };
        if let Some(pair) = resolve_numbered(&mut index, m, n, &mut conflicted, i) {
            outcome.pairs.insert(m.file_name.clone(), pair);
            matched[i] = true;
            conflicted.remove(&i);
        }
    }

    // Phase 3: edited variants share the original's sidecar.
    for (i, m) in media.iter().enumerate() {
        if m.edited_token.is_none() {
            continue;
        }
        let Some(stripped) = &m.stem_without_edited else {
            continue;
        };
        let pseudo = parse_media_name(&format!("{}.{}", stripped, m.ext));
        if let Some(slot) = resolve_shared(&index, &pseudo) {
            outcome
                .shared
                .insert(m.file_name.clone(), index.slots[slot].parsed.file_name.clone());
            matched[i] = true;
        } else {
            tracing::info!(
                "no sidecar found for edited variant {} (original stem {:?})",
                m.file_name,
                stripped
            );
        }
    }

    // Phase 4: report.
    for (i, m) in media.iter().enumerate() {
        if matched[i] {
            continue;
        }
        if m.edited_token.is_some() {
            outcome.unmatched_media.push(m.file_name.clone());
            continue;
        }
        let stem_lower = m.stem.to_lowercase();
        let still_plausible = index.plausible(&stem_lower, &m.ext);
        let recorded = conflicted.remove(&i);
        if still_plausible.len() > 1 {
            let candidates: Vec<String> = still_plausible
                .iter()
                .map(|&s| index.slots[s].parsed.file_name.clone())
                .collect();
            tracing::error!(
                "ambiguous sidecars for {}: no unique winner among {:?}",
                m.file_name,
                candidates
            );
            outcome.conflicts.push(MatchConflict {
                media: m.file_name.clone(),
                candidates,
            });
        } else if let Some(candidates) = recorded.filter(|c| c.len() > 1) {
            tracing::error!(
                "ambiguous sidecars for {}: no unique winner among {:?}",
                m.file_name,
                candidates
            );
            outcome.conflicts.push(MatchConflict {
                media: m.file_name.clone(),
                candidates,
            });
        } else {
            tracing::info!("no sidecar for media file {}", m.file_name);
        }
        outcome.unmatched_media.push(m.file_name.clone());
    }

    for slot in &index.slots {
        if !slot.used {
            tracing::info!("unmatched sidecar {}", slot.parsed.file_name);
            outcome.unmatched_sidecars.push(slot.parsed.file_name.clone());
        }
    }
    outcome.unmatched_media.sort();
    outcome.unmatched_sidecars.sort();

    outcome
}

/// Phase 2 lookup for one numbered media file. Tries the end-stripped stem
/// first, then the verbatim stem (interior markers live in both names).
fn resolve_numbered(
    index: &mut Index,
    m: &MediaName,
    n: u32,
    conflicted: &mut HashMap<usize, Vec<String>>,
    media_idx: usize,
) -> Option<String> {
    let mut stems: Vec<String> = Vec::new();
    if let Some(s) = &m.stem_without_number {
        stems.push(s.to_lowercase());
    }
    let verbatim = m.stem.to_lowercase();
    if !stems.contains(&verbatim) {
        stems.push(verbatim);
    }

    for stem in stems {
        let found = index.candidates(&stem, &m.ext, Some(n), false);
        match found.len() {
            1 => {
                index.slots[found[0]].used = true;
                return Some(index.slots[found[0]].parsed.file_name.clone());
            }
            len if len > 1 => {
                conflicted.insert(
                    media_idx,
                    found
                        .iter()
                        .map(|&s| index.slots[s].parsed.file_name.clone())
                        .collect(),
                );
                return None;
            }
            _ => {}
        }
    }
    None
}

/// Phase 3 lookup: same rules as 1–2 but over all sidecars, consumed ones
/// included, because the original keeps ownership.
fn resolve_shared(index: &Index, pseudo: &MediaName) -> Option<usize> {
    let stem_lower = pseudo.stem.to_lowercase();
    let exact = index.candidates(&stem_lower, &pseudo.ext, None, true);
    if exact.len() == 1 {
        return Some(exact[0]);
    }
    if let Some(n) = pseudo.numeric_suffix {
        let mut stems: Vec<String> = Vec::new();
        if let Some(s) = &pseudo.stem_without_number {
            stems.push(s.to_lowercase());
        }
        if !stems.contains(&stem_lower) {
            stems.push(stem_lower);
        }
        for stem in stems {
            let found = index.candidates(&stem, &pseudo.ext, Some(n), true);
            if found.len() == 1 {
                return Some(found[0]);
            }
        }
    }
    None
}
