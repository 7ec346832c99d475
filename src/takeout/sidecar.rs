use regex::Regex;
use std::sync::OnceLock;

/// Full supplemental segment; exports truncate it anywhere down to the
/// leading dot to respect path-length limits.
pub const SUPPLEMENTAL_SEGMENT: &str = ".supplemental-metadata";

/// Localized editor suffixes, compared case-insensitively against the
/// lowercased stem.
pub const EDITED_TOKENS: &[&str] = &[
    "-edited",
    "-bearbeitet",
    "-modifié",
    "-modificato",
    "-editado",
    "-editada",
    "-編集済み",
    "-편집됨",
    "-已编辑",
    "-已編輯",
];

fn end_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?s)(?P<base>.*)\((?P<n>\d+)\)$").unwrap())
}

fn interior_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((?P<n>\d+)\)\.").unwrap())
}

/// Split a filename at its last dot. The extension comes back without the
/// dot; a dotless name has an empty extension.
pub fn split_stem_ext(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos + 1..]),
        _ => (name, ""),
    }
}

/// A parsed media filename.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaName {
    pub file_name: String,
    /// Stem exactly as it appears on disk (duplicate marker included).
    pub stem: String,
    /// Extension without dot, lowercased.
    pub ext: String,
    /// Valid duplicate marker, if the `(N)` sits at the end of the stem or
    /// immediately before an interior period. Any other placement is not a
    /// duplicate marker.
    pub numeric_suffix: Option<u32>,
    /// Stem with an end-position `(N)` removed. None for interior markers,
    /// whose stem is carried verbatim into the sidecar name.
    pub stem_without_number: Option<String>,
    /// The localized edited token found at the end of the stem, if any.
    pub edited_token: Option<&'static str>,
    /// Stem with the edited token removed, preserving a trailing `(N)` that
    /// sat outside the token.
    pub stem_without_edited: Option<String>,
}

pub fn parse_media_name(file_name: &str) -> MediaName {
    let (stem_raw, ext_raw) = split_stem_ext(file_name);
    let stem = stem_raw.to_string();
    let ext = ext_raw.to_lowercase();

    let (numeric_suffix, stem_without_number) =
        if let Some(caps) = end_number_re().captures(&stem) {
            let n = caps["n"].parse::<u32>().ok();
            (n, n.map(|_| caps["base"].to_string()))
        } else if let Some(caps) = interior_number_re().captures(&stem) {
            (caps["n"].parse::<u32>().ok(), None)
        } else {
            (None, None)
        };

    let (edited_token, stem_without_edited) = find_edited_token(&stem);

    MediaName {
        file_name: file_name.to_string(),
        stem,
        ext,
        numeric_suffix,
        stem_without_number,
        edited_token,
        stem_without_edited,
    }
}

/// Detect a trailing localized edited token, tolerating a `(N)` after it
/// (`photo-edited(1).jpg` strips to `photo(1)`).
fn find_edited_token(stem: &str) -> (Option<&'static str>, Option<String>) {
    let (body, trailing_number) = match end_number_re().captures(stem) {
        Some(caps) => (
            caps["base"].to_string(),
            Some(format!("({})", &caps["n"])),
        ),
        None => (stem.to_string(), None),
    };
    let body_lower = body.to_lowercase();
    for token in EDITED_TOKENS {
        if body_lower.ends_with(token) {
            let cut = body.len() - token.len();
            let mut stripped = body[..cut].to_string();
            if let Some(num) = &trailing_number {
                stripped.push_str(num);
            }
            return (Some(token), Some(stripped));
        }
    }
    (None, None)
}

/// One way of reading a sidecar filename back to its media name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SidecarKey {
    /// Media stem, lowercased.
    pub stem: String,
    /// Media extension, lowercased; possibly truncated by the exporter,
    /// empty for extensionless media.
    pub ext: String,
}

/// A parsed sidecar filename. Truncated supplemental segments can make the
/// reading ambiguous, so up to two interpretations are kept; the matcher
/// resolves collisions.
#[derive(Debug, Clone, PartialEq)]
pub struct SidecarName {
    pub file_name: String,
    /// `(N)` found immediately before `.json`.
    pub numeric_suffix: Option<u32>,
    pub interpretations: Vec<SidecarKey>,
}

/// Parse a sidecar filename. Returns None when the name does not end in
/// `.json`.
pub fn parse_sidecar_name(file_name: &str) -> Option<SidecarName> {
    let lower = file_name.to_lowercase();
    let without_json = lower.strip_suffix(".json")?;

    let (rest, numeric_suffix) = match end_number_re().captures(without_json) {
        Some(caps) => (
            caps["base"].to_string(),
            caps["n"].parse::<u32>().ok(),
        ),
        None => (without_json.to_string(), None),
    };

    let mut interpretations = Vec::new();

    // Longest truncation prefix of ".supplemental-metadata" the name ends
    // with; every truncated family decodes to the same canonical segment.
    let matched_prefix_len = (1..=SUPPLEMENTAL_SEGMENT.len())
        .rev()
        .find(|len| rest.ends_with(&SUPPLEMENTAL_SEGMENT[..*len]));
    if let Some(len) = matched_prefix_len {
        let media_part = &rest[..rest.len() - len];
        let (stem, ext) = split_stem_ext(media_part);
        interpretations.push(SidecarKey {
            stem: stem.to_string(),
            ext: ext.to_string(),
        });
        // The full segment is unambiguous; a truncated one could also be a
        // legitimate media extension, so the legacy reading stays in play.
        if len == SUPPLEMENTAL_SEGMENT.len() {
            return Some(SidecarName {
                file_name: file_name.to_string(),
                numeric_suffix,
                interpretations,
            });
        }
    }

    // Legacy bare form: `<stem>.<ext>.json`.
    let (stem, ext) = split_stem_ext(&rest);
    let legacy = SidecarKey {
        stem: stem.to_string(),
        ext: ext.to_string(),
    };
    if !interpretations.contains(&legacy) {
        interpretations.push(legacy);
    }

    Some(SidecarName {
        file_name: file_name.to_string(),
        numeric_suffix,
        interpretations,
    })
}

/// Case-insensitive, truncation-tolerant extension comparison: the sidecar
/// side may be any prefix of the media extension. Empty matches only empty
/// (extensionless media); the exporter truncates name ends, never an
/// interior extension down to nothing.
pub fn ext_matches(sidecar_ext: &str, media_ext: &str) -> bool {
    if sidecar_ext.is_empty() {
        return media_ext.is_empty();
    }
    media_ext.starts_with(sidecar_ext)
}
