use std::path::Path;
use unicode_normalization::UnicodeNormalization;

/// NFC-normalize a string. All paths stored in the catalog go through this
/// so that macOS (NFD) and Linux exports of the same tree agree.
pub fn nfc(s: &str) -> String {
    s.nfc().collect()
}

/// Canonical relative path: NFC, forward slashes, no leading separator.
pub fn canonical_relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let joined = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    nfc(&joined)
}

const SYSTEM_FILE_NAMES: &[&str] = &["Thumbs.db", "desktop.ini", ".DS_Store"];
const TEMP_EXTENSIONS: &[&str] = &["tmp", "temp", "part", "crdownload"];

/// True for files the walker should never turn into work items: dotfiles,
/// OS droppings, editor/download temporaries. Extension-based *media*
/// filtering is deliberately absent; the MIME sniffer is authoritative.
pub fn is_ignored_file_name(name: &str) -> bool {
    if name.starts_with('.') {
        return true;
    }
    if SYSTEM_FILE_NAMES.iter().any(|s| s.eq_ignore_ascii_case(name)) {
        return true;
    }
    if name.ends_with('~') {
        return true;
    }
    if let Some((_, ext)) = name.rsplit_once('.') {
        if TEMP_EXTENSIONS.iter().any(|t| ext.eq_ignore_ascii_case(t)) {
            return true;
        }
    }
    false
}

/// Hidden directories are skipped wholesale during the walk.
pub fn is_hidden_dir_name(name: &str) -> bool {
    name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_nfc_composes_decomposed_input() {
        // "é" as 'e' + combining acute vs the precomposed form
        let decomposed = "Caf\u{0065}\u{0301}";
        let composed = "Caf\u{00e9}";
        assert_eq!(nfc(decomposed), composed);
        assert_eq!(nfc(composed), composed);
    }

    #[test]
    fn test_canonical_relative_uses_forward_slashes() {
        let root = PathBuf::from("/takeout/Google Photos");
        let file = root.join("Album1").join("a.jpg");
        assert_eq!(canonical_relative(&root, &file), "Album1/a.jpg");
    }

    #[test]
    fn test_canonical_relative_foreign_path_kept_as_is() {
        let root = PathBuf::from("/takeout");
        let file = PathBuf::from("/elsewhere/b.jpg");
        assert_eq!(canonical_relative(&root, &file), "elsewhere/b.jpg");
    }

    #[test]
    fn test_ignored_names() {
        assert!(is_ignored_file_name(".hidden"));
        assert!(is_ignored_file_name(".DS_Store"));
        assert!(is_ignored_file_name("Thumbs.db"));
        assert!(is_ignored_file_name("thumbs.DB"));
        assert!(is_ignored_file_name("desktop.ini"));
        assert!(is_ignored_file_name("draft.jpg~"));
        assert!(is_ignored_file_name("download.part"));
        assert!(is_ignored_file_name("x.TMP"));
    }

    #[test]
    fn test_ordinary_names_not_ignored() {
        assert!(!is_ignored_file_name("IMG_0001.jpg"));
        assert!(!is_ignored_file_name("movie.mp4"));
        // No extension filtering here: arbitrary extensions pass through
        assert!(!is_ignored_file_name("file.xyz"));
        // Tilde duplicates are ordinary names, not temporaries
        assert!(!is_ignored_file_name("IMG~2.jpg"));
    }

    #[test]
    fn test_hidden_dirs() {
        assert!(is_hidden_dir_name(".git"));
        assert!(!is_hidden_dir_name("Photos from 2020"));
    }
}
