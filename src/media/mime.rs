use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Returned when the magic bytes identify nothing we catalog as media.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// How much of the head the sniffer reads. Every magic signature `infer`
/// knows sits well inside this window.
const SNIFF_LEN: usize = 8192;

/// Detect the MIME type from the leading bytes of the file. Only `image/*`
/// and `video/*` results are trusted; everything else (including files the
/// matcher cannot identify at all) collapses to the generic sentinel.
/// There is deliberately no extension fallback.
pub fn detect_mime(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(sniff(&buf[..filled]))
}

pub fn sniff(head: &[u8]) -> String {
    match infer::get(head) {
        Some(kind)
            if matches!(
                kind.matcher_type(),
                infer::MatcherType::Image | infer::MatcherType::Video
            ) =>
        {
            kind.mime_type().to_string()
        }
        _ => UNKNOWN_MIME.to_string(),
    }
}

pub fn is_image(mime: &str) -> bool {
    mime.starts_with("image/")
}

pub fn is_video(mime: &str) -> bool {
    mime.starts_with("video/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jpeg_magic() {
        let head = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
        assert_eq!(sniff(&head), "image/jpeg");
    }

    #[test]
    fn test_png_magic() {
        let head = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        assert_eq!(sniff(&head), "image/png");
    }

    #[test]
    fn test_mp4_magic() {
        let mut head = vec![0x00, 0x00, 0x00, 0x18];
        head.extend_from_slice(b"ftypmp42");
        head.extend_from_slice(&[0u8; 16]);
        assert_eq!(sniff(&head), "video/mp4");
    }

    #[test]
    fn test_unknown_bytes_are_sentinel() {
        assert_eq!(sniff(b"this is just text, not media"), UNKNOWN_MIME);
        assert_eq!(sniff(&[]), UNKNOWN_MIME);
    }

    #[test]
    fn test_non_media_magic_is_sentinel() {
        // A ZIP archive has a known signature but is neither image nor video.
        let head = [0x50, 0x4B, 0x03, 0x04, 0, 0, 0, 0];
        assert_eq!(sniff(&head), UNKNOWN_MIME);
    }

    #[test]
    fn test_extension_is_irrelevant() {
        let tmp = tempfile::tempdir().unwrap();
        // PNG bytes behind a .jpg name: content wins.
        let path = tmp.path().join("lies.jpg");
        std::fs::write(&path, [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0]).unwrap();
        assert_eq!(detect_mime(&path).unwrap(), "image/png");
    }

    #[test]
    fn test_helpers() {
        assert!(is_image("image/heic"));
        assert!(is_video("video/quicktime"));
        assert!(!is_image(UNKNOWN_MIME));
    }
}
