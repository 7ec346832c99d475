use crate::error::{ErrorCategory, ItemError};
use crate::media::aggregate::FileMetadata;
use crate::media::{exif, fingerprint, mime, probe};
use std::path::Path;

/// The pure CPU-side work for one file: hashes, MIME, EXIF, dimensions and
/// the optional video probe. Runs on the CPU pool; failures come back as
/// values — nothing is allowed to unwind across the pool boundary.
pub fn process_file(
    path: &Path,
    use_exiftool: bool,
    use_ffprobe: bool,
) -> Result<FileMetadata, ItemError> {
    match std::panic::catch_unwind(|| process_file_inner(path, use_exiftool, use_ffprobe)) {
        Ok(result) => result,
        Err(_) => Err(ItemError::new(
            ErrorCategory::Unknown,
            format!("panic while processing {}", path.display()),
        )),
    }
}

fn process_file_inner(
    path: &Path,
    use_exiftool: bool,
    use_ffprobe: bool,
) -> Result<FileMetadata, ItemError> {
    let crc32 = fingerprint::crc32_hex(path).map_err(|e| ItemError::from_io(&e, "crc32"))?;
    let content_fingerprint = fingerprint::content_fingerprint(path)
        .map_err(|e| ItemError::from_io(&e, "content fingerprint"))?;
    let mime_type = mime::detect_mime(path).map_err(|e| ItemError::from_io(&e, "mime sniff"))?;

    let mut meta = FileMetadata {
        crc32,
        content_fingerprint,
        mime_type,
        ..Default::default()
    };

    if mime::is_video(&meta.mime_type) {
        if use_ffprobe {
            match probe::ffprobe_video(path) {
                Ok(video) => meta.video = Some(video),
                Err(e) => tracing::warn!("ffprobe failed for {:?}: {}", path, e),
            }
        } else {
            tracing::warn!(
                "video probe disabled; duration/frame rate/resolution null for {:?}",
                path
            );
        }
        return Ok(meta);
    }

    // Image and unknown content both get a best-effort EXIF read; videos
    // are not required to carry EXIF.
    meta.exif = exif::extract_exif(path);

    if mime::is_image(&meta.mime_type) {
        match image::image_dimensions(path) {
            Ok((w, h)) => {
                meta.header_width = Some(w);
                meta.header_height = Some(h);
            }
            Err(e) => tracing::debug!("no header dimensions for {:?}: {}", path, e),
        }
    }

    // RAW formats that kamadak-exif cannot read go through exiftool when
    // enabled; an all-empty EXIF result is the trigger.
    if use_exiftool && meta.exif.capture_time.is_none() && meta.exif.camera_model.is_none() {
        match probe::exiftool_metadata(path) {
            Ok(data) => meta.exif = data,
            Err(e) => tracing::debug!("exiftool fallback failed for {:?}: {}", path, e),
        }
    }

    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_error_value() {
        let err = process_file(Path::new("/no/such/file.jpg"), false, false).unwrap_err();
        assert_eq!(err.category, ErrorCategory::IoError);
    }

    #[test]
    fn test_plain_file_processes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("blob.bin");
        std::fs::write(&path, b"not media at all").unwrap();
        let meta = process_file(&path, false, false).unwrap();
        assert_eq!(meta.crc32.len(), 8);
        assert_eq!(meta.content_fingerprint.len(), 64);
        assert_eq!(meta.mime_type, mime::UNKNOWN_MIME);
        assert!(meta.video.is_none());
    }

    #[test]
    fn test_png_gets_header_dimensions() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tiny.png");
        let img = image::DynamicImage::new_rgb8(3, 2);
        img.save(&path).unwrap();
        let meta = process_file(&path, false, false).unwrap();
        assert_eq!(meta.mime_type, "image/png");
        assert_eq!(meta.header_width, Some(3));
        assert_eq!(meta.header_height, Some(2));
    }

    #[test]
    fn test_video_without_probe_has_null_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("clip.mp4");
        let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
        bytes.extend_from_slice(b"ftypmp42");
        bytes.extend_from_slice(&[0u8; 64]);
        std::fs::write(&path, &bytes).unwrap();
        let meta = process_file(&path, false, false).unwrap();
        assert_eq!(meta.mime_type, "video/mp4");
        assert!(meta.video.is_none());
    }
}
