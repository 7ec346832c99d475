use crate::catalog::model::MediaItemRecord;
use crate::media::exif::ExifData;
use crate::media::probe::VideoProbe;
use crate::media::timestamp::timestamp_from_filename;
use crate::media::{mime, fingerprint};
use crate::takeout::metadata::SidecarMetadata;
use crate::takeout::sidecar::split_stem_ext;

/// Everything the CPU pool computed for one file. A plain value type; it
/// crosses the pool boundary in both directions.
#[derive(Debug, Clone, Default)]
pub struct FileMetadata {
    pub crc32: String,
    pub content_fingerprint: String,
    pub mime_type: String,
    pub exif: ExifData,
    /// Pixel dimensions read from the image header; EXIF may describe a
    /// thumbnail instead of the actual image.
    pub header_width: Option<u32>,
    pub header_height: Option<u32>,
    pub video: Option<VideoProbe>,
}

/// Merge sidecar JSON, EXIF, probe output and filename fallbacks into one
/// record, field by field:
/// capture time  — JSON > EXIF DateTimeOriginal > filename > null;
/// GPS           — JSON geoData > EXIF (EXIF also kept in its own columns);
/// dimensions    — probe for videos, header for images, EXIF as fallback;
/// title         — JSON title > basename without extension.
pub fn build_record(
    media_item_id: String,
    relative_path: &str,
    album_id: &str,
    file_size: u64,
    meta: &FileMetadata,
    sidecar: Option<&SidecarMetadata>,
    sidecar_path: Option<String>,
    sidecar_fingerprint: Option<String>,
) -> MediaItemRecord {
    let file_name = relative_path.rsplit('/').next().unwrap_or(relative_path);
    let (stem, _) = split_stem_ext(file_name);

    let capture_time = sidecar
        .and_then(|s| s.photo_taken())
        .or(meta.exif.capture_time)
        .or_else(|| timestamp_from_filename(file_name));

    let json_coords = sidecar.and_then(|s| s.geo_data.as_ref()).and_then(|g| g.coordinates());
    let (gps_latitude, gps_longitude, gps_altitude) = match json_coords {
        Some((lat, lon, alt)) => (Some(lat), Some(lon), alt),
        None => (
            meta.exif.gps_latitude,
            meta.exif.gps_longitude,
            meta.exif.gps_altitude,
        ),
    };

    let is_video = mime::is_video(&meta.mime_type);
    let (width, height) = if is_video {
        let probe = meta.video.as_ref();
        (
            probe
                .and_then(|v| v.width)
                .or(meta.exif.width.map(|w| w as i64)),
            probe
                .and_then(|v| v.height)
                .or(meta.exif.height.map(|h| h as i64)),
        )
    } else {
        (
            meta.header_width
                .map(|w| w as i64)
                .or(meta.exif.width.map(|w| w as i64)),
            meta.header_height
                .map(|h| h as i64)
                .or(meta.exif.height.map(|h| h as i64)),
        )
    };

    let title = sidecar
        .and_then(|s| s.title.clone())
        .unwrap_or_else(|| stem.to_string());

    MediaItemRecord {
        id: media_item_id,
        relative_path: relative_path.to_string(),
        album_id: album_id.to_string(),
        mime_type: Some(meta.mime_type.clone()),
        file_size: file_size as i64,
        crc32: Some(meta.crc32.clone()),
        content_fingerprint: Some(meta.content_fingerprint.clone()),
        sidecar_fingerprint,
        sidecar_path,
        width,
        height,
        duration_secs: meta.video.as_ref().and_then(|v| v.duration_secs),
        frame_rate: meta.video.as_ref().and_then(|v| v.frame_rate),
        capture_time,
        title: Some(title),
        description: sidecar.and_then(|s| s.description.clone()).filter(|d| !d.is_empty()),
        gps_latitude,
        gps_longitude,
        gps_altitude,
        exif_capture_time: meta.exif.capture_time,
        exif_digitized_time: meta.exif.digitized_time,
        exif_gps_latitude: meta.exif.gps_latitude,
        exif_gps_longitude: meta.exif.gps_longitude,
        exif_camera_make: meta.exif.camera_make.clone(),
        exif_camera_model: meta.exif.camera_model.clone(),
        exif_lens_model: meta.exif.lens_model.clone(),
        exif_focal_length: meta.exif.focal_length,
        exif_aperture: meta.exif.aperture,
        exif_exposure_time: meta.exif.exposure_time,
        exif_iso: meta.exif.iso,
        exif_orientation: meta.exif.orientation.map(|o| o as i64),
        json_creation_time: sidecar.and_then(|s| s.created()),
        archived: sidecar.map(|s| s.archived).unwrap_or(false),
        trashed: sidecar.map(|s| s.trashed).unwrap_or(false),
        favorited: sidecar.map(|s| s.favorited).unwrap_or(false),
        origin: sidecar.and_then(|s| s.origin()),
        people: sidecar.map(|s| s.people_names()).unwrap_or_default(),
    }
}

/// Sidecar fingerprint, used to notice metadata-only changes on rescan.
pub fn sidecar_fingerprint(path: &std::path::Path) -> Option<String> {
    match fingerprint::content_fingerprint(path) {
        Ok(fp) => Some(fp),
        Err(e) => {
            tracing::warn!("cannot fingerprint sidecar {:?}: {}", path, e);
            None
        }
    }
}
