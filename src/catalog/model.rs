use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    Present,
    Missing,
    Error,
    Inconsistent,
}

impl MediaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Present => "present",
            MediaStatus::Missing => "missing",
            MediaStatus::Error => "error",
            MediaStatus::Inconsistent => "inconsistent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlbumStatus {
    Present,
    Error,
    Missing,
}

impl AlbumStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlbumStatus::Present => "present",
            AlbumStatus::Error => "error",
            AlbumStatus::Missing => "missing",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlbumType {
    User,
    Year,
}

impl AlbumType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlbumType::User => "user",
            AlbumType::Year => "year",
        }
    }
}

/// An album row as written at discovery time.
#[derive(Debug, Clone)]
pub struct AlbumRecord {
    pub id: String,
    /// Canonical (NFC, forward-slash) path of the album folder relative to
    /// the takeout root.
    pub folder_path: String,
    pub album_type: AlbumType,
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub access_level: Option<String>,
    pub status: AlbumStatus,
}

/// Everything the writer needs to insert or replace one media_items row.
/// Assembled by the aggregation step on a worker thread.
#[derive(Debug, Clone, Default)]
pub struct MediaItemRecord {
    pub id: String,
    pub relative_path: String,
    pub album_id: String,
    pub mime_type: Option<String>,
    pub file_size: i64,
    pub crc32: Option<String>,
    pub content_fingerprint: Option<String>,
    pub sidecar_fingerprint: Option<String>,
    pub sidecar_path: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub duration_secs: Option<f64>,
    pub frame_rate: Option<f64>,
    pub capture_time: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub gps_altitude: Option<f64>,
    pub exif_capture_time: Option<DateTime<Utc>>,
    pub exif_digitized_time: Option<DateTime<Utc>>,
    pub exif_gps_latitude: Option<f64>,
    pub exif_gps_longitude: Option<f64>,
    pub exif_camera_make: Option<String>,
    pub exif_camera_model: Option<String>,
    pub exif_lens_model: Option<String>,
    pub exif_focal_length: Option<f64>,
    pub exif_aperture: Option<f64>,
    pub exif_exposure_time: Option<f64>,
    pub exif_iso: Option<i64>,
    pub exif_orientation: Option<i64>,
    pub json_creation_time: Option<DateTime<Utc>>,
    pub archived: bool,
    pub trashed: bool,
    pub favorited: bool,
    pub origin: Option<String>,
    /// Names in sidecar order; persisted through people/people_tags.
    pub people: Vec<String>,
}

/// Slice of a media_items row used for change detection.
#[derive(Debug, Clone)]
pub struct ChangeDetectionRow {
    pub id: String,
    pub file_size: i64,
    pub content_fingerprint: Option<String>,
}

/// One row of processing_errors.
#[derive(Debug, Clone)]
pub struct ProcessingErrorRecord {
    pub relative_path: String,
    pub error_type: crate::error::ErrorKind,
    pub category: crate::error::ErrorCategory,
    pub message: String,
}

/// Per-run counters, mirrored onto the scan_runs row at batch boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunCounters {
    pub files_discovered: u64,
    pub media_files_discovered: u64,
    pub sidecar_files_discovered: u64,
    pub files_processed: u64,
    pub new_files: u64,
    pub unchanged_files: u64,
    pub changed_files: u64,
    pub missing_files: u64,
    pub error_files: u64,
    pub inconsistent_files: u64,
    pub albums_total: u64,
}

/// Final report of one scan run: the counters plus the error breakdown.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScanSummary {
    pub scan_run_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub counters: RunCounters,
    /// error_category -> count, from processing_errors.
    pub errors_by_category: Vec<(String, u64)>,
    pub files_per_second: f64,
}
