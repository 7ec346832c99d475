use crate::error::{ErrorCategory, ItemError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

/// Takeout encodes Unix seconds as strings; older exports used numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum UnixSeconds {
    Text(String),
    Number(i64),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TakeoutTimestamp {
    timestamp: Option<UnixSeconds>,
}

impl TakeoutTimestamp {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let secs = match self.timestamp.as_ref()? {
            UnixSeconds::Text(s) => s.parse::<i64>().ok()?,
            UnixSeconds::Number(n) => *n,
        };
        DateTime::from_timestamp(secs, 0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoData {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
}

impl GeoData {
    /// Takeout writes 0/0 for unset coordinates.
    pub fn coordinates(&self) -> Option<(f64, f64, Option<f64>)> {
        let lat = self.latitude?;
        let lon = self.longitude?;
        if lat == 0.0 && lon == 0.0 {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        Some((lat, lon, self.altitude))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRef {
    pub name: String,
}

/// The per-media Takeout sidecar document. Unknown fields are ignored —
/// Google keeps adding them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub photo_taken_time: Option<TakeoutTimestamp>,
    pub creation_time: Option<TakeoutTimestamp>,
    pub geo_data: Option<GeoData>,
    pub geo_data_exif: Option<GeoData>,
    #[serde(default)]
    pub people: Vec<PersonRef>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub trashed: bool,
    #[serde(default)]
    pub favorited: bool,
    google_photos_origin: Option<serde_json::Value>,
}

impl SidecarMetadata {
    pub fn photo_taken(&self) -> Option<DateTime<Utc>> {
        self.photo_taken_time.as_ref().and_then(|t| t.to_datetime())
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.creation_time.as_ref().and_then(|t| t.to_datetime())
    }

    /// Origin flattened to its discriminating key, e.g. "mobileUpload".
    pub fn origin(&self) -> Option<String> {
        self.google_photos_origin
            .as_ref()?
            .as_object()?
            .keys()
            .next()
            .cloned()
    }

    pub fn people_names(&self) -> Vec<String> {
        self.people.iter().map(|p| p.name.clone()).collect()
    }
}

/// Album-level `metadata.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub access: Option<String>,
    pub date: Option<TakeoutTimestamp>,
}

/// Load a media sidecar. A missing file and malformed JSON are distinct
/// failures; both surface as `json_sidecar` errors upstream.
pub fn load_sidecar(path: &Path) -> Result<SidecarMetadata, ItemError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ItemError::from_io(&e, "read sidecar"))?;
    serde_json::from_str(&text)
        .map_err(|e| ItemError::new(ErrorCategory::ParseError, format!("sidecar json: {e}")))
}

pub fn load_album_metadata(path: &Path) -> Result<AlbumMetadata, ItemError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ItemError::from_io(&e, "read album metadata"))?;
    serde_json::from_str(&text)
        .map_err(|e| ItemError::new(ErrorCategory::ParseError, format!("album metadata json: {e}")))
}
