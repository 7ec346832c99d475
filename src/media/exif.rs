use chrono::{DateTime, Utc};
use std::path::Path;

/// Flattened EXIF fields carried onto the media_items row.
#[derive(Debug, Clone, Default)]
pub struct ExifData {
    pub capture_time: Option<DateTime<Utc>>,
    pub digitized_time: Option<DateTime<Utc>>,
    pub gps_latitude: Option<f64>,
    pub gps_longitude: Option<f64>,
    pub gps_altitude: Option<f64>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens_model: Option<String>,
    pub focal_length: Option<f64>,
    pub aperture: Option<f64>,
    pub exposure_time: Option<f64>,
    pub iso: Option<i64>,
    pub orientation: Option<u16>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Extract EXIF metadata using kamadak-exif.
/// Never panics; returns all-None on any error.
pub fn extract_exif(path: &Path) -> ExifData {
    match std::panic::catch_unwind(|| extract_exif_inner(path)) {
        Ok(data) => data,
        Err(_) => {
            tracing::warn!("panic in extract_exif for {:?}", path);
            ExifData::default()
        }
    }
}

fn extract_exif_inner(path: &Path) -> ExifData {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!("cannot open {:?}: {}", path, e);
            return ExifData::default();
        }
    };
    let mut buf_reader = std::io::BufReader::new(file);
    let exif_reader = exif::Reader::new();
    let exif = match exif_reader.read_from_container(&mut buf_reader) {
        Ok(e) => e,
        Err(e) => {
            tracing::debug!("no EXIF in {:?}: {}", path, e);
            return ExifData::default();
        }
    };

    let (gps_latitude, gps_longitude) = read_gps(&exif);

    ExifData {
        capture_time: read_datetime(&exif, exif::Tag::DateTimeOriginal),
        digitized_time: read_datetime(&exif, exif::Tag::DateTimeDigitized),
        gps_latitude,
        gps_longitude,
        gps_altitude: read_rational(&exif, exif::Tag::GPSAltitude),
        camera_make: read_ascii_tag(&exif, exif::Tag::Make),
        camera_model: read_ascii_tag(&exif, exif::Tag::Model),
        lens_model: read_ascii_tag(&exif, exif::Tag::LensModel),
        focal_length: read_rational(&exif, exif::Tag::FocalLength),
        aperture: read_rational(&exif, exif::Tag::FNumber),
        exposure_time: read_rational(&exif, exif::Tag::ExposureTime),
        iso: read_uint(&exif, exif::Tag::PhotographicSensitivity).map(|v| v as i64),
        orientation: read_orientation(&exif),
        width: read_uint(&exif, exif::Tag::PixelXDimension),
        height: read_uint(&exif, exif::Tag::PixelYDimension),
    }
}

fn read_datetime(exif: &exif::Exif, tag: exif::Tag) -> Option<DateTime<Utc>> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    let s = match &field.value {
        exif::Value::Ascii(vecs) => vecs
            .first()
            .and_then(|v| std::str::from_utf8(v).ok())?
            .to_string(),
        _ => return None,
    };
    parse_exif_datetime(&s)
}

/// EXIF datetime format: "YYYY:MM:DD HH:MM:SS". Treated as UTC; EXIF carries
/// no offset in this tag.
pub fn parse_exif_datetime(s: &str) -> Option<DateTime<Utc>> {
    use chrono::{NaiveDateTime, TimeZone};
    if s.len() < 19 {
        return None;
    }
    let date = s[..10].replace(':', "-");
    let normalized = format!("{} {}", date, &s[11..19]);
    let ndt = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%d %H:%M:%S").ok()?;
    Some(Utc.from_utc_datetime(&ndt))
}

fn read_ascii_tag(exif: &exif::Exif, tag: exif::Tag) -> Option<String> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Ascii(vecs) => {
            let s = vecs
                .first()
                .and_then(|v| std::str::from_utf8(v).ok())?
                .trim()
                .to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        }
        _ => None,
    }
}

fn read_orientation(exif: &exif::Exif) -> Option<u16> {
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Short(v) => v.first().copied().filter(|o| (1..=8).contains(o)),
        _ => None,
    }
}

fn read_rational(exif: &exif::Exif, tag: exif::Tag) -> Option<f64> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Rational(v) => v.first().map(|r| r.to_f64()),
        exif::Value::SRational(v) => v.first().map(|r| r.to_f64()),
        _ => None,
    }
}

fn read_uint(exif: &exif::Exif, tag: exif::Tag) -> Option<u32> {
    exif.get_field(tag, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
}

/// Degrees/minutes/seconds rationals plus an N/S or E/W reference letter,
/// converted to signed decimal degrees.
fn read_gps(exif: &exif::Exif) -> (Option<f64>, Option<f64>) {
    let lat = read_dms(exif, exif::Tag::GPSLatitude)
        .map(|deg| apply_ref(deg, read_ascii_tag(exif, exif::Tag::GPSLatitudeRef), "S"))
        .filter(|d| (-90.0..=90.0).contains(d));
    let lon = read_dms(exif, exif::Tag::GPSLongitude)
        .map(|deg| apply_ref(deg, read_ascii_tag(exif, exif::Tag::GPSLongitudeRef), "W"))
        .filter(|d| (-180.0..=180.0).contains(d));
    (lat, lon)
}

fn read_dms(exif: &exif::Exif, tag: exif::Tag) -> Option<f64> {
    let field = exif.get_field(tag, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Rational(v) if v.len() >= 3 => {
            let d = v[0].to_f64();
            let m = v[1].to_f64();
            let s = v[2].to_f64();
            Some(d + m / 60.0 + s / 3600.0)
        }
        _ => None,
    }
}

fn apply_ref(degrees: f64, reference: Option<String>, negative: &str) -> f64 {
    match reference {
        Some(r) if r.eq_ignore_ascii_case(negative) => -degrees,
        _ => degrees,
    }
}
