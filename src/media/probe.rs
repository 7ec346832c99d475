use crate::error::{ErrorCategory, FatalError, ItemError};
use crate::media::exif::{parse_exif_datetime, ExifData};
use std::path::Path;
use std::process::Command;

/// Video-stream metadata as reported by ffprobe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoProbe {
    pub duration_secs: Option<f64>,
    pub frame_rate: Option<f64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

/// True when the tool answers `-version` on PATH.
pub fn tool_available(tool: &str) -> bool {
    Command::new(tool)
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .is_ok_and(|ok| ok)
}

/// Enabled tools must actually exist; a half-working run that silently
/// drops every video field is worse than failing at startup.
pub fn ensure_tools(use_exiftool: bool, use_ffprobe: bool) -> Result<(), FatalError> {
    if use_exiftool && !tool_available("exiftool") {
        return Err(FatalError::ToolMissing("exiftool"));
    }
    if use_ffprobe && !tool_available("ffprobe") {
        return Err(FatalError::ToolMissing("ffprobe"));
    }
    Ok(())
}

/// Probe a video with ffprobe. Errors come back as values; the caller
/// records them per item.
pub fn ffprobe_video(path: &Path) -> Result<VideoProbe, ItemError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(|e| ItemError::from_io(&e, "ffprobe spawn"))?;
    if !output.status.success() {
        return Err(ItemError::new(
            ErrorCategory::Corrupted,
            format!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }
    parse_ffprobe_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parse ffprobe's JSON document. Split from the subprocess call so the
/// parsing is testable without the tool installed.
pub fn parse_ffprobe_output(json: &str) -> Result<VideoProbe, ItemError> {
    let doc: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| ItemError::new(ErrorCategory::ParseError, format!("ffprobe json: {e}")))?;

    let duration_secs = doc
        .pointer("/format/duration")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| *d >= 0.0);

    let video_stream = doc
        .pointer("/streams")
        .and_then(|v| v.as_array())
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s.pointer("/codec_type").and_then(|t| t.as_str()) == Some("video"))
        });

    let mut probe = VideoProbe {
        duration_secs,
        ..Default::default()
    };
    if let Some(stream) = video_stream {
        probe.width = stream.pointer("/width").and_then(|v| v.as_i64());
        probe.height = stream.pointer("/height").and_then(|v| v.as_i64());
        probe.frame_rate = stream
            .pointer("/avg_frame_rate")
            .and_then(|v| v.as_str())
            .and_then(parse_frame_rate);
    }
    Ok(probe)
}

/// ffprobe reports rates as a fraction, e.g. "30000/1001" or "25/1".
fn parse_frame_rate(s: &str) -> Option<f64> {
    let (num, den) = s.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if den == 0.0 || num <= 0.0 {
        return None;
    }
    Some(num / den)
}

/// Extract metadata from a RAW file with `exiftool -json -n`.
pub fn exiftool_metadata(path: &Path) -> Result<ExifData, ItemError> {
    let output = Command::new("exiftool")
        .args(["-json", "-n"])
        .arg(path)
        .output()
        .map_err(|e| ItemError::from_io(&e, "exiftool spawn"))?;
    if !output.status.success() {
        return Err(ItemError::new(
            ErrorCategory::Corrupted,
            format!(
                "exiftool exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }
    parse_exiftool_output(&String::from_utf8_lossy(&output.stdout))
}

/// exiftool -json emits an array with one object per input file.
pub fn parse_exiftool_output(json: &str) -> Result<ExifData, ItemError> {
    let doc: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| ItemError::new(ErrorCategory::ParseError, format!("exiftool json: {e}")))?;
    let obj = doc
        .as_array()
        .and_then(|a| a.first())
        .ok_or_else(|| ItemError::new(ErrorCategory::ParseError, "exiftool: empty output"))?;

    let str_field = |key: &str| {
        obj.get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    let num_field = |key: &str| obj.get(key).and_then(|v| v.as_f64());

    Ok(ExifData {
        capture_time: str_field("DateTimeOriginal")
            .as_deref()
            .and_then(parse_exif_datetime),
        digitized_time: str_field("CreateDate").as_deref().and_then(parse_exif_datetime),
        // -n already yields signed decimal degrees
        gps_latitude: num_field("GPSLatitude").filter(|d| (-90.0..=90.0).contains(d)),
        gps_longitude: num_field("GPSLongitude").filter(|d| (-180.0..=180.0).contains(d)),
        gps_altitude: num_field("GPSAltitude"),
        camera_make: str_field("Make"),
        camera_model: str_field("Model"),
        lens_model: str_field("LensModel"),
        focal_length: num_field("FocalLength"),
        aperture: num_field("FNumber"),
        exposure_time: num_field("ExposureTime"),
        iso: obj.get("ISO").and_then(|v| v.as_i64()),
        orientation: obj
            .get("Orientation")
            .and_then(|v| v.as_u64())
            .map(|o| o as u16)
            .filter(|o| (1..=8).contains(o)),
        width: obj.get("ImageWidth").and_then(|v| v.as_u64()).map(|w| w as u32),
        height: obj.get("ImageHeight").and_then(|v| v.as_u64()).map(|h| h as u32),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
        let ntsc = parse_frame_rate("30000/1001").unwrap();
        assert!((ntsc - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("garbage"), None);
        assert_eq!(parse_frame_rate("-25/1"), None);
    }

    #[test]
    fn test_parse_ffprobe_output() {
        let json = r#"{
            "streams": [
                {"codec_type": "audio", "sample_rate": "48000"},
                {"codec_type": "video", "width": 1920, "height": 1080,
                 "avg_frame_rate": "30000/1001"}
            ],
            "format": {"duration": "12.480000"}
        }"#;
        let probe = parse_ffprobe_output(json).unwrap();
        assert_eq!(probe.width, Some(1920));
        assert_eq!(probe.height, Some(1080));
        assert_eq!(probe.duration_secs, Some(12.48));
        assert!((probe.frame_rate.unwrap() - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_parse_ffprobe_no_video_stream() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        let probe = parse_ffprobe_output(json).unwrap();
        assert_eq!(probe, VideoProbe::default());
    }

    #[test]
    fn test_parse_ffprobe_invalid_json() {
        let err = parse_ffprobe_output("nope").unwrap_err();
        assert_eq!(err.category, ErrorCategory::ParseError);
    }

    #[test]
    fn test_parse_exiftool_output() {
        let json = r#"[{
            "SourceFile": "a.cr2",
            "DateTimeOriginal": "2022:08:14 09:15:00",
            "Make": "Canon",
            "Model": "Canon EOS R5",
            "LensModel": "RF24-70mm F2.8 L IS USM",
            "FocalLength": 50.0,
            "FNumber": 2.8,
            "ExposureTime": 0.005,
            "ISO": 200,
            "Orientation": 1,
            "ImageWidth": 8192,
            "ImageHeight": 5464,
            "GPSLatitude": 48.8584,
            "GPSLongitude": 2.2945
        }]"#;
        let data = parse_exiftool_output(json).unwrap();
        assert_eq!(data.camera_make.as_deref(), Some("Canon"));
        assert_eq!(data.camera_model.as_deref(), Some("Canon EOS R5"));
        assert_eq!(data.focal_length, Some(50.0));
        assert_eq!(data.aperture, Some(2.8));
        assert_eq!(data.iso, Some(200));
        assert_eq!(data.width, Some(8192));
        assert_eq!(data.gps_latitude, Some(48.8584));
        assert!(data.capture_time.is_some());
    }

    #[test]
    fn test_parse_exiftool_empty_array() {
        let err = parse_exiftool_output("[]").unwrap_err();
        assert_eq!(err.category, ErrorCategory::ParseError);
    }

    #[test]
    fn test_ensure_tools_disabled_is_ok() {
        assert!(ensure_tools(false, false).is_ok());
    }
}
