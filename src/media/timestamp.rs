use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Last-resort capture timestamp, recovered from common camera filename
/// shapes. Always UTC; the filename carries no zone.
///
/// Recognized, in order: `IMG_YYYYMMDD_HHMMSS`, `VID_YYYYMMDD_HHMMSS`,
/// bare `YYYYMMDD_HHMMSS`, `YYYY-MM-DD` (midnight).
pub fn timestamp_from_filename(file_name: &str) -> Option<DateTime<Utc>> {
    static DATETIME_RE: OnceLock<Regex> = OnceLock::new();
    static DATE_RE: OnceLock<Regex> = OnceLock::new();

    let datetime_re = DATETIME_RE.get_or_init(|| {
        Regex::new(r"(?:^|[^0-9])(?:IMG_|VID_)?(\d{8})_(\d{6})(?:[^0-9]|$)").unwrap()
    });
    let date_re =
        DATE_RE.get_or_init(|| Regex::new(r"(?:^|[^0-9])(\d{4})-(\d{2})-(\d{2})(?:[^0-9]|$)").unwrap());

    if let Some(caps) = datetime_re.captures(file_name) {
        let date = &caps[1];
        let time = &caps[2];
        let (y, mo, d) = (
            date[0..4].parse().ok()?,
            date[4..6].parse().ok()?,
            date[6..8].parse().ok()?,
        );
        let (h, mi, s) = (
            time[0..2].parse().ok()?,
            time[2..4].parse().ok()?,
            time[4..6].parse().ok()?,
        );
        let ndt = NaiveDate::from_ymd_opt(y, mo, d)?.and_hms_opt(h, mi, s)?;
        return Some(Utc.from_utc_datetime(&ndt));
    }

    if let Some(caps) = date_re.captures(file_name) {
        let (y, mo, d) = (
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        );
        let ndt = NaiveDate::from_ymd_opt(y, mo, d)?.and_hms_opt(0, 0, 0)?;
        return Some(Utc.from_utc_datetime(&ndt));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(dt: DateTime<Utc>) -> String {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    #[test]
    fn test_img_pattern() {
        let dt = timestamp_from_filename("IMG_20200920_131207.jpg").unwrap();
        assert_eq!(fmt(dt), "2020-09-20 13:12:07");
    }

    #[test]
    fn test_vid_pattern() {
        let dt = timestamp_from_filename("VID_20191231_235959.mp4").unwrap();
        assert_eq!(fmt(dt), "2019-12-31 23:59:59");
    }

    #[test]
    fn test_bare_datetime_pattern() {
        let dt = timestamp_from_filename("20180603_081500.jpg").unwrap();
        assert_eq!(fmt(dt), "2018-06-03 08:15:00");
    }

    #[test]
    fn test_date_only_pattern_is_midnight() {
        let dt = timestamp_from_filename("2017-04-01 picnic.jpg").unwrap();
        assert_eq!(fmt(dt), "2017-04-01 00:00:00");
    }

    #[test]
    fn test_screenshot_style() {
        let dt = timestamp_from_filename("Screenshot_20190317-234331.jpg");
        // Date part matches the bare pattern? "20190317-234331" — an 8-digit
        // run followed by '-', not '_': no datetime match, no date match.
        assert!(dt.is_none());
    }

    #[test]
    fn test_invalid_calendar_date_rejected() {
        assert!(timestamp_from_filename("IMG_20201340_121212.jpg").is_none());
        assert!(timestamp_from_filename("IMG_20200920_256161.jpg").is_none());
    }

    #[test]
    fn test_no_pattern() {
        assert!(timestamp_from_filename("beach.jpg").is_none());
        assert!(timestamp_from_filename("123.jpg").is_none());
    }
}
