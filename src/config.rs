use crate::error::FatalError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Output shape for log records. The sink itself is chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

/// Scanner configuration. Every recognized option is a named field;
/// deserializing a map with unknown keys is an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Config {
    /// I/O worker thread count.
    pub worker_threads: usize,
    /// CPU pool width (fingerprint/EXIF/MIME work).
    pub worker_processes: usize,
    /// Records per writer transaction.
    pub batch_size: usize,
    /// Capacity of the work and results queues.
    pub queue_maxsize: usize,
    /// Shell out to exiftool for RAW metadata.
    pub use_exiftool: bool,
    /// Shell out to ffprobe for video metadata.
    pub use_ffprobe: bool,
    /// tracing env-filter directive, e.g. "info" or "takeout_cataloger=debug".
    pub log_level: String,
    pub log_format: LogFormat,
    /// SQLite busy timeout in milliseconds.
    pub db_busy_timeout_ms: u64,
    /// Bounded retries for a failing batch commit before the run is fatal.
    pub commit_retry_attempts: u32,
    /// Catalog file location; defaults to the user data directory.
    pub catalog_path: Option<PathBuf>,
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for Config {
    fn default() -> Self {
        let cores = available_cores();
        Config {
            worker_threads: cores * 2,
            worker_processes: (cores * 3 / 4).max(1),
            batch_size: 100,
            queue_maxsize: 1000,
            use_exiftool: false,
            use_ffprobe: false,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            db_busy_timeout_ms: 5000,
            commit_retry_attempts: 3,
            catalog_path: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), FatalError> {
        if self.worker_threads == 0 {
            return Err(FatalError::Config("worker_threads must be >= 1".into()));
        }
        if self.worker_processes == 0 {
            return Err(FatalError::Config("worker_processes must be >= 1".into()));
        }
        if self.batch_size == 0 {
            return Err(FatalError::Config("batch_size must be >= 1".into()));
        }
        if self.queue_maxsize == 0 {
            return Err(FatalError::Config("queue_maxsize must be >= 1".into()));
        }
        if self.commit_retry_attempts == 0 {
            return Err(FatalError::Config("commit_retry_attempts must be >= 1".into()));
        }
        Ok(())
    }

    /// Resolved catalog path: the configured one, else
    /// `<data dir>/takeout-cataloger/catalog.sqlite3`.
    pub fn resolved_catalog_path(&self) -> PathBuf {
        if let Some(p) = &self.catalog_path {
            return p.clone();
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("takeout-cataloger")
            .join("catalog.sqlite3")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.worker_threads >= 2);
        assert!(cfg.worker_processes >= 1);
        assert_eq!(cfg.batch_size, 100);
        assert_eq!(cfg.queue_maxsize, 1000);
        assert!(!cfg.use_exiftool);
        assert!(!cfg.use_ffprobe);
    }

    #[test]
    fn test_zero_fields_rejected() {
        let mut cfg = Config::default();
        cfg.batch_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.worker_threads = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.queue_maxsize = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let json = r#"{"worker_threads": 4, "frobnicate": true}"#;
        let parsed: Result<Config, _> = serde_json::from_str(json);
        assert!(parsed.is_err(), "unknown keys must be rejected");
    }

    #[test]
    fn test_known_keys_accepted() {
        let json = r#"{"worker_threads": 4, "batch_size": 50, "log_format": "json"}"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.worker_threads, 4);
        assert_eq!(cfg.batch_size, 50);
        assert_eq!(cfg.log_format, LogFormat::Json);
        // Unspecified keys fall back to defaults
        assert_eq!(cfg.queue_maxsize, 1000);
    }

    #[test]
    fn test_explicit_catalog_path_wins() {
        let mut cfg = Config::default();
        cfg.catalog_path = Some(PathBuf::from("/tmp/cat.sqlite3"));
        assert_eq!(cfg.resolved_catalog_path(), PathBuf::from("/tmp/cat.sqlite3"));
    }
}
