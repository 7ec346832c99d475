use std::io;
use std::path::PathBuf;

/// Category of a recoverable, per-item failure. Closed set; stored as a
/// string in `processing_errors.error_category`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    PermissionDenied,
    Corrupted,
    IoError,
    ParseError,
    UnsupportedFormat,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::PermissionDenied => "permission_denied",
            ErrorCategory::Corrupted => "corrupted",
            ErrorCategory::IoError => "io_error",
            ErrorCategory::ParseError => "parse_error",
            ErrorCategory::UnsupportedFormat => "unsupported_format",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Total mapping from an I/O error to a category.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => ErrorCategory::PermissionDenied,
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => ErrorCategory::Corrupted,
            _ => ErrorCategory::IoError,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of input the failure was observed on. Stored as a string in
/// `processing_errors.error_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MediaFile,
    JsonSidecar,
    AlbumMetadata,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MediaFile => "media_file",
            ErrorKind::JsonSidecar => "json_sidecar",
            ErrorKind::AlbumMetadata => "album_metadata",
        }
    }
}

/// A recoverable failure carried as a plain value. This is the only error
/// shape that crosses the CPU-pool boundary.
#[derive(Debug, Clone)]
pub struct ItemError {
    pub category: ErrorCategory,
    pub message: String,
}

impl ItemError {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        ItemError {
            category,
            message: message.into(),
        }
    }

    pub fn from_io(err: &io::Error, context: &str) -> Self {
        ItemError {
            category: ErrorCategory::from_io(err),
            message: format!("{context}: {err}"),
        }
    }
}

impl std::fmt::Display for ItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

/// Errors that end the scan run. Everything else is recorded per item and
/// the run keeps going.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("takeout root does not exist: {0}")]
    RootMissing(PathBuf),
    #[error("takeout root is not a directory: {0}")]
    RootNotADirectory(PathBuf),
    #[error("takeout root has no album folders: {0}")]
    RootEmpty(PathBuf),
    #[error("catalog error: {0}")]
    Catalog(#[from] rusqlite::Error),
    #[error("cannot open catalog: {0}")]
    CatalogOpen(#[from] anyhow::Error),
    #[error("catalog schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: u32, supported: u32 },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("required external tool '{0}' is enabled but not on PATH")]
    ToolMissing(&'static str),
    #[error("catalog commit failed after {attempts} attempts: {source}")]
    CommitRetriesExhausted {
        attempts: u32,
        source: rusqlite::Error,
    },
    #[error("cannot build cpu pool: {0}")]
    CpuPool(String),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("scan thread panicked: {0}")]
    ThreadPanic(String),
}
