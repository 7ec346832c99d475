pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod media;
pub mod paths;
pub mod scan;
pub mod takeout;

pub use catalog::model::ScanSummary;
pub use config::{Config, LogFormat};
pub use error::FatalError;
pub use scan::run_scan;

/// Install the tracing subscriber with the configured level and format.
/// The sink itself (stderr by default) is the embedder's business; calling
/// this twice is a no-op.
pub fn init_logging(config: &Config) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match config.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    if result.is_err() {
        tracing::debug!("logging already initialized");
    }
}
