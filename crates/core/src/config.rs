//! Job framework configuration
//!
//! Configuration can be loaded from a file, environment variables, or created
//! programmatically.

use pdf_editor_scheduler::WorkerPoolConfig;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings shared by the execution engine and the jobs
#[derive(Debug, Clone, PartialEq)]
pub struct JobsConfig {
    /// Number of worker threads for thread-mode jobs
    pub num_workers: usize,
    /// How long an idle worker sleeps before polling the queue again
    pub poll_interval: Duration,
    /// Fonts scanned per cooperative slice of a fonts job
    pub font_scan_batch: usize,
    /// Directory for temporary files written while saving
    pub temp_dir: PathBuf,
}

impl Default for JobsConfig {
    fn default() -> Self {
        let workers = WorkerPoolConfig::default();
        Self {
            num_workers: workers.num_workers,
            poll_interval: workers.poll_interval,
            font_scan_batch: 20,
            temp_dir: Self::default_temp_dir(),
        }
    }
}

/// On-disk layout of the configuration file
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    num_workers: Option<usize>,
    poll_interval_ms: Option<u64>,
    font_scan_batch: Option<usize>,
    temp_dir: Option<PathBuf>,
}

impl JobsConfig {
    /// Sets the number of worker threads.
    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers;
        self
    }

    /// Sets the worker poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the number of fonts scanned per slice.
    pub fn with_font_scan_batch(mut self, batch: usize) -> Self {
        self.font_scan_batch = batch;
        self
    }

    /// Sets the temporary file directory.
    pub fn with_temp_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.temp_dir = path.as_ref().to_path_buf();
        self
    }

    /// Returns the default temporary directory, `pdf-editor` under the
    /// system temporary directory.
    pub fn default_temp_dir() -> PathBuf {
        std::env::temp_dir().join("pdf-editor")
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PDF_EDITOR_JOB_WORKERS`: number of worker threads
    /// - `PDF_EDITOR_JOB_POLL_MS`: worker poll interval in milliseconds (default: 10)
    /// - `PDF_EDITOR_FONT_SCAN_BATCH`: fonts scanned per slice (default: 20)
    /// - `PDF_EDITOR_TMP_DIR`: temporary file directory
    ///
    /// # Errors
    /// Returns an error if any environment variable contains an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PDF_EDITOR_JOB_WORKERS") {
            config.num_workers = parse_positive("PDF_EDITOR_JOB_WORKERS", &val)?;
        }

        if let Ok(val) = std::env::var("PDF_EDITOR_JOB_POLL_MS") {
            let millis = val
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue("PDF_EDITOR_JOB_POLL_MS".to_string()))?;
            config.poll_interval = Duration::from_millis(millis);
        }

        if let Ok(val) = std::env::var("PDF_EDITOR_FONT_SCAN_BATCH") {
            config.font_scan_batch = parse_positive("PDF_EDITOR_FONT_SCAN_BATCH", &val)?;
        }

        if let Ok(val) = std::env::var("PDF_EDITOR_TMP_DIR") {
            config.temp_dir = PathBuf::from(val);
        }

        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// Expected file format:
    /// ```toml
    /// num_workers = 4
    /// poll_interval_ms = 10
    /// font_scan_batch = 20
    /// temp_dir = "/tmp/pdf-editor"
    /// ```
    ///
    /// Missing keys keep their default, unknown keys are ignored.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(toml_str)?;
        let mut config = Self::default();

        if let Some(num_workers) = file.num_workers {
            if num_workers == 0 {
                return Err(ConfigError::InvalidValue("num_workers".to_string()));
            }
            config.num_workers = num_workers;
        }
        if let Some(millis) = file.poll_interval_ms {
            config.poll_interval = Duration::from_millis(millis);
        }
        if let Some(batch) = file.font_scan_batch {
            if batch == 0 {
                return Err(ConfigError::InvalidValue("font_scan_batch".to_string()));
            }
            config.font_scan_batch = batch;
        }
        if let Some(temp_dir) = file.temp_dir {
            config.temp_dir = temp_dir;
        }

        Ok(config)
    }

    /// Worker pool settings for the execution engine
    pub fn worker_pool_config(&self) -> WorkerPoolConfig {
        WorkerPoolConfig::new(self.num_workers).with_poll_interval(self.poll_interval)
    }
}

fn parse_positive(key: &str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::InvalidValue(key.to_string())),
    }
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid value for a configuration parameter
    #[error("invalid configuration value for: {0}")]
    InvalidValue(String),
    /// I/O error reading the configuration file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Malformed configuration file
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_KEYS: [&str; 4] = [
        "PDF_EDITOR_JOB_WORKERS",
        "PDF_EDITOR_JOB_POLL_MS",
        "PDF_EDITOR_FONT_SCAN_BATCH",
        "PDF_EDITOR_TMP_DIR",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_default_config() {
        let config = JobsConfig::default();
        assert!(config.num_workers > 0);
        assert_eq!(config.poll_interval, Duration::from_millis(10));
        assert_eq!(config.font_scan_batch, 20);
        assert!(config.temp_dir.ends_with("pdf-editor"));
    }

    #[test]
    fn test_builder_methods() {
        let config = JobsConfig::default()
            .with_workers(3)
            .with_poll_interval(Duration::from_millis(1))
            .with_font_scan_batch(5)
            .with_temp_dir("/tmp/jobs");

        assert_eq!(config.num_workers, 3);
        assert_eq!(config.font_scan_batch, 5);
        assert_eq!(config.temp_dir, PathBuf::from("/tmp/jobs"));

        let pool = config.worker_pool_config();
        assert_eq!(pool.num_workers, 3);
        assert_eq!(pool.poll_interval, Duration::from_millis(1));
    }

    #[test]
    fn test_from_toml() {
        let config = JobsConfig::from_toml(
            r#"
            # Job settings
            num_workers = 2
            poll_interval_ms = 25
            temp_dir = "/var/tmp/editor"
            unknown_key = true
            "#,
        )
        .unwrap();

        assert_eq!(config.num_workers, 2);
        assert_eq!(config.poll_interval, Duration::from_millis(25));
        assert_eq!(config.font_scan_batch, 20);
        assert_eq!(config.temp_dir, PathBuf::from("/var/tmp/editor"));
    }

    #[test]
    fn test_from_toml_rejects_zero_workers() {
        let err = JobsConfig::from_toml("num_workers = 0").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key) if key == "num_workers"));
    }

    #[test]
    fn test_from_toml_malformed() {
        let err = JobsConfig::from_toml("num_workers = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.toml");
        fs::write(&path, "font_scan_batch = 7\n").unwrap();

        let config = JobsConfig::from_file(&path).unwrap();
        assert_eq!(config.font_scan_batch, 7);

        let missing = JobsConfig::from_file(dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        clear_env();
        std::env::set_var("PDF_EDITOR_JOB_WORKERS", "6");
        std::env::set_var("PDF_EDITOR_JOB_POLL_MS", "3");
        std::env::set_var("PDF_EDITOR_TMP_DIR", "/tmp/editor-env");

        let config = JobsConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.num_workers, 6);
        assert_eq!(config.poll_interval, Duration::from_millis(3));
        assert_eq!(config.font_scan_batch, 20);
        assert_eq!(config.temp_dir, PathBuf::from("/tmp/editor-env"));
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        clear_env();
        std::env::set_var("PDF_EDITOR_FONT_SCAN_BATCH", "zero");

        let result = JobsConfig::from_env();
        clear_env();

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue(key)) if key == "PDF_EDITOR_FONT_SCAN_BATCH"
        ));
    }
}
