//! Configuration loading and validation.
//!
//! Settings live in a TOML file with one section per concern. Every field
//! has a default, so a missing file, an empty file, or a partial file always
//! yields a usable configuration.
//!
//! ```toml
//! [service]
//! base_url = "http://localhost:8000"
//! timeout_secs = 30
//!
//! [retry]
//! max_retries = 5
//! base_delay_ms = 1000
//! max_delay_ms = 30000
//! jitter_ms = 1000
//!
//! [workflow]
//! iterations = 3
//! results_per_page = 5
//! pacing = true
//!
//! [status]
//! check_interval_secs = 4
//!
//! [sessions]
//! autosave = true
//! ```
//!
//! The default location is `config.toml` under the platform configuration
//! directory (for example `~/.config/seminar/`); `--config` and the
//! `SEMINAR_CONFIG` environment variable override it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::ServiceConfig;
use crate::error::{Result, SeminarError};
use crate::retry::{
    RetryPolicy, DEFAULT_BASE_DELAY_MS, DEFAULT_JITTER_BOUND_MS, DEFAULT_MAX_DELAY_MS,
    DEFAULT_MAX_RETRIES,
};
use crate::session::persistence::SessionPersistence;
use crate::status::DEFAULT_CHECK_INTERVAL;
use crate::workflow::{
    SequencerConfig, DEFAULT_ITERATIONS, DEFAULT_RESULTS_PER_PAGE, MAX_ITERATIONS, MIN_ITERATIONS,
};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "config.toml";

// ============================================================================
// Sections
// ============================================================================

/// Retry behavior for service calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempt budget per call, first try included.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Upper bound of the random jitter added to each delay, in
    /// milliseconds. Zero disables jitter.
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

fn default_jitter_ms() -> u64 {
    DEFAULT_JITTER_BOUND_MS
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl RetryConfig {
    /// Validate the retry settings.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_retries == 0 {
            return Err("retry.max_retries must be at least 1".to_string());
        }
        if self.base_delay_ms == 0 {
            return Err("retry.base_delay_ms must be greater than zero".to_string());
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err("retry.max_delay_ms must be at least retry.base_delay_ms".to_string());
        }
        Ok(())
    }

    /// Build the retry policy these settings describe.
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_retries(self.max_retries)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_jitter_bound(Duration::from_millis(self.jitter_ms))
    }
}

/// Discussion workflow defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Rounds per discussion, within `1..=5`.
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// Search results requested per round.
    #[serde(default = "default_results_per_page")]
    pub results_per_page: u32,

    /// Whether to sleep briefly before each service call.
    #[serde(default = "default_pacing")]
    pub pacing: bool,
}

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

fn default_results_per_page() -> u32 {
    DEFAULT_RESULTS_PER_PAGE
}

fn default_pacing() -> bool {
    true
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            results_per_page: default_results_per_page(),
            pacing: default_pacing(),
        }
    }
}

impl WorkflowConfig {
    /// Validate the workflow settings.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(MIN_ITERATIONS..=MAX_ITERATIONS).contains(&self.iterations) {
            return Err(format!(
                "workflow.iterations must be between {MIN_ITERATIONS} and {MAX_ITERATIONS}, got {}",
                self.iterations
            ));
        }
        if self.results_per_page == 0 {
            return Err("workflow.results_per_page must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Service availability monitoring settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Seconds between availability probes.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
}

fn default_check_interval_secs() -> u64 {
    DEFAULT_CHECK_INTERVAL.as_secs()
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
        }
    }
}

impl StatusConfig {
    /// Validate the monitoring settings.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.check_interval_secs == 0 {
            return Err("status.check_interval_secs must be greater than zero".to_string());
        }
        Ok(())
    }

    /// The probing interval as a duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

/// Transcript storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Directory for the sessions file. Defaults to the platform data
    /// directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Whether commands persist transcripts automatically.
    #[serde(default = "default_autosave")]
    pub autosave: bool,
}

fn default_autosave() -> bool {
    true
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            autosave: default_autosave(),
        }
    }
}

// ============================================================================
// Top-Level Configuration
// ============================================================================

/// All seminar settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeminarConfig {
    /// Study service connection.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Retry behavior for service calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Discussion workflow defaults.
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Availability monitoring.
    #[serde(default)]
    pub status: StatusConfig,

    /// Transcript storage.
    #[serde(default)]
    pub sessions: SessionsConfig,
}

impl SeminarConfig {
    /// Load and validate the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            SeminarError::config_with_path(
                format!("failed to read configuration: {e}"),
                path.to_path_buf(),
            )
        })?;
        let config: Self = toml::from_str(&contents).map_err(|e| {
            SeminarError::config_with_path(
                format!("failed to parse configuration: {e}"),
                path.to_path_buf(),
            )
        })?;
        config
            .validate()
            .map_err(|reason| SeminarError::config_with_path(reason, path.to_path_buf()))?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Load from an explicit path, the default location, or fall back to
    /// defaults.
    ///
    /// An explicit path must exist; the default location is optional.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("no configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// The platform-default configuration file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("seminar").join(CONFIG_FILE))
    }

    /// Validate every section.
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.service.validate()?;
        self.retry.validate()?;
        self.workflow.validate()?;
        self.status.validate()?;
        Ok(())
    }

    /// Build the sequencer configuration these settings describe.
    pub fn sequencer_config(&self) -> SequencerConfig {
        let content_fetch = RetryPolicy::content_fetch()
            .with_jitter_bound(Duration::from_millis(self.retry.jitter_ms));
        SequencerConfig::new()
            .with_iterations(self.workflow.iterations)
            .with_results_per_page(self.workflow.results_per_page)
            .with_pacing(self.workflow.pacing)
            .with_retry_policy(self.retry.to_policy())
            .with_content_fetch_policy(content_fetch)
    }

    /// Build the persistence manager for the configured sessions directory.
    pub fn session_persistence(&self) -> Result<SessionPersistence> {
        let dir = match &self.sessions.dir {
            Some(dir) => dir.clone(),
            None => SessionPersistence::default_dir()?,
        };
        Ok(SessionPersistence::new(dir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that the defaults pass validation.
    #[test]
    fn test_default_config_is_valid() {
        let config = SeminarConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.workflow.iterations, DEFAULT_ITERATIONS);
        assert_eq!(config.status.check_interval_secs, 4);
        assert!(config.sessions.autosave);
    }

    /// Test parsing a complete configuration file.
    #[test]
    fn test_parse_full_config() {
        let config: SeminarConfig = toml::from_str(
            r#"
            [service]
            base_url = "https://study.example.com"
            api_key = "secret"
            timeout_secs = 10

            [retry]
            max_retries = 3
            base_delay_ms = 100
            max_delay_ms = 2000
            jitter_ms = 0

            [workflow]
            iterations = 2
            results_per_page = 3
            pacing = false

            [status]
            check_interval_secs = 2

            [sessions]
            dir = "/tmp/seminar-sessions"
            autosave = false
            "#,
        )
        .unwrap();

        assert_eq!(config.service.base_url, "https://study.example.com");
        assert_eq!(config.service.api_key.as_deref(), Some("secret"));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.workflow.iterations, 2);
        assert!(!config.workflow.pacing);
        assert_eq!(config.status.interval(), Duration::from_secs(2));
        assert_eq!(
            config.sessions.dir.as_deref(),
            Some(Path::new("/tmp/seminar-sessions"))
        );
        assert!(!config.sessions.autosave);
        assert!(config.validate().is_ok());
    }

    /// Test that partial files fall back to defaults per field.
    #[test]
    fn test_parse_partial_config() {
        let config: SeminarConfig = toml::from_str(
            r#"
            [workflow]
            iterations = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.workflow.iterations, 4);
        assert_eq!(config.workflow.results_per_page, DEFAULT_RESULTS_PER_PAGE);
        assert_eq!(config.retry.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.service.base_url, "http://localhost:8000");
    }

    /// Test that an empty file yields the default configuration.
    #[test]
    fn test_parse_empty_config() {
        let config: SeminarConfig = toml::from_str("").unwrap();
        assert!(config.validate().is_ok());
    }

    /// Test section validation failures.
    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = SeminarConfig::default();
        config.workflow.iterations = 0;
        assert!(config.validate().unwrap_err().contains("iterations"));

        let mut config = SeminarConfig::default();
        config.workflow.iterations = 9;
        assert!(config.validate().is_err());

        let mut config = SeminarConfig::default();
        config.retry.max_delay_ms = 10;
        config.retry.base_delay_ms = 100;
        assert!(config.validate().unwrap_err().contains("max_delay_ms"));

        let mut config = SeminarConfig::default();
        config.status.check_interval_secs = 0;
        assert!(config.validate().unwrap_err().contains("check_interval"));
    }

    /// Test loading from a file on disk.
    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[workflow]\niterations = 5\n").unwrap();

        let config = SeminarConfig::load(&path).unwrap();
        assert_eq!(config.workflow.iterations, 5);
    }

    /// Test that an explicit missing path is an error, not a default.
    #[test]
    fn test_load_or_default_requires_explicit_path() {
        let missing = Path::new("/nonexistent/seminar/config.toml");
        let error = SeminarConfig::load_or_default(Some(missing)).unwrap_err();
        assert!(matches!(error, SeminarError::Config { .. }));
    }

    /// Test that invalid TOML surfaces a configuration error with the path.
    #[test]
    fn test_load_rejects_invalid_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "workflow = [not toml").unwrap();

        let error = SeminarConfig::load(&path).unwrap_err();
        assert!(error.to_string().contains("parse"));
    }

    /// Test that invalid values are rejected at load time.
    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[workflow]\niterations = 0\n").unwrap();

        assert!(SeminarConfig::load(&path).is_err());
    }

    /// Test the conversion into a sequencer configuration.
    #[test]
    fn test_sequencer_config_conversion() {
        let mut config = SeminarConfig::default();
        config.workflow.iterations = 2;
        config.workflow.pacing = false;
        config.retry.max_retries = 7;
        config.retry.jitter_ms = 0;

        let sequencer = config.sequencer_config();
        assert_eq!(sequencer.iterations, 2);
        assert!(!sequencer.pacing);
        assert_eq!(sequencer.retry.max_retries, 7);
        assert_eq!(sequencer.retry.jitter_bound, Duration::ZERO);
        assert_eq!(sequencer.content_fetch.jitter_bound, Duration::ZERO);
    }

    /// Test the sessions directory override.
    #[test]
    fn test_session_persistence_honors_dir_override() {
        let mut config = SeminarConfig::default();
        config.sessions.dir = Some(PathBuf::from("/tmp/seminar-test-sessions"));

        let persistence = config.session_persistence().unwrap();
        assert_eq!(
            persistence.sessions_file_path(),
            PathBuf::from("/tmp/seminar-test-sessions/sessions.json")
        );
    }
}
