//! TOML configuration for LearnTrack.
//!
//! Every section has compiled-in defaults, so an absent or partial file is
//! fine. The file is looked up from an explicit path, then the
//! `LEARNTRACK_CONFIG` environment variable, then `./learntrack.toml`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::jobs::ReminderJob;
use crate::notify::{Composer, JsonLogSink, NotificationSink};
use crate::storage::JsonRecordStore;

pub const CONFIG_ENV: &str = "LEARNTRACK_CONFIG";
const LOCAL_CONFIG: &str = "learntrack.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Resolve the configuration file.
    ///
    /// An explicit path must load; the environment and local fallbacks only
    /// warn when broken and drop through to defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "LEARNTRACK_CONFIG set but file could not be loaded, trying fallback"
                ),
            }
        }

        let local = Path::new(LOCAL_CONFIG);
        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => warn!(
                    path = %local.display(),
                    error = %e,
                    "local config file exists but could not be loaded, using defaults"
                ),
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }

    pub fn record_store(&self) -> JsonRecordStore {
        JsonRecordStore::new(
            self.data.users_path(),
            self.data.enrollments_path(),
            self.data.schedules_path(),
        )
    }

    pub fn log_sink(&self) -> JsonLogSink {
        JsonLogSink::new(self.data.email_log_path())
    }

    pub fn composer(&self) -> Composer {
        Composer::new(self.mail.sender.clone())
    }

    /// Reminder job wired to the configured files, or to `sink` when given.
    pub fn reminder_job(&self, sink: Option<Arc<dyn NotificationSink>>) -> ReminderJob {
        let sink: Arc<dyn NotificationSink> = match sink {
            Some(sink) => sink,
            None => Arc::new(self.log_sink()),
        };
        ReminderJob::new(Arc::new(self.record_store()), sink, self.composer())
    }
}

// ---------------------------------------------------------------------------
// Data files
// ---------------------------------------------------------------------------

/// Locations of the record files and the notification log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory the file names below are resolved against.
    pub dir: PathBuf,
    pub users_file: String,
    pub enrollments_file: String,
    pub schedules_file: String,
    pub email_log_file: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            users_file: "users.json".to_string(),
            enrollments_file: "course_enrollments.json".to_string(),
            schedules_file: "course_schedules.json".to_string(),
            email_log_file: "email_log.json".to_string(),
        }
    }
}

impl DataConfig {
    pub fn users_path(&self) -> PathBuf {
        self.dir.join(&self.users_file)
    }

    pub fn enrollments_path(&self) -> PathBuf {
        self.dir.join(&self.enrollments_file)
    }

    pub fn schedules_path(&self) -> PathBuf {
        self.dir.join(&self.schedules_file)
    }

    pub fn email_log_path(&self) -> PathBuf {
        self.dir.join(&self.email_log_file)
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5001".to_string(),
            cors_origins: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Mail
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// `from` address on every notification.
    pub sender: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            sender: "noreply@learningplatform.com".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Six-field cron expression (sec min hour day month weekday), local time.
    pub cron: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cron: "0 0 9 * * *".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
