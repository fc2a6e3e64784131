use std::collections::HashSet;
use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for `interval`, `timeout` and `cleanup_interval`, in seconds
pub const MAX_PERIOD_SECS: u64 = 365 * 24 * 60 * 60;
/// Upper bound for `storage.retention_days`
pub const MAX_RETENTION_DAYS: u32 = 36_500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    ReadFailed {
        path: path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    ParseFailed {
        path: path::PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("could not determine a default config path ($XDG_CONFIG_HOME and $HOME are unset)")]
    ConfigPathUnavailable,
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub databases: Vec<DatabaseTarget>,
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub alert: AlertSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

/// One monitored database endpoint.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseTarget {
    #[serde(rename = "db_name")]
    pub name: String,
    pub host: String,
    pub port: u16,
    pub service_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(rename = "enable", default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl fmt::Debug for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseTarget")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("service_name", &self.service_name)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Seconds between two cycles
    pub interval: u64,
    /// Per-check liveness timeout in seconds
    pub timeout: u64,
    pub max_concurrent: usize,
    /// Accepted for compatibility, not used by the scheduler
    #[serde(default)]
    pub batch_size: usize,
}

/// Declared alerting cadence. Parsed and validated but not consulted by the
/// alert hook yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertSettings {
    #[serde(default)]
    pub initial_interval: Option<u64>,
    #[serde(default)]
    pub max_interval: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_db_path")]
    pub path: path::PathBuf,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Rows older than this many days are pruned. Cleanup is off when unset.
    #[serde(default)]
    pub retention_days: Option<u32>,
    /// Seconds between two retention passes
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
}

fn default_db_path() -> path::PathBuf {
    path::PathBuf::from("monitor.db")
}

fn default_pool_size() -> usize {
    4
}

fn default_cleanup_interval() -> u64 {
    3600
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            pool_size: default_pool_size(),
            retention_days: None,
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/dbwatch/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Ok(home_dir) = env::var("HOME") {
        path::PathBuf::from(home_dir).join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("dbwatch/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };
        let optional = |value: Option<u64>| value.map_or_else(|| "unset".to_string(), |v| v.to_string());

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_title_2 = write_title_indented(2);
        let write_2 = write_indented(2);

        writeln!(f, "Current Monitor Configuration:")?;
        write_title_1(f, "Monitor")?;
        write_1(f, "Interval (s)", &self.monitor.interval)?;
        write_1(f, "Timeout (s)", &self.monitor.timeout)?;
        write_1(f, "Max Concurrent", &self.monitor.max_concurrent)?;
        write_1(f, "Batch Size", &self.monitor.batch_size)?;
        write_title_1(f, "Alert")?;
        write_1(f, "Initial Interval (s)", &optional(self.alert.initial_interval))?;
        write_1(f, "Max Interval (s)", &optional(self.alert.max_interval))?;
        write_title_1(f, "Storage")?;
        write_1(f, "Path", &self.storage.path.display())?;
        write_1(f, "Pool Size", &self.storage.pool_size)?;
        write_1(f, "Retention (days)", &optional(self.storage.retention_days.map(u64::from)))?;
        write_1(f, "Cleanup Interval (s)", &self.storage.cleanup_interval)?;
        write_title_1(f, "Databases")?;
        for target in &self.databases {
            write_title_2(f, target.name.as_str())?;
            write_2(f, "Address", &format!("{}:{}/{}", target.host, target.port, target.service_name))?;
            write_2(f, "User", &target.username)?;
            write_2(f, "Enabled", &target.enabled)?;
        }

        Ok(())
    }
}

impl Config {
    /// Load the config from `optional_path`, or from the default location
    /// when no path is given, and validate it.
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let raw_string = fs::read_to_string(&config_path)
            .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
        let config: Self = toml::from_str(&raw_string)
            .map_err(|source| ConfigError::ParseFailed { path: config_path.clone(), source })?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.interval == 0 {
            return Err(ConfigError::Invalid("monitor.interval must be greater than 0".into()));
        }
        if self.monitor.timeout == 0 {
            return Err(ConfigError::Invalid("monitor.timeout must be greater than 0".into()));
        }
        if self.monitor.max_concurrent == 0 {
            return Err(ConfigError::Invalid("monitor.max_concurrent must be greater than 0".into()));
        }
        if self.storage.pool_size == 0 {
            return Err(ConfigError::Invalid("storage.pool_size must be greater than 0".into()));
        }
        if self.storage.cleanup_interval == 0 {
            return Err(ConfigError::Invalid("storage.cleanup_interval must be greater than 0".into()));
        }
        for (key, value) in [
            ("monitor.interval", self.monitor.interval),
            ("monitor.timeout", self.monitor.timeout),
            ("storage.cleanup_interval", self.storage.cleanup_interval),
        ] {
            if value > MAX_PERIOD_SECS {
                return Err(ConfigError::Invalid(format!("{key} must be at most {MAX_PERIOD_SECS} seconds, got {value}")));
            }
        }
        if let Some(days) = self.storage.retention_days {
            if days > MAX_RETENTION_DAYS {
                return Err(ConfigError::Invalid(format!(
                    "storage.retention_days must be at most {MAX_RETENTION_DAYS}, got {days}"
                )));
            }
        }
        if let (Some(initial), Some(max)) = (self.alert.initial_interval, self.alert.max_interval) {
            if initial > max {
                return Err(ConfigError::Invalid(format!(
                    "alert.initial_interval ({initial}) exceeds alert.max_interval ({max})"
                )));
            }
        }

        let mut seen = HashSet::new();
        for target in &self.databases {
            if target.name.trim().is_empty() {
                return Err(ConfigError::Invalid("database entry with an empty db_name".into()));
            }
            if !seen.insert(target.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate db_name `{}`", target.name)));
            }
        }

        Ok(())
    }

    pub fn enabled_targets(&self) -> impl Iterator<Item = &DatabaseTarget> {
        self.databases.iter().filter(|target| target.enabled)
    }
}
