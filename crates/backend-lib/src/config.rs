// ============================
// toolroom-backend-lib/src/config.rs
// ============================
//! Configuration management.
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "toolroom.toml";

/// Prefix of environment variable overrides, nested keys use `__`
pub const ENV_PREFIX: &str = "TOOLROOM_";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Absolute base URL used to build links in emails
    pub public_base_url: String,
    /// Log level
    pub log_level: String,
    /// Session TTL in seconds
    pub session_ttl_secs: u64,
    /// Password requirements
    pub password_requirements: PasswordRequirements,
    /// Database connection pool
    pub database: DatabaseSettings,
    /// Outgoing mail
    pub mail: MailSettings,
    /// Photo normalization budgets
    pub photo: PhotoSettings,
    /// Failed login throttling
    pub auth_rate_limit: AuthRateLimitSettings,
}

/// Password complexity requirements
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordRequirements {
    /// Minimum password length
    pub min_length: usize,
    /// Require uppercase letters
    pub require_uppercase: bool,
    /// Require lowercase letters
    pub require_lowercase: bool,
    /// Require digits
    pub require_digit: bool,
    /// Require special characters
    pub require_special: bool,
}

/// Postgres pool settings
///
/// Without a `url` the server falls back to in-memory storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// SMTP settings. Without `smtp_host`, mail is written to the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub sender: String,
}

/// Limits applied to uploaded photos
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PhotoSettings {
    /// Largest allowed width + height in pixels
    pub max_dimension_sum: u32,
    /// Target size of the encoded JPEG
    pub max_bytes: usize,
    pub initial_quality: u8,
    pub quality_step: u8,
    pub min_quality: u8,
}

/// Failed login throttling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthRateLimitSettings {
    pub max_attempts: u32,
    pub lockout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            public_base_url: "http://127.0.0.1:3000".to_string(),
            log_level: "info".to_string(),
            session_ttl_secs: 60 * 60 * 24 * 7, // 7 days
            password_requirements: PasswordRequirements::default(),
            database: DatabaseSettings::default(),
            mail: MailSettings::default(),
            photo: PhotoSettings::default(),
            auth_rate_limit: AuthRateLimitSettings::default(),
        }
    }
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: 1,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
            require_special: false,
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 30,
        }
    }
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            sender: "toolroom@localhost".to_string(),
        }
    }
}

impl Default for PhotoSettings {
    fn default() -> Self {
        Self {
            max_dimension_sum: 600,
            max_bytes: 50 * 1024,
            initial_quality: 85,
            quality_step: 5,
            min_quality: 10,
        }
    }
}

impl Default for AuthRateLimitSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_secs: 5 * 60,
        }
    }
}

impl Settings {
    /// Load settings from a specific TOML file and the environment.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings: Settings = Self::figment(path.as_ref()).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Provider chain: defaults, then file, then `TOOLROOM_*` variables
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            bail!("unknown log level {:?}", self.log_level);
        }
        if self.session_ttl_secs == 0 {
            bail!("session_ttl_secs must be positive");
        }
        if self.password_requirements.min_length == 0 {
            bail!("password_requirements.min_length must be at least 1");
        }
        if self.database.max_connections == 0 {
            bail!("database.max_connections must be positive");
        }
        if self.database.min_connections > self.database.max_connections {
            bail!("database.min_connections exceeds database.max_connections");
        }
        if self.mail.sender.trim().is_empty() {
            bail!("mail.sender must not be empty");
        }
        if self.auth_rate_limit.max_attempts == 0 {
            bail!("auth_rate_limit.max_attempts must be positive");
        }
        self.photo.validate()?;
        Ok(())
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Absolute URL for a path on this server
    pub fn external_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl PhotoSettings {
    fn validate(&self) -> Result<()> {
        if self.max_dimension_sum < 2 {
            bail!("photo.max_dimension_sum must be at least 2");
        }
        if self.max_bytes == 0 {
            bail!("photo.max_bytes must be positive");
        }
        if self.initial_quality == 0 || self.initial_quality > 100 {
            bail!("photo.initial_quality must be within 1..=100");
        }
        if self.quality_step == 0 {
            bail!("photo.quality_step must be positive");
        }
        if self.min_quality == 0 || self.min_quality > self.initial_quality {
            bail!("photo.min_quality must be within 1..=initial_quality");
        }
        Ok(())
    }
}
