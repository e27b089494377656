//! Configuration management
//!
//! This module handles loading and parsing configuration for the Mentora
//! booking service. Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults. Every component
//! receives the relevant config section at construction; there is no ambient
//! global settings lookup.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Outbound email configuration
    #[serde(default)]
    pub email: EmailConfig,
    /// Application-level settings (base URL etc.)
    #[serde(default)]
    pub app: AppConfig,
    /// Booking lifecycle settings (token lifetimes, reminder windows)
    #[serde(default)]
    pub booking: BookingConfig,
    /// Background task runner settings
    #[serde(default)]
    pub tasks: TasksConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/mentora.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Outbound email (SMTP) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// SMTP relay host
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    /// SMTP port
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username
    #[serde(default)]
    pub smtp_username: String,
    /// SMTP password
    #[serde(default)]
    pub smtp_password: String,
    /// Display name on outbound mail
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Default sender address
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// Address receiving mentor invites and reminders
    #[serde(default = "default_mentor_address")]
    pub mentor_address: String,
    /// Address receiving contact-form alerts
    #[serde(default = "default_admin_address")]
    pub admin_address: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_name: default_from_name(),
            from_address: default_from_address(),
            mentor_address: default_mentor_address(),
            admin_address: default_admin_address(),
        }
    }
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "Mentora".to_string()
}

fn default_from_address() -> String {
    "no-reply@mentora.local".to_string()
}

fn default_mentor_address() -> String {
    "admin@example.com".to_string()
}

fn default_admin_address() -> String {
    "admin@example.com".to_string()
}

/// Application-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Public base URL used when building links embedded in emails
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

/// Booking lifecycle configuration
///
/// Two distinct token families live here: booking confirmation/completion
/// tokens (hours-scale) and account email-verification tokens (minutes-scale).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Validity window for booking confirmation/completion tokens
    #[serde(default = "default_token_valid_hours")]
    pub token_valid_hours: i64,
    /// Validity window for account email-verification tokens
    #[serde(default = "default_verification_token_valid_minutes")]
    pub verification_token_valid_minutes: i64,
    /// How far ahead the reminder sweep looks for upcoming sessions
    #[serde(default = "default_reminder_window_hours")]
    pub reminder_window_hours: i64,
    /// Minimum gap between two reminders for the same booking
    #[serde(default = "default_reminder_cooldown_hours")]
    pub reminder_cooldown_hours: i64,
    /// Interval between reminder sweep runs, in seconds
    #[serde(default = "default_reminder_sweep_interval_secs")]
    pub reminder_sweep_interval_secs: u64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            token_valid_hours: default_token_valid_hours(),
            verification_token_valid_minutes: default_verification_token_valid_minutes(),
            reminder_window_hours: default_reminder_window_hours(),
            reminder_cooldown_hours: default_reminder_cooldown_hours(),
            reminder_sweep_interval_secs: default_reminder_sweep_interval_secs(),
        }
    }
}

fn default_token_valid_hours() -> i64 {
    48
}

fn default_verification_token_valid_minutes() -> i64 {
    15
}

fn default_reminder_window_hours() -> i64 {
    24
}

fn default_reminder_cooldown_hours() -> i64 {
    6
}

fn default_reminder_sweep_interval_secs() -> u64 {
    3600
}

/// Background task runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Maximum delivery attempts per email job
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between delivery attempts, in seconds
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    60
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist or is empty, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e))?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - MENTORA_SERVER_HOST / MENTORA_SERVER_PORT
    /// - MENTORA_DATABASE_DRIVER / MENTORA_DATABASE_URL
    /// - MENTORA_EMAIL_SMTP_HOST / MENTORA_EMAIL_SMTP_PORT
    /// - MENTORA_EMAIL_SMTP_USERNAME / MENTORA_EMAIL_SMTP_PASSWORD
    /// - MENTORA_APP_BASE_URL
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("MENTORA_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("MENTORA_SERVER_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Ok(driver) = std::env::var("MENTORA_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                other => tracing::warn!("Unknown database driver '{}', keeping config value", other),
            }
        }
        if let Ok(url) = std::env::var("MENTORA_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(host) = std::env::var("MENTORA_EMAIL_SMTP_HOST") {
            self.email.smtp_host = host;
        }
        if let Ok(port) = std::env::var("MENTORA_EMAIL_SMTP_PORT") {
            if let Ok(port) = port.parse() {
                self.email.smtp_port = port;
            }
        }
        if let Ok(username) = std::env::var("MENTORA_EMAIL_SMTP_USERNAME") {
            self.email.smtp_username = username;
        }
        if let Ok(password) = std::env::var("MENTORA_EMAIL_SMTP_PASSWORD") {
            self.email.smtp_password = password;
        }
        if let Ok(base_url) = std::env::var("MENTORA_APP_BASE_URL") {
            self.app.base_url = base_url;
        }
    }
}
