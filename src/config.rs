use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Discourse caps `/posts.json` at 30 posts per request.
pub const DEFAULT_PAGE_SIZE: i64 = 30;
/// Consecutive no-new-data pages that end a forward scan.
pub const DEFAULT_EMPTY_STREAK_THRESHOLD: u32 = 5;
/// Consecutive empty pages that end a backfill scan.
pub const DEFAULT_BACKFILL_EMPTY_STREAK_THRESHOLD: u32 = 10;
/// Attempts per page fetch before giving up.
pub const DEFAULT_FETCH_MAX_ATTEMPTS: u32 = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_path: PathBuf,

    // Remote fetch
    pub fetch_max_attempts: u32,
    pub fetch_backoff_unit: Duration,
    pub request_timeout: Duration,

    // Ingestion
    pub refresh_body_on_rescan: bool,

    // Backfill
    pub backfill_empty_streak_threshold: u32,

    // Trigger
    pub sync_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Database
            database_path: PathBuf::from(env_or_default("DATABASE_PATH", "./data/mirror.sqlite")),

            // Remote fetch
            fetch_max_attempts: parse_env_u32("FETCH_MAX_ATTEMPTS", DEFAULT_FETCH_MAX_ATTEMPTS)?,
            fetch_backoff_unit: Duration::from_millis(parse_env_u64("FETCH_BACKOFF_UNIT_MS", 1000)?),
            request_timeout: Duration::from_secs(parse_env_u64("REQUEST_TIMEOUT_SECS", 30)?),

            // Ingestion
            refresh_body_on_rescan: parse_env_bool("REFRESH_BODY_ON_RESCAN", true)?,

            // Backfill
            backfill_empty_streak_threshold: parse_env_u32(
                "BACKFILL_EMPTY_STREAK_THRESHOLD",
                DEFAULT_BACKFILL_EMPTY_STREAK_THRESHOLD,
            )?,

            // Trigger
            sync_interval: Duration::from_secs(parse_env_u64("SYNC_INTERVAL_SECS", 86_400)?),
        })
    }

    /// Configuration for tests: in-place defaults with no backoff delay.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            database_path: PathBuf::from("./data/test.sqlite"),
            fetch_max_attempts: DEFAULT_FETCH_MAX_ATTEMPTS,
            fetch_backoff_unit: Duration::ZERO,
            request_timeout: Duration::from_secs(10),
            refresh_body_on_rescan: true,
            backfill_empty_streak_threshold: DEFAULT_BACKFILL_EMPTY_STREAK_THRESHOLD,
            sync_interval: Duration::from_secs(60),
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                name: "FETCH_MAX_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.backfill_empty_streak_threshold == 0 {
            return Err(ConfigError::InvalidValue {
                name: "BACKFILL_EMPTY_STREAK_THRESHOLD".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.sync_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "SYNC_INTERVAL_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// A forum to register, as supplied by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantRegistration {
    pub name: String,
    pub api_base_url: String,
    pub api_key: String,
    pub api_username: String,
    pub initial_cursor: i64,
    pub page_size: i64,
    pub empty_streak_threshold: u32,
}

impl TenantRegistration {
    /// Load a tenant registration from environment variables.
    ///
    /// `TENANT_NAME` falls back to `DAO_NAME` for existing deployments.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let name = optional_env("TENANT_NAME")
            .or_else(|| optional_env("DAO_NAME"))
            .ok_or_else(|| ConfigError::MissingEnvVar("TENANT_NAME".to_string()))?;

        let registration = Self {
            name,
            api_base_url: required_env("API_BASE_URL")?,
            api_key: required_env("DISCOURSE_API_KEY")?,
            api_username: required_env("DISCOURSE_USERNAME")?,
            initial_cursor: parse_env_i64("LAST_PROCESSED_POST_ID", 1)?,
            page_size: parse_env_i64("TENANT_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            empty_streak_threshold: parse_env_u32(
                "TENANT_EMPTY_STREAK_THRESHOLD",
                DEFAULT_EMPTY_STREAK_THRESHOLD,
            )?,
        };
        registration.validate()?;
        Ok(registration)
    }

    /// Validate the registration.
    ///
    /// # Errors
    ///
    /// Returns an error if any field is empty or out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(invalid("TENANT_NAME", "cannot be empty"));
        }
        if self.api_key.is_empty() {
            return Err(invalid("DISCOURSE_API_KEY", "cannot be empty"));
        }
        if self.api_username.is_empty() {
            return Err(invalid("DISCOURSE_USERNAME", "cannot be empty"));
        }
        validate_base_url(&self.api_base_url)
            .map_err(|message| invalid("API_BASE_URL", &message))?;
        if self.page_size < 1 {
            return Err(invalid("TENANT_PAGE_SIZE", "must be at least 1"));
        }
        if self.empty_streak_threshold == 0 {
            return Err(invalid("TENANT_EMPTY_STREAK_THRESHOLD", "must be at least 1"));
        }
        if self.initial_cursor < 0 {
            return Err(invalid("LAST_PROCESSED_POST_ID", "cannot be negative"));
        }
        Ok(())
    }
}

/// Check that a forum base URL is an absolute http(s) URL.
///
/// # Errors
///
/// Returns a human-readable message describing the problem.
pub fn validate_base_url(value: &str) -> Result<(), String> {
    let parsed = url::Url::parse(value).map_err(|e| format!("'{value}' is not a URL: {e}"))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{other}'")),
    }
    if parsed.host_str().is_none() {
        return Err(format!("'{value}' has no host"));
    }
    Ok(())
}

fn invalid(name: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        message: message.to_string(),
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    optional_env(name).ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    optional_env(name).unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_i64(name: &str, default: i64) -> Result<i64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn registration() -> TenantRegistration {
        TenantRegistration {
            name: "Aave".to_string(),
            api_base_url: "https://governance.aave.com".to_string(),
            api_key: "key".to_string(),
            api_username: "system".to_string(),
            initial_cursor: 1,
            page_size: DEFAULT_PAGE_SIZE,
            empty_streak_threshold: DEFAULT_EMPTY_STREAK_THRESHOLD,
        }
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_env_bool("NONEXISTENT_VAR", true).unwrap());
        assert!(!parse_env_bool("NONEXISTENT_VAR", false).unwrap());
    }

    #[test]
    fn test_validate_base_url() {
        assert!(validate_base_url("https://governance.aave.com").is_ok());
        assert!(validate_base_url("http://localhost:3000").is_ok());
        assert!(validate_base_url("ftp://forum.example.com").is_err());
        assert!(validate_base_url("governance.aave.com").is_err());
        assert!(validate_base_url("").is_err());
    }

    #[test]
    fn test_registration_validation() {
        assert!(registration().validate().is_ok());

        let mut bad = registration();
        bad.api_key = String::new();
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::InvalidValue { name, .. }) if name == "DISCOURSE_API_KEY"
        ));

        let mut bad = registration();
        bad.page_size = 0;
        assert!(bad.validate().is_err());

        let mut bad = registration();
        bad.api_base_url = "not a url".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::for_testing().validate().is_ok());

        let config = Config {
            fetch_max_attempts: 0,
            ..Config::for_testing()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_registration_from_env_falls_back_to_dao_name() {
        std::env::remove_var("TENANT_NAME");
        std::env::set_var("DAO_NAME", "Aave");
        std::env::set_var("API_BASE_URL", "https://governance.aave.com");
        std::env::set_var("DISCOURSE_API_KEY", "key");
        std::env::set_var("DISCOURSE_USERNAME", "system");
        std::env::set_var("LAST_PROCESSED_POST_ID", "36300");

        let registration = TenantRegistration::from_env().unwrap();
        assert_eq!(registration.name, "Aave");
        assert_eq!(registration.initial_cursor, 36300);
        assert_eq!(registration.page_size, DEFAULT_PAGE_SIZE);

        for name in [
            "DAO_NAME",
            "API_BASE_URL",
            "DISCOURSE_API_KEY",
            "DISCOURSE_USERNAME",
            "LAST_PROCESSED_POST_ID",
        ] {
            std::env::remove_var(name);
        }
    }

    #[test]
    #[serial]
    fn test_registration_from_env_requires_credentials() {
        std::env::set_var("TENANT_NAME", "Aave");
        std::env::set_var("API_BASE_URL", "https://governance.aave.com");
        std::env::remove_var("DISCOURSE_API_KEY");
        std::env::remove_var("DISCOURSE_USERNAME");

        let err = TenantRegistration::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(name) if name == "DISCOURSE_API_KEY"));

        std::env::remove_var("TENANT_NAME");
        std::env::remove_var("API_BASE_URL");
    }
}
