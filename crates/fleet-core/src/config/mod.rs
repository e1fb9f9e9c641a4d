//! Client configuration.
//!
//! `FleetConfig` is read from `<config_dir>/fleet/config.json` and then
//! overridden by `FLEET_*` environment variables.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::otp::OtpLimits;
use crate::remote::RestTree;
use crate::session::{SessionWindows, StaticCredentialVerifier};
use crate::sync::RetryPolicy;
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_VERSION: u32 = 1;

pub const ENV_DATABASE_URL: &str = "FLEET_DATABASE_URL";
pub const ENV_AUTH_TOKEN: &str = "FLEET_AUTH_TOKEN";
pub const ENV_TIMEOUT_SECS: &str = "FLEET_TIMEOUT_SECS";
pub const ENV_ADMIN_USERNAME: &str = "FLEET_ADMIN_USERNAME";
pub const ENV_ADMIN_PASSWORD: &str = "FLEET_ADMIN_PASSWORD";
pub const ENV_SMS_ENDPOINT: &str = "FLEET_SMS_ENDPOINT";
pub const ENV_SMS_API_KEY: &str = "FLEET_SMS_API_KEY";

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FleetConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Root of the realtime database, e.g. `https://fleet-demo.firebaseio.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_durable_session_hours")]
    pub durable_session_hours: u32,
    #[serde(default = "default_tab_session_hours")]
    pub tab_session_hours: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logout_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sms_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sms_api_key: Option<String>,
    #[serde(default = "default_otp_cooldown_secs")]
    pub otp_cooldown_secs: u64,
    #[serde(default = "default_otp_max_per_day")]
    pub otp_max_per_day: u32,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            database_url: None,
            auth_token: None,
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            durable_session_hours: default_durable_session_hours(),
            tab_session_hours: default_tab_session_hours(),
            admin_username: None,
            admin_password: None,
            logout_url: None,
            sms_endpoint: None,
            sms_api_key: None,
            otp_cooldown_secs: default_otp_cooldown_secs(),
            otp_max_per_day: default_otp_max_per_day(),
        }
    }
}

impl fmt::Debug for FleetConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");
        formatter
            .debug_struct("FleetConfig")
            .field("version", &self.version)
            .field("database_url", &self.database_url)
            .field("auth_token", &redact(&self.auth_token))
            .field("timeout_secs", &self.timeout_secs)
            .field("retry_attempts", &self.retry_attempts)
            .field("durable_session_hours", &self.durable_session_hours)
            .field("tab_session_hours", &self.tab_session_hours)
            .field("admin_username", &self.admin_username)
            .field("admin_password", &redact(&self.admin_password))
            .field("logout_url", &self.logout_url)
            .field("sms_endpoint", &self.sms_endpoint)
            .field("sms_api_key", &redact(&self.sms_api_key))
            .field("otp_cooldown_secs", &self.otp_cooldown_secs)
            .field("otp_max_per_day", &self.otp_max_per_day)
            .finish()
    }
}

const fn default_version() -> u32 {
    CONFIG_VERSION
}

const fn default_timeout_secs() -> u64 {
    20
}

const fn default_retry_attempts() -> u32 {
    1
}

const fn default_durable_session_hours() -> u32 {
    24
}

const fn default_tab_session_hours() -> u32 {
    8
}

const fn default_otp_cooldown_secs() -> u64 {
    60
}

const fn default_otp_max_per_day() -> u32 {
    5
}

/// `<config_dir>/fleet/config.json`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("fleet").join(CONFIG_FILE_NAME))
}

impl FleetConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|error| {
            Error::Config(format!("failed to read {}: {error}", path.display()))
        })?;
        let mut config = serde_json::from_str::<Self>(&raw).map_err(|error| {
            Error::Config(format!("failed to parse {}: {error}", path.display()))
        })?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)?;
        std::fs::write(path, serialized)?;
        Ok(())
    }

    /// Apply `FLEET_*` variables from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| normalize_text_option(lookup(key));

        if let Some(url) = get(ENV_DATABASE_URL) {
            self.database_url = Some(url);
        }
        if let Some(token) = get(ENV_AUTH_TOKEN) {
            self.auth_token = Some(token);
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            self.timeout_secs = raw.parse().map_err(|_| {
                Error::Config(format!("{ENV_TIMEOUT_SECS} must be a whole number of seconds"))
            })?;
        }
        if let Some(username) = get(ENV_ADMIN_USERNAME) {
            self.admin_username = Some(username);
        }
        if let Some(password) = get(ENV_ADMIN_PASSWORD) {
            self.admin_password = Some(password);
        }
        if let Some(endpoint) = get(ENV_SMS_ENDPOINT) {
            self.sms_endpoint = Some(endpoint);
        }
        if let Some(key) = get(ENV_SMS_API_KEY) {
            self.sms_api_key = Some(key);
        }
        self.normalize();
        Ok(())
    }

    /// Check ranges and URL schemes.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeoutSecs must be greater than zero".to_string()));
        }
        if self.retry_attempts == 0 {
            return Err(Error::Config("retryAttempts must be at least 1".to_string()));
        }
        if self.durable_session_hours == 0 || self.tab_session_hours == 0 {
            return Err(Error::Config(
                "session windows must be at least one hour".to_string(),
            ));
        }
        for (name, url) in [
            ("databaseUrl", &self.database_url),
            ("logoutUrl", &self.logout_url),
            ("smsEndpoint", &self.sms_endpoint),
        ] {
            if let Some(url) = url {
                if !is_http_url(url) {
                    return Err(Error::Config(format!(
                        "{name} must include http:// or https://"
                    )));
                }
            }
        }
        Ok(())
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::attempts(self.retry_attempts)
    }

    pub fn session_windows(&self) -> SessionWindows {
        SessionWindows {
            durable: TimeDelta::hours(i64::from(self.durable_session_hours)),
            tab: TimeDelta::hours(i64::from(self.tab_session_hours)),
        }
    }

    pub const fn otp_limits(&self) -> OtpLimits {
        OtpLimits {
            cooldown: Duration::from_secs(self.otp_cooldown_secs),
            max_per_window: self.otp_max_per_day,
            window: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Verifier for the configured admin pair, if both halves are set.
    pub fn credential_verifier(&self) -> Option<StaticCredentialVerifier> {
        match (&self.admin_username, &self.admin_password) {
            (Some(username), Some(password)) => {
                Some(StaticCredentialVerifier::new(username, password))
            }
            _ => None,
        }
    }

    /// REST binding for the configured database.
    pub fn rest_tree(&self) -> Result<RestTree> {
        let url = self.database_url.as_deref().ok_or_else(|| {
            Error::Config(format!(
                "no database URL configured (set databaseUrl or {ENV_DATABASE_URL})"
            ))
        })?;
        RestTree::new(url, self.auth_token.clone())
            .map_err(|error| Error::Config(error.to_string()))
    }

    fn normalize(&mut self) {
        self.database_url =
            normalize_text_option(self.database_url.take()).map(|url| trim_url(&url));
        self.auth_token = normalize_text_option(self.auth_token.take());
        self.admin_username = normalize_text_option(self.admin_username.take());
        self.logout_url = normalize_text_option(self.logout_url.take());
        self.sms_endpoint = normalize_text_option(self.sms_endpoint.take());
        self.sms_api_key = normalize_text_option(self.sms_api_key.take());
        if self.admin_password.as_deref().is_some_and(str::is_empty) {
            self.admin_password = None;
        }
    }
}

fn trim_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = FleetConfig::load_from_path(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, FleetConfig::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(20));
        assert_eq!(config.session_windows(), SessionWindows::default());
    }

    #[test]
    fn save_and_load_round_trip_normalizes_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet/config.json");
        let config = FleetConfig {
            database_url: Some(" https://fleet-demo.firebaseio.com/ ".to_string()),
            auth_token: Some("  ".to_string()),
            retry_attempts: 3,
            ..FleetConfig::default()
        };

        config.save_to_path(&path).unwrap();
        let loaded = FleetConfig::load_from_path(&path).unwrap();
        assert_eq!(
            loaded.database_url.as_deref(),
            Some("https://fleet-demo.firebaseio.com")
        );
        assert_eq!(loaded.auth_token, None);
        assert_eq!(loaded.retry_policy(), RetryPolicy::attempts(3));
    }

    #[test]
    fn sparse_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"databaseUrl": "http://localhost:9000"}"#).unwrap();

        let config = FleetConfig::load_from_path(&path).unwrap();
        assert_eq!(config.timeout_secs, 20);
        assert_eq!(config.otp_max_per_day, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_DATABASE_URL, "https://override.firebaseio.com"),
            (ENV_TIMEOUT_SECS, "5"),
            (ENV_ADMIN_USERNAME, "admin"),
            (ENV_ADMIN_PASSWORD, "admin123"),
            (ENV_SMS_API_KEY, ""),
        ]);
        let mut config = FleetConfig {
            database_url: Some("https://file.firebaseio.com".to_string()),
            sms_api_key: Some("from-file".to_string()),
            ..FleetConfig::default()
        };

        config
            .apply_overrides(|key| env.get(key).map(ToString::to_string))
            .unwrap();
        assert_eq!(
            config.database_url.as_deref(),
            Some("https://override.firebaseio.com")
        );
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.sms_api_key.as_deref(), Some("from-file"));
        assert!(config.credential_verifier().is_some());
    }

    #[test]
    fn invalid_timeout_override_is_a_config_error() {
        let mut config = FleetConfig::default();
        let result =
            config.apply_overrides(|key| (key == ENV_TIMEOUT_SECS).then(|| "soon".to_string()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let config = FleetConfig {
            database_url: Some("fleet.firebaseio.com".to_string()),
            ..FleetConfig::default()
        };
        assert!(config.validate().is_err());

        let config = FleetConfig {
            timeout_secs: 0,
            ..FleetConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rest_tree_requires_database_url() {
        assert!(matches!(
            FleetConfig::default().rest_tree(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = FleetConfig {
            auth_token: Some("db-secret".to_string()),
            admin_password: Some("admin123".to_string()),
            ..FleetConfig::default()
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("db-secret"));
        assert!(!rendered.contains("admin123"));
    }
}
