use std::path::Path;

use fleet_core::util::normalize_text_option;
use fleet_core::FleetConfig;
use serde_json::Value;

use crate::cli::ConfigCommands;
use crate::commands::common::{load_config, print_json};
use crate::error::CliError;

const REDACTED_FIELDS: [&str; 3] = ["authToken", "adminPassword", "smsApiKey"];

/// Values passed to `fleet config init`; unset ones keep the file's value.
#[derive(Debug, Default)]
pub struct ConfigUpdate {
    pub database_url: Option<String>,
    pub auth_token: Option<String>,
    pub timeout_secs: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub logout_url: Option<String>,
    pub sms_endpoint: Option<String>,
    pub sms_api_key: Option<String>,
}

impl ConfigUpdate {
    pub fn apply(self, config: &mut FleetConfig) {
        fn merge(target: &mut Option<String>, value: Option<String>) {
            if let Some(value) = normalize_text_option(value) {
                *target = Some(value);
            }
        }

        merge(&mut config.database_url, self.database_url);
        merge(&mut config.auth_token, self.auth_token);
        merge(&mut config.admin_username, self.admin_username);
        merge(&mut config.admin_password, self.admin_password);
        merge(&mut config.logout_url, self.logout_url);
        merge(&mut config.sms_endpoint, self.sms_endpoint);
        merge(&mut config.sms_api_key, self.sms_api_key);
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = timeout_secs;
        }
        if let Some(retry_attempts) = self.retry_attempts {
            config.retry_attempts = retry_attempts;
        }
    }
}

pub fn run_config(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            database_url,
            auth_token,
            timeout_secs,
            retry_attempts,
            admin_username,
            admin_password,
            logout_url,
            sms_endpoint,
            sms_api_key,
        } => {
            let update = ConfigUpdate {
                database_url,
                auth_token,
                timeout_secs,
                retry_attempts,
                admin_username,
                admin_password,
                logout_url,
                sms_endpoint,
                sms_api_key,
            };
            let config = run_config_init(path, update)?;
            println!("Saved config to {}", path.display());
            if config.database_url.is_none() {
                println!("No database URL set yet; pass --database-url or set FLEET_DATABASE_URL.");
            }
            Ok(())
        }
        ConfigCommands::Show => {
            let config = load_config(path)?;
            print_json(&redacted_config(&config)?)
        }
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

/// Merge `update` into the file at `path` and save it.
///
/// Environment overrides are not written back.
pub fn run_config_init(path: &Path, update: ConfigUpdate) -> Result<FleetConfig, CliError> {
    let mut config = FleetConfig::load_from_path(path)?;
    update.apply(&mut config);
    config.validate()?;
    config.save_to_path(path)?;
    tracing::info!("Wrote config to {}", path.display());
    Ok(config)
}

pub fn redacted_config(config: &FleetConfig) -> Result<Value, CliError> {
    let mut value = serde_json::to_value(config)?;
    if let Some(fields) = value.as_object_mut() {
        for field in REDACTED_FIELDS {
            if let Some(secret) = fields.get_mut(field) {
                *secret = Value::String("[REDACTED]".to_string());
            }
        }
    }
    Ok(value)
}
