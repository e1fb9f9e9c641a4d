use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fleet_core::config::default_config_path;
use fleet_core::{Entity, FleetClient, FleetConfig, RestTree};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::CliError;

const SUMMARY_WIDTH: usize = 60;

/// Config path from `--config`, else the platform default.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, CliError> {
    explicit
        .map(Path::to_path_buf)
        .or_else(default_config_path)
        .ok_or_else(|| {
            CliError::Config("could not resolve a config directory; pass --config".to_string())
        })
}

/// File config with `FLEET_*` overrides applied.
pub fn load_config(path: &Path) -> Result<FleetConfig, CliError> {
    let mut config = FleetConfig::load_from_path(path)?;
    config.apply_env_overrides()?;
    config.validate()?;
    Ok(config)
}

pub fn open_client(config: &FleetConfig) -> Result<FleetClient<RestTree>, CliError> {
    Ok(FleetClient::from_config(config)?)
}

/// Read a `--data` argument, with `-` meaning stdin.
pub fn read_data_arg(raw: &str) -> Result<String, CliError> {
    if raw.trim() != "-" {
        return Ok(raw.to_string());
    }
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Err(CliError::InvalidData(
            "`--data -` expects JSON piped on stdin".to_string(),
        ));
    }
    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(buffer)
}

/// Parse record fields; they must form a JSON object.
pub fn parse_object(raw: &str) -> Result<Map<String, Value>, CliError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(CliError::InvalidData("expected a JSON object".to_string())),
        Err(error) => Err(CliError::InvalidData(error.to_string())),
    }
}

/// Build a typed entity from user-supplied fields.
pub fn entity_from_fields<E: Entity>(
    mut fields: Map<String, Value>,
    id: Option<&str>,
) -> Result<E, CliError> {
    for protected in ["createdAt", "updatedAt"] {
        fields.remove(protected);
    }
    if let Some(id) = id {
        fields.insert("id".to_string(), Value::String(id.to_string()));
    }
    serde_json::from_value(Value::Object(fields))
        .map_err(|error| CliError::InvalidData(error.to_string()))
}

/// One line per record: id, last update and a compact field summary.
pub fn format_record_lines<E: Entity>(records: &[E], now: DateTime<Utc>) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            let meta = record.meta();
            let updated = meta
                .updated_at
                .map_or_else(|| "-".to_string(), |at| format_relative_time(at, now));
            let summary = record_summary(record);
            format!("{:<24}  {updated:<10}  {summary}", meta.id)
        })
        .collect()
}

pub fn record_summary<E: Serialize>(record: &E) -> String {
    let Ok(Value::Object(mut fields)) = serde_json::to_value(record) else {
        return String::new();
    };
    for meta_field in ["id", "createdAt", "updatedAt"] {
        fields.remove(meta_field);
    }
    let rendered = Value::Object(fields).to_string();
    truncate(&rendered, SUMMARY_WIDTH)
}

pub fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let kept: String = value.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}

pub fn format_relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = now.signed_duration_since(at).num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    format!("{}d ago", hours / 24)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
