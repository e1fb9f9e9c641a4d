use std::io;

use fleet_core::session::AuthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] fleet_core::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid record data: {0}")]
    InvalidData(String),
    #[error("No record '{id}' in {collection}")]
    NotFound { collection: String, id: String },
    #[error("{0}")]
    ActionFailed(String),
}
