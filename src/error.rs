//! Error handling module for iminstall
//!
//! Each layer owns a typed error (`MarkupError`, `SettingsError`, `ExecError`);
//! `IimError` is the crate-level error the install orchestration returns and
//! converts all of them with `From`, so collaborator failures propagate
//! unchanged through `?`.

use thiserror::Error;

use crate::executor::ExecError;
use crate::markup::MarkupError;
use crate::settings::SettingsError;

/// Main error type for installation attempts
#[derive(Error, Debug)]
pub enum IimError {
    /// IO errors (response file creation, reading inputs)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The response description could not be serialized
    #[error("Response generation failed: {0}")]
    Markup(#[from] MarkupError),

    /// Ambient settings could not be loaded or are invalid
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// The installer process could not be run or exited non-zero
    #[error("Installer execution failed: {0}")]
    Exec(#[from] ExecError),

    /// Neither an existing response file nor a response description was given
    #[error("No response file found at {path} and no response description provided for '{name}'")]
    MissingResponse { name: String, path: String },

    /// The install name cannot be used in a file name
    #[error("Invalid installation name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// Required ambient configuration is missing
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for installation operations
pub type Result<T> = std::result::Result<T, IimError>;

impl IimError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
