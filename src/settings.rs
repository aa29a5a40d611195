//! Ambient installer settings.
//!
//! `AmbientConfig` is the read-only view the credential resolver and the
//! install orchestration consult when the caller leaves something out.
//! `Settings` is the file-backed implementation, saved and loaded as JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::types::{AccessMode, CredentialPolicy};

/// Environment variable naming the settings file to load
pub const SETTINGS_ENV: &str = "IIM_SETTINGS";

/// Default Installation Manager location
pub const DEFAULT_BASE_DIR: &str = "/opt/IBM/InstallationManager";

/// Default installer log file
pub const DEFAULT_LOG_FILE: &str = "/tmp/install_log.xml";

/// Errors loading, saving or validating settings
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings from {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write settings to {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Read-only ambient configuration lookups.
///
/// Every lookup may be absent. Implementations must not have side effects.
pub trait AmbientConfig {
    fn installer_base_dir(&self) -> Option<PathBuf>;

    fn installer_user(&self) -> Option<String>;

    fn installer_group(&self) -> Option<String>;

    fn access_mode(&self) -> Option<AccessMode>;

    fn default_master_password_file(&self) -> Option<PathBuf>;

    fn default_secure_storage_file(&self) -> Option<PathBuf>;

    /// Where the installer writes its log
    fn log_file(&self) -> Option<PathBuf> {
        None
    }

    fn credential_policy(&self) -> CredentialPolicy {
        CredentialPolicy::default()
    }
}

/// File-backed installer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Installation Manager install root (contains `eclipse/tools/imcl`)
    pub base_dir: PathBuf,
    /// User the installer runs as; unset keeps the current user
    pub user: Option<String>,
    /// Group the installer runs as; unset keeps the user's primary group
    pub group: Option<String>,
    pub access_mode: AccessMode,
    pub master_password_file: Option<PathBuf>,
    pub secure_storage_file: Option<PathBuf>,
    pub log_file: PathBuf,
    pub credential_policy: CredentialPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            user: None,
            group: None,
            access_mode: AccessMode::default(),
            master_password_file: None,
            secure_storage_file: None,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            credential_policy: CredentialPolicy::default(),
        }
    }
}

impl Settings {
    /// Save settings to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        fs::write(path, json).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load settings from a JSON file; missing fields take their defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let settings: Self =
            serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Load from `$IIM_SETTINGS` when set, otherwise use defaults
    pub fn from_env_or_default() -> Result<Self, SettingsError> {
        match std::env::var_os(SETTINGS_ENV) {
            Some(path) if !path.is_empty() => Self::load_from_file(PathBuf::from(path)),
            _ => Ok(Self::default()),
        }
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.base_dir.is_absolute() {
            return Err(SettingsError::Invalid {
                field: "base_dir",
                reason: format!("{:?} must be an absolute path", self.base_dir),
            });
        }

        if !self.log_file.is_absolute() {
            return Err(SettingsError::Invalid {
                field: "log_file",
                reason: format!("{:?} must be an absolute path", self.log_file),
            });
        }

        for (field, value) in [("user", &self.user), ("group", &self.group)] {
            if let Some(name) = value {
                if name.trim().is_empty() || name.contains(char::is_whitespace) {
                    return Err(SettingsError::Invalid {
                        field,
                        reason: format!("'{}' is not a valid account name", name),
                    });
                }
            }
        }

        for (field, value) in [
            ("master_password_file", &self.master_password_file),
            ("secure_storage_file", &self.secure_storage_file),
        ] {
            if value.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                return Err(SettingsError::Invalid {
                    field,
                    reason: "path must not be empty; omit the field instead".to_string(),
                });
            }
        }

        Ok(())
    }
}

impl AmbientConfig for Settings {
    fn installer_base_dir(&self) -> Option<PathBuf> {
        Some(self.base_dir.clone())
    }

    fn installer_user(&self) -> Option<String> {
        self.user.clone()
    }

    fn installer_group(&self) -> Option<String> {
        self.group.clone()
    }

    fn access_mode(&self) -> Option<AccessMode> {
        Some(self.access_mode)
    }

    fn default_master_password_file(&self) -> Option<PathBuf> {
        self.master_password_file.clone()
    }

    fn default_secure_storage_file(&self) -> Option<PathBuf> {
        self.secure_storage_file.clone()
    }

    fn log_file(&self) -> Option<PathBuf> {
        Some(self.log_file.clone())
    }

    fn credential_policy(&self) -> CredentialPolicy {
        self.credential_policy
    }
}
