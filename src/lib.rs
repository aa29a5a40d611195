//! iminstall Library
//!
//! Unattended IBM Installation Manager installs: response documents are
//! generated from ordered, nested descriptions, credential files are chosen
//! from caller and ambient inputs, and `imcl` is run with the derived flags.

pub mod cli;
pub mod command;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod installer;
pub mod manifest;
pub mod markup;
pub mod process_guard;
pub mod response_file;
pub mod settings;
pub mod types;

// Re-export main types for convenience
pub use command::{InstallCommand, InvocationArgs};
pub use credentials::{
    decide, invocation_paths, resolve_credentials, resolve_unified, CredentialDecision,
    CredentialInputs,
};
pub use error::{IimError, Result};
pub use executor::{DryRunExecutor, ExecError, ExecOutput, ExecRequest, ProcessExecutor, SystemExecutor};
pub use installer::{InstallOutcome, InstallPlan, InstallRequest, Installer, ResponseSource};
pub use manifest::InstallManifest;
pub use markup::{
    render_document, serialize, ConfigNode, ConfigValue, Deferred, MarkupError, MarkupLine, Scalar,
};
pub use process_guard::{ChildRegistry, CommandProcessGroup};
pub use response_file::{FileCreator, FileRequest, TempFileCreator};
pub use settings::{AmbientConfig, Settings, SettingsError};
pub use types::{AccessMode, CredentialPolicy, Severity};
