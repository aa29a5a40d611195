//! Secure storage and master password selection.
//!
//! The installer authenticates to repositories with a secure storage file,
//! optionally unlocked by a master password file. Either may come from the
//! caller or from the ambient settings; this module decides which pair is
//! used and what the operator is told about it.
//!
//! Two functions cover the two historical code paths:
//!
//! - [`resolve_credentials`] is the advisory table: message, severity and
//!   the paths that message describes
//! - [`invocation_paths`] is the command-line fallback, which uses a related
//!   but different rule
//!
//! [`decide`] combines them according to a [`CredentialPolicy`]. Under
//! `Unified` the message and the flags always agree; under `Legacy` the
//! message comes from the advisory table and the flags from the fallback.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::settings::AmbientConfig;
use crate::types::{CredentialPolicy, Severity};

/// The four optional credential paths an install attempt starts from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialInputs {
    pub caller_secure_storage_file: Option<PathBuf>,
    pub caller_master_password_file: Option<PathBuf>,
    pub ambient_secure_storage_file: Option<PathBuf>,
    pub ambient_master_password_file: Option<PathBuf>,
}

impl CredentialInputs {
    /// Pair caller-supplied paths with the ambient defaults.
    pub fn from_ambient(
        caller_secure_storage_file: Option<PathBuf>,
        caller_master_password_file: Option<PathBuf>,
        ambient: &dyn AmbientConfig,
    ) -> Self {
        Self {
            caller_secure_storage_file,
            caller_master_password_file,
            ambient_secure_storage_file: ambient.default_secure_storage_file(),
            ambient_master_password_file: ambient.default_master_password_file(),
        }
    }
}

/// Which credential files to use, and the advisory explaining the choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialDecision {
    pub secure_storage_file: Option<PathBuf>,
    pub master_password_file: Option<PathBuf>,
    pub message: String,
    pub severity: Severity,
}

impl CredentialDecision {
    fn new(
        secure_storage_file: Option<PathBuf>,
        master_password_file: Option<PathBuf>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            secure_storage_file,
            master_password_file,
            message: message.into(),
            severity,
        }
    }

    /// Emit the advisory at its severity.
    pub fn log(&self) {
        match self.severity {
            Severity::Info => info!("{}", self.message),
            Severity::Warn => warn!("{}", self.message),
        }
    }

    /// `imcl` flags for the chosen files.
    ///
    /// A master password file is never passed without a secure storage file.
    pub fn to_cli_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(secure) = &self.secure_storage_file {
            args.push("-secureStorageFile".to_string());
            args.push(secure.display().to_string());
            if let Some(master) = &self.master_password_file {
                args.push("-masterPasswordFile".to_string());
                args.push(master.display().to_string());
            }
        }
        args
    }
}

const MASTER_WITHOUT_STORAGE: &str =
    "A master password file was provided without a secure storage file.";

/// Advisory decision table. First matching row wins.
pub fn resolve_credentials(inputs: &CredentialInputs) -> CredentialDecision {
    let caller_secure = inputs.caller_secure_storage_file.as_ref();
    let caller_master = inputs.caller_master_password_file.as_ref();
    let ambient_secure = inputs.ambient_secure_storage_file.as_ref();
    let ambient_master = inputs.ambient_master_password_file.as_ref();

    match (caller_secure, caller_master) {
        (Some(secure), Some(master)) => CredentialDecision::new(
            Some(secure.clone()),
            Some(master.clone()),
            Severity::Info,
            "Using the provided secure storage file and master password file",
        ),
        (None, Some(_)) => master_only_fallback(ambient_secure, ambient_master),
        _ => match (ambient_secure, ambient_master) {
            (Some(secure), Some(master)) => CredentialDecision::new(
                Some(secure.clone()),
                Some(master.clone()),
                Severity::Info,
                "Using the default secure storage file and master password file",
            ),
            (None, Some(_)) => CredentialDecision::new(
                None,
                None,
                Severity::Warn,
                "A default master password file is configured without a secure storage file; ignoring it",
            ),
            _ => anonymous(),
        },
    }
}

/// Command-line fallback, independent of the advisory table.
///
/// Each missing caller value falls back to its ambient default, except that
/// the ambient master password is only taken when the caller gave neither
/// file. The master password is dropped when no secure storage file remains.
pub fn invocation_paths(inputs: &CredentialInputs) -> (Option<PathBuf>, Option<PathBuf>) {
    let master = match (
        &inputs.caller_secure_storage_file,
        &inputs.caller_master_password_file,
    ) {
        (None, None) => inputs.ambient_master_password_file.clone(),
        (_, caller_master) => caller_master.clone(),
    };
    let secure = inputs
        .caller_secure_storage_file
        .clone()
        .or_else(|| inputs.ambient_secure_storage_file.clone());

    match secure {
        Some(secure) => (Some(secure), master),
        None => (None, None),
    }
}

/// Single authoritative decision: the paths are exactly what the message
/// describes and exactly what the installer receives.
pub fn resolve_unified(inputs: &CredentialInputs) -> CredentialDecision {
    let ambient_secure = inputs.ambient_secure_storage_file.as_ref();
    let ambient_master = inputs.ambient_master_password_file.as_ref();

    match (
        &inputs.caller_secure_storage_file,
        &inputs.caller_master_password_file,
    ) {
        (Some(_), Some(_)) | (None, Some(_)) => resolve_credentials(inputs),
        (Some(secure), None) => CredentialDecision::new(
            Some(secure.clone()),
            None,
            Severity::Info,
            "Using the provided secure storage file without a master password file",
        ),
        (None, None) => match (ambient_secure, ambient_master) {
            (Some(secure), None) => CredentialDecision::new(
                Some(secure.clone()),
                None,
                Severity::Info,
                "Using the default secure storage file without a master password file",
            ),
            _ => resolve_credentials(inputs),
        },
    }
}

/// Resolve credentials under `policy`.
pub fn decide(inputs: &CredentialInputs, policy: CredentialPolicy) -> CredentialDecision {
    match policy {
        CredentialPolicy::Unified => resolve_unified(inputs),
        CredentialPolicy::Legacy => {
            let advisory = resolve_credentials(inputs);
            let (secure_storage_file, master_password_file) = invocation_paths(inputs);
            CredentialDecision {
                secure_storage_file,
                master_password_file,
                ..advisory
            }
        }
    }
}

fn master_only_fallback(
    ambient_secure: Option<&PathBuf>,
    ambient_master: Option<&PathBuf>,
) -> CredentialDecision {
    match (ambient_secure, ambient_master) {
        (Some(secure), Some(master)) => CredentialDecision::new(
            Some(secure.clone()),
            Some(master.clone()),
            Severity::Warn,
            format!(
                "{} Using the default secure storage file and master password file instead.",
                MASTER_WITHOUT_STORAGE
            ),
        ),
        (Some(secure), None) => CredentialDecision::new(
            Some(secure.clone()),
            None,
            Severity::Warn,
            format!(
                "{} Using the default secure storage file with no master password file.",
                MASTER_WITHOUT_STORAGE
            ),
        ),
        (None, _) => CredentialDecision::new(
            None,
            None,
            Severity::Warn,
            format!("{} Ignoring it.", MASTER_WITHOUT_STORAGE),
        ),
    }
}

fn anonymous() -> CredentialDecision {
    CredentialDecision::new(
        None,
        None,
        Severity::Info,
        "No security credentials were provided; attempting anonymous access",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Option<PathBuf> {
        Some(PathBuf::from(s))
    }

    fn inputs(
        caller_secure: Option<PathBuf>,
        caller_master: Option<PathBuf>,
        ambient_secure: Option<PathBuf>,
        ambient_master: Option<PathBuf>,
    ) -> CredentialInputs {
        CredentialInputs {
            caller_secure_storage_file: caller_secure,
            caller_master_password_file: caller_master,
            ambient_secure_storage_file: ambient_secure,
            ambient_master_password_file: ambient_master,
        }
    }

    #[test]
    fn test_caller_pair_wins() {
        let d = resolve_credentials(&inputs(p("/s1"), p("/m1"), p("/s2"), p("/m2")));
        assert_eq!(d.secure_storage_file, p("/s1"));
        assert_eq!(d.master_password_file, p("/m1"));
        assert_eq!(d.severity, Severity::Info);
    }

    #[test]
    fn test_master_only_variants() {
        let both = resolve_credentials(&inputs(None, p("/m1"), p("/s2"), p("/m2")));
        assert_eq!((both.secure_storage_file, both.master_password_file), (p("/s2"), p("/m2")));
        assert_eq!(both.severity, Severity::Warn);

        let secure_only = resolve_credentials(&inputs(None, p("/m1"), p("/s2"), None));
        assert_eq!(secure_only.secure_storage_file, p("/s2"));
        assert_eq!(secure_only.master_password_file, None);
        assert!(secure_only.message.contains("no master password file"));

        let neither = resolve_credentials(&inputs(None, p("/m1"), None, p("/m2")));
        assert_eq!((neither.secure_storage_file, neither.master_password_file), (None, None));
        assert!(neither.message.contains("Ignoring"));
    }

    #[test]
    fn test_invocation_paths_keeps_caller_master() {
        assert_eq!(
            invocation_paths(&inputs(None, p("/m1"), p("/s2"), p("/m2"))),
            (p("/s2"), p("/m1"))
        );
        assert_eq!(invocation_paths(&inputs(None, None, None, p("/m2"))), (None, None));
        assert_eq!(
            invocation_paths(&inputs(p("/s1"), None, p("/s2"), p("/m2"))),
            (p("/s1"), None)
        );
    }

    #[test]
    fn test_cli_args_never_emit_master_alone() {
        let d = CredentialDecision::new(None, p("/m"), Severity::Info, "x");
        assert!(d.to_cli_args().is_empty());

        let d = CredentialDecision::new(p("/s"), p("/m"), Severity::Info, "x");
        assert_eq!(
            d.to_cli_args(),
            vec!["-secureStorageFile", "/s", "-masterPasswordFile", "/m"]
        );
    }
}
