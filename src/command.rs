//! Typed installer invocations.
//!
//! `InvocationArgs` is the contract between Rust and an external tool: the
//! struct is the single source of truth for flag names, so a renamed flag is
//! a compile error rather than a failed install.

use std::path::{Path, PathBuf};

use crate::credentials::CredentialDecision;
use crate::types::AccessMode;

/// Directory below the install root holding `imcl`
pub const TOOLS_SUBDIR: &str = "eclipse/tools";

/// Installer command-line executable
pub const IMCL: &str = "imcl";

/// Trait for typed invocation arguments.
///
/// - `program()` is the executable to run.
/// - `to_cli_args()` returns arguments exactly as the tool expects them.
pub trait InvocationArgs {
    fn program(&self) -> &Path;

    fn to_cli_args(&self) -> Vec<String>;

    /// Single shell command line, arguments quoted where needed.
    fn command_line(&self) -> String {
        let mut line = shell_quote(&self.program().display().to_string());
        for arg in self.to_cli_args() {
            line.push(' ');
            line.push_str(&shell_quote(&arg));
        }
        line
    }
}

/// `imcl` directory for an Installation Manager install root.
pub fn tools_dir(base_dir: &Path) -> PathBuf {
    base_dir.join(TOOLS_SUBDIR)
}

/// An `imcl input <response file>` invocation.
///
/// Renders as:
///
/// ```text
/// <imcl> input <path> -showProgress -accessRights <mode> -acceptLicense
///        input <path> -log <logPath> [-secureStorageFile <path> [-masterPasswordFile <path>]]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallCommand {
    pub imcl: PathBuf,
    pub response_file: PathBuf,
    pub access_mode: AccessMode,
    pub log_file: PathBuf,
    pub secure_storage_file: Option<PathBuf>,
    pub master_password_file: Option<PathBuf>,
}

impl InstallCommand {
    pub fn new(
        base_dir: &Path,
        response_file: PathBuf,
        access_mode: AccessMode,
        log_file: PathBuf,
        credentials: &CredentialDecision,
    ) -> Self {
        Self {
            imcl: tools_dir(base_dir).join(IMCL),
            response_file,
            access_mode,
            log_file,
            secure_storage_file: credentials.secure_storage_file.clone(),
            master_password_file: credentials.master_password_file.clone(),
        }
    }

    fn input_snippet(&self) -> [String; 2] {
        ["input".to_string(), self.response_file.display().to_string()]
    }
}

impl InvocationArgs for InstallCommand {
    fn program(&self) -> &Path {
        &self.imcl
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(14);
        args.extend(self.input_snippet());
        args.push("-showProgress".to_string());
        args.push("-accessRights".to_string());
        args.push(self.access_mode.to_string());
        args.push("-acceptLicense".to_string());
        args.extend(self.input_snippet());
        args.push("-log".to_string());
        args.push(self.log_file.display().to_string());

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

/// Quote `arg` for `/bin/sh` unless it only holds safe characters.
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '/' | '.' | '-' | '_' | ':' | '=' | '+' | ',' | '@')
        });
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
