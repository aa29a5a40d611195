//! Installer module
//!
//! Drives one unattended `imcl` installation: picks or generates the
//! response file, resolves credentials, builds the command line and hands
//! it to the process executor.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::command::{tools_dir, InstallCommand, InvocationArgs};
use crate::credentials::{decide, CredentialDecision, CredentialInputs};
use crate::error::{IimError, Result};
use crate::executor::{ExecOutput, ExecRequest, ProcessExecutor};
use crate::markup::{render_document, ConfigNode, RESPONSE_ROOT};
use crate::response_file::{FileCreator, FileRequest};
use crate::settings::{AmbientConfig, DEFAULT_LOG_FILE};

/// One installation request
#[derive(Debug, Default)]
pub struct InstallRequest {
    /// Name of the installation, used for the generated response file name
    pub name: String,
    /// Existing response file; used verbatim when it is a regular file
    pub response_file: Option<PathBuf>,
    /// Description to generate a response file from otherwise
    pub response: Option<ConfigNode>,
    pub secure_storage_file: Option<PathBuf>,
    pub master_password_file: Option<PathBuf>,
}

/// Where the response file came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSource {
    /// Caller's file, passed through untouched
    Existing(PathBuf),
    /// Generated from the response description
    Generated(PathBuf),
}

impl ResponseSource {
    pub fn path(&self) -> &Path {
        match self {
            ResponseSource::Existing(path) | ResponseSource::Generated(path) => path,
        }
    }
}

/// Everything decided before the installer runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub response: ResponseSource,
    pub credentials: CredentialDecision,
    pub command: InstallCommand,
    pub exec: ExecRequest,
}

/// Result of a successful installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub plan: InstallPlan,
    pub output: ExecOutput,
}

/// Check that `name` can be embedded in the response file name.
pub fn validate_install_name(name: &str) -> Result<()> {
    let reason = if name.trim().is_empty() {
        "must not be empty"
    } else if name.contains('/') {
        "contains path separator"
    } else if name.contains('\0') {
        "contains a NUL byte"
    } else {
        return Ok(());
    };
    Err(IimError::InvalidName {
        name: name.to_string(),
        reason,
    })
}

/// Installer instance bound to its collaborators
pub struct Installer<'a> {
    ambient: &'a dyn AmbientConfig,
    files: &'a dyn FileCreator,
    executor: &'a dyn ProcessExecutor,
    keep_generated: bool,
}

impl<'a> Installer<'a> {
    pub fn new(
        ambient: &'a dyn AmbientConfig,
        files: &'a dyn FileCreator,
        executor: &'a dyn ProcessExecutor,
    ) -> Self {
        Self {
            ambient,
            files,
            executor,
            keep_generated: false,
        }
    }

    /// Leave generated response files in place after `install` returns.
    pub fn keep_generated_files(mut self, keep: bool) -> Self {
        self.keep_generated = keep;
        self
    }

    /// Plan and run the installation.
    ///
    /// A generated response file is removed once the installer exits,
    /// whether it succeeded or not. Collaborator failures are returned
    /// unchanged and not retried.
    pub fn install(&self, request: &InstallRequest) -> Result<InstallOutcome> {
        let plan = self.plan(request)?;

        info!(name = %request.name, "Starting installation");
        let result = self.executor.execute(&plan.exec);
        if let ResponseSource::Generated(path) = &plan.response {
            self.discard_generated(path);
        }

        let output = result.inspect_err(|e| {
            error!(name = %request.name, "Installation failed: {}", e);
        })?;
        info!(name = %request.name, "Installation complete");

        Ok(InstallOutcome { plan, output })
    }

    /// Prepare the response file and command without running the installer.
    ///
    /// A generated response file is left for the caller to inspect.
    pub fn plan(&self, request: &InstallRequest) -> Result<InstallPlan> {
        validate_install_name(&request.name)?;

        let base_dir = self
            .ambient
            .installer_base_dir()
            .ok_or_else(|| IimError::config("installer base directory is not configured"))?;

        let response = self.prepare_response_file(request)?;

        let credentials = self.credentials(
            request.secure_storage_file.clone(),
            request.master_password_file.clone(),
        );
        credentials.log();

        let access_mode = self.ambient.access_mode().unwrap_or_default();
        let log_file = self
            .ambient
            .log_file()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

        let command = InstallCommand::new(
            &base_dir,
            response.path().to_path_buf(),
            access_mode,
            log_file,
            &credentials,
        );

        let exec = ExecRequest {
            command: command.command_line(),
            user: self.ambient.installer_user(),
            group: self.ambient.installer_group(),
            cwd: Some(tools_dir(&base_dir)),
            umask: access_mode.umask_override(),
        };

        Ok(InstallPlan {
            response,
            credentials,
            command,
            exec,
        })
    }

    /// Credential decision for caller-supplied paths under the ambient policy.
    pub fn credentials(
        &self,
        secure_storage_file: Option<PathBuf>,
        master_password_file: Option<PathBuf>,
    ) -> CredentialDecision {
        let inputs =
            CredentialInputs::from_ambient(secure_storage_file, master_password_file, self.ambient);
        decide(&inputs, self.ambient.credential_policy())
    }

    fn discard_generated(&self, path: &Path) {
        if self.keep_generated {
            info!("Keeping generated response file {:?}", path);
            return;
        }
        match self.files.remove(path) {
            Ok(()) => debug!("Removed generated response file {:?}", path),
            Err(e) => warn!("Failed to remove response file {:?}: {}", path, e),
        }
    }

    fn prepare_response_file(&self, request: &InstallRequest) -> Result<ResponseSource> {
        if let Some(path) = request.response_file.as_ref().filter(|p| p.is_file()) {
            info!("Using existing response file {:?}", path);
            return Ok(ResponseSource::Existing(path.clone()));
        }

        let Some(node) = &request.response else {
            return Err(IimError::MissingResponse {
                name: request.name.clone(),
                path: request
                    .response_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<none>".to_string()),
            });
        };

        let document = render_document(RESPONSE_ROOT, node)?;
        let file_request = FileRequest::response_file(
            &request.name,
            document,
            self.ambient.installer_user(),
            self.ambient.installer_group(),
        );
        let path = self.files.create(&file_request)?;
        info!("Generated response file {:?}", path);
        Ok(ResponseSource::Generated(path))
    }
}
