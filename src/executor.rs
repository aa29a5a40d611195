//! Installer process execution.
//!
//! `ProcessExecutor` is the seam between install orchestration and the
//! operating system. `SystemExecutor` runs the command through `/bin/sh -c`
//! as the requested user and group, in the requested directory, with an
//! optional umask; `DryRunExecutor` only logs what would run.

use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use nix::sys::stat::{umask, Mode};
use nix::unistd::{Group, User};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::process_guard::{ChildRegistry, CommandProcessGroup};

/// A command to run synchronously.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecRequest {
    /// Complete shell command line
    pub command: String,
    pub user: Option<String>,
    pub group: Option<String>,
    pub cwd: Option<PathBuf>,
    /// Umask for the child, e.g. `0o013`
    pub umask: Option<u32>,
}

/// Captured output of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Unknown user '{0}'")]
    UnknownUser(String),

    #[error("Unknown group '{0}'")]
    UnknownGroup(String),

    #[error("Account lookup failed: {0}")]
    Lookup(#[from] nix::Error),

    #[error("Failed to run '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// `code` is `None` when the process was killed by a signal
    #[error("'{command}' exited with status {}: {}", exit_status(.code), .stderr.trim())]
    NonZeroExit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn exit_status(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| c.to_string())
}

pub trait ProcessExecutor {
    /// Run `request` to completion; a non-zero exit is an error.
    fn execute(&self, request: &ExecRequest) -> Result<ExecOutput, ExecError>;
}

/// Runs commands on this host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl SystemExecutor {
    fn resolve_identity(request: &ExecRequest) -> Result<(Option<u32>, Option<u32>), ExecError> {
        let user = match &request.user {
            Some(name) => Some(
                User::from_name(name)?.ok_or_else(|| ExecError::UnknownUser(name.clone()))?,
            ),
            None => None,
        };

        let gid = match &request.group {
            Some(name) => Some(
                Group::from_name(name)?
                    .ok_or_else(|| ExecError::UnknownGroup(name.clone()))?
                    .gid
                    .as_raw(),
            ),
            // a user switch without a group takes the user's primary group
            None => user.as_ref().map(|u| u.gid.as_raw()),
        };

        Ok((user.map(|u| u.uid.as_raw()), gid))
    }
}

impl ProcessExecutor for SystemExecutor {
    fn execute(&self, request: &ExecRequest) -> Result<ExecOutput, ExecError> {
        let (uid, gid) = Self::resolve_identity(request)?;

        info!(
            command = %request.command,
            user = ?request.user,
            group = ?request.group,
            cwd = ?request.cwd,
            umask = ?request.umask.map(|m| format!("{:03o}", m)),
            "Running installer"
        );

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c")
            .arg(&request.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .in_new_process_group();

        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }
        if let Some(gid) = gid {
            cmd.gid(gid);
        }
        if let Some(uid) = uid {
            cmd.uid(uid);
        }
        if let Some(mask) = request.umask {
            let mode = Mode::from_bits_truncate(mask as nix::libc::mode_t);
            // SAFETY: umask(2) is async-signal-safe
            unsafe {
                cmd.pre_exec(move || {
                    umask(mode);
                    Ok(())
                });
            }
        }

        let child = cmd.spawn().map_err(|source| ExecError::Spawn {
            command: request.command.clone(),
            source,
        })?;
        let pid = child.id();

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.register(pid);
        }
        let waited = child.wait_with_output();
        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.unregister(pid);
        }

        let output = waited.map_err(|source| ExecError::Spawn {
            command: request.command.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        for line in stdout.lines() {
            debug!(target: "iminstall::installer_output", "{}", line);
        }
        for line in stderr.lines() {
            debug!(target: "iminstall::installer_output", "stderr: {}", line);
        }

        let exit_code = output.status.code();
        if !output.status.success() {
            warn!(pid, code = ?exit_code, "Installer failed");
            return Err(ExecError::NonZeroExit {
                command: request.command.clone(),
                code: exit_code,
                stderr,
            });
        }

        info!(pid, "Installer finished successfully");
        Ok(ExecOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}

/// Logs the request and reports success without running anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

impl ProcessExecutor for DryRunExecutor {
    fn execute(&self, request: &ExecRequest) -> Result<ExecOutput, ExecError> {
        info!(
            command = %request.command,
            user = ?request.user,
            group = ?request.group,
            cwd = ?request.cwd,
            "[DRY RUN] Skipping installer execution"
        );
        Ok(ExecOutput {
            exit_code: Some(0),
            ..ExecOutput::default()
        })
    }
}
