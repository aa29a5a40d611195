use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// iminstall - unattended IBM Installation Manager installs
#[derive(Parser, Debug)]
#[command(name = "iminstall")]
#[command(about = "Generate Installation Manager response files and run imcl unattended")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: prepare everything and log the imcl command instead
    /// of running it.
    ///
    /// The response file is still generated so it can be inspected.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file (defaults to $IIM_SETTINGS, then built-in defaults)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install with imcl using an existing or generated response file
    Install {
        /// Installation name (used in the generated response file name)
        #[arg(short, long, required_unless_present = "manifest", value_parser = parse_install_name)]
        name: Option<String>,

        /// Existing response file to use verbatim
        #[arg(long, conflicts_with = "manifest")]
        response_file: Option<PathBuf>,

        /// JSON response description to generate the response file from
        #[arg(long, conflicts_with = "manifest")]
        response_json: Option<PathBuf>,

        /// JSON install manifest (name, response, credentials)
        #[arg(long)]
        manifest: Option<PathBuf>,

        #[command(flatten)]
        credentials: CredentialArgs,
    },
    /// Print the response document generated from a JSON description
    Render {
        /// JSON response description
        description: PathBuf,

        /// Root element name
        #[arg(long, default_value = crate::markup::RESPONSE_ROOT)]
        root: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show which credential files would be passed to imcl
    Credentials {
        #[command(flatten)]
        credentials: CredentialArgs,
    },
    /// Validate a settings file
    Validate {
        /// Path to settings file to validate
        settings_file: PathBuf,
    },
    /// Write a settings file with default values
    InitSettings {
        /// Destination path
        path: PathBuf,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct CredentialArgs {
    /// Secure storage file for repository authentication
    #[arg(long)]
    pub secure_storage_file: Option<PathBuf>,

    /// Master password file unlocking the secure storage file
    #[arg(long)]
    pub master_password_file: Option<PathBuf>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

fn parse_install_name(name: &str) -> Result<String, String> {
    crate::installer::validate_install_name(name)
        .map(|()| name.to_string())
        .map_err(|e| e.to_string())
}
