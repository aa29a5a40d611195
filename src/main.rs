//! iminstall - Main entry point

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use iminstall::cli::{Cli, Commands, CredentialArgs};
use iminstall::command::shell_quote;
use iminstall::executor::{DryRunExecutor, ProcessExecutor, SystemExecutor};
use iminstall::installer::{InstallRequest, Installer};
use iminstall::manifest::{load_response_description, InstallManifest};
use iminstall::markup::render_document;
use iminstall::process_guard;
use iminstall::response_file::TempFileCreator;
use iminstall::settings::Settings;

/// Initialize the tracing subscriber; RUST_LOG overrides the default level
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Install {
            name,
            response_file,
            response_json,
            manifest,
            credentials,
        } => {
            let request = match manifest {
                Some(path) => {
                    info!("Loading install manifest {:?}", path);
                    let mut request = InstallManifest::load_from_file(&path)?.into_request()?;
                    // explicit flags win over the manifest
                    if let Some(name) = name {
                        request.name = name;
                    }
                    request.secure_storage_file =
                        credentials.secure_storage_file.or(request.secure_storage_file);
                    request.master_password_file =
                        credentials.master_password_file.or(request.master_password_file);
                    request
                }
                None => InstallRequest {
                    name: name.context("--name is required without --manifest")?,
                    response_file,
                    response: response_json
                        .map(load_response_description)
                        .transpose()?,
                    secure_storage_file: credentials.secure_storage_file,
                    master_password_file: credentials.master_password_file,
                },
            };
            let settings = load_settings(cli.settings.as_deref())?;
            run_install(&settings, &request, cli.dry_run)
        }
        Commands::Render {
            description,
            root,
            output,
        } => {
            let node = load_response_description(&description)?;
            let document = render_document(&root, &node)
                .with_context(|| format!("Failed to render {:?}", description))?;
            match output {
                Some(path) => {
                    std::fs::write(&path, document)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    info!("Wrote response document to {:?}", path);
                }
                None => print!("{}", document),
            }
            Ok(())
        }
        Commands::Credentials { credentials } => {
            let settings = load_settings(cli.settings.as_deref())?;
            show_credentials(&settings, credentials);
            Ok(())
        }
        Commands::Validate { settings_file } => {
            info!("Validating settings file: {:?}", settings_file);
            let settings = Settings::load_from_file(&settings_file)?;
            settings.validate()?;
            println!("✓ Settings file is valid: {:?}", settings_file);
            Ok(())
        }
        Commands::InitSettings { path } => {
            if path.exists() {
                anyhow::bail!("Refusing to overwrite existing file {:?}", path);
            }
            Settings::default().save_to_file(&path)?;
            println!("✓ Wrote default settings to {:?}", path);
            Ok(())
        }
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load_from_file(path)?,
        None => Settings::from_env_or_default()?,
    };
    settings.validate().context("Invalid settings")?;
    debug!("Effective settings: {:?}", settings);
    Ok(settings)
}

fn run_install(settings: &Settings, request: &InstallRequest, dry_run: bool) -> Result<()> {
    // cleanup still happens through the executor's registry if this fails
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }

    let files = TempFileCreator::new();
    let executor: &dyn ProcessExecutor = if dry_run {
        &DryRunExecutor
    } else {
        &SystemExecutor
    };

    // dry runs keep the generated response file for inspection
    let installer = Installer::new(settings, &files, executor).keep_generated_files(dry_run);
    let outcome = installer
        .install(request)
        .with_context(|| format!("Installation '{}' failed", request.name))?;

    if dry_run {
        println!("{}", outcome.plan.exec.command);
    } else {
        println!("✓ Installation '{}' complete", request.name);
    }
    Ok(())
}

fn show_credentials(settings: &Settings, credentials: CredentialArgs) {
    let files = TempFileCreator::new();
    let installer = Installer::new(settings, &files, &DryRunExecutor);
    let decision = installer.credentials(
        credentials.secure_storage_file,
        credentials.master_password_file,
    );

    println!("[{}] {}", decision.severity, decision.message);
    let flags: Vec<String> = decision.to_cli_args().iter().map(|a| shell_quote(a)).collect();
    if flags.is_empty() {
        println!("(no credential flags)");
    } else {
        println!("{}", flags.join(" "));
    }
}
