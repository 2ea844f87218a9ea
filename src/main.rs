use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use tokio::runtime::Runtime;

use warehouse_relay::cli::{Args, Commands};
use warehouse_relay::cloud::transfer::{Payload, Transfer};
use warehouse_relay::config::{config_path_from_env, load_or_default, RelayConfig};
use warehouse_relay::pipeline::export_and_upload_from_env;
use warehouse_relay::server::{start_server, AppState};

fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    initialize_logging(args.verbose)?;

    // Load configuration
    let config_path = args.config.clone().or_else(config_path_from_env);
    let config = load_or_default(config_path.as_deref())?;

    match args.command {
        Commands::Export => run_export(&config),
        Commands::Transfer { path, filename, project } => {
            run_transfer(&config, &path, filename.as_deref(), project.as_deref())
        }
        Commands::Serve { bind } => run_server(config, &bind),
        Commands::InitConfig { path } => {
            info!("Creating default configuration file at {}", path.display());
            RelayConfig::create_default_config_file(&path)?;
            info!("Configuration created successfully");
            Ok(())
        }
    }
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")?;
    Ok(())
}

/// Run one export/relay invocation and print its response
fn run_export(config: &RelayConfig) -> Result<()> {
    let response = export_and_upload_from_env(config);

    if response.is_success() {
        println!("{}", response.body);
        Ok(())
    } else {
        eprintln!("{}", response.body);
        Err(anyhow!("Export failed with status {}", response.status))
    }
}

/// Stream a local file through the transfer stage
fn run_transfer(config: &RelayConfig, path: &Path, filename: Option<&str>, project: Option<&str>) -> Result<()> {
    let filename = match filename {
        Some(name) => name.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("Cannot derive a filename from {}", path.display()))?,
    };
    let project = project.unwrap_or(&config.secret_project_id);

    let file = fs::File::open(path).context(format!("Failed to open {}", path.display()))?;
    let reader: Box<dyn Read + Send> = Box::new(file);

    let transfer = Transfer::from_config(config)?;
    let outcome = transfer.process_csv_upload(Payload::Reader(reader), &filename, project);
    println!("{}", serde_json::to_string(&outcome)?);

    if outcome.is_success() {
        Ok(())
    } else {
        Err(anyhow!("Transfer failed: {}", outcome.message))
    }
}

/// Start the HTTP surface on a multi-threaded runtime
fn run_server(config: RelayConfig, bind: &str) -> Result<()> {
    let state = AppState {
        config: Arc::new(config),
        // Read per trigger so key rotation needs no restart
        service_account_key: None,
    };

    let rt = Runtime::new().context("Failed to create tokio runtime")?;
    rt.block_on(start_server(state, bind))
}
