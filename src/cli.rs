//! Clap derive structures and dispatch for the `fabric-compiler` binary.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::db::{MemoryStore, Store, TopologyStore};
use crate::models::{BatchReport, TopologyDocument};
use crate::netbox::{self, NetBoxClient};
use crate::utils::config_filename;
use crate::AppState;

/// fabric-compiler: spine/leaf topology in, underlay configs out
#[derive(Debug, Parser)]
#[command(
    name = "fabric-compiler",
    version,
    about = "Load a spine/leaf topology and render underlay BGP configurations",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// SQLite database file
    #[arg(long, env = "DB_PATH", global = true)]
    pub db: Option<String>,

    /// Comma-separated management interface patterns
    #[arg(long, env = "FABRIC_EXCLUDED_INTERFACES", global = true, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Template file replacing the built-in underlay template
    #[arg(long, env = "TEMPLATE_PATH", global = true)]
    pub template: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP API
    Serve {
        /// Bind address
        #[arg(long, env = "LISTEN_ADDR")]
        listen: Option<String>,
    },
    /// Load a topology document into the database
    Load {
        /// YAML or JSON document
        file: PathBuf,
    },
    /// Render configurations from the database
    Render(RenderArgs),
    /// Load a document in memory and render it, without touching the database
    Compile {
        file: PathBuf,
        /// Directory receiving one <device>.cfg per device
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Dump the stored inventory
    Inventory {
        #[arg(long, short = 'o', default_value = "yaml")]
        output: OutputFormat,
    },
    /// Push the stored topology to NetBox
    NetboxPush,
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Device to render (repeatable, default: all)
    #[arg(long = "device", short = 'd')]
    pub devices: Vec<String>,

    /// Directory receiving one <device>.cfg per device
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

impl GlobalOpts {
    /// Overlay command-line flags on the environment configuration
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(db) = &self.db {
            config.db_path = db.clone();
        }
        let exclude: Vec<String> = self
            .exclude
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !exclude.is_empty() {
            config.excluded_interfaces = exclude;
        }
        if self.template.is_some() {
            config.template_path = self.template.clone();
        }
        config
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = cli.global.apply(Config::load());

    match cli.command {
        Command::Compile { file, out_dir } => compile_file(config, &file, out_dir.as_deref()).await,
        command => {
            let store = Store::with_pool_size(&config.db_path, config.db_max_connections).await?;
            tracing::info!("Database: {}", config.db_path);
            let state = Arc::new(AppState::new(Arc::new(store), config)?);
            run_with_store(state, command).await
        }
    }
}

async fn run_with_store(state: Arc<AppState>, command: Command) -> Result<()> {
    match command {
        Command::Serve { listen } => {
            let addr = listen.unwrap_or_else(|| state.config.listen_addr.clone());
            crate::serve(state, &addr).await
        }
        Command::Load { file } => load_file(&state, &file).await,
        Command::Render(args) => {
            let report = state
                .compiler
                .compile(state.store.as_ref(), &args.devices)
                .await?;
            emit(&report, args.out_dir.as_deref()).await
        }
        Command::Inventory { output } => {
            let inventory = state.store.snapshot().await?;
            let text = match output {
                OutputFormat::Json => serde_json::to_string_pretty(&inventory)?,
                OutputFormat::Yaml => serde_yaml::to_string(&inventory)?,
            };
            println!("{}", text);
            Ok(())
        }
        Command::NetboxPush => {
            let (Some(url), Some(token)) = (&state.config.netbox_url, &state.config.netbox_token)
            else {
                anyhow::bail!("NETBOX_URL and NETBOX_TOKEN must be set");
            };
            let nb = NetBoxClient::new(url.clone(), token.clone())?;
            let result = netbox::sync_push(
                state.store.as_ref(),
                &nb,
                state.compiler.renderer().resolver(),
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Compile { file, out_dir } => {
            compile_file(state.config.clone(), &file, out_dir.as_deref()).await
        }
    }
}

/// Load `file` into a throwaway in-memory store and render every device
async fn compile_file(config: Config, file: &Path, out_dir: Option<&Path>) -> Result<()> {
    let state = AppState::new(Arc::new(MemoryStore::new()), config)?;
    load_file(&state, file).await?;
    let report = state.compiler.compile(state.store.as_ref(), &[]).await?;
    emit(&report, out_dir).await
}

async fn load_file(state: &AppState, file: &Path) -> Result<()> {
    let doc = TopologyDocument::from_path(file).await?;
    let report = state.loader.load(state.store.as_ref(), &doc).await?;
    for rejected in &report.rejected_bindings {
        eprintln!(
            "rejected {} on {}:{}: {}",
            rejected.address, rejected.device, rejected.interface, rejected.reason
        );
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Print or write the outputs, then fail if any device failed
async fn emit(report: &BatchReport, out_dir: Option<&Path>) -> Result<()> {
    match out_dir {
        Some(dir) => {
            write_outputs(report, dir).await?;
        }
        None => {
            for text in report.outputs.values() {
                print!("{}", text);
            }
        }
    }
    for failure in &report.failures {
        eprintln!("{}: {} ({})", failure.device, failure.message, failure.kind);
    }
    if !report.failures.is_empty() {
        anyhow::bail!(
            "{} of {} device(s) failed to render",
            report.failed(),
            report.succeeded() + report.failed()
        );
    }
    Ok(())
}

/// Write each output to `<dir>/<device>.cfg`
pub async fn write_outputs(report: &BatchReport, dir: &Path) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let mut written = Vec::new();
    for (device, text) in &report.outputs {
        let path = dir.join(config_filename(device));
        tokio::fs::write(&path, text)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    tracing::info!("Wrote {} config(s) to {}", written.len(), dir.display());
    Ok(written)
}
