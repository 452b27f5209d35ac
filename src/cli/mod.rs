//! # Command Line Interface
//!
//! `kvmirror` drives the secret engine from a terminal: lifecycle commands
//! on single secrets, drift checks and repair, and the retention sweep.

pub mod config;
pub mod output;
pub mod prompt;
pub mod secrets;
pub mod sync;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::engine::SecretEngine;
use crate::observability::{init_observability, log_config_info, LogFormat};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "kvmirror")]
#[command(about = "Versioned secrets with a blank CI mirror tree")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Engine configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Platform scope prefixed to secret paths
    #[arg(long, global = true)]
    pub platform: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log format
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    pub log_format: String,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,

    /// Skip the delete/undelete confirmation (destroy always asks)
    #[arg(short, long, global = true)]
    pub yes: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a secret and its mirror at version 1
    Create(secrets::CreateArgs),

    /// Write a new version with keys added, changed or removed
    Update(secrets::UpdateArgs),

    /// Read a secret version
    Get(secrets::VersionArgs),

    /// Show primary and mirror metadata
    Metadata(secrets::PathArgs),

    /// Soft-delete a version in both trees
    Delete(secrets::VersionArgs),

    /// Restore a soft-deleted version in both trees
    Undelete(secrets::UndeleteArgs),

    /// Delete every version and schedule permanent removal
    Destroy(secrets::PathArgs),

    /// Report paths whose mirror disagrees with the primary
    CheckSync(secrets::ScopeArgs),

    /// Repair one version of one path
    Resync(sync::ResyncArgs),

    /// Check a scope and repair every drifted version
    ResyncAll(secrets::ScopeArgs),

    /// Permanently remove secrets whose destroy date has passed
    Clean(sync::CleanArgs),

    /// List secrets under a scope
    List(secrets::ScopeArgs),
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_format: LogFormat = cli.log_format.parse().map_err(anyhow::Error::msg)?;
    init_observability(cli.verbose, log_format);

    let config_path = config::resolve_config_path(cli.config);
    let engine_config = config::load_engine_config(config_path.as_deref(), cli.platform)?;
    log_config_info(&engine_config);

    let engine = SecretEngine::connect(engine_config)
        .await
        .context("Failed to connect to secret backend")?
        .with_prompt(Arc::new(prompt::TerminalPrompt));

    let output = cli.output;
    match cli.command {
        Commands::Create(args) => secrets::create(&engine, args, output).await,
        Commands::Update(args) => secrets::update(&engine, args, output).await,
        Commands::Get(args) => secrets::get(&engine, args, output).await,
        Commands::Metadata(args) => secrets::metadata(&engine, args, output).await,
        Commands::Delete(args) => secrets::delete(&engine, args, cli.yes, output).await,
        Commands::Undelete(args) => secrets::undelete(&engine, args, cli.yes, output).await,
        Commands::Destroy(args) => secrets::destroy(&engine, args, output).await,
        Commands::CheckSync(args) => sync::check_sync(&engine, args, output).await,
        Commands::Resync(args) => sync::resync(&engine, args, output).await,
        Commands::ResyncAll(args) => sync::resync_all(&engine, args, output).await,
        Commands::Clean(args) => sync::clean(&engine, args, output).await,
        Commands::List(args) => secrets::list(&engine, args, output).await,
    }
}
