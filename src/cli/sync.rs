//! Mirror synchronization and retention CLI commands
//!
//! check-sync, resync, resync-all and clean.

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;

use crate::engine::{ResyncOutcome, SecretEngine};
use crate::secrets::SecretPath;

use super::output::{print_output, OutputFormat};
use super::secrets::ScopeArgs;

#[derive(Args, Debug)]
pub struct ResyncArgs {
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Version to repair
    #[arg(long)]
    pub version: u64,
}

#[derive(Args, Debug)]
pub struct CleanArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Report what would be destroyed without destroying anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct ResyncResult<'a> {
    path: &'a SecretPath,
    version: u64,
    outcome: ResyncOutcome,
    message: &'static str,
}

pub async fn check_sync(engine: &SecretEngine, args: ScopeArgs, output: OutputFormat) -> Result<()> {
    let scope = args.scope.unwrap_or_else(|| engine.default_scope().to_string());
    let report = engine.check_sync(&scope).await?;
    print_output(&report, output)?;
    if !report.is_in_sync() {
        bail!(
            "{} drifted and {} unreadable path(s) under '{}'",
            report.drift.len(),
            report.errors.len(),
            scope
        );
    }
    Ok(())
}

pub async fn resync(engine: &SecretEngine, args: ResyncArgs, output: OutputFormat) -> Result<()> {
    let path = engine.secret_path(&args.path)?;
    let outcome = engine.resync(&path, args.version).await?;
    print_output(
        &ResyncResult { path: &path, version: args.version, outcome, message: outcome.as_str() },
        output,
    )
}

pub async fn resync_all(engine: &SecretEngine, args: ScopeArgs, output: OutputFormat) -> Result<()> {
    let scope = args.scope.unwrap_or_else(|| engine.default_scope().to_string());
    let report = engine.check_sync(&scope).await?;
    let repaired = engine.resync_all(&report).await;
    print_output(&repaired, output)?;
    if !repaired.errors.is_empty() {
        bail!("Resync failed for {} path(s)", repaired.errors.len());
    }
    Ok(())
}

pub async fn clean(engine: &SecretEngine, args: CleanArgs, output: OutputFormat) -> Result<()> {
    let scope = args.scope.scope.unwrap_or_else(|| engine.default_scope().to_string());
    let report = engine.clean(&scope, args.dry_run).await?;
    print_output(&report, output)?;
    if !report.errors.is_empty() {
        bail!("Retention sweep finished with {} error(s)", report.errors.len());
    }
    Ok(())
}
