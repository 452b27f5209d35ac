//! Secret lifecycle CLI commands
//!
//! create, update, get, metadata, delete, undelete, destroy and list.

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::engine::SecretEngine;
use crate::secrets::{CustomMetadata, SecretChanges, SecretData, SecretPath};

use super::output::{print_output, OutputFormat};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Secret name, relative to the platform scope
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Secret value as KEY=VALUE (repeat for multiple keys)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub values: Vec<(String, String)>,

    /// JSON object of string values to add to the secret
    #[arg(long, value_name = "FILE")]
    pub from_file: Option<PathBuf>,

    /// Team or person owning the secret
    #[arg(long)]
    pub owner: String,

    /// Where the secret value comes from
    #[arg(long)]
    pub source: String,

    /// What the secret is used for
    #[arg(long)]
    pub usage: String,

    /// Additional custom metadata as KEY=VALUE
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub metadata: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Key to add or overwrite as KEY=VALUE
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub values: Vec<(String, String)>,

    /// Key to remove
    #[arg(long = "unset", value_name = "KEY")]
    pub removed: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Version number (defaults to the latest readable version)
    #[arg(long)]
    pub version: Option<u64>,
}

#[derive(Args, Debug)]
pub struct UndeleteArgs {
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Version number to restore
    #[arg(long)]
    pub version: u64,
}

#[derive(Args, Debug)]
pub struct PathArgs {
    #[arg(value_name = "PATH")]
    pub path: String,
}

#[derive(Args, Debug)]
pub struct ScopeArgs {
    /// Scope to scan (defaults to the platform scope)
    #[arg(value_name = "SCOPE")]
    pub scope: Option<String>,
}

#[derive(Debug, Serialize)]
struct WriteResult<'a> {
    path: &'a SecretPath,
    version: u64,
}

#[derive(Debug, Serialize)]
struct DeleteResult<'a> {
    path: &'a SecretPath,
    version: Option<u64>,
}

pub async fn create(engine: &SecretEngine, args: CreateArgs, output: OutputFormat) -> Result<()> {
    let path = engine.secret_path(&args.path)?;

    let mut data = SecretData::new();
    if let Some(file) = &args.from_file {
        data.extend(read_data_file(file)?);
    }
    data.extend(args.values);
    if data.is_empty() {
        bail!("No secret values given; use --set KEY=VALUE or --from-file");
    }

    let mut metadata: CustomMetadata = args.metadata.into_iter().collect();
    metadata.insert("owner".to_string(), args.owner);
    metadata.insert("source".to_string(), args.source);
    metadata.insert("usage".to_string(), args.usage);

    let version = engine.create(&path, data, metadata).await?;
    print_output(&WriteResult { path: &path, version }, output)
}

pub async fn update(engine: &SecretEngine, args: UpdateArgs, output: OutputFormat) -> Result<()> {
    let path = engine.secret_path(&args.path)?;

    let mut changes: SecretChanges =
        args.values.into_iter().map(|(key, value)| (key, Some(value))).collect();
    for key in args.removed {
        if changes.insert(key.clone(), None).is_some() {
            bail!("Key '{}' is both set and unset", key);
        }
    }
    if changes.is_empty() {
        bail!("Nothing to update; use --set KEY=VALUE or --unset KEY");
    }

    let version = engine.update(&path, changes).await?;
    print_output(&WriteResult { path: &path, version }, output)
}

pub async fn get(engine: &SecretEngine, args: VersionArgs, output: OutputFormat) -> Result<()> {
    let path = engine.secret_path(&args.path)?;
    let record = engine.get(&path, args.version).await?;
    print_output(&record, output)
}

pub async fn metadata(engine: &SecretEngine, args: PathArgs, output: OutputFormat) -> Result<()> {
    let path = engine.secret_path(&args.path)?;
    let view = engine.metadata(&path).await?;
    print_output(&view, output)
}

pub async fn delete(
    engine: &SecretEngine,
    args: VersionArgs,
    assume_yes: bool,
    output: OutputFormat,
) -> Result<()> {
    let path = engine.secret_path(&args.path)?;
    let version = engine.delete(&path, args.version, assume_yes).await?;
    print_output(&DeleteResult { path: &path, version }, output)
}

pub async fn undelete(
    engine: &SecretEngine,
    args: UndeleteArgs,
    assume_yes: bool,
    output: OutputFormat,
) -> Result<()> {
    let path = engine.secret_path(&args.path)?;
    engine.undelete(&path, args.version, assume_yes).await?;
    print_output(&WriteResult { path: &path, version: args.version }, output)
}

pub async fn destroy(engine: &SecretEngine, args: PathArgs, output: OutputFormat) -> Result<()> {
    let path = engine.secret_path(&args.path)?;
    let outcome = engine.destroy(&path).await?;
    print_output(&outcome, output)
}

pub async fn list(engine: &SecretEngine, args: ScopeArgs, output: OutputFormat) -> Result<()> {
    let scope = args.scope.unwrap_or_else(|| engine.default_scope().to_string());
    let paths = engine.list(&scope).await?;
    print_output(&paths, output)
}

/// Parse `KEY=VALUE`; the value may itself contain `=`.
pub fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

fn read_data_file(file: &PathBuf) -> Result<SecretData> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Expected a JSON object of strings in {}", file.display()))
}
