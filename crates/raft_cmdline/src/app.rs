use std::{path::PathBuf, sync::Arc};

use raft_plugin::{PluginHandle, PluginLoadError, PluginRegistry};
use tracing::{debug, info};

use crate::{
    cli::Cli,
    config::AppConfig,
    db,
    expand::expand_file_args,
    runner::{PipelineRunner, RunSummary},
    AppError,
};

/// What a successful invocation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// `--import` was given; there is no database layer to import into.
    Imported,
    Parsed(RunSummary),
    /// Neither `--import` nor `--parse` was given.
    NoRecognizedOptions,
}

/// Checks the database, loads plugins, then imports or parses.
///
/// Plugins are loaded even when nothing will be parsed, so a broken plugin
/// always fails the invocation. Every loaded plugin is shut down before
/// returning.
pub async fn run(cli: &Cli, config: &AppConfig) -> Result<RunOutcome, AppError> {
    if let Some(path) = &cli.db {
        let path = db::check(path, cli.create)?;
        debug!(db = %path.display(), "database path accepted");
    }

    let mut registry = PluginRegistry::new(config.plugins.clone());
    let outcome = run_with_plugins(cli, config, &mut registry).await;
    registry.shutdown_all().await;
    outcome
}

async fn run_with_plugins(
    cli: &Cli,
    config: &AppConfig,
    registry: &mut PluginRegistry,
) -> Result<RunOutcome, AppError> {
    let filters = load_plugins(registry, &cli.capture_filter).await?;
    let processors = load_plugins(registry, &cli.process_capture).await?;

    if cli.import {
        info!("import requested; no database layer is attached");
        return Ok(RunOutcome::Imported);
    }
    if !cli.parse {
        return Ok(RunOutcome::NoRecognizedOptions);
    }

    let jobs: Vec<_> = cli
        .selected_formats()
        .into_iter()
        .map(|(format, args)| (format, expand_file_args(&args)))
        .collect();

    let mut runner = PipelineRunner::new(filters, processors).with_limits(config.ingest);
    runner.run(&jobs).await?;
    let summary = runner.into_summary();
    info!(
        files = summary.files.len(),
        records = summary.records_adapted(),
        skipped = summary.records_skipped(),
        "parse complete"
    );
    Ok(RunOutcome::Parsed(summary))
}

async fn load_plugins(
    registry: &mut PluginRegistry,
    paths: &[PathBuf],
) -> Result<Vec<Arc<PluginHandle>>, PluginLoadError> {
    let mut handles = Vec::with_capacity(paths.len());
    for path in paths {
        handles.push(registry.load(path).await?);
    }
    Ok(handles)
}
