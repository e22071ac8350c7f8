use std::error::Error as StdError;

use raft_plugin::PluginLoadError;
use thiserror::Error;

use crate::{config::ConfigError, db::DbError, runner::PipelineError};

/// Everything that makes `raft-cmdline` exit non-zero.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    PluginLoad(#[from] PluginLoadError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Lines describing `err` and its sources. A cause whose text is already part
/// of the line before it is left out.
pub fn error_chain(err: &dyn StdError) -> Vec<String> {
    let mut previous = err.to_string();
    let mut lines = vec![format!("error: {previous}")];
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !previous.contains(&text) {
            lines.push(format!("  caused by: {text}"));
        }
        previous = text;
        source = cause.source();
    }
    lines
}
