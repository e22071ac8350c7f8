#![forbid(unsafe_code)]
//! Command-line driver for RAFT capture processing.
//!
//! `raft-cmdline --parse --capture-filter f.py --process-capture p.py
//! --burp-log 'logs/*.log'` streams every matched file through the format
//! parsers, normalizes each record into a [`raft_capture::Capture`], and hands
//! it to the filter plugins and then the processor plugins, in the order they
//! were given. See [`runner::PipelineRunner`] for the per-file loop.

mod app;
pub mod cli;
pub mod config;
pub mod db;
mod error;
pub mod expand;
pub mod logging;
pub mod runner;

pub use app::{run, RunOutcome};
pub use cli::Cli;
pub use config::{AppConfig, ConfigError, LogFormat, LoggingConfig};
pub use error::{error_chain, AppError};
pub use runner::{
    FileReport, FileState, InitializationState, PipelineError, PipelineRunner, RunSummary,
};
