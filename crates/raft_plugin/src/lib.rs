#![forbid(unsafe_code)]
//! Host side of RAFT capture plugins.
//!
//! A plugin is a separate program that speaks line-delimited JSON-RPC 2.0 on
//! stdin/stdout. On start the host sends `register`; the plugin answers with
//! the callables it offers. A plugin declaring exactly one type gets a single
//! `instantiate` call, and every later call carries the returned instance
//! token. The callables the pipeline drives are `initialize`,
//! `capture_filter` and `process_capture`; anything else is recorded and left
//! alone.
//!
//! Plugins may send `log` notifications at any time; they are re-emitted
//! through `tracing` with the plugin path attached.
//!
//! `sdk/raft_plugin.py` implements the plugin side for Python.

mod config;
mod error;
mod handle;
mod protocol;
mod registry;
mod transport;

use std::path::PathBuf;

pub use config::{LaunchSpec, PluginHostConfig};
pub use error::{CallFailure, LoadFailure, PluginCallError, PluginLoadError, TransportError};
pub use handle::PluginHandle;
pub use protocol::{
    FilterOutcome, InstantiateParams, KnownCapability, LogParams, PluginKind, RegisterParams,
    Registration, RequestId, TypeDescriptor, METHOD_INSTANTIATE, METHOD_LOG, METHOD_REGISTER,
    METHOD_SHUTDOWN, PROTOCOL_VERSION,
};
pub use registry::PluginRegistry;

/// Directory containing `raft_plugin.py`; add it to `PYTHONPATH` for Python
/// plugins that import the SDK.
pub fn python_sdk_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("sdk")
}
