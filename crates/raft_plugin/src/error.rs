use std::{io, path::PathBuf, time::Duration};

use serde_json::Value;
use thiserror::Error;

/// Failure of the stdio JSON-RPC channel to a plugin process.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("transport task failed: {0}")]
    Transport(String),
    #[error("plugin returned JSON-RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("plugin broke the protocol: {0}")]
    Protocol(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("transport channel closed unexpectedly")]
    ChannelClosed,
}

/// A plugin could not be brought up.
#[derive(Debug, Error)]
#[error("failed to load plugin `{path}`: {cause}")]
pub struct PluginLoadError {
    pub path: PathBuf,
    #[source]
    pub cause: LoadFailure,
}

#[derive(Debug, Error)]
pub enum LoadFailure {
    #[error("plugin file is not readable: {0}")]
    Unreadable(#[source] io::Error),
    #[error("could not start the plugin process: {0}")]
    Spawn(#[source] TransportError),
    #[error("registration failed: {0}")]
    Register(#[source] TransportError),
    #[error("plugin answered `register` with an invalid description: {0}")]
    InvalidRegistration(#[source] serde_json::Error),
    #[error("could not instantiate `{type_name}`: {source}")]
    Instantiate {
        type_name: String,
        #[source]
        source: TransportError,
    },
}

/// A capability call failed; the pipeline treats this as fatal.
#[derive(Debug, Error)]
#[error("plugin `{path}` failed in `{capability}`: {source}")]
pub struct PluginCallError {
    pub path: PathBuf,
    pub capability: String,
    #[source]
    pub source: CallFailure,
}

#[derive(Debug, Error)]
pub enum CallFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("could not encode the call parameters: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("result is an object but not a capture: {0}")]
    InvalidResult(#[source] serde_json::Error),
}
