use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use raft_capture::Capture;

/// Version string sent with `register`.
pub const PROTOCOL_VERSION: &str = "1";

/// Host → plugin request asking the plugin to describe its callables.
pub const METHOD_REGISTER: &str = "register";
/// Host → plugin request creating the single instance of a plugin type.
pub const METHOD_INSTANTIATE: &str = "instantiate";
/// Host → plugin notification sent before stdin is closed.
pub const METHOD_SHUTDOWN: &str = "shutdown";
/// Plugin → host notification carrying a log line.
pub const METHOD_LOG: &str = "log";

/// Unique identifier for JSON-RPC calls.
pub type RequestId = u64;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub path: String,
}

/// Callables a plugin declares in its `register` answer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    #[serde(default)]
    pub functions: Vec<String>,
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstantiateParams {
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LogParams {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// How the host reaches a plugin's capabilities.
#[derive(Clone, Debug, PartialEq)]
pub enum PluginKind {
    /// Top-level functions, called by name.
    FreeFunctions(Vec<String>),
    /// The plugin's only type, instantiated once; calls carry the instance
    /// token. `methods` never holds `_`-prefixed names.
    Instance {
        type_name: String,
        instance: Value,
        methods: Vec<String>,
    },
}

impl PluginKind {
    pub fn instance(type_name: String, instance: Value, methods: Vec<String>) -> Self {
        let methods = methods
            .into_iter()
            .filter(|method| !method.starts_with('_'))
            .collect();
        PluginKind::Instance {
            type_name,
            instance,
            methods,
        }
    }

    pub fn callables(&self) -> &[String] {
        match self {
            PluginKind::FreeFunctions(functions) => functions,
            PluginKind::Instance { methods, .. } => methods,
        }
    }

    pub fn instance_token(&self) -> Option<&Value> {
        match self {
            PluginKind::FreeFunctions(_) => None,
            PluginKind::Instance { instance, .. } => Some(instance),
        }
    }
}

/// Capabilities the pipeline knows how to drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KnownCapability {
    Initialize,
    CaptureFilter,
    ProcessCapture,
}

impl KnownCapability {
    pub const ALL: [KnownCapability; 3] = [
        KnownCapability::Initialize,
        KnownCapability::CaptureFilter,
        KnownCapability::ProcessCapture,
    ];

    /// JSON-RPC method name, identical to the callable's name in the plugin.
    pub fn method(self) -> &'static str {
        match self {
            KnownCapability::Initialize => "initialize",
            KnownCapability::CaptureFilter => "capture_filter",
            KnownCapability::ProcessCapture => "process_capture",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cap| cap.method() == name)
    }
}

impl fmt::Display for KnownCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

/// What a `capture_filter` result means for the record being filtered.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterOutcome {
    /// Falsy result: the record goes no further.
    Skip,
    /// Truthy non-object result: the current capture stays as is.
    Keep,
    /// Object result: it replaces the current capture.
    Replace(Box<Capture>),
}

impl FilterOutcome {
    /// Interprets a filter's JSON result. `null`, `false`, `0`, `""`, `[]`
    /// and `{}` are falsy; any other object must decode as a [`Capture`].
    pub fn from_result(value: Value) -> Result<Self, serde_json::Error> {
        let outcome = match value {
            Value::Null | Value::Bool(false) => FilterOutcome::Skip,
            Value::Number(number) if number.as_f64() == Some(0.0) => FilterOutcome::Skip,
            Value::String(text) if text.is_empty() => FilterOutcome::Skip,
            Value::Array(items) if items.is_empty() => FilterOutcome::Skip,
            Value::Object(map) if map.is_empty() => FilterOutcome::Skip,
            Value::Object(map) => {
                FilterOutcome::Replace(Box::new(serde_json::from_value(Value::Object(map))?))
            }
            _ => FilterOutcome::Keep,
        };
        Ok(outcome)
    }
}
