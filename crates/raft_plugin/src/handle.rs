use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    time::Duration,
};

use serde_json::{Map, Value};
use tracing::debug;

use raft_capture::Capture;

use crate::{
    transport::PluginTransport, CallFailure, FilterOutcome, InstantiateParams, KnownCapability,
    LoadFailure, PluginCallError, PluginHostConfig, PluginKind, PluginLoadError, RegisterParams,
    Registration, METHOD_INSTANTIATE, METHOD_REGISTER, PROTOCOL_VERSION,
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// A running plugin and the capabilities it offers.
pub struct PluginHandle {
    path: PathBuf,
    kind: PluginKind,
    capabilities: BTreeSet<KnownCapability>,
    unrecognized: Vec<String>,
    transport: PluginTransport,
    call_timeout: Duration,
}

impl PluginHandle {
    /// Starts the plugin at `path`, registers it and, for single-type
    /// plugins, creates the instance.
    pub async fn launch(path: &Path, config: &PluginHostConfig) -> Result<Self, PluginLoadError> {
        let fail = |cause| PluginLoadError {
            path: path.to_path_buf(),
            cause,
        };

        let spec = config.launch_spec(path);
        let label = path.display().to_string();
        let transport = PluginTransport::spawn(&spec, label)
            .await
            .map_err(|err| fail(LoadFailure::Spawn(err)))?;

        let params = RegisterParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            path: path.display().to_string(),
        };
        let params = serde_json::to_value(params)
            .map_err(|err| fail(LoadFailure::InvalidRegistration(err)))?;
        let answer = transport
            .request(METHOD_REGISTER, params, config.startup_timeout())
            .await
            .map_err(|err| fail(LoadFailure::Register(err)))?;
        let registration: Registration = serde_json::from_value(answer)
            .map_err(|err| fail(LoadFailure::InvalidRegistration(err)))?;

        let kind = match registration.types.as_slice() {
            [only] => {
                let params = serde_json::to_value(InstantiateParams {
                    type_name: only.name.clone(),
                })
                .map_err(|err| fail(LoadFailure::InvalidRegistration(err)))?;
                let instance = transport
                    .request(METHOD_INSTANTIATE, params, config.startup_timeout())
                    .await
                    .map_err(|source| {
                        fail(LoadFailure::Instantiate {
                            type_name: only.name.clone(),
                            source,
                        })
                    })?;
                PluginKind::instance(only.name.clone(), instance, only.methods.clone())
            }
            _ => PluginKind::FreeFunctions(registration.functions),
        };

        let mut capabilities = BTreeSet::new();
        let mut unrecognized = Vec::new();
        for name in kind.callables() {
            match KnownCapability::from_name(name) {
                Some(capability) => {
                    capabilities.insert(capability);
                }
                None => unrecognized.push(name.clone()),
            }
        }
        if !unrecognized.is_empty() {
            debug!(plugin = %path.display(), ?unrecognized, "ignoring unrecognized callables");
        }
        debug!(plugin = %path.display(), ?capabilities, "plugin registered");

        Ok(Self {
            path: path.to_path_buf(),
            kind,
            capabilities,
            unrecognized,
            transport,
            call_timeout: config.call_timeout(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> &PluginKind {
        &self.kind
    }

    pub fn capabilities(&self) -> &BTreeSet<KnownCapability> {
        &self.capabilities
    }

    pub fn supports(&self, capability: KnownCapability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Callables the plugin declared that the pipeline never invokes.
    pub fn unrecognized(&self) -> &[String] {
        &self.unrecognized
    }

    /// A handle stays valid while the plugin process keeps its stdout open.
    pub fn is_valid(&self) -> bool {
        self.transport.is_open()
    }

    /// Runs `initialize(file_path)`. Returns `false` when the plugin has no
    /// such capability.
    pub async fn initialize(&self, file_path: &Path) -> Result<bool, PluginCallError> {
        let argument = Value::String(file_path.display().to_string());
        Ok(self
            .invoke(KnownCapability::Initialize, "file_path", argument)
            .await?
            .is_some())
    }

    /// Runs `capture_filter(capture)`. `None` when the plugin has no filter.
    pub async fn capture_filter(
        &self,
        capture: &Capture,
    ) -> Result<Option<FilterOutcome>, PluginCallError> {
        let capability = KnownCapability::CaptureFilter;
        if !self.supports(capability) {
            return Ok(None);
        }
        let argument = self.encode(capability, capture)?;
        let Some(result) = self.invoke(capability, "capture", argument).await? else {
            return Ok(None);
        };
        FilterOutcome::from_result(result)
            .map(Some)
            .map_err(|err| self.call_error(capability, CallFailure::InvalidResult(err)))
    }

    /// Runs `process_capture(capture)`, discarding its result. Returns
    /// `false` when the plugin has no processor.
    pub async fn process_capture(&self, capture: &Capture) -> Result<bool, PluginCallError> {
        let capability = KnownCapability::ProcessCapture;
        if !self.supports(capability) {
            return Ok(false);
        }
        let argument = self.encode(capability, capture)?;
        Ok(self.invoke(capability, "capture", argument).await?.is_some())
    }

    /// Asks the plugin process to exit.
    pub async fn shutdown(&self) {
        self.transport.shutdown(SHUTDOWN_GRACE).await;
    }

    fn encode(
        &self,
        capability: KnownCapability,
        capture: &Capture,
    ) -> Result<Value, PluginCallError> {
        serde_json::to_value(capture)
            .map_err(|err| self.call_error(capability, CallFailure::Encode(err)))
    }

    async fn invoke(
        &self,
        capability: KnownCapability,
        key: &str,
        argument: Value,
    ) -> Result<Option<Value>, PluginCallError> {
        if !self.supports(capability) {
            return Ok(None);
        }
        let mut params = Map::new();
        if let Some(instance) = self.kind.instance_token() {
            params.insert("instance".to_string(), instance.clone());
        }
        params.insert(key.to_string(), argument);

        self.transport
            .request(capability.method(), Value::Object(params), self.call_timeout)
            .await
            .map(Some)
            .map_err(|err| self.call_error(capability, CallFailure::Transport(err)))
    }

    fn call_error(&self, capability: KnownCapability, source: CallFailure) -> PluginCallError {
        PluginCallError {
            path: self.path.clone(),
            capability: capability.to_string(),
            source,
        }
    }
}

impl std::fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle")
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .field("valid", &self.is_valid())
            .finish()
    }
}

