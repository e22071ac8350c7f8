use std::{
    collections::BTreeMap,
    ffi::OsString,
    path::Path,
    time::Duration,
};

use serde::{Deserialize, Serialize};

const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;

/// How plugin processes are launched and how long the host waits on them.
///
/// Deserializes from the `[plugins]` table of the command-line config file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginHostConfig {
    /// Budget for `register` and `instantiate`.
    pub startup_timeout_ms: u64,
    /// Budget for each capability call.
    pub call_timeout_ms: u64,
    /// Copy plugin stderr to the host's stderr instead of the debug log.
    pub mirror_stderr: bool,
    /// Extension (without the dot) → interpreter command line.
    pub interpreters: BTreeMap<String, Vec<String>>,
    /// Extra environment for plugin processes.
    pub env: BTreeMap<String, String>,
}

impl Default for PluginHostConfig {
    fn default() -> Self {
        let interpreters = [("py", "python3"), ("sh", "sh")]
            .into_iter()
            .map(|(ext, program)| (ext.to_string(), vec![program.to_string()]))
            .collect();
        Self {
            startup_timeout_ms: DEFAULT_STARTUP_TIMEOUT_MS,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            mirror_stderr: false,
            interpreters,
            env: BTreeMap::new(),
        }
    }
}

impl PluginHostConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Program and arguments that run the plugin at `path`.
    pub fn launch_spec(&self, path: &Path) -> LaunchSpec {
        let interpreter = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.interpreters.get(ext))
            .and_then(|argv| argv.split_first());

        let (program, mut args) = match interpreter {
            Some((program, rest)) => (
                OsString::from(program),
                rest.iter().map(OsString::from).collect::<Vec<_>>(),
            ),
            None => (path.as_os_str().to_os_string(), Vec::new()),
        };
        if interpreter.is_some() {
            args.push(path.as_os_str().to_os_string());
        }

        LaunchSpec {
            program,
            args,
            env: self
                .env
                .iter()
                .map(|(key, value)| (OsString::from(key), OsString::from(value)))
                .collect(),
            mirror_stderr: self.mirror_stderr,
        }
    }
}

/// Fully resolved command line for one plugin process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub env: Vec<(OsString, OsString)>,
    pub mirror_stderr: bool,
}
