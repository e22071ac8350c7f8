use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::info;

use crate::{LoadFailure, PluginHandle, PluginHostConfig, PluginLoadError};

/// Loaded plugins, keyed by canonical source path.
///
/// Loading the same path twice hands back the cached handle without starting
/// another process.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    config: PluginHostConfig,
    plugins: HashMap<PathBuf, Arc<PluginHandle>>,
    order: Vec<PathBuf>,
}

impl PluginRegistry {
    pub fn new(config: PluginHostConfig) -> Self {
        Self {
            config,
            plugins: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn config(&self) -> &PluginHostConfig {
        &self.config
    }

    pub async fn load(&mut self, path: &Path) -> Result<Arc<PluginHandle>, PluginLoadError> {
        let key = path.canonicalize().map_err(|err| PluginLoadError {
            path: path.to_path_buf(),
            cause: LoadFailure::Unreadable(err),
        })?;
        if let Some(handle) = self.plugins.get(&key) {
            return Ok(handle.clone());
        }

        let handle = Arc::new(PluginHandle::launch(&key, &self.config).await?);
        info!(
            plugin = %key.display(),
            capabilities = ?handle.capabilities(),
            "loaded plugin"
        );
        self.plugins.insert(key.clone(), handle.clone());
        self.order.push(key);
        Ok(handle)
    }

    pub fn get(&self, path: &Path) -> Option<Arc<PluginHandle>> {
        let key = path.canonicalize().ok()?;
        self.plugins.get(&key).cloned()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Shuts every plugin down in load order and empties the cache.
    pub async fn shutdown_all(&mut self) {
        for key in self.order.drain(..) {
            if let Some(handle) = self.plugins.remove(&key) {
                handle.shutdown().await;
            }
        }
    }
}
