/// Shader manager: named table of loaded shader assets
///
/// Loads templates through a `ShaderTemplateStore`, creates the assets on
/// the GPU thread given at construction and is the hot-reload entry point
/// (`reload_shader`).

use std::sync::Arc;
use rustc_hash::FxHashMap;
use crate::config::ConfigProvider;
use crate::error::Result;
use crate::gpu::GpuHandle;
use crate::shader::{AssetRegistry, ShaderAsset, ShaderAssetDesc, ShaderIncludes, ShaderTemplateStore};

/// Everything a shader manager needs besides the GPU thread
#[derive(Clone)]
pub struct ShaderManagerDesc {
    pub registry: Arc<dyn AssetRegistry>,
    pub includes: Arc<ShaderIncludes>,
    pub config: Arc<dyn ConfigProvider>,
}

pub struct ShaderManager {
    store: ShaderTemplateStore,
    includes: Arc<ShaderIncludes>,
    config: Arc<dyn ConfigProvider>,
    gpu: GpuHandle,
    shaders: FxHashMap<String, Arc<ShaderAsset>>,
}

impl ShaderManager {
    pub fn new(desc: ShaderManagerDesc, gpu: GpuHandle) -> Self {
        Self {
            store: ShaderTemplateStore::new(desc.registry),
            includes: desc.includes,
            config: desc.config,
            gpu,
            shaders: FxHashMap::default(),
        }
    }

    pub fn gpu(&self) -> &GpuHandle {
        &self.gpu
    }

    /// Load the shader `name`, or return it if already loaded
    ///
    /// # Errors
    ///
    /// `MissingStage`/`Io` from the template store, `ThreadAffinity` if the
    /// GPU thread cannot be reached. Nothing is registered on failure.
    pub fn load_shader(&mut self, name: &str) -> Result<Arc<ShaderAsset>> {
        if let Some(asset) = self.shaders.get(name) {
            return Ok(Arc::clone(asset));
        }

        let data = self.store.load_data(name)?;
        let asset = Arc::new(ShaderAsset::load(ShaderAssetDesc {
            urn: name.to_string(),
            data,
            config: Arc::clone(&self.config),
            includes: Arc::clone(&self.includes),
        }, self.gpu.clone())?);

        self.shaders.insert(name.to_string(), Arc::clone(&asset));
        crate::engine_debug!("lumen::ShaderManager", "Loaded shader '{}'", name);
        Ok(asset)
    }

    pub fn shader(&self, name: &str) -> Option<Arc<ShaderAsset>> {
        self.shaders.get(name).cloned()
    }

    /// Re-read the templates of `name` and reload the asset
    ///
    /// # Errors
    ///
    /// `BackendError` if the shader is not loaded; template store and
    /// `ShaderAsset::reload` errors otherwise. The asset keeps its previous
    /// data when the templates cannot be read.
    pub fn reload_shader(&self, name: &str) -> Result<()> {
        let Some(asset) = self.shaders.get(name) else {
            crate::engine_bail!("lumen::ShaderManager", "Cannot reload shader '{}': not loaded", name);
        };
        let data = self.store.load_data(name)?;
        asset.reload(data)
    }

    /// Dispose and forget `name`; returns false if it was not loaded
    pub fn unload_shader(&mut self, name: &str) -> Result<bool> {
        match self.shaders.remove(name) {
            Some(asset) => {
                asset.dispose()?;
                crate::engine_debug!("lumen::ShaderManager", "Unloaded shader '{}'", name);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Dispose every shader and clear the table
    ///
    /// Every asset is attempted; the first error is returned.
    pub fn dispose_all(&mut self) -> Result<()> {
        let mut first_error = None;
        for (_, asset) in self.shaders.drain() {
            if let Err(e) = asset.dispose() {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    /// Names of the loaded shaders, sorted
    pub fn shader_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shaders.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
#[path = "shader_manager_tests.rs"]
mod tests;
