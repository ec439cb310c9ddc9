/// Shader asset: lifecycle of one logical shader
///
/// Owns the template pair, the parameter metadata and every GPU object
/// compiled for the shader. All GPU work (compile, link, uniform queries,
/// disposal) is marshalled onto the GPU thread through the asset's
/// `GpuHandle`; the program cache is only ever locked there.
///
/// Lifecycle:
///
/// ```text
/// Uninitialized -> Loaded -> { Compiling(hash) -> Loaded }* -> Disposed
/// ```
///
/// A variant is selected by the requested flags plus the flags enabled in
/// the current configuration, masked with the flags the templates test.
///
/// `Disposed` is terminal. Any further operation fails with
/// `UseAfterDispose`, except `dispose()` itself which is a no-op.

use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use crate::config::{ConfigProvider, RenderingConfig};
use crate::error::{Error, Result};
use crate::gpu::{GpuDriver, GpuHandle, ProgramHandle, ShaderStage};
use crate::shader::{
    FeatureFlags, FeatureHash, ParameterMetadata, ProgramCache, ShaderData,
    ShaderIncludes, ShaderTemplatePair, SourceAssembler, VariantCompiler,
};

/// Lifecycle phase of a shader asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Created, no data applied yet
    Uninitialized,
    /// Data applied; variants compile on demand
    Loaded,
    /// A variant is being compiled on the GPU thread
    Compiling(FeatureHash),
    /// GPU objects released; terminal
    Disposed,
}

/// Everything needed to create a shader asset
#[derive(Clone)]
pub struct ShaderAssetDesc {
    /// Shader identity, e.g. "engine:chunk"
    pub urn: String,
    pub data: ShaderData,
    /// Polled on every variant request; its enabled toggles join the request
    pub config: Arc<dyn ConfigProvider>,
    pub includes: Arc<ShaderIncludes>,
}

/// Mutable data readable from any thread
struct ShaderMeta {
    data: ShaderData,
    /// Flags referenced by the current templates
    available: FeatureFlags,
    /// Variant recompiled on reload
    active: FeatureFlags,
}

/// State shared with the closures sent to the GPU thread
struct AssetCore {
    urn: String,
    config: Arc<dyn ConfigProvider>,
    assembler: SourceAssembler,
    meta: RwLock<ShaderMeta>,
    /// Only locked on the GPU thread
    cache: Mutex<ProgramCache>,
    phase: Mutex<LifecyclePhase>,
    disposed: AtomicBool,
}

impl AssetCore {
    fn read_meta(&self) -> Result<RwLockReadGuard<'_, ShaderMeta>> {
        self.meta.read()
            .map_err(|_| Error::BackendError(format!("Shader '{}' metadata lock poisoned", self.urn)))
    }

    fn lock_cache(&self) -> Result<MutexGuard<'_, ProgramCache>> {
        self.cache.lock()
            .map_err(|_| Error::BackendError(format!("Shader '{}' program cache lock poisoned", self.urn)))
    }

    fn set_phase(&self, phase: LifecyclePhase) {
        if let Ok(mut current) = self.phase.lock() {
            *current = phase;
        }
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(Error::UseAfterDispose(self.urn.clone()));
        }
        Ok(())
    }

    /// Flags of the variant actually built for a request
    ///
    /// The options enabled in `config` are added to `flags`, then the result
    /// is masked with the flags the templates reference.
    fn variant_flags(flags: FeatureFlags, config: Option<&RenderingConfig>, available: FeatureFlags) -> FeatureFlags {
        let requested = match config {
            Some(config) => flags | FeatureFlags::from_config(config),
            None => flags,
        };
        requested & available
    }

    /// Program of the variant `flags`, compiled on a cache miss (GPU thread)
    fn program(&self, driver: &mut dyn GpuDriver, flags: FeatureFlags) -> Result<ProgramHandle> {
        self.ensure_alive()?;

        let config = self.config.rendering_config();
        let (templates, flags) = {
            let meta = self.read_meta()?;
            (
                meta.data.templates().clone(),
                Self::variant_flags(flags, config.as_ref(), meta.available),
            )
        };
        let hash = flags.feature_hash();

        let mut cache = self.lock_cache()?;
        if let Some(entry) = cache.get(hash) {
            return Ok(entry.program);
        }

        self.set_phase(LifecyclePhase::Compiling(hash));
        let compiler = VariantCompiler::new(
            self.urn.clone(),
            self.assembler.clone(),
            templates,
            config,
        );
        let result = cache.get_or_create(
            driver,
            hash,
            |d| compiler.compile(d, ShaderStage::Vertex, flags),
            |d| compiler.compile(d, ShaderStage::Fragment, flags),
        );
        self.set_phase(LifecyclePhase::Loaded);
        result
    }

    /// Replace the data, drop every variant and recompile the active one (GPU thread)
    fn reload(&self, driver: &mut dyn GpuDriver, data: ShaderData) -> Result<()> {
        self.ensure_alive()?;

        let released = self.lock_cache()?.dispose(driver);

        let active = {
            let mut meta = self.meta.write()
                .map_err(|_| Error::BackendError(format!("Shader '{}' metadata lock poisoned", self.urn)))?;
            let templates = data.templates();
            meta.available = FeatureFlags::referenced_in(&[templates.vertex(), templates.fragment()]);
            meta.data = data;
            meta.active
        };
        self.set_phase(LifecyclePhase::Loaded);

        crate::engine_debug!(
            "lumen::ShaderAsset",
            "Reloaded shader '{}' ({} GPU objects released)", self.urn, released
        );

        // A broken template leaves the asset without this variant until the next reload
        if let Err(e) = self.program(driver, active) {
            crate::engine_warn!("lumen::ShaderAsset", "Recompiling shader '{}' failed: {}", self.urn, e);
        }
        Ok(())
    }
}

// ===== SHADER ASSET =====

/// One logical shader and all of its compiled variants
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use lumen_shader::lumen::config::NoConfig;
/// use lumen_shader::lumen::gpu::GpuHandle;
/// use lumen_shader::lumen::shader::{
///     FeatureFlags, ShaderAsset, ShaderAssetDesc, ShaderData, ShaderIncludes, ShaderTemplatePair,
/// };
/// # fn gpu() -> GpuHandle { unimplemented!() }
///
/// let asset = ShaderAsset::load(ShaderAssetDesc {
///     urn: "engine:default".to_string(),
///     data: ShaderData::new(ShaderTemplatePair::new(
///         "void main(){gl_Position=vec4(0);}",
///         "void main(){gl_FragColor=vec4(1);}",
///     )),
///     config: Arc::new(NoConfig),
///     includes: Arc::new(ShaderIncludes::default()),
/// }, gpu())?;
///
/// let program = asset.program(FeatureFlags::empty())?;
/// asset.dispose()?;
/// # Ok::<(), lumen_shader::lumen::Error>(())
/// ```
pub struct ShaderAsset {
    core: Arc<AssetCore>,
    gpu: GpuHandle,
}

impl ShaderAsset {
    /// Create the asset and apply `desc.data` as its first reload
    ///
    /// A variant that fails to compile is logged, not returned: the asset
    /// loads and the error shows up again when the variant is requested.
    ///
    /// # Errors
    ///
    /// `ThreadAffinity` if the GPU thread cannot be reached.
    pub fn load(desc: ShaderAssetDesc, gpu: GpuHandle) -> Result<Self> {
        let ShaderAssetDesc { urn, data, config, includes } = desc;
        let asset = Self {
            core: Arc::new(AssetCore {
                urn,
                config,
                assembler: SourceAssembler::new(includes),
                meta: RwLock::new(ShaderMeta {
                    data: data.clone(),
                    available: FeatureFlags::empty(),
                    active: FeatureFlags::empty(),
                }),
                cache: Mutex::new(ProgramCache::new()),
                phase: Mutex::new(LifecyclePhase::Uninitialized),
                disposed: AtomicBool::new(false),
            }),
            gpu,
        };
        if let Err(e) = asset.reload(data) {
            // Nothing reached the GPU; skip the dispose on drop
            asset.core.disposed.store(true, Ordering::SeqCst);
            return Err(e);
        }
        Ok(asset)
    }

    pub fn urn(&self) -> &str {
        &self.core.urn
    }

    pub fn gpu(&self) -> &GpuHandle {
        &self.gpu
    }

    pub fn phase(&self) -> LifecyclePhase {
        if self.is_disposed() {
            return LifecyclePhase::Disposed;
        }
        self.core.phase.lock()
            .map(|phase| *phase)
            .unwrap_or(LifecyclePhase::Disposed)
    }

    pub fn is_disposed(&self) -> bool {
        self.core.disposed.load(Ordering::SeqCst)
    }

    /// Replace templates and parameters, dispose every variant and recompile
    /// the active one
    ///
    /// Runs as a single GPU-thread operation. A recompile failure is logged
    /// and leaves the asset without that variant; it is not returned.
    ///
    /// # Errors
    ///
    /// - `UseAfterDispose` on a disposed asset
    /// - `ThreadAffinity` if the GPU thread cannot be reached
    pub fn reload(&self, data: ShaderData) -> Result<()> {
        self.core.ensure_alive()?;
        crate::engine_debug!("lumen::ShaderAsset", "Reloading shader '{}'", self.core.urn);

        let core = Arc::clone(&self.core);
        self.gpu.synch(move |driver| core.reload(driver, data))
    }

    /// Program of the variant `flags`, compiled on first request
    ///
    /// Flags the templates never reference are ignored, so requests that
    /// differ only in such flags share one program.
    ///
    /// # Errors
    ///
    /// `UseAfterDispose`, `ThreadAffinity`, `Compilation` or `Link`.
    pub fn program(&self, flags: FeatureFlags) -> Result<ProgramHandle> {
        self.core.ensure_alive()?;
        let core = Arc::clone(&self.core);
        self.gpu.synch(move |driver| core.program(driver, flags))
    }

    /// Make `flags` the variant recompiled by `reload`, and return its program
    pub fn activate(&self, flags: FeatureFlags) -> Result<ProgramHandle> {
        self.core.ensure_alive()?;
        {
            let mut meta = self.core.meta.write()
                .map_err(|_| Error::BackendError(format!("Shader '{}' metadata lock poisoned", self.core.urn)))?;
            meta.active = flags;
        }
        self.program(flags)
    }

    /// Location of uniform `name` in the variant `flags` (GPU query)
    pub fn uniform_location(&self, flags: FeatureFlags, name: &str) -> Result<Option<i32>> {
        self.core.ensure_alive()?;
        let core = Arc::clone(&self.core);
        let name = name.to_string();
        self.gpu.synch(move |driver| {
            let program = core.program(driver, flags)?;
            Ok(driver.uniform_location(program, &name))
        })
    }

    /// Whether the variant built for `flags` under the current configuration
    /// is linked and cached (GPU query)
    pub fn is_cached(&self, flags: FeatureFlags) -> Result<bool> {
        self.core.ensure_alive()?;
        let config = self.core.config.rendering_config();
        let hash = AssetCore::variant_flags(flags, config.as_ref(), self.available_features()).feature_hash();
        let core = Arc::clone(&self.core);
        self.gpu.synch(move |_| Ok(core.lock_cache()?.contains(hash)))
    }

    /// Number of linked variants (GPU query)
    pub fn cached_variant_count(&self) -> Result<usize> {
        self.core.ensure_alive()?;
        let core = Arc::clone(&self.core);
        self.gpu.synch(move |_| Ok(core.lock_cache()?.len()))
    }

    /// Flags referenced by the current templates
    ///
    /// Requests and config-enabled flags outside this set are ignored.
    pub fn available_features(&self) -> FeatureFlags {
        self.core.read_meta()
            .map(|meta| meta.available)
            .unwrap_or_else(|_| FeatureFlags::empty())
    }

    pub fn active_features(&self) -> FeatureFlags {
        self.core.read_meta()
            .map(|meta| meta.active)
            .unwrap_or_else(|_| FeatureFlags::empty())
    }

    pub fn templates(&self) -> Option<ShaderTemplatePair> {
        self.core.read_meta().ok().map(|meta| meta.data.templates().clone())
    }

    pub fn parameter(&self, name: &str) -> Option<ParameterMetadata> {
        self.core.read_meta().ok()?.data.parameter(name).cloned()
    }

    pub fn parameters(&self) -> Vec<ParameterMetadata> {
        self.core.read_meta()
            .map(|meta| meta.data.parameters().to_vec())
            .unwrap_or_default()
    }

    /// Release every GPU object of this asset
    ///
    /// Idempotent: only the first call reaches the GPU thread.
    ///
    /// # Errors
    ///
    /// `ThreadAffinity` if the GPU thread cannot be reached; the asset is
    /// still considered disposed and its GPU objects leak.
    pub fn dispose(&self) -> Result<()> {
        if self.core.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.core.set_phase(LifecyclePhase::Disposed);

        let core = Arc::clone(&self.core);
        let released = self.gpu.synch(move |driver| Ok(core.lock_cache()?.dispose(driver)));

        match released {
            Ok(count) => {
                crate::engine_debug!(
                    "lumen::ShaderAsset",
                    "Disposed shader '{}' ({} GPU objects released)", self.core.urn, count
                );
                Ok(())
            }
            Err(e) => {
                crate::engine_error!(
                    "lumen::ShaderAsset",
                    "Failed to dispose shader '{}', GPU objects leaked: {}", self.core.urn, e
                );
                Err(e)
            }
        }
    }
}

impl Drop for ShaderAsset {
    fn drop(&mut self) {
        // Errors are already logged by dispose()
        let _ = self.dispose();
    }
}

#[cfg(test)]
#[path = "shader_asset_tests.rs"]
mod tests;
