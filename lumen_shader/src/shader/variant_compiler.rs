/// Variant compiler
///
/// Assembles the source of one stage for one variant, optionally dumps it for
/// debugging, and compiles it. Must run on the GPU thread: every function
/// here takes the driver directly.

use std::path::{Path, PathBuf};
use crate::config::RenderingConfig;
use crate::error::{Error, Result};
use crate::gpu::{GpuDriver, ShaderStage, StageHandle};
use crate::shader::{FeatureFlags, FeatureHash, ShaderTemplatePair, SourceAssembler};

/// Compile `source` into a new shader object
///
/// A rejected object is deleted after its log has been read; only valid
/// handles ever leave this function.
///
/// # Errors
///
/// `Compilation` with the driver log when the driver rejects the source.
pub fn compile_stage(driver: &mut dyn GpuDriver, stage: ShaderStage, source: &str) -> Result<StageHandle> {
    let shader = driver.create_shader_object(stage)?;
    driver.set_source(shader, source);
    driver.compile(shader);

    if !driver.compile_status(shader) {
        let log = driver.shader_info_log(shader);
        driver.delete_shader(shader);
        return Err(Error::Compilation { stage, log });
    }
    Ok(shader)
}

/// File name of a debug dump: `<stage>_<urn with ':' as '-'>_<hash>.glsl`
pub fn dump_file_name(stage: ShaderStage, urn: &str, hash: FeatureHash) -> String {
    format!("{}_{}_{}.glsl", stage.name(), urn.replace(':', "-"), hash)
}

/// Write an assembled source to `dir`; failures are logged, never returned
pub fn dump_source(dir: &Path, stage: ShaderStage, urn: &str, hash: FeatureHash, source: &str) -> Option<PathBuf> {
    let path = dir.join(dump_file_name(stage, urn, hash));
    let written = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&path, source));
    match written {
        Ok(()) => Some(path),
        Err(e) => {
            crate::engine_error!("lumen::VariantCompiler", "Failed to dump shader source to '{}': {}", path.display(), e);
            None
        }
    }
}

/// Everything needed to compile the stages of one shader
///
/// Owns cheap clones of its inputs so it can be moved onto the GPU thread.
#[derive(Debug, Clone)]
pub struct VariantCompiler {
    urn: String,
    assembler: SourceAssembler,
    templates: ShaderTemplatePair,
    /// Configuration snapshot taken when the compiler was built
    config: Option<RenderingConfig>,
}

impl VariantCompiler {
    pub fn new(
        urn: impl Into<String>,
        assembler: SourceAssembler,
        templates: ShaderTemplatePair,
        config: Option<RenderingConfig>,
    ) -> Self {
        Self {
            urn: urn.into(),
            assembler,
            templates,
            config,
        }
    }

    pub fn urn(&self) -> &str {
        &self.urn
    }

    /// Assembled source of `stage` for `flags`
    pub fn source(&self, stage: ShaderStage, flags: FeatureFlags) -> String {
        self.assembler.assemble(stage, &self.templates, flags, self.config.as_ref())
    }

    /// Assemble, dump if enabled, and compile one stage of the variant `flags`
    pub fn compile(&self, driver: &mut dyn GpuDriver, stage: ShaderStage, flags: FeatureFlags) -> Result<StageHandle> {
        let source = self.source(stage, flags);

        if let Some(config) = self.config.as_ref().filter(|c| c.dump_shaders) {
            dump_source(&config.shader_log_dir, stage, &self.urn, flags.feature_hash(), &source);
        }

        compile_stage(driver, stage, &source)
    }
}

#[cfg(test)]
#[path = "variant_compiler_tests.rs"]
mod tests;
