/// Source assembly
///
/// Turns a template body into compilable GLSL for one variant. The output is
/// a pure function of (stage, templates, flags, config, includes): identical
/// inputs give byte-identical text, which the program cache and the debug
/// dumps both rely on.
///
/// Layout of an assembled stage:
///
/// ```text
/// #version <glsl_version>
/// #define TEXTURE_OFFSET ...            engine/config numeric defines
/// #define <FLAG>                        one per enabled feature flag
/// #define BLOCK_HINT_* int(n)           vertex flags, always present
/// <globalDefinesIncl>
/// <globalUniformsIncl>
/// <globalFunctions{Vert,Frag}Incl>
///
/// <template body>
/// ```

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use crate::config::{
    RenderingConfig, DEFAULT_GLSL_VERSION, DEFAULT_TEXTURE_OFFSET, DEFAULT_SHADOW_MAP_RESOLUTION,
    BLOCK_LIGHT_POW, BLOCK_LIGHT_SUN_POW, BLOCK_INTENSITY_FACTOR,
    SSAO_KERNEL_ELEMENTS, SSAO_NOISE_SIZE, TEXTURE_OFFSET_EFFECTS,
};
use crate::error::Result;
use crate::gpu::ShaderStage;
use crate::shader::{FeatureFlags, ShaderTemplatePair, VertexFlag};

pub const DEFINES_INCLUDE: &str = "globalDefinesIncl.glsl";
pub const UNIFORMS_INCLUDE: &str = "globalUniformsIncl.glsl";
pub const VERTEX_FUNCTIONS_INCLUDE: &str = "globalFunctionsVertIncl.glsl";
pub const FRAGMENT_FUNCTIONS_INCLUDE: &str = "globalFunctionsFragIncl.glsl";

// ===== SHADER INCLUDES =====

/// Shared GLSL text prepended to every template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderIncludes {
    pub defines: String,
    pub uniforms: String,
    pub vertex_functions: String,
    pub fragment_functions: String,
}

impl ShaderIncludes {
    /// Load the four include files from `dir`
    ///
    /// A missing include is replaced by empty text and logged; any other read
    /// failure is returned.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        Ok(Self {
            defines: read_include(dir, DEFINES_INCLUDE)?,
            uniforms: read_include(dir, UNIFORMS_INCLUDE)?,
            vertex_functions: read_include(dir, VERTEX_FUNCTIONS_INCLUDE)?,
            fragment_functions: read_include(dir, FRAGMENT_FUNCTIONS_INCLUDE)?,
        })
    }

    /// Helper function library of `stage`
    pub fn functions(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.vertex_functions,
            ShaderStage::Fragment => &self.fragment_functions,
        }
    }
}

fn read_include(dir: &Path, file_name: &str) -> Result<String> {
    let path = dir.join(file_name);
    match std::fs::read_to_string(&path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            crate::engine_warn!("lumen::SourceAssembler", "Shader include '{}' not found, using empty text", path.display());
            Ok(String::new())
        }
        Err(e) => Err(e.into()),
    }
}

// ===== SOURCE ASSEMBLER =====

/// Builds the final source text of a shader stage
#[derive(Debug, Clone, Default)]
pub struct SourceAssembler {
    includes: Arc<ShaderIncludes>,
}

impl SourceAssembler {
    pub fn new(includes: Arc<ShaderIncludes>) -> Self {
        Self { includes }
    }

    pub fn includes(&self) -> &ShaderIncludes {
        &self.includes
    }

    /// Assemble the source of `stage` for the variant `flags`
    ///
    /// Without a configuration the engine defaults are used for every
    /// numeric define.
    pub fn assemble(
        &self,
        stage: ShaderStage,
        templates: &ShaderTemplatePair,
        flags: FeatureFlags,
        config: Option<&RenderingConfig>,
    ) -> String {
        let glsl_version = config.map(|c| c.glsl_version).unwrap_or(DEFAULT_GLSL_VERSION);
        let texture_offset = config
            .and_then(|c| c.texture_atlas_tile_size)
            .unwrap_or(DEFAULT_TEXTURE_OFFSET);
        let shadow_map_resolution = config
            .map(|c| c.shadow_map_resolution)
            .unwrap_or(DEFAULT_SHADOW_MAP_RESOLUTION);

        let mut source = String::new();

        // 1. Preamble
        source.push_str(&format!("#version {}\n", glsl_version));

        // 2. Numeric defines
        source.push_str(&format!("#define TEXTURE_OFFSET {:?}\n", texture_offset));
        source.push_str(&format!("#define BLOCK_LIGHT_POW {:?}\n", BLOCK_LIGHT_POW));
        source.push_str(&format!("#define BLOCK_LIGHT_SUN_POW {:?}\n", BLOCK_LIGHT_SUN_POW));
        source.push_str(&format!("#define BLOCK_INTENSITY_FACTOR {:?}\n", BLOCK_INTENSITY_FACTOR));
        source.push_str(&format!("#define SHADOW_MAP_RESOLUTION {:?}\n", shadow_map_resolution as f32));
        source.push_str(&format!("#define SSAO_KERNEL_ELEMENTS {}\n", SSAO_KERNEL_ELEMENTS));
        source.push_str(&format!("#define SSAO_NOISE_SIZE {}\n", SSAO_NOISE_SIZE));
        source.push_str(&format!("#define TEXTURE_OFFSET_EFFECTS {:?}\n", TEXTURE_OFFSET_EFFECTS));

        // 3. Feature flags, vertex flags, shared defines
        for name in flags.define_names() {
            source.push_str(&format!("#define {}\n", name));
        }
        for vertex_flag in VertexFlag::ALL {
            source.push_str(&format!("#define {} int({})\n", vertex_flag.define_name(), vertex_flag.value()));
        }
        push_block(&mut source, &self.includes.defines);

        // 4. Shared uniforms
        push_block(&mut source, &self.includes.uniforms);

        // 5. Stage helpers
        push_block(&mut source, self.includes.functions(stage));

        // 6. Template body
        source.push('\n');
        source.push_str(templates.stage(stage));

        source
    }
}

/// Append `text`, making sure the next block starts on its own line
fn push_block(source: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    source.push_str(text);
    if !text.ends_with('\n') {
        source.push('\n');
    }
}

#[cfg(test)]
#[path = "source_assembler_tests.rs"]
mod tests;
