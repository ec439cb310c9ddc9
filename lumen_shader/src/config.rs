//! Rendering configuration consumed by shader source assembly.
//!
//! The configuration is owned by the application and exposed through the
//! `ConfigProvider` trait. Providers are polled on every variant request:
//! enabled toggles are added to the requested feature flags
//! (`FeatureFlags::from_config`) and numeric options become defines. Turning
//! bloom on in an options menu therefore selects the bloom variant on the
//! next request, compiling it if needed.

use std::path::PathBuf;
use std::sync::RwLock;

// ===== ENGINE-FIXED CONSTANTS =====

/// GLSL version emitted in the preamble when no configuration is available
pub const DEFAULT_GLSL_VERSION: u32 = 120;

/// Relative atlas tile size used when no world atlas reports one
pub const DEFAULT_TEXTURE_OFFSET: f32 = 0.06125;

/// Relative tile size of the effects texture atlas
pub const TEXTURE_OFFSET_EFFECTS: f32 = 0.0625;

/// Exponent of the block light falloff curve
pub const BLOCK_LIGHT_POW: f32 = 0.96;

/// Exponent of the sunlight falloff curve
pub const BLOCK_LIGHT_SUN_POW: f32 = 0.96;

/// Intensity multiplier applied to block light
pub const BLOCK_INTENSITY_FACTOR: f32 = 1.25;

/// Number of SSAO kernel samples
pub const SSAO_KERNEL_ELEMENTS: u32 = 32;

/// Edge length of the SSAO noise texture
pub const SSAO_NOISE_SIZE: u32 = 4;

/// Shadow map resolution when no configuration is available
pub const DEFAULT_SHADOW_MAP_RESOLUTION: u32 = 1024;

// ===== RENDERING CONFIG =====

/// Rendering options that influence generated shader source
#[derive(Debug, Clone, PartialEq)]
pub struct RenderingConfig {
    /// GLSL version of the `#version` directive
    pub glsl_version: u32,
    /// Relative tile size of the block texture atlas (None = engine default)
    pub texture_atlas_tile_size: Option<f32>,
    /// Shadow map resolution in texels
    pub shadow_map_resolution: u32,

    // Feature toggles (see FeatureFlags::from_config)
    pub volumetric_fog: bool,
    pub animate_grass: bool,
    pub animate_water: bool,
    /// Blur intensity; 0 disables blurring entirely
    pub blur_intensity: u32,
    pub flickering_light: bool,
    pub vignette: bool,
    pub bloom: bool,
    pub motion_blur: bool,
    pub ssao: bool,
    pub film_grain: bool,
    pub outline: bool,
    pub light_shafts: bool,
    pub dynamic_shadows: bool,
    pub normal_mapping: bool,
    pub parallax_mapping: bool,
    pub dynamic_shadows_pcf_filtering: bool,
    pub cloud_shadows: bool,
    pub local_reflections: bool,
    pub inscattering: bool,
    pub clamp_lighting: bool,

    /// Write every assembled stage source to `shader_log_dir`
    pub dump_shaders: bool,
    /// Directory receiving shader dumps
    pub shader_log_dir: PathBuf,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            glsl_version: DEFAULT_GLSL_VERSION,
            texture_atlas_tile_size: None,
            shadow_map_resolution: DEFAULT_SHADOW_MAP_RESOLUTION,
            volumetric_fog: false,
            animate_grass: false,
            animate_water: false,
            blur_intensity: 2,
            flickering_light: false,
            vignette: true,
            bloom: false,
            motion_blur: false,
            ssao: false,
            film_grain: false,
            outline: true,
            light_shafts: false,
            dynamic_shadows: false,
            normal_mapping: false,
            parallax_mapping: false,
            dynamic_shadows_pcf_filtering: false,
            cloud_shadows: true,
            local_reflections: false,
            inscattering: true,
            clamp_lighting: false,
            dump_shaders: false,
            shader_log_dir: PathBuf::from("logs/shaders"),
        }
    }
}

// ===== CONFIG PROVIDER =====

/// Read-only access to the current rendering configuration
///
/// Returning `None` means no configuration is available; assembly then falls
/// back to the engine-fixed defaults instead of failing.
pub trait ConfigProvider: Send + Sync {
    /// Snapshot of the configuration, taken at call time
    fn rendering_config(&self) -> Option<RenderingConfig>;
}

/// Provider with no configuration at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConfig;

impl ConfigProvider for NoConfig {
    fn rendering_config(&self) -> Option<RenderingConfig> {
        None
    }
}

impl ConfigProvider for RenderingConfig {
    fn rendering_config(&self) -> Option<RenderingConfig> {
        Some(self.clone())
    }
}

impl ConfigProvider for RwLock<RenderingConfig> {
    fn rendering_config(&self) -> Option<RenderingConfig> {
        // A poisoned lock still holds the last written config
        match self.read() {
            Ok(config) => Some(config.clone()),
            Err(poisoned) => Some(poisoned.into_inner().clone()),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
