/// Feature flags selecting shader variants
///
/// Each flag is one bit; the flag name doubles as the GLSL define emitted when
/// the flag is enabled. The bit order is part of the cache key and of the
/// debug dump file names: append new flags at the end and bump
/// `FEATURE_FLAGS_VERSION` when the menu changes.

use std::fmt;
use bitflags::bitflags;
use rustc_hash::FxHashSet;
use crate::config::RenderingConfig;

/// Version of the feature flag menu below
pub const FEATURE_FLAGS_VERSION: u32 = 1;

bitflags! {
    /// Rendering features a shader variant is compiled for
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct FeatureFlags: u32 {
        const VOLUMETRIC_FOG = 1 << 0;
        const ANIMATED_GRASS = 1 << 1;
        const ANIMATED_WATER = 1 << 2;
        const NO_BLUR = 1 << 3;
        const FLICKERING_LIGHT = 1 << 4;
        const VIGNETTE = 1 << 5;
        const BLOOM = 1 << 6;
        const MOTION_BLUR = 1 << 7;
        const SSAO = 1 << 8;
        const FILM_GRAIN = 1 << 9;
        const OUTLINE = 1 << 10;
        const LIGHT_SHAFTS = 1 << 11;
        const DYNAMIC_SHADOWS = 1 << 12;
        const NORMAL_MAPPING = 1 << 13;
        const PARALLAX_MAPPING = 1 << 14;
        const DYNAMIC_SHADOWS_PCF = 1 << 15;
        const CLOUD_SHADOWS = 1 << 16;
        const LOCAL_REFLECTIONS = 1 << 17;
        const INSCATTERING = 1 << 18;
        const CLAMP_LIGHTING = 1 << 19;
    }
}

/// Cache key of a shader variant
///
/// The raw bitmask of the enabled flags, so two different flag sets can never
/// share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FeatureHash(pub u32);

impl fmt::Display for FeatureHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FeatureFlags {
    /// Cache key of this flag set
    pub fn feature_hash(&self) -> FeatureHash {
        FeatureHash(self.bits())
    }

    /// Define names of the enabled flags, in bit order
    pub fn define_names(&self) -> impl Iterator<Item = &'static str> {
        self.iter_names().map(|(name, _)| name)
    }

    /// Flags enabled by the rendering options
    pub fn from_config(config: &RenderingConfig) -> Self {
        let mut flags = FeatureFlags::empty();
        flags.set(FeatureFlags::VOLUMETRIC_FOG, config.volumetric_fog);
        flags.set(FeatureFlags::ANIMATED_GRASS, config.animate_grass);
        flags.set(FeatureFlags::ANIMATED_WATER, config.animate_water);
        flags.set(FeatureFlags::NO_BLUR, config.blur_intensity == 0);
        flags.set(FeatureFlags::FLICKERING_LIGHT, config.flickering_light);
        flags.set(FeatureFlags::VIGNETTE, config.vignette);
        flags.set(FeatureFlags::BLOOM, config.bloom);
        flags.set(FeatureFlags::MOTION_BLUR, config.motion_blur);
        flags.set(FeatureFlags::SSAO, config.ssao);
        flags.set(FeatureFlags::FILM_GRAIN, config.film_grain);
        flags.set(FeatureFlags::OUTLINE, config.outline);
        flags.set(FeatureFlags::LIGHT_SHAFTS, config.light_shafts);
        flags.set(FeatureFlags::DYNAMIC_SHADOWS, config.dynamic_shadows);
        flags.set(FeatureFlags::NORMAL_MAPPING, config.normal_mapping);
        flags.set(FeatureFlags::PARALLAX_MAPPING, config.parallax_mapping);
        flags.set(FeatureFlags::DYNAMIC_SHADOWS_PCF, config.dynamic_shadows_pcf_filtering);
        flags.set(FeatureFlags::CLOUD_SHADOWS, config.cloud_shadows);
        flags.set(FeatureFlags::LOCAL_REFLECTIONS, config.local_reflections);
        flags.set(FeatureFlags::INSCATTERING, config.inscattering);
        flags.set(FeatureFlags::CLAMP_LIGHTING, config.clamp_lighting);
        flags
    }

    /// Flags whose define name appears as an identifier in any of `sources`
    ///
    /// A template that never tests a flag compiles to the same code with or
    /// without it; masking requests with this set avoids duplicate variants.
    pub fn referenced_in(sources: &[&str]) -> Self {
        let identifiers: FxHashSet<&str> = sources.iter()
            .flat_map(|source| source.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_')))
            .filter(|word| !word.is_empty())
            .collect();

        FeatureFlags::all().iter_names()
            .filter(|(name, _)| identifiers.contains(name))
            .fold(FeatureFlags::empty(), |acc, (_, flag)| acc | flag)
    }
}

// ===== VERTEX FLAGS =====

/// Per-vertex block hints, emitted unconditionally as `#define NAME int(value)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFlag {
    BlockHintNormal,
    BlockHintWater,
    BlockHintLava,
    BlockHintGrass,
    BlockHintWaving,
    BlockHintWavingBlock,
}

impl VertexFlag {
    pub const ALL: [VertexFlag; 6] = [
        VertexFlag::BlockHintNormal,
        VertexFlag::BlockHintWater,
        VertexFlag::BlockHintLava,
        VertexFlag::BlockHintGrass,
        VertexFlag::BlockHintWaving,
        VertexFlag::BlockHintWavingBlock,
    ];

    pub fn define_name(&self) -> &'static str {
        match self {
            VertexFlag::BlockHintNormal => "BLOCK_HINT_NORMAL",
            VertexFlag::BlockHintWater => "BLOCK_HINT_WATER",
            VertexFlag::BlockHintLava => "BLOCK_HINT_LAVA",
            VertexFlag::BlockHintGrass => "BLOCK_HINT_GRASS",
            VertexFlag::BlockHintWaving => "BLOCK_HINT_WAVING",
            VertexFlag::BlockHintWavingBlock => "BLOCK_HINT_WAVING_BLOCK",
        }
    }

    /// Value written into the vertex attribute
    pub fn value(&self) -> i32 {
        *self as i32
    }
}

#[cfg(test)]
#[path = "feature_flags_tests.rs"]
mod tests;
