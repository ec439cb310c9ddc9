/// Shader module - templates, variant compilation and shader lifecycle

pub mod feature_flags;
pub mod shader_data;
pub mod template_store;
pub mod source_assembler;
pub mod variant_compiler;
pub mod program_cache;
pub mod shader_asset;
pub mod shader_manager;

pub use feature_flags::*;
pub use shader_data::*;
pub use template_store::*;
pub use source_assembler::*;
pub use variant_compiler::*;
pub use program_cache::*;
pub use shader_asset::*;
pub use shader_manager::*;
