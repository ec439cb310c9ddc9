/*!
# Lumen Shader

Shader program variant management for the Lumen renderer.

This crate loads paired vertex/fragment GLSL templates, assembles concrete
source text for every requested feature-flag combination, compiles and links
the result through a backend driver, and caches the linked programs keyed by
feature hash. GPU calls are confined to a single designated thread; any other
thread marshals its requests onto it and blocks for the answer.

## Architecture

- **GpuDriver**: Backend trait for the raw driver calls (compile, link, delete)
- **GpuContext / GpuThread**: The one thread on which driver calls are legal
- **ShaderTemplateStore**: Loads a `<name>_vert.glsl` / `<name>_frag.glsl` pair
- **SourceAssembler**: Builds final per-stage source text from a template pair
- **VariantCompiler**: Submits assembled source to the driver
- **ProgramCache**: Feature hash to linked program, owns disposal
- **ShaderAsset**: Lifecycle controller (load, reload, dispose)
- **ShaderManager**: Named table of shader assets

Backend implementations (OpenGL via glow, ...) provide concrete drivers.
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod config;
pub mod gpu;
pub mod shader;

// Main lumen namespace module
pub mod lumen {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton
    pub use crate::engine::Engine;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
    }

    // Configuration sub-module
    pub mod config {
        pub use crate::config::*;
    }

    // GPU driver and thread affinity sub-module
    pub mod gpu {
        pub use crate::gpu::*;
    }

    // Shader asset sub-module
    pub mod shader {
        pub use crate::shader::*;
    }
}

