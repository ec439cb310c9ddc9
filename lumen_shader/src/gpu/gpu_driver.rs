/// GPU driver abstraction
///
/// The driver is the only component allowed to talk to the graphics API.
/// Implementations wrap a live context and are therefore NOT `Send`: a driver
/// is created on the GPU thread and never leaves it. Everything else reaches
/// it through `GpuHandle::synch`.

use crate::error::Result;

// ===== SHADER STAGE =====

/// Pipeline stage of a shader object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// Both stages, vertex first
    pub const ALL: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Fragment];

    /// Lowercase stage name ("vertex", "fragment")
    pub fn name(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

// ===== HANDLES =====

/// Opaque handle of a compiled (or compiling) stage object
///
/// Only meaningful on the GPU thread that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageHandle(u32);

impl StageHandle {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Opaque handle of a linked (or linking) program object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(u32);

impl ProgramHandle {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

// ===== DRIVER TRAIT =====

/// Shader-related subset of a graphics driver
///
/// Status queries return plain values: a failed compile or link is a normal
/// outcome read back through `compile_status`/`validate` plus the info log,
/// not an `Err`. `Err` is reserved for the driver being unable to create an
/// object at all.
pub trait GpuDriver {
    /// Create an empty shader object for `stage`
    fn create_shader_object(&mut self, stage: ShaderStage) -> Result<StageHandle>;

    /// Replace the source text of a shader object
    fn set_source(&mut self, shader: StageHandle, source: &str);

    /// Compile the current source of a shader object
    fn compile(&mut self, shader: StageHandle);

    /// Whether the last compile succeeded
    fn compile_status(&mut self, shader: StageHandle) -> bool;

    /// Diagnostic log of the last compile
    fn shader_info_log(&mut self, shader: StageHandle) -> String;

    /// Create an empty program object
    fn create_program(&mut self) -> Result<ProgramHandle>;

    /// Attach a compiled shader object to a program
    fn attach(&mut self, program: ProgramHandle, shader: StageHandle);

    /// Link the attached stages
    fn link(&mut self, program: ProgramHandle);

    /// Whether the program linked and is usable for rendering
    ///
    /// Backends decide how strict this is; a failed check must mean the
    /// program can never be drawn with.
    fn validate(&mut self, program: ProgramHandle) -> bool;

    /// Diagnostic log of the last link
    fn program_info_log(&mut self, program: ProgramHandle) -> String;

    fn delete_shader(&mut self, shader: StageHandle);

    fn delete_program(&mut self, program: ProgramHandle);

    /// Location of a uniform in a linked program (None if inactive or unknown)
    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<i32>;
}

#[cfg(test)]
#[path = "gpu_driver_tests.rs"]
mod tests;
