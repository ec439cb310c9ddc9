/// GlDriver - OpenGL implementation of the GpuDriver trait

use std::num::NonZeroU32;
use glow::HasContext;
use lumen_shader::lumen::{Error, Result};
use lumen_shader::lumen::gpu::{GpuDriver, ProgramHandle, ShaderStage, StageHandle};

/// OpenGL shader driver
///
/// Every method issues GL calls and must run on the thread where the GL
/// context is current.
pub struct GlDriver {
    gl: glow::Context,
}

impl GlDriver {
    /// Wrap a context that is current on this thread
    pub fn new(gl: glow::Context) -> Self {
        #[cfg(feature = "gl-debug")]
        let gl = crate::gl_debug::install(gl);

        lumen_shader::engine_info!(
            "lumen::GlDriver",
            "OpenGL driver created (GL {:?})", gl.version()
        );
        Self { gl }
    }

    /// Load the GL entry points through `loader` and wrap the result
    ///
    /// # Safety
    ///
    /// A GL context must be current on this thread and `loader` must return
    /// valid entry points for it.
    pub unsafe fn from_loader_function<F>(loader: F) -> Self
    where
        F: FnMut(&str) -> *const std::os::raw::c_void,
    {
        Self::new(glow::Context::from_loader_function(loader))
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }
}

// ===== CONVERSIONS =====

pub(crate) fn gl_stage(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
    }
}

pub(crate) fn native_shader(handle: StageHandle) -> Option<glow::NativeShader> {
    NonZeroU32::new(handle.raw()).map(glow::NativeShader)
}

pub(crate) fn native_program(handle: ProgramHandle) -> Option<glow::NativeProgram> {
    NonZeroU32::new(handle.raw()).map(glow::NativeProgram)
}

fn invalid_handle(call: &str, raw: u32) {
    lumen_shader::engine_warn!("lumen::GlDriver", "{}: invalid GL object name {}", call, raw);
}

// ===== DRIVER =====

impl GpuDriver for GlDriver {
    fn create_shader_object(&mut self, stage: ShaderStage) -> Result<StageHandle> {
        let shader = unsafe { self.gl.create_shader(gl_stage(stage)) }
            .map_err(|e| Error::BackendError(format!("glCreateShader({}) failed: {}", stage.name(), e)))?;
        Ok(StageHandle::from_raw(shader.0.get()))
    }

    fn set_source(&mut self, shader: StageHandle, source: &str) {
        match native_shader(shader) {
            Some(native) => unsafe { self.gl.shader_source(native, source) },
            None => invalid_handle("set_source", shader.raw()),
        }
    }

    fn compile(&mut self, shader: StageHandle) {
        match native_shader(shader) {
            Some(native) => unsafe { self.gl.compile_shader(native) },
            None => invalid_handle("compile", shader.raw()),
        }
    }

    fn compile_status(&mut self, shader: StageHandle) -> bool {
        native_shader(shader)
            .map(|native| unsafe { self.gl.get_shader_compile_status(native) })
            .unwrap_or(false)
    }

    fn shader_info_log(&mut self, shader: StageHandle) -> String {
        native_shader(shader)
            .map(|native| unsafe { self.gl.get_shader_info_log(native) })
            .unwrap_or_default()
    }

    fn create_program(&mut self) -> Result<ProgramHandle> {
        let program = unsafe { self.gl.create_program() }
            .map_err(|e| Error::BackendError(format!("glCreateProgram failed: {}", e)))?;
        Ok(ProgramHandle::from_raw(program.0.get()))
    }

    fn attach(&mut self, program: ProgramHandle, shader: StageHandle) {
        match (native_program(program), native_shader(shader)) {
            (Some(program), Some(shader)) => unsafe { self.gl.attach_shader(program, shader) },
            _ => invalid_handle("attach", program.raw()),
        }
    }

    fn link(&mut self, program: ProgramHandle) {
        match native_program(program) {
            Some(native) => unsafe { self.gl.link_program(native) },
            None => invalid_handle("link", program.raw()),
        }
    }

    /// Reads `GL_LINK_STATUS`; `glValidateProgram` is not issued.
    ///
    /// Validation checks the program against the GL state bound at the time
    /// of the call (samplers, draw buffers). At load time that is not the
    /// state the program will draw with, so it would reject usable programs.
    fn validate(&mut self, program: ProgramHandle) -> bool {
        native_program(program)
            .map(|native| unsafe { self.gl.get_program_link_status(native) })
            .unwrap_or(false)
    }

    fn program_info_log(&mut self, program: ProgramHandle) -> String {
        native_program(program)
            .map(|native| unsafe { self.gl.get_program_info_log(native) })
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: StageHandle) {
        match native_shader(shader) {
            Some(native) => unsafe { self.gl.delete_shader(native) },
            None => invalid_handle("delete_shader", shader.raw()),
        }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        match native_program(program) {
            Some(native) => unsafe { self.gl.delete_program(native) },
            None => invalid_handle("delete_program", program.raw()),
        }
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<i32> {
        let native = native_program(program)?;
        unsafe { self.gl.get_uniform_location(native, name) }
            .map(|location| location.0 as i32)
    }
}

#[cfg(test)]
#[path = "gl_driver_tests.rs"]
mod tests;
