/// KHR_debug message routing to the engine logger

use glow::HasContext;
use lumen_shader::lumen::Engine;
use lumen_shader::lumen::log::LogSeverity;

fn severity(gl_severity: u32) -> LogSeverity {
    match gl_severity {
        glow::DEBUG_SEVERITY_HIGH => LogSeverity::Error,
        glow::DEBUG_SEVERITY_MEDIUM => LogSeverity::Warn,
        glow::DEBUG_SEVERITY_LOW => LogSeverity::Info,
        _ => LogSeverity::Trace,
    }
}

/// Enable synchronous debug output if the context supports it
pub(crate) fn install(mut gl: glow::Context) -> glow::Context {
    if !gl.supports_debug() {
        lumen_shader::engine_warn!("lumen::GlDriver", "KHR_debug not supported, GL debug output disabled");
        return gl;
    }
    unsafe {
        gl.enable(glow::DEBUG_OUTPUT);
        gl.enable(glow::DEBUG_OUTPUT_SYNCHRONOUS);
        gl.debug_message_callback(|_source, _kind, id, gl_severity, message| {
            Engine::log(severity(gl_severity), "lumen::GL", format!("[{}] {}", id, message));
        });
    }
    gl
}
