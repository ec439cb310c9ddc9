/*!
# Lumen Shader - OpenGL Backend

OpenGL implementation of the `GpuDriver` trait from `lumen_shader`, using the
glow bindings.

A `GlDriver` wraps a `glow::Context` whose GL context is current on the
calling thread. Create it inside the factory given to `GpuThread::spawn` (or
on the thread that owns a `GpuContext`), never on another thread.

## Example

```no_run
use lumen_shader::lumen::gpu::{GpuDriver, GpuThread};
use lumen_shader_gl::GlDriver;
# fn make_current_context() -> glow::Context { unimplemented!() }

let gpu = GpuThread::spawn("lumen-gl", || {
    let gl = make_current_context();
    Ok(Box::new(GlDriver::new(gl)) as Box<dyn GpuDriver>)
})?;
# Ok::<(), lumen_shader::lumen::Error>(())
```
*/

mod gl_driver;
#[cfg(feature = "gl-debug")]
mod gl_debug;

pub use gl_driver::GlDriver;
