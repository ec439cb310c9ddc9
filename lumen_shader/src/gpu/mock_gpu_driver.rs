/// Mock GPU driver for unit tests (no graphics context required)
///
/// Simulates just enough of a GLSL driver:
/// - compile succeeds iff the source contains `void main` and its braces balance
/// - link succeeds iff exactly one compiled vertex and one compiled fragment
///   object are attached
///
/// Clones share state, so a test keeps one clone as a spy while the other is
/// moved onto the GPU thread. Every call is recorded with the calling thread.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use rustc_hash::FxHashMap;
use crate::error::{Error, Result};
use crate::gpu::{GpuDriver, ShaderStage, StageHandle, ProgramHandle};

// ============================================================================
// Mock objects
// ============================================================================

#[derive(Debug, Clone)]
pub struct MockShaderObject {
    pub stage: ShaderStage,
    pub source: String,
    pub compiled: bool,
    pub log: String,
}

#[derive(Debug, Clone, Default)]
pub struct MockProgramObject {
    pub attached: Vec<StageHandle>,
    pub linked: bool,
    pub log: String,
    uniforms: FxHashMap<String, i32>,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u32,
    shaders: FxHashMap<u32, MockShaderObject>,
    programs: FxHashMap<u32, MockProgramObject>,
    calls: Vec<(&'static str, ThreadId)>,
    /// Calls that referenced an object that does not exist (double delete, ...)
    invalid_calls: Vec<&'static str>,
    /// Sources passed to `compile`, in call order
    compiled_sources: Vec<String>,
    fail_object_creation: bool,
    /// Linked programs still fail `validate` (link log untouched)
    reject_validation: bool,
}

impl MockState {
    fn record(&mut self, call: &'static str) {
        self.calls.push((call, thread::current().id()));
    }

    fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

// ============================================================================
// Mock driver
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MockGpuDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockGpuDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Boxed clone, ready to hand to `GpuContext::new`
    pub fn boxed(&self) -> Box<dyn GpuDriver> {
        Box::new(self.clone())
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Make every subsequent create_* call fail
    pub fn set_fail_object_creation(&self, fail: bool) {
        self.state().fail_object_creation = fail;
    }

    /// Make `validate` reject programs that linked
    pub fn set_reject_validation(&self, reject: bool) {
        self.state().reject_validation = reject;
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.state().calls.iter().filter(|(name, _)| *name == call).count()
    }

    pub fn total_calls(&self) -> usize {
        self.state().calls.len()
    }

    /// Whether every recorded call was made from `thread`
    pub fn all_calls_from(&self, thread: ThreadId) -> bool {
        self.state().calls.iter().all(|(_, id)| *id == thread)
    }

    pub fn invalid_calls(&self) -> Vec<&'static str> {
        self.state().invalid_calls.clone()
    }

    pub fn live_shader_count(&self) -> usize {
        self.state().shaders.len()
    }

    pub fn live_program_count(&self) -> usize {
        self.state().programs.len()
    }

    pub fn compiled_sources(&self) -> Vec<String> {
        self.state().compiled_sources.clone()
    }

    pub fn shader(&self, handle: StageHandle) -> Option<MockShaderObject> {
        self.state().shaders.get(&handle.raw()).cloned()
    }

    pub fn program(&self, handle: ProgramHandle) -> Option<MockProgramObject> {
        self.state().programs.get(&handle.raw()).cloned()
    }
}

fn braces_balance(source: &str) -> bool {
    let mut depth: i32 = 0;
    for c in source.chars() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

impl GpuDriver for MockGpuDriver {
    fn create_shader_object(&mut self, stage: ShaderStage) -> Result<StageHandle> {
        let mut guard = self.state();
        let state = &mut *guard;
        state.record("create_shader_object");
        if state.fail_object_creation {
            return Err(Error::BackendError("Mock: shader object creation failed".to_string()));
        }
        let id = state.allocate_id();
        state.shaders.insert(id, MockShaderObject {
            stage,
            source: String::new(),
            compiled: false,
            log: String::new(),
        });
        Ok(StageHandle::from_raw(id))
    }

    fn set_source(&mut self, shader: StageHandle, source: &str) {
        let mut guard = self.state();
        let state = &mut *guard;
        state.record("set_source");
        match state.shaders.get_mut(&shader.raw()) {
            Some(object) => object.source = source.to_string(),
            None => state.invalid_calls.push("set_source"),
        }
    }

    fn compile(&mut self, shader: StageHandle) {
        let mut guard = self.state();
        let state = &mut *guard;
        state.record("compile");
        let Some(object) = state.shaders.get_mut(&shader.raw()) else {
            state.invalid_calls.push("compile");
            return;
        };
        let source = object.source.clone();
        if !source.contains("void main") {
            object.compiled = false;
            object.log = "0:1(1): error: no function 'main' defined".to_string();
        } else if !braces_balance(&source) {
            object.compiled = false;
            object.log = "0:1(1): error: syntax error, unbalanced braces".to_string();
        } else {
            object.compiled = true;
            object.log.clear();
        }
        state.compiled_sources.push(source);
    }

    fn compile_status(&mut self, shader: StageHandle) -> bool {
        let mut guard = self.state();
        let state = &mut *guard;
        state.record("compile_status");
        state.shaders.get(&shader.raw()).map(|s| s.compiled).unwrap_or(false)
    }

    fn shader_info_log(&mut self, shader: StageHandle) -> String {
        let mut guard = self.state();
        let state = &mut *guard;
        state.record("shader_info_log");
        state.shaders.get(&shader.raw()).map(|s| s.log.clone()).unwrap_or_default()
    }

    fn create_program(&mut self) -> Result<ProgramHandle> {
        let mut guard = self.state();
        let state = &mut *guard;
        state.record("create_program");
        if state.fail_object_creation {
            return Err(Error::BackendError("Mock: program creation failed".to_string()));
        }
        let id = state.allocate_id();
        state.programs.insert(id, MockProgramObject::default());
        Ok(ProgramHandle::from_raw(id))
    }

    fn attach(&mut self, program: ProgramHandle, shader: StageHandle) {
        let mut guard = self.state();
        let state = &mut *guard;
        state.record("attach");
        if !state.shaders.contains_key(&shader.raw()) {
            state.invalid_calls.push("attach");
            return;
        }
        match state.programs.get_mut(&program.raw()) {
            Some(object) => object.attached.push(shader),
            None => state.invalid_calls.push("attach"),
        }
    }

    fn link(&mut self, program: ProgramHandle) {
        let mut guard = self.state();
        let state = &mut *guard;
        state.record("link");
        let Some(attached) = state.programs.get(&program.raw()).map(|p| p.attached.clone()) else {
            state.invalid_calls.push("link");
            return;
        };

        let count = |stage: ShaderStage| attached.iter()
            .filter_map(|handle| state.shaders.get(&handle.raw()))
            .filter(|object| object.stage == stage && object.compiled)
            .count();
        let vertex = count(ShaderStage::Vertex);
        let fragment = count(ShaderStage::Fragment);

        // Uniform locations in declaration order across the attached stages
        let mut uniforms = FxHashMap::default();
        for handle in &attached {
            if let Some(object) = state.shaders.get(&handle.raw()) {
                for line in object.source.lines() {
                    let mut words = line.trim().trim_end_matches(';').split_whitespace();
                    if words.next() == Some("uniform") {
                        if let Some(name) = words.nth(1) {
                            let next = uniforms.len() as i32;
                            uniforms.entry(name.to_string()).or_insert(next);
                        }
                    }
                }
            }
        }

        if let Some(object) = state.programs.get_mut(&program.raw()) {
            if vertex == 1 && fragment == 1 && attached.len() == 2 {
                object.linked = true;
                object.log.clear();
                object.uniforms = uniforms;
            } else {
                object.linked = false;
                object.log = format!(
                    "error: expected one compiled vertex and one compiled fragment stage, got {} and {}",
                    vertex, fragment
                );
            }
        }
    }

    fn validate(&mut self, program: ProgramHandle) -> bool {
        let mut guard = self.state();
        let state = &mut *guard;
        state.record("validate");
        let linked = state.programs.get(&program.raw()).map(|p| p.linked).unwrap_or(false);
        linked && !state.reject_validation
    }

    fn program_info_log(&mut self, program: ProgramHandle) -> String {
        let mut guard = self.state();
        let state = &mut *guard;
        state.record("program_info_log");
        state.programs.get(&program.raw()).map(|p| p.log.clone()).unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: StageHandle) {
        let mut guard = self.state();
        let state = &mut *guard;
        state.record("delete_shader");
        if state.shaders.remove(&shader.raw()).is_none() {
            state.invalid_calls.push("delete_shader");
        }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        let mut guard = self.state();
        let state = &mut *guard;
        state.record("delete_program");
        if state.programs.remove(&program.raw()).is_none() {
            state.invalid_calls.push("delete_program");
        }
    }

    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<i32> {
        let mut guard = self.state();
        let state = &mut *guard;
        state.record("uniform_location");
        state.programs.get(&program.raw())
            .filter(|p| p.linked)
            .and_then(|p| p.uniforms.get(name).copied())
    }
}

#[cfg(test)]
#[path = "mock_gpu_driver_tests.rs"]
mod tests;
