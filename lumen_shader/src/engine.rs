/// Lumen - Singleton manager for engine subsystems
///
/// This module provides global singleton management for the GPU thread, the
/// shader manager and the logger. It uses thread-safe static storage with
/// RwLock for safe concurrent access.

use std::sync::{OnceLock, RwLock, Arc, Mutex};
use std::time::SystemTime;
use crate::error::{Result, Error};
use crate::gpu::{GpuDriver, GpuHandle, GpuThread};
use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
use crate::shader::{ShaderManager, ShaderManagerDesc};

// ===== INTERNAL STATE =====

/// Global engine state storage
static ENGINE_STATE: OnceLock<EngineState> = OnceLock::new();

/// Global logger (initialized with DefaultLogger)
static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Where GPU calls are executed
enum GpuBinding {
    /// Dedicated thread owned by the engine
    Owned(GpuThread),
    /// Thread owned by the application (its render loop pumps the queue)
    Bound(GpuHandle),
}

impl GpuBinding {
    fn handle(&self) -> GpuHandle {
        match self {
            GpuBinding::Owned(thread) => thread.handle(),
            GpuBinding::Bound(handle) => handle.clone(),
        }
    }
}

/// Internal state structure holding all engine singletons
struct EngineState {
    /// GPU thread binding
    gpu: RwLock<Option<GpuBinding>>,
    /// Shader manager singleton
    shader_manager: RwLock<Option<Arc<Mutex<ShaderManager>>>>,
}

impl EngineState {
    /// Create a new empty engine state
    fn new() -> Self {
        Self {
            gpu: RwLock::new(None),
            shader_manager: RwLock::new(None),
        }
    }
}

fn logger() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger::default())))
}

// ===== PUBLIC API =====

/// Main engine singleton manager
///
/// Manages the lifecycle of all engine subsystems (GPU thread, shader
/// manager, logger) using a singleton pattern with thread-safe access.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use lumen_shader::lumen::Engine;
/// use lumen_shader::lumen::config::RenderingConfig;
/// use lumen_shader::lumen::gpu::GpuDriver;
/// use lumen_shader::lumen::shader::{DirectoryAssetRegistry, ShaderIncludes, ShaderManagerDesc};
/// # fn make_driver() -> lumen_shader::lumen::Result<Box<dyn GpuDriver>> { unimplemented!() }
///
/// Engine::initialize()?;
/// Engine::create_gpu_thread("lumen-gpu", make_driver)?;
/// Engine::create_shader_manager(ShaderManagerDesc {
///     registry: Arc::new(DirectoryAssetRegistry::new("assets/shaders")),
///     includes: Arc::new(ShaderIncludes::default()),
///     config: Arc::new(RenderingConfig::default()),
/// })?;
///
/// let shaders = Engine::shader_manager()?;
/// let chunk = shaders.lock().unwrap().load_shader("chunk")?;
///
/// // Cleanup
/// Engine::shutdown();
/// # Ok::<(), lumen_shader::lumen::Error>(())
/// ```
pub struct Engine;

impl Engine {
    /// Helper to log errors before returning them (internal use)
    fn log_and_return_error(error: Error) -> Error {
        match &error {
            Error::InitializationFailed(msg) => {
                crate::engine_error!("lumen::Engine", "Initialization failed: {}", msg);
            }
            Error::BackendError(msg) => {
                crate::engine_error!("lumen::Engine", "Backend error: {}", msg);
            }
            _ => {
                crate::engine_error!("lumen::Engine", "Engine error: {}", error);
            }
        }
        error
    }

    fn state() -> Result<&'static EngineState> {
        ENGINE_STATE.get()
            .ok_or_else(|| Self::log_and_return_error(
                Error::InitializationFailed("Engine not initialized. Call Engine::initialize() first.".to_string())
            ))
    }

    /// Initialize the engine
    ///
    /// This must be called once at application startup before creating any subsystems.
    ///
    /// # Errors
    ///
    /// Currently always succeeds, but returns Result for future extensibility.
    pub fn initialize() -> Result<()> {
        ENGINE_STATE.get_or_init(EngineState::new);
        Ok(())
    }

    /// Shutdown the entire engine and destroy all singletons
    ///
    /// Shaders are disposed first, while the GPU thread can still release
    /// their GPU objects; the GPU thread is stopped afterwards.
    pub fn shutdown() {
        if ENGINE_STATE.get().is_none() {
            return;
        }
        if let Err(e) = Self::destroy_shader_manager() {
            crate::engine_error!("lumen::Engine", "Shader manager shutdown failed: {}", e);
        }
        if let Err(e) = Self::destroy_gpu() {
            crate::engine_error!("lumen::Engine", "GPU shutdown failed: {}", e);
        }
    }

    // ===== GPU API =====

    fn register_gpu(binding: GpuBinding) -> Result<GpuHandle> {
        let state = Self::state()?;

        let mut lock = state.gpu.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("GPU lock poisoned".to_string())
            ))?;

        if lock.is_some() {
            return Err(Self::log_and_return_error(
                Error::InitializationFailed("GPU already exists. Call Engine::destroy_gpu() first.".to_string())
            ));
        }

        let handle = binding.handle();
        *lock = Some(binding);
        Ok(handle)
    }

    /// Start a dedicated GPU thread and make it the engine's GPU thread
    ///
    /// `factory` runs on the new thread and builds the driver there.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The engine is not initialized
    /// - A GPU thread is already registered
    /// - The thread or the driver cannot be created
    pub fn create_gpu_thread<F>(name: &str, factory: F) -> Result<GpuHandle>
    where
        F: FnOnce() -> Result<Box<dyn GpuDriver>> + Send + 'static,
    {
        // Fail before spawning anything
        if Self::state()?.gpu.read().map(|gpu| gpu.is_some()).unwrap_or(false) {
            return Err(Self::log_and_return_error(
                Error::InitializationFailed("GPU already exists. Call Engine::destroy_gpu() first.".to_string())
            ));
        }

        let thread = GpuThread::spawn(name, factory).map_err(Self::log_and_return_error)?;
        let handle = Self::register_gpu(GpuBinding::Owned(thread))?;

        crate::engine_info!("lumen::Engine", "GPU thread '{}' created successfully", name);
        Ok(handle)
    }

    /// Register a GPU thread owned by the application
    ///
    /// The owning thread keeps its `GpuContext` and pumps it.
    pub fn bind_gpu(handle: GpuHandle) -> Result<()> {
        Self::register_gpu(GpuBinding::Bound(handle))?;
        crate::engine_info!("lumen::Engine", "Application GPU thread bound");
        Ok(())
    }

    /// Get the GPU handle
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The engine is not initialized
    /// - No GPU thread has been created or bound
    pub fn gpu() -> Result<GpuHandle> {
        let state = Self::state()?;

        let lock = state.gpu.read()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("GPU lock poisoned".to_string())
            ))?;

        lock.as_ref()
            .map(GpuBinding::handle)
            .ok_or_else(|| Self::log_and_return_error(
                Error::InitializationFailed("GPU not created. Call Engine::create_gpu_thread() first.".to_string())
            ))
    }

    /// Destroy the GPU binding, stopping the engine-owned thread if any
    ///
    /// Destroy the shader manager first: assets disposed afterwards cannot
    /// reach the GPU thread and leak their GPU objects.
    pub fn destroy_gpu() -> Result<()> {
        let state = Self::state()?;

        let binding = state.gpu.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("GPU lock poisoned".to_string())
            ))?
            .take();

        // Joined outside the lock: queued requests may still query the engine
        if let Some(binding) = binding {
            drop(binding);
            crate::engine_info!("lumen::Engine", "GPU singleton destroyed");
        }

        Ok(())
    }

    // ===== SHADER MANAGER API =====

    /// Create and register the shader manager singleton on the engine's GPU thread
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The engine is not initialized
    /// - No GPU thread exists
    /// - A shader manager already exists
    pub fn create_shader_manager(desc: ShaderManagerDesc) -> Result<()> {
        let state = Self::state()?;
        let gpu = Self::gpu()?;

        let mut lock = state.shader_manager.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("ShaderManager lock poisoned".to_string())
            ))?;

        if lock.is_some() {
            return Err(Self::log_and_return_error(
                Error::InitializationFailed("ShaderManager already exists. Call Engine::destroy_shader_manager() first.".to_string())
            ));
        }

        *lock = Some(Arc::new(Mutex::new(ShaderManager::new(desc, gpu))));

        crate::engine_info!("lumen::Engine", "ShaderManager singleton created successfully");

        Ok(())
    }

    /// Get the shader manager singleton
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The engine is not initialized
    /// - The shader manager has not been created
    pub fn shader_manager() -> Result<Arc<Mutex<ShaderManager>>> {
        let state = Self::state()?;

        let lock = state.shader_manager.read()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("ShaderManager lock poisoned".to_string())
            ))?;

        lock.clone()
            .ok_or_else(|| Self::log_and_return_error(
                Error::InitializationFailed("ShaderManager not created. Call Engine::create_shader_manager() first.".to_string())
            ))
    }

    /// Dispose every shader and destroy the shader manager singleton
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is not initialized, or the first
    /// shader disposal error (the manager is destroyed regardless).
    pub fn destroy_shader_manager() -> Result<()> {
        let state = Self::state()?;

        let manager = state.shader_manager.write()
            .map_err(|_| Self::log_and_return_error(
                Error::BackendError("ShaderManager lock poisoned".to_string())
            ))?
            .take();

        let Some(manager) = manager else {
            return Ok(());
        };

        let disposed = match manager.lock() {
            Ok(mut manager) => manager.dispose_all(),
            Err(_) => Err(Error::BackendError("ShaderManager lock poisoned".to_string())),
        };

        crate::engine_info!("lumen::Engine", "ShaderManager singleton destroyed");

        disposed.map_err(Self::log_and_return_error)
    }

    /// Reset all singletons for testing (only available in test builds)
    #[cfg(test)]
    pub fn reset_for_testing() {
        if let Some(state) = ENGINE_STATE.get() {
            if let Ok(mut manager) = state.shader_manager.write() {
                *manager = None;
            }
            let binding = state.gpu.write().ok().and_then(|mut gpu| gpu.take());
            drop(binding);
        }
    }

    // ===== LOGGING API =====

    /// Set a custom logger
    ///
    /// Replace the default logger with a custom implementation (file logger,
    /// editor console, ...).
    ///
    /// # Example
    ///
    /// ```no_run
    /// use lumen_shader::lumen::{Engine, log::{Logger, LogEntry}};
    ///
    /// struct FileLogger;
    /// impl Logger for FileLogger {
    ///     fn log(&self, entry: &LogEntry) {
    ///         // Write to file...
    ///     }
    /// }
    ///
    /// Engine::set_logger(FileLogger);
    /// ```
    pub fn set_logger<L: Logger + 'static>(logger: L) {
        if let Ok(mut lock) = self::logger().write() {
            *lock = Box::new(logger);
        }
    }

    /// Reset logger to default (DefaultLogger)
    pub fn reset_logger() {
        if let Ok(mut lock) = logger().write() {
            *lock = Box::new(DefaultLogger::default());
        }
    }

    /// Internal logging method (for simple logs without file:line)
    ///
    /// Used by macros like engine_info!, engine_warn!, etc.
    ///
    /// # Arguments
    ///
    /// * `severity` - Log severity level
    /// * `source` - Source module (e.g., "lumen::ShaderAsset")
    /// * `message` - Log message
    pub fn log(severity: LogSeverity, source: &str, message: String) {
        if let Ok(lock) = logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: None,
                line: None,
            });
        }
    }

    /// Internal logging method with file:line information (for ERROR logs)
    ///
    /// Used by engine_error! macro to include source location.
    pub fn log_detailed(
        severity: LogSeverity,
        source: &str,
        message: String,
        file: &'static str,
        line: u32,
    ) {
        if let Ok(lock) = logger().read() {
            lock.log(&LogEntry {
                severity,
                timestamp: SystemTime::now(),
                source: source.to_string(),
                message,
                file: Some(file),
                line: Some(line),
            });
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
