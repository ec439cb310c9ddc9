/// GPU thread affinity
///
/// Exactly one thread owns the GPU driver. Other threads submit closures
/// through a `GpuHandle`; the owning thread drains its queue in submission
/// order and replies through a one-shot channel the caller blocks on.
///
/// Two ways to own the driver:
///
/// - **GpuThread**: a dedicated, named thread that builds the driver itself
///   and serves requests until shut down.
/// - **GpuContext**: binds a driver to the *current* thread, for render loops
///   that already own the graphics context. The loop calls
///   `process_pending()` once per frame (or `run()` to block).
///
/// Calls made on the GPU thread itself run inline. A closure that calls back
/// into `synch` while already running is rejected instead of deadlocking.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use crossbeam::channel::{self, Receiver, Sender};
use crate::error::{Error, Result};
use crate::gpu::GpuDriver;

/// Unit of work executed on the GPU thread
type GpuJob = Box<dyn FnOnce(&mut dyn GpuDriver) + Send>;

enum GpuMessage {
    Run(GpuJob),
    Shutdown,
}

thread_local! {
    /// Driver bound to this thread, if it is a GPU thread
    static GPU_DRIVER: RefCell<Option<Box<dyn GpuDriver>>> = RefCell::new(None);
}

/// Run `op` against the driver bound to the current thread
fn with_driver<R>(op: impl FnOnce(&mut dyn GpuDriver) -> Result<R>) -> Result<R> {
    GPU_DRIVER.with(|slot| {
        let mut slot = slot.try_borrow_mut().map_err(|_| {
            Error::ThreadAffinity("re-entrant GPU call from inside a GPU operation".to_string())
        })?;
        match slot.as_mut() {
            Some(driver) => op(driver.as_mut()),
            None => Err(Error::ThreadAffinity(
                "no GPU driver is bound to this thread".to_string()
            )),
        }
    })
}

// ===== GPU HANDLE =====

/// Cloneable, thread-safe entry point to the GPU thread
///
/// Dropping every handle does not stop the GPU thread; use
/// `GpuThread::shutdown()` or `request_shutdown()` for that.
#[derive(Clone)]
pub struct GpuHandle {
    /// Request queue; None once the GPU thread stopped accepting work
    queue: Arc<Mutex<Option<Sender<GpuMessage>>>>,
    thread_id: ThreadId,
}

impl GpuHandle {
    /// Whether the calling thread is the GPU thread
    pub fn is_gpu_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Whether the GPU thread still accepts requests
    pub fn is_alive(&self) -> bool {
        self.queue.lock().map(|queue| queue.is_some()).unwrap_or(false)
    }

    /// Execute `op` on the GPU thread and wait for its result
    ///
    /// Runs inline when called from the GPU thread, otherwise enqueues the
    /// closure and blocks until it has run.
    ///
    /// # Errors
    ///
    /// - `ThreadAffinity` if the GPU thread stopped, dropped the request
    ///   without running it, or the call is re-entrant
    /// - whatever `op` itself returns
    pub fn synch<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(&mut dyn GpuDriver) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        if self.is_gpu_thread() {
            return with_driver(op);
        }

        let (reply_tx, reply_rx) = channel::bounded::<Result<R>>(1);
        let job: GpuJob = Box::new(move |driver| {
            // Receiver gone means the caller stopped waiting
            let _ = reply_tx.send(op(driver));
        });

        {
            let queue = self.queue.lock().map_err(|_| {
                Error::ThreadAffinity("GPU request queue lock poisoned".to_string())
            })?;
            let sender = queue.as_ref().ok_or_else(|| {
                Error::ThreadAffinity("GPU thread has stopped".to_string())
            })?;
            sender.send(GpuMessage::Run(job)).map_err(|_| {
                Error::ThreadAffinity("GPU thread has stopped".to_string())
            })?;
        }

        crate::engine_trace!("lumen::GpuThread", "Queued GPU request from {:?}", thread::current().id());

        reply_rx.recv().map_err(|_| {
            Error::ThreadAffinity("GPU request dropped before execution".to_string())
        })?
    }

    /// Ask the GPU thread to stop after the requests already queued
    ///
    /// Requests submitted afterwards fail with `ThreadAffinity`.
    pub fn request_shutdown(&self) {
        if let Ok(queue) = self.queue.lock() {
            if let Some(sender) = queue.as_ref() {
                let _ = sender.send(GpuMessage::Shutdown);
            }
        }
    }
}

impl fmt::Debug for GpuHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuHandle")
            .field("thread_id", &self.thread_id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

// ===== GPU CONTEXT =====

/// Driver binding for the current thread
///
/// Not `Send`: the context lives and dies on the thread it was created on.
/// Dropping it stops the queue, fails every pending request and releases
/// the driver.
pub struct GpuContext {
    handle: GpuHandle,
    receiver: Receiver<GpuMessage>,
    _not_send: PhantomData<*const ()>,
}

impl GpuContext {
    /// Bind `driver` to the current thread
    ///
    /// # Errors
    ///
    /// `InitializationFailed` if this thread already has a driver bound.
    pub fn new(driver: Box<dyn GpuDriver>) -> Result<Self> {
        GPU_DRIVER.with(|slot| {
            let mut slot = slot.try_borrow_mut().map_err(|_| {
                Error::InitializationFailed("GPU driver slot is in use".to_string())
            })?;
            if slot.is_some() {
                return Err(Error::InitializationFailed(
                    "A GPU driver is already bound to this thread".to_string()
                ));
            }
            *slot = Some(driver);
            Ok(())
        })?;

        let (sender, receiver) = channel::unbounded();
        Ok(Self {
            handle: GpuHandle {
                queue: Arc::new(Mutex::new(Some(sender))),
                thread_id: thread::current().id(),
            },
            receiver,
            _not_send: PhantomData,
        })
    }

    /// Handle other threads use to reach this context
    pub fn handle(&self) -> GpuHandle {
        self.handle.clone()
    }

    /// Execute every queued request without blocking
    ///
    /// Returns the number of requests executed. A pending shutdown request
    /// closes the context.
    pub fn process_pending(&self) -> usize {
        let mut executed = 0;
        while let Ok(message) = self.receiver.try_recv() {
            match message {
                GpuMessage::Run(job) => {
                    self.execute(job);
                    executed += 1;
                }
                GpuMessage::Shutdown => {
                    self.close();
                    break;
                }
            }
        }
        executed
    }

    /// Serve requests until a shutdown request arrives
    pub fn run(&self) {
        while let Ok(message) = self.receiver.recv() {
            match message {
                GpuMessage::Run(job) => self.execute(job),
                GpuMessage::Shutdown => break,
            }
        }
        self.close();
    }

    fn execute(&self, job: GpuJob) {
        let result = with_driver(|driver| {
            job(driver);
            Ok(())
        });
        if let Err(e) = result {
            // The job was dropped unexecuted; its caller sees ThreadAffinity
            crate::engine_error!("lumen::GpuThread", "GPU request not executed: {}", e);
        }
    }

    /// Stop accepting requests and fail the ones still queued
    fn close(&self) {
        if let Ok(mut queue) = self.handle.queue.lock() {
            queue.take();
        }
        let dropped = self.receiver.try_iter()
            .filter(|message| matches!(message, GpuMessage::Run(_)))
            .count();
        if dropped > 0 {
            crate::engine_warn!("lumen::GpuThread", "Dropped {} pending GPU requests at shutdown", dropped);
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        self.close();
        GPU_DRIVER.with(|slot| {
            if let Ok(mut slot) = slot.try_borrow_mut() {
                *slot = None;
            }
        });
    }
}

// ===== GPU THREAD =====

/// Dedicated GPU thread
///
/// # Example
///
/// ```no_run
/// use lumen_shader::lumen::gpu::{GpuThread, GpuDriver};
/// # fn make_driver() -> lumen_shader::lumen::Result<Box<dyn GpuDriver>> { unimplemented!() }
///
/// let mut gpu = GpuThread::spawn("lumen-gpu", make_driver)?;
/// let handle = gpu.handle();
/// // hand `handle` to loaders, shader assets, ...
/// gpu.shutdown();
/// # Ok::<(), lumen_shader::lumen::Error>(())
/// ```
pub struct GpuThread {
    handle: GpuHandle,
    join: Option<JoinHandle<()>>,
}

impl GpuThread {
    /// Start a GPU thread whose driver is built by `factory` on that thread
    ///
    /// # Errors
    ///
    /// `InitializationFailed` if the thread cannot be spawned or exits before
    /// reporting readiness; the factory's own error if driver creation fails.
    pub fn spawn<F>(name: &str, factory: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Box<dyn GpuDriver>> + Send + 'static,
    {
        let (ready_tx, ready_rx) = channel::bounded::<Result<GpuHandle>>(1);
        let thread_name = name.to_string();

        let join = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let context = match factory().and_then(GpuContext::new) {
                    Ok(context) => context,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if ready_tx.send(Ok(context.handle())).is_err() {
                    return;
                }
                crate::engine_info!("lumen::GpuThread", "GPU thread '{}' started", thread_name);
                context.run();
                crate::engine_info!("lumen::GpuThread", "GPU thread '{}' stopped", thread_name);
            })
            .map_err(|e| Error::InitializationFailed(format!("Failed to spawn GPU thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(handle)) => Ok(Self { handle, join: Some(join) }),
            Ok(Err(e)) => {
                let _ = join.join();
                Err(e)
            }
            Err(_) => {
                let _ = join.join();
                Err(Error::InitializationFailed(
                    "GPU thread exited before reporting readiness".to_string()
                ))
            }
        }
    }

    pub fn handle(&self) -> GpuHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        self.join.is_some()
    }

    /// Stop the thread after the requests already queued and wait for it
    ///
    /// Idempotent.
    pub fn shutdown(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        self.handle.request_shutdown();
        if self.handle.is_gpu_thread() {
            // Joining ourselves would never return
            crate::engine_warn!("lumen::GpuThread", "GPU thread shutdown requested from the GPU thread itself");
            return;
        }
        if join.join().is_err() {
            crate::engine_error!("lumen::GpuThread", "GPU thread panicked");
        }
    }
}

impl Drop for GpuThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "gpu_thread_tests.rs"]
mod tests;
