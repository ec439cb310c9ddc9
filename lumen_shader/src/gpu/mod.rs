/// GPU module - driver collaborator and GPU thread affinity

pub mod gpu_driver;
pub mod gpu_thread;

#[cfg(test)]
pub(crate) mod mock_gpu_driver;

pub use gpu_driver::*;
pub use gpu_thread::*;
