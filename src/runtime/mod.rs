//! Execution backends
//!
//! The CPU backend is always available; the accelerator backend (WebGPU)
//! is compiled in behind the `wgpu` feature. Kernels receive an
//! [`ExecCtx`] threading the library context and the device assignment
//! through every call — there is no ambient global state.

pub mod cpu;
mod device;

#[cfg(feature = "wgpu")]
pub mod wgpu;

pub use device::DeviceManager;

use crate::library::Library;

/// Backend owning a storage representation or a kernel implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Host memory and host loops
    Cpu,
    /// Accelerator memory and generated compute kernels
    Accelerator,
}

/// Per-call execution context handed to kernels and storage transitions
#[derive(Clone, Copy)]
pub struct ExecCtx<'a> {
    /// Owning library context
    pub lib: &'a Library,
    /// Device id assigned to this sub-task by the device manager
    pub device: usize,
}

impl<'a> ExecCtx<'a> {
    /// Context for direct (non-scheduled) object operations
    pub fn direct(lib: &'a Library) -> Self {
        Self { lib, device: 0 }
    }

    /// The accelerator context, when the feature is compiled in and a
    /// device was initialized
    #[cfg(feature = "wgpu")]
    pub fn accel(&self) -> Option<&'a wgpu::AccelContext> {
        self.lib.accel()
    }

    /// Whether an accelerator backend is usable for this call
    pub fn has_accel(&self) -> bool {
        #[cfg(feature = "wgpu")]
        {
            self.accel().is_some()
        }
        #[cfg(not(feature = "wgpu"))]
        {
            false
        }
    }
}
