//! Library context handle
//!
//! The library is the explicit context threaded through every API entry
//! point: it owns the device manager, the lazily built per-element-type
//! kernel registries and storage managers, and (when compiled in) the
//! accelerator context. There are no static constructors and no global
//! singletons; two libraries in one process are fully independent.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::dtype::Element;
use crate::registry::KernelRegistry;
use crate::runtime::DeviceManager;
use crate::storage::{matrix_manager, vector_manager, MatrixBundle, StorageManager, VectorBundle};

#[cfg(feature = "wgpu")]
use std::sync::OnceLock;

#[cfg(feature = "wgpu")]
use log::warn;

/// Library configuration consumed at construction
#[derive(Debug, Clone)]
pub struct Config {
    /// Block-size hint fixing every object's block grid at construction
    pub block_size: usize,
    /// Devices exposed to the block-to-device assignment
    pub n_devices: usize,
    /// Try to initialize the accelerator backend (requires the `wgpu`
    /// feature; silently falls back to host-only when no adapter exists)
    pub accel: bool,
    /// Accelerator adapter index
    pub accel_device: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: 65536,
            n_devices: 1,
            accel: false,
            accel_device: 0,
        }
    }
}

struct LibraryInner {
    config: Config,
    devices: DeviceManager,
    vec_managers: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    mat_managers: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    kernels: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    #[cfg(feature = "wgpu")]
    accel: OnceLock<Option<crate::runtime::wgpu::AccelContext>>,
}

/// Shared library context
pub struct Library {
    inner: Arc<LibraryInner>,
}

impl Clone for Library {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Library {
    /// Library with the default configuration
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Library with an explicit configuration
    pub fn with_config(config: Config) -> Self {
        let devices = DeviceManager::new(config.n_devices);
        Self {
            inner: Arc::new(LibraryInner {
                config,
                devices,
                vec_managers: Mutex::new(HashMap::new()),
                mat_managers: Mutex::new(HashMap::new()),
                kernels: Mutex::new(HashMap::new()),
                #[cfg(feature = "wgpu")]
                accel: OnceLock::new(),
            }),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Block-to-device assignment
    pub fn device_manager(&self) -> &DeviceManager {
        &self.inner.devices
    }

    /// The accelerator context, initialized on first use when the
    /// configuration asks for it and an adapter is present
    #[cfg(feature = "wgpu")]
    pub fn accel(&self) -> Option<&crate::runtime::wgpu::AccelContext> {
        self.inner
            .accel
            .get_or_init(|| {
                if !self.inner.config.accel {
                    return None;
                }
                match crate::runtime::wgpu::AccelContext::new(self.inner.config.accel_device) {
                    Ok(ctx) => Some(ctx),
                    Err(e) => {
                        warn!("accelerator unavailable, staying host-only: {e}");
                        None
                    }
                }
            })
            .as_ref()
    }

    /// Vector storage manager for element type `T`
    pub fn vector_manager<T: Element>(&self) -> Arc<StorageManager<VectorBundle<T>>> {
        let mut map = self.inner.vec_managers.lock();
        let entry = map
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(vector_manager::<T>()) as Arc<dyn Any + Send + Sync>);
        Arc::clone(entry)
            .downcast::<StorageManager<VectorBundle<T>>>()
            .expect("vector manager registered under its own TypeId")
    }

    /// Matrix storage manager for element type `T`
    pub fn matrix_manager<T: Element>(&self) -> Arc<StorageManager<MatrixBundle<T>>> {
        let mut map = self.inner.mat_managers.lock();
        let entry = map
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(matrix_manager::<T>()) as Arc<dyn Any + Send + Sync>);
        Arc::clone(entry)
            .downcast::<StorageManager<MatrixBundle<T>>>()
            .expect("matrix manager registered under its own TypeId")
    }

    /// Kernel registry for element type `T`, populated with the default
    /// implementations on first use
    pub fn kernels<T: Element>(&self) -> Arc<KernelRegistry<T>> {
        let mut map = self.inner.kernels.lock();
        let entry = map.entry(TypeId::of::<T>()).or_insert_with(|| {
            let reg = KernelRegistry::<T>::new();
            crate::runtime::cpu::register_defaults(&reg);
            #[cfg(feature = "wgpu")]
            crate::runtime::wgpu::register_defaults(&reg);
            Arc::new(reg) as Arc<dyn Any + Send + Sync>
        });
        Arc::clone(entry)
            .downcast::<KernelRegistry<T>>()
            .expect("kernel registry registered under its own TypeId")
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("block_size", &self.inner.config.block_size)
            .field("n_devices", &self.inner.config.n_devices)
            .finish()
    }
}

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// Process-unique id used to key device-manager affinity
pub(crate) fn next_uid() -> u64 {
    NEXT_UID.fetch_add(1, Ordering::Relaxed)
}
