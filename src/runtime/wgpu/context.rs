//! Accelerator context
//!
//! Owns the WebGPU device and queue, provides work-group sizing helpers,
//! and caches compiled kernel programs keyed by
//! `(source template, element type, operator identities)`. A program that
//! failed to compile is memoized: retrying the same key reports the
//! failure without recompiling.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use parking_lot::Mutex;
use smallvec::SmallVec;
use wgpu::{Buffer, BufferDescriptor, BufferUsages, ComputePipeline, Device, Queue, ShaderModule};

use crate::dtype::DType;
use crate::error::{Error, Result};

/// Work-group size burned into every generated kernel
pub const WORKGROUP_SIZE: u32 = 256;

/// Compiled-program cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    /// Source template identity
    pub template: &'static str,
    /// Element type the template was specialized for
    pub dtype: DType,
    /// Identities of the operators spliced into the source
    pub ops: SmallVec<[u64; 3]>,
}

/// One accelerator device queue plus the process-lifetime program cache
pub struct AccelContext {
    device: Arc<Device>,
    queue: Arc<Queue>,
    adapter_name: String,
    modules: Mutex<HashMap<ProgramKey, Arc<ShaderModule>>>,
    pipelines: Mutex<HashMap<(ProgramKey, &'static str), Arc<ComputePipeline>>>,
    failed: Mutex<HashSet<ProgramKey>>,
}

impl AccelContext {
    /// Initialize the adapter at `index` and request a device
    pub fn new(index: usize) -> Result<Self> {
        let (device, queue, adapter_name) = pollster::block_on(async {
            let instance = wgpu::Instance::default();

            let adapters: Vec<_> = instance.enumerate_adapters(wgpu::Backends::all()).await;
            if adapters.is_empty() {
                return Err(Error::Device("no accelerator adapter found".into()));
            }
            let adapter = if index < adapters.len() {
                let mut adapters = adapters;
                adapters.swap_remove(index)
            } else {
                instance
                    .request_adapter(&wgpu::RequestAdapterOptions {
                        power_preference: wgpu::PowerPreference::HighPerformance,
                        compatible_surface: None,
                        force_fallback_adapter: false,
                    })
                    .await
                    .map_err(|_| Error::Device("no accelerator adapter found".into()))?
            };

            let adapter_name = adapter.get_info().name;
            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("sparr accelerator device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    trace: wgpu::Trace::Off,
                    experimental_features: wgpu::ExperimentalFeatures::default(),
                })
                .await
                .map_err(|e| Error::Device(format!("device request failed: {e:?}")))?;

            Ok((device, queue, adapter_name))
        })?;

        info!("accel: using adapter '{adapter_name}'");

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_name,
            modules: Mutex::new(HashMap::new()),
            pipelines: Mutex::new(HashMap::new()),
            failed: Mutex::new(HashSet::new()),
        })
    }

    /// Adapter name, for logs
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Device handle
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Command queue
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Default work-group size
    pub fn wave_size(&self) -> u32 {
        WORKGROUP_SIZE
    }

    /// Ceiling-divided group count clamped to `[1, 256]`
    pub fn group_count_256(&self, n: usize) -> u32 {
        (n as u32).div_ceil(WORKGROUP_SIZE).clamp(1, 256)
    }

    /// Ceiling-divided group count clamped to `[1, 512]`
    pub fn group_count_512(&self, n: usize) -> u32 {
        (n as u32).div_ceil(WORKGROUP_SIZE).clamp(1, 512)
    }

    /// Compile (or fetch) the program for `key`
    ///
    /// The source is parsed before module creation; a parse failure is
    /// recorded against the key and reported as `Compilation` on every
    /// retry without building again.
    pub fn program(&self, key: &ProgramKey, source: &str) -> Result<Arc<ShaderModule>> {
        if let Some(module) = self.modules.lock().get(key) {
            return Ok(Arc::clone(module));
        }
        if self.failed.lock().contains(key) {
            return Err(Error::Compilation(format!(
                "program '{}' previously failed for {}",
                key.template, key.dtype
            )));
        }

        let mut frontend = wgpu::naga::front::wgsl::Frontend::new();
        if let Err(e) = frontend.parse(source) {
            self.failed.lock().insert(key.clone());
            return Err(Error::Compilation(format!(
                "program '{}' failed to compile: {e}",
                key.template
            )));
        }

        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(key.template),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let module = Arc::new(module);
        self.modules.lock().insert(key.clone(), Arc::clone(&module));
        debug!("accel: compiled program '{}' for {}", key.template, key.dtype);
        Ok(module)
    }

    /// Compute pipeline for one entry point of a cached program
    pub fn pipeline(
        &self,
        key: &ProgramKey,
        entry: &'static str,
        module: &ShaderModule,
        layout: &wgpu::BindGroupLayout,
    ) -> Arc<ComputePipeline> {
        let cache_key = (key.clone(), entry);
        if let Some(pipeline) = self.pipelines.lock().get(&cache_key) {
            return Arc::clone(pipeline);
        }

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{}_{entry}_layout", key.template)),
                bind_group_layouts: &[layout],
                immediate_size: 0,
            });
        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(&format!("{}_{entry}", key.template)),
                layout: Some(&pipeline_layout),
                module,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            });
        let pipeline = Arc::new(pipeline);
        self.pipelines.lock().insert(cache_key, Arc::clone(&pipeline));
        pipeline
    }

    /// Storage buffer usable from compute shaders, at least 4 bytes
    pub fn create_storage_buffer(&self, label: &str, size: u64) -> Buffer {
        self.device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: size.max(4),
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    }

    /// Storage buffer initialized from host data
    pub fn create_storage_with_data<P: bytemuck::Pod>(&self, label: &str, data: &[P]) -> Buffer {
        let buffer = self.create_storage_buffer(label, std::mem::size_of_val(data) as u64);
        if !data.is_empty() {
            self.queue.write_buffer(&buffer, 0, bytemuck::cast_slice(data));
        }
        buffer
    }

    /// Uniform buffer initialized from host data
    pub fn create_uniform_with_data<P: bytemuck::Pod>(&self, label: &str, data: &[P]) -> Buffer {
        let buffer = self.device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: (std::mem::size_of_val(data) as u64).max(16),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue.write_buffer(&buffer, 0, bytemuck::cast_slice(data));
        buffer
    }

    /// Submit a finished encoder and wait for the device
    pub fn submit_and_wait(&self, encoder: wgpu::CommandEncoder) -> Result<()> {
        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: Some(submission),
                timeout: Some(Duration::from_secs(60)),
            })
            .map_err(|e| Error::Device(format!("queue wait failed: {e}")))?;
        Ok(())
    }

    /// Blocking readback of a storage buffer into a host slice
    pub fn read_buffer<P: bytemuck::Pod>(&self, buffer: &Buffer, output: &mut [P]) -> Result<()> {
        if output.is_empty() {
            return Ok(());
        }
        let size = std::mem::size_of_val(output) as u64;

        let staging = self.device.create_buffer(&BufferDescriptor {
            label: Some("sparr staging"),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("sparr readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.submit_and_wait(encoder)?;

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(Duration::from_secs(60)),
            })
            .map_err(|e| Error::Device(format!("poll failed during readback: {e}")))?;
        receiver
            .recv()
            .map_err(|_| Error::Device("readback callback was not invoked".into()))?
            .map_err(|e| Error::Device(format!("buffer map failed: {e:?}")))?;

        {
            let data = slice.get_mapped_range();
            let src: &[P] = bytemuck::cast_slice(&data);
            output.copy_from_slice(&src[..output.len()]);
        }
        staging.unmap();
        Ok(())
    }
}

impl std::fmt::Debug for AccelContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccelContext")
            .field("adapter", &self.adapter_name)
            .finish_non_exhaustive()
    }
}
