//! WebGPU accelerator backend
//!
//! Compiled in behind the `wgpu` feature. The accelerator owns one
//! device queue, mirrors the host storage formats in device buffers, and
//! runs kernel programs generated from the user's operator fragments.

mod assign;
mod buffers;
mod context;
mod convert;
mod source;
mod vxm;

pub use assign::VAssignMaskedAcc;
pub use buffers::{AccCooMat, AccCooVec, AccCsrMat, AccDenseVec};
pub use context::{AccelContext, ProgramKey, WORKGROUP_SIZE};
pub use convert::{register_matrix_rules, register_vector_rules};
pub use vxm::VxmMaskedAcc;

use std::sync::Arc;

use wgpu::{
    BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    BindingType, Buffer, BufferBindingType, ShaderModule, ShaderStages,
};

use crate::dtype::Element;
use crate::error::Result;
use crate::registry::{KernelRegistry, OpKind};

/// Register the default accelerator kernels for one element type
///
/// Zero-sized element types have no device representation and are left
/// host-only.
pub fn register_defaults<T: Element>(reg: &KernelRegistry<T>) {
    if std::mem::size_of::<T>() == 0 {
        return;
    }
    reg.register(OpKind::VxmMasked, Arc::new(VxmMaskedAcc));
    reg.register(OpKind::VAssignMasked, Arc::new(VAssignMaskedAcc));
}

/// One buffer slot of a compute dispatch
pub(crate) enum Binding<'a> {
    /// Read-only storage buffer
    Read(&'a Buffer),
    /// Read-write storage buffer
    Write(&'a Buffer),
    /// Uniform buffer
    Uniform(&'a Buffer),
}

/// Create the layout and bind group for `bindings` and dispatch `groups`
/// work-groups of `entry`
pub(crate) fn run_compute(
    ctx: &AccelContext,
    key: &ProgramKey,
    entry: &'static str,
    module: &ShaderModule,
    bindings: &[Binding<'_>],
    groups: u32,
) -> Result<()> {
    let layout_entries: Vec<BindGroupLayoutEntry> = bindings
        .iter()
        .enumerate()
        .map(|(i, b)| BindGroupLayoutEntry {
            binding: i as u32,
            visibility: ShaderStages::COMPUTE,
            ty: BindingType::Buffer {
                ty: match b {
                    Binding::Read(_) => BufferBindingType::Storage { read_only: true },
                    Binding::Write(_) => BufferBindingType::Storage { read_only: false },
                    Binding::Uniform(_) => BufferBindingType::Uniform,
                },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        })
        .collect();

    let layout = ctx
        .device()
        .create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some(entry),
            entries: &layout_entries,
        });

    let group_entries: Vec<BindGroupEntry> = bindings
        .iter()
        .enumerate()
        .map(|(i, b)| BindGroupEntry {
            binding: i as u32,
            resource: match b {
                Binding::Read(buf) | Binding::Write(buf) | Binding::Uniform(buf) => {
                    buf.as_entire_binding()
                }
            },
        })
        .collect();

    let bind_group = ctx.device().create_bind_group(&BindGroupDescriptor {
        label: Some(entry),
        layout: &layout,
        entries: &group_entries,
    });

    let pipeline = ctx.pipeline(key, entry, module, &layout);

    let mut encoder = ctx
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(entry) });
    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(entry),
            timestamp_writes: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(groups.max(1), 1, 1);
    }
    ctx.submit_and_wait(encoder)
}

/// Reinterpret one 32-bit element as its raw bits for uniform packing
pub(crate) fn bits_of<T: Element>(value: T) -> u32 {
    bytemuck::try_cast(value).unwrap_or(0)
}
