//! Masked vector-matrix product on the accelerator
//!
//! One generated program carries all prescribed variants: `atomic_scalar`
//! (one lane per source row), `atomic_vector` (one work-group cooperates
//! on a heavy row), and `config_scalar` (a prepass compacts the stored
//! source rows before the scatter, preferred for thin frontiers). The
//! result block is prepared with the init value and accumulated through a
//! compare-exchange fold, then committed as the device-dense mirror.

use std::sync::Arc;

use log::trace;

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::format::{MatrixFormat, VectorFormat};
use crate::registry::{Kernel, Task, TaskVxmMasked};
use crate::runtime::{BackendKind, ExecCtx};

use super::buffers::AccDenseVec;
use super::source::vxm_program;
use super::{bits_of, run_compute, AccelContext, Binding, WORKGROUP_SIZE};

/// Accelerator vxm with per-row variant selection
pub struct VxmMaskedAcc;

fn acc_dense_vec<T: Element>(
    v: &crate::vector::Vector<T>,
    block: usize,
    ctx: &ExecCtx<'_>,
) -> Result<(AccDenseVec, T, usize)> {
    let mgr = v.manager();
    let mut b = v.blocks()[block].write();
    mgr.validate_rw(VectorFormat::AccDense.index(), &mut b, ctx)?;
    let nnz = b.nnz();
    Ok((b.acc_dense()?.clone(), b.fill, nnz))
}

impl<T: Element> Kernel<T> for VxmMaskedAcc {
    fn name(&self) -> &'static str {
        "vxm_masked_acc"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Accelerator
    }

    fn priority(&self) -> u32 {
        2
    }

    fn applicable(&self, task: &Task<T>, ctx: &ExecCtx<'_>) -> bool {
        let Task::VxmMasked(t) = task else { return false };
        // Device bindings cannot alias the written result buffer.
        std::mem::size_of::<T>() != 0
            && ctx.has_accel()
            && !t.r.same_object(&t.v)
            && !t.r.same_object(&t.mask)
    }

    fn conversions_needed(&self, task: &Task<T>) -> u32 {
        let Task::VxmMasked(t) = task else { return u32::MAX };
        u32::from(!t.v.is_format_valid(VectorFormat::AccDense))
            + u32::from(!t.mask.is_format_valid(VectorFormat::AccDense))
            + u32::from(!t.m.is_format_valid(MatrixFormat::AccCsr))
    }

    fn execute(&self, task: &Task<T>, block: usize, ctx: &ExecCtx<'_>) -> Result<()> {
        let Task::VxmMasked(t) = task else {
            return Err(Error::invalid_state("task kind mismatch"));
        };
        let acc: &AccelContext = ctx
            .accel()
            .ok_or_else(|| Error::Device("accelerator not initialized".into()))?;

        let (key, source) = vxm_program(&t.op_multiply, &t.op_add, &t.op_select)?;
        let module = acc.program(&key, &source)?;

        let init = t.init.get();
        let len_j = t.r.grid().block_len(block);
        let early_exit = u32::from(t.desc.is_early_exit());

        let (mask_mirror, _, _) = acc_dense_vec(&t.mask, block, ctx)?;
        let r_buf = acc.create_storage_buffer("vxm result", (len_j * 4) as u64);
        let dummy = acc.create_storage_buffer("vxm dummy", 4);
        let config_buf = acc.create_storage_buffer("vxm config", 4);
        let config_size_buf = acc.create_storage_with_data("vxm config size", &[0u32]);

        // Fill the result block with the init value.
        let prepare_params = acc.create_uniform_with_data(
            "vxm params",
            &[0u32, len_j as u32, early_exit, 0, 0, bits_of(init), 0, 0],
        );
        run_compute(
            acc,
            &key,
            "vxm_prepare",
            &module,
            &[
                Binding::Read(&dummy),
                Binding::Read(&dummy),
                Binding::Read(&dummy),
                Binding::Read(&dummy),
                Binding::Read(&dummy),
                Binding::Write(&r_buf),
                Binding::Uniform(&prepare_params),
                Binding::Write(&config_buf),
                Binding::Write(&config_size_buf),
            ],
            acc.group_count_256(len_j),
        )?;

        for kb in 0..t.v.grid().n_blocks() {
            let len_k = t.v.grid().block_len(kb);
            if len_k == 0 {
                continue;
            }
            let (v_mirror, v_fill, v_nnz) = acc_dense_vec(&t.v, kb, ctx)?;

            let m_mirror = {
                let mgr = t.m.manager();
                let mut b = t.m.block(kb, block).write();
                mgr.validate_rw(MatrixFormat::AccCsr.index(), &mut b, ctx)?;
                b.acc_csr()?.clone()
            };
            if m_mirror.nnz == 0 {
                continue;
            }

            let params = acc.create_uniform_with_data(
                "vxm params",
                &[
                    len_k as u32,
                    len_j as u32,
                    early_exit,
                    0,
                    bits_of(v_fill),
                    bits_of(init),
                    0,
                    0,
                ],
            );
            let bindings = [
                Binding::Read(&v_mirror.ax),
                Binding::Read(&m_mirror.ap),
                Binding::Read(&m_mirror.aj),
                Binding::Read(&m_mirror.ax),
                Binding::Read(&mask_mirror.ax),
                Binding::Write(&r_buf),
                Binding::Uniform(&params),
                Binding::Write(&config_buf),
                Binding::Write(&config_size_buf),
            ];

            let avg_row_nnz = m_mirror.nnz / len_k.max(1);
            if avg_row_nnz >= WORKGROUP_SIZE as usize {
                trace!("vxm acc: block ({kb}, {block}) via atomic_vector");
                run_compute(
                    acc,
                    &key,
                    "vxm_atomic_vector",
                    &module,
                    &bindings,
                    acc.group_count_512(len_k * WORKGROUP_SIZE as usize),
                )?;
            } else if v_nnz * 4 < len_k {
                // Thin frontier: compact the stored rows first.
                trace!("vxm acc: block ({kb}, {block}) via config_scalar");
                let config = acc.create_storage_buffer("vxm config", (len_k * 4) as u64);
                let config_size = acc.create_storage_with_data("vxm config size", &[0u32]);
                let bindings = [
                    Binding::Read(&v_mirror.ax),
                    Binding::Read(&m_mirror.ap),
                    Binding::Read(&m_mirror.aj),
                    Binding::Read(&m_mirror.ax),
                    Binding::Read(&mask_mirror.ax),
                    Binding::Write(&r_buf),
                    Binding::Uniform(&params),
                    Binding::Write(&config),
                    Binding::Write(&config_size),
                ];
                run_compute(
                    acc,
                    &key,
                    "vxm_config",
                    &module,
                    &bindings,
                    acc.group_count_512(len_k),
                )?;
                run_compute(
                    acc,
                    &key,
                    "vxm_config_atomic_scalar",
                    &module,
                    &bindings,
                    acc.group_count_512(len_k),
                )?;
            } else {
                trace!("vxm acc: block ({kb}, {block}) via atomic_scalar");
                run_compute(
                    acc,
                    &key,
                    "vxm_atomic_scalar",
                    &module,
                    &bindings,
                    acc.group_count_512(len_k),
                )?;
            }
        }

        let mgr = t.r.manager();
        let mut rb = t.r.blocks()[block].write();
        rb.fill = init;
        rb.acc_dense = Some(AccDenseVec {
            ax: Arc::new(r_buf),
            len: len_j,
        });
        mgr.commit(VectorFormat::AccDense.index(), &mut rb);
        Ok(())
    }
}
