//! Masked vector assign on the accelerator
//!
//! Dense mask: one lane per target position. Sparse mask: one lane per
//! stored mask entry, scattering into the target. The variant follows
//! whichever mask mirror is already valid, sparse first.

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::format::VectorFormat;
use crate::registry::{Kernel, Task, TaskVAssignMasked};
use crate::runtime::{BackendKind, ExecCtx};

use super::source::assign_program;
use super::{bits_of, run_compute, Binding};

/// Accelerator masked assign
pub struct VAssignMaskedAcc;

impl<T: Element> Kernel<T> for VAssignMaskedAcc {
    fn name(&self) -> &'static str {
        "v_assign_masked_acc"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Accelerator
    }

    fn priority(&self) -> u32 {
        2
    }

    fn applicable(&self, task: &Task<T>, ctx: &ExecCtx<'_>) -> bool {
        let Task::VAssignMasked(t) = task else { return false };
        std::mem::size_of::<T>() != 0 && ctx.has_accel() && !t.r.same_object(&t.mask)
    }

    fn conversions_needed(&self, task: &Task<T>) -> u32 {
        let Task::VAssignMasked(t) = task else {
            return u32::MAX;
        };
        let mask_ready = t.mask.is_format_valid(VectorFormat::AccCoo)
            || t.mask.is_format_valid(VectorFormat::AccDense);
        u32::from(!mask_ready) + u32::from(!t.r.is_format_valid(VectorFormat::AccDense))
    }

    fn execute(&self, task: &Task<T>, block: usize, ctx: &ExecCtx<'_>) -> Result<()> {
        let Task::VAssignMasked(t) = task else {
            return Err(Error::invalid_state("task kind mismatch"));
        };
        let acc = ctx
            .accel()
            .ok_or_else(|| Error::Device("accelerator not initialized".into()))?;

        let (key, source) = assign_program(&t.op_assign, &t.op_select)?;
        let module = acc.program(&key, &source)?;
        let value = t.value.get();

        let sparse_mask = t.mask.blocks()[block].read().is_valid(VectorFormat::AccCoo);

        // Target mirror carries the current contents.
        let r_mirror = {
            let mgr = t.r.manager();
            let mut b = t.r.blocks()[block].write();
            mgr.validate_rw(VectorFormat::AccDense.index(), &mut b, ctx)?;
            b.acc_dense()?.clone()
        };

        if sparse_mask {
            let mask_mirror = {
                let mgr = t.mask.manager();
                let mut b = t.mask.blocks()[block].write();
                mgr.validate_rw(VectorFormat::AccCoo.index(), &mut b, ctx)?;
                b.acc_coo()?.clone()
            };
            let params = acc.create_uniform_with_data(
                "assign params",
                &[mask_mirror.nnz as u32, 0, bits_of(value), 0],
            );
            run_compute(
                acc,
                &key,
                "assign_sparse",
                &module,
                &[
                    Binding::Write(&r_mirror.ax),
                    Binding::Read(&mask_mirror.ax),
                    Binding::Uniform(&params),
                    Binding::Read(&mask_mirror.ai),
                ],
                acc.group_count_256(mask_mirror.nnz),
            )?;
        } else {
            let mask_mirror = {
                let mgr = t.mask.manager();
                let mut b = t.mask.blocks()[block].write();
                mgr.validate_rw(VectorFormat::AccDense.index(), &mut b, ctx)?;
                b.acc_dense()?.clone()
            };
            let dummy = acc.create_storage_buffer("assign dummy", 4);
            let params = acc.create_uniform_with_data(
                "assign params",
                &[r_mirror.len as u32, 0, bits_of(value), 0],
            );
            run_compute(
                acc,
                &key,
                "assign_dense",
                &module,
                &[
                    Binding::Write(&r_mirror.ax),
                    Binding::Read(&mask_mirror.ax),
                    Binding::Uniform(&params),
                    Binding::Read(&dummy),
                ],
                acc.group_count_256(r_mirror.len),
            )?;
        }

        let mgr = t.r.manager();
        let mut rb = t.r.blocks()[block].write();
        mgr.commit(VectorFormat::AccDense.index(), &mut rb);
        Ok(())
    }
}
