//! Masked vector assign on the host
//!
//! `r[i] = op_assign(r[i], value)` for every `i` with `select(mask[i])`.
//! Two paths: a sparse mask scatters one update per stored mask entry, a
//! dense mask scans every position. The variant is picked per call by
//! whichever mask format is already valid, sparse first.

use crate::dtype::Element;
use crate::error::Result;
use crate::format::VectorFormat;
use crate::registry::{Kernel, Task, TaskVAssignMasked};
use crate::runtime::{BackendKind, ExecCtx};

use super::{snapshot_vec_coo, snapshot_vec_dense, vec_conversions};

/// Masked assign with mask-format variant selection
pub struct VAssignMaskedCpu;

impl VAssignMaskedCpu {
    fn execute_sp2dn<T: Element>(
        &self,
        t: &TaskVAssignMasked<T>,
        block: usize,
        ctx: &ExecCtx<'_>,
    ) -> Result<()> {
        let (mask_ai, mask_ax) = snapshot_vec_coo(&t.mask, block, ctx)?;
        let value = t.value.get();

        let mgr = t.r.manager();
        let mut rb = t.r.blocks()[block].write();
        mgr.validate_rw(VectorFormat::CpuDense.index(), &mut rb, ctx)?;
        {
            let dense = rb.dense_mut()?;
            for (&i, &x) in mask_ai.iter().zip(mask_ax.iter()) {
                if t.op_select.apply(x) {
                    let i = i as usize;
                    dense.ax[i] = t.op_assign.apply(dense.ax[i], value);
                }
            }
        }
        mgr.commit(VectorFormat::CpuDense.index(), &mut rb);
        Ok(())
    }

    fn execute_dn2dn<T: Element>(
        &self,
        t: &TaskVAssignMasked<T>,
        block: usize,
        ctx: &ExecCtx<'_>,
    ) -> Result<()> {
        let (mask_ax, _) = snapshot_vec_dense(&t.mask, block, ctx)?;
        let value = t.value.get();

        let mgr = t.r.manager();
        let mut rb = t.r.blocks()[block].write();
        mgr.validate_rw(VectorFormat::CpuDense.index(), &mut rb, ctx)?;
        {
            let dense = rb.dense_mut()?;
            for (i, &x) in mask_ax.iter().enumerate() {
                if t.op_select.apply(x) {
                    dense.ax[i] = t.op_assign.apply(dense.ax[i], value);
                }
            }
        }
        mgr.commit(VectorFormat::CpuDense.index(), &mut rb);
        Ok(())
    }
}

impl<T: Element> Kernel<T> for VAssignMaskedCpu {
    fn name(&self) -> &'static str {
        "v_assign_masked_cpu"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn conversions_needed(&self, task: &Task<T>) -> u32 {
        let Task::VAssignMasked(t) = task else {
            return u32::MAX;
        };
        // Either mask format serves; count a conversion only when neither
        // is valid.
        let mask_ready = t.mask.is_format_valid(VectorFormat::CpuCoo)
            || t.mask.is_format_valid(VectorFormat::CpuDense);
        u32::from(!mask_ready) + vec_conversions(&t.r, VectorFormat::CpuDense)
    }

    fn execute(&self, task: &Task<T>, block: usize, ctx: &ExecCtx<'_>) -> Result<()> {
        let Task::VAssignMasked(t) = task else {
            return Err(crate::error::Error::invalid_state("task kind mismatch"));
        };

        let sparse_mask = t.mask.blocks()[block].read().is_valid(VectorFormat::CpuCoo);
        let dense_mask = t.mask.blocks()[block].read().is_valid(VectorFormat::CpuDense);

        if sparse_mask {
            return self.execute_sp2dn(t, block, ctx);
        }
        if dense_mask {
            return self.execute_dn2dn(t, block, ctx);
        }
        self.execute_sp2dn(t, block, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desc::Descriptor;
    use crate::library::Library;
    use crate::op;
    use crate::scalar::Scalar;
    use crate::vector::Vector;

    fn assign_task(lib: &Library, dense_mask: bool) -> Task<i32> {
        let r = Vector::<i32>::new(lib, 4).unwrap();

        let mask = Vector::<i32>::new(lib, 4).unwrap();
        mask.build(&[0, 2], &[1, 1], Descriptor::new()).unwrap();
        if dense_mask {
            mask.set_format(VectorFormat::CpuDense).unwrap();
            // Leave only the dense representation valid.
            for block in mask.blocks() {
                let mut b = block.write();
                let mgr = mask.manager();
                mgr.commit(VectorFormat::CpuDense.index(), &mut b);
            }
        }

        Task::VAssignMasked(crate::registry::TaskVAssignMasked {
            r,
            mask,
            value: Scalar::new(7),
            op_assign: op::second::<i32>(),
            op_select: op::nonzero::<i32>(),
            desc: Descriptor::new(),
        })
    }

    #[test]
    fn test_masked_dense_assign() {
        let lib = Library::new();
        let ctx = ExecCtx::direct(&lib);
        let task = assign_task(&lib, true);

        VAssignMaskedCpu.execute(&task, 0, &ctx).unwrap();

        let Task::VAssignMasked(t) = &task else {
            unreachable!()
        };
        let got: Vec<i32> = (0..4).map(|i| t.r.get(i).unwrap()).collect();
        assert_eq!(got, vec![7, 0, 7, 0]);
    }

    #[test]
    fn test_masked_sparse_assign() {
        let lib = Library::new();
        let ctx = ExecCtx::direct(&lib);
        let task = assign_task(&lib, false);

        VAssignMaskedCpu.execute(&task, 0, &ctx).unwrap();

        let Task::VAssignMasked(t) = &task else {
            unreachable!()
        };
        let got: Vec<i32> = (0..4).map(|i| t.r.get(i).unwrap()).collect();
        assert_eq!(got, vec![7, 0, 7, 0]);
    }

    #[test]
    fn test_assign_folds_with_existing_entries() {
        let lib = Library::new();
        let ctx = ExecCtx::direct(&lib);
        let Task::VAssignMasked(mut t) = assign_task(&lib, false) else {
            unreachable!()
        };
        t.r.build(&[0, 1], &[10, 20], Descriptor::new()).unwrap();
        t.op_assign = op::plus::<i32>();
        let task = Task::VAssignMasked(t);

        VAssignMaskedCpu.execute(&task, 0, &ctx).unwrap();

        let Task::VAssignMasked(t) = &task else {
            unreachable!()
        };
        let got: Vec<i32> = (0..4).map(|i| t.r.get(i).unwrap()).collect();
        assert_eq!(got, vec![17, 20, 7, 0]);
    }

    #[test]
    fn test_self_mask_assign() {
        let lib = Library::new();
        let ctx = ExecCtx::direct(&lib);
        let r = Vector::<i32>::new(&lib, 3).unwrap();
        r.build(&[1], &[5], Descriptor::new()).unwrap();

        let task = Task::VAssignMasked(crate::registry::TaskVAssignMasked {
            r: r.clone(),
            mask: r.clone(),
            value: Scalar::new(9),
            op_assign: op::second::<i32>(),
            op_select: op::nonzero::<i32>(),
            desc: Descriptor::new(),
        });

        VAssignMaskedCpu.execute(&task, 0, &ctx).unwrap();
        assert_eq!(r.get(1).unwrap(), 9);
        assert_eq!(r.get(0).unwrap(), 0);
    }
}
