//! Masked vector-matrix product on the host
//!
//! Contract: for every column `j` with `select(mask[j])`,
//! `r[j] = init (+) fold (v[k] (*) M[k,j])` over the `k` where both the
//! matrix entry and the source entry exist; every other `r[j]` is `init`,
//! which also becomes the fill value of `r`.
//!
//! Two variants differ in how they walk the source vector: the dense scan
//! reads every position and skips fill values, the sparse variant walks
//! only the stored entries of a COO source. The dispatcher picks by which
//! source format is already valid; the sparse variant wins ties because a
//! thin frontier is the common case in graph traversals.

use crate::dtype::Element;
use crate::error::Result;
use crate::format::{MatrixFormat, VectorFormat};
use crate::registry::{Kernel, Task, TaskVxmMasked};
use crate::runtime::{BackendKind, ExecCtx};

use super::{mat_conversions, snapshot_mat_csr, snapshot_vec_coo, snapshot_vec_dense, vec_conversions};

/// Shared tail: accumulate one source entry against one matrix row
#[inline]
fn scatter_row<T: Element>(
    t: &TaskVxmMasked<T>,
    selected: &[bool],
    csr: &crate::format::CsrMat<T>,
    local_k: usize,
    vk: T,
    acc: &mut [T],
) {
    for (c, mx) in csr.iter_row(local_k) {
        if selected[c as usize] {
            let c = c as usize;
            acc[c] = t.op_add.apply(acc[c], t.op_multiply.apply(vk, mx));
        }
    }
}

fn write_result<T: Element>(t: &TaskVxmMasked<T>, block: usize, init: T, acc: Vec<T>) -> Result<()> {
    let mgr = t.r.manager();
    let mut rb = t.r.blocks()[block].write();
    rb.fill = init;
    mgr.validate_wd(VectorFormat::CpuDense.index(), &mut rb);
    rb.dense_mut()?.ax = acc;
    mgr.commit(VectorFormat::CpuDense.index(), &mut rb);
    Ok(())
}

fn selected_mask<T: Element>(
    t: &TaskVxmMasked<T>,
    block: usize,
    ctx: &ExecCtx<'_>,
) -> Result<Vec<bool>> {
    let (mask_ax, _) = snapshot_vec_dense(&t.mask, block, ctx)?;
    Ok(mask_ax.iter().map(|&x| t.op_select.apply(x)).collect())
}

/// Dense-source scan
pub struct VxmMaskedDenseCpu;

impl<T: Element> Kernel<T> for VxmMaskedDenseCpu {
    fn name(&self) -> &'static str {
        "vxm_masked_dense_cpu"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn conversions_needed(&self, task: &Task<T>) -> u32 {
        let Task::VxmMasked(t) = task else { return u32::MAX };
        vec_conversions(&t.v, VectorFormat::CpuDense)
            + vec_conversions(&t.mask, VectorFormat::CpuDense)
            + mat_conversions(&t.m, MatrixFormat::CpuCsr)
    }

    fn execute(&self, task: &Task<T>, block: usize, ctx: &ExecCtx<'_>) -> Result<()> {
        let Task::VxmMasked(t) = task else {
            return Err(crate::error::Error::invalid_state("task kind mismatch"));
        };

        let init = t.init.get();
        let selected = selected_mask(t, block, ctx)?;
        let len = t.r.grid().block_len(block);
        let mut acc = vec![init; len];

        // With nothing selected the matrix and source are never touched.
        if selected.iter().any(|&s| s) {
            for kb in 0..t.v.grid().n_blocks() {
                let (v_ax, v_fill) = snapshot_vec_dense(&t.v, kb, ctx)?;
                let csr = snapshot_mat_csr(&t.m, kb, block, ctx)?;
                for (local_k, &vk) in v_ax.iter().enumerate() {
                    if vk != v_fill {
                        scatter_row(t, &selected, &csr, local_k, vk, &mut acc);
                    }
                }
            }
        }

        write_result(t, block, init, acc)
    }
}

/// Sparse-frontier scan over a COO source
pub struct VxmMaskedSparseCpu;

impl<T: Element> Kernel<T> for VxmMaskedSparseCpu {
    fn name(&self) -> &'static str {
        "vxm_masked_sparse_cpu"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn priority(&self) -> u32 {
        1
    }

    fn conversions_needed(&self, task: &Task<T>) -> u32 {
        let Task::VxmMasked(t) = task else { return u32::MAX };
        vec_conversions(&t.v, VectorFormat::CpuCoo)
            + vec_conversions(&t.mask, VectorFormat::CpuDense)
            + mat_conversions(&t.m, MatrixFormat::CpuCsr)
    }

    fn execute(&self, task: &Task<T>, block: usize, ctx: &ExecCtx<'_>) -> Result<()> {
        let Task::VxmMasked(t) = task else {
            return Err(crate::error::Error::invalid_state("task kind mismatch"));
        };

        let init = t.init.get();
        let selected = selected_mask(t, block, ctx)?;
        let len = t.r.grid().block_len(block);
        let mut acc = vec![init; len];

        if selected.iter().any(|&s| s) {
            for kb in 0..t.v.grid().n_blocks() {
                let (v_ai, v_ax) = snapshot_vec_coo(&t.v, kb, ctx)?;
                if v_ai.is_empty() {
                    continue;
                }
                let csr = snapshot_mat_csr(&t.m, kb, block, ctx)?;
                for (&local_k, &vk) in v_ai.iter().zip(v_ax.iter()) {
                    scatter_row(t, &selected, &csr, local_k as usize, vk, &mut acc);
                }
            }
        }

        write_result(t, block, init, acc)
    }
}
