//! Masked element-wise vector add on the host
//!
//! Sort-merge over two COO blocks sharing an index domain. A mask, when
//! present, filters each input first: a semi-join of the input's sorted
//! index sequence against the mask's produces the survivor permutation,
//! sized from that input's own entry count. The merge resolves index
//! collisions with the operator, keeping `a` as the left operand.

use crate::dtype::Element;
use crate::error::Result;
use crate::format::VectorFormat;
use crate::registry::{Kernel, Task};
use crate::runtime::{BackendKind, ExecCtx};

use super::{snapshot_vec_coo, vec_conversions};

/// Survivor permutation of `input` indices present in the sorted `mask`
/// sequence
fn mask_by_indices(input: &[u32], mask: &[u32]) -> Vec<u32> {
    let mut perm = Vec::with_capacity(input.len());
    let mut m = 0usize;
    for (k, &i) in input.iter().enumerate() {
        while m < mask.len() && mask[m] < i {
            m += 1;
        }
        if m < mask.len() && mask[m] == i {
            perm.push(k as u32);
        }
    }
    perm
}

/// Gather the surviving entries of one input
fn gather<T: Element>(ai: &[u32], ax: &[T], perm: &[u32]) -> (Vec<u32>, Vec<T>) {
    (
        perm.iter().map(|&k| ai[k as usize]).collect(),
        perm.iter().map(|&k| ax[k as usize]).collect(),
    )
}

/// Masked sort-merge add
pub struct VEwiseAddCpu;

impl<T: Element> Kernel<T> for VEwiseAddCpu {
    fn name(&self) -> &'static str {
        "v_eadd_cpu"
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn conversions_needed(&self, task: &Task<T>) -> u32 {
        let Task::VEwiseAdd(t) = task else { return u32::MAX };
        let mask = t
            .mask
            .as_ref()
            .map(|m| vec_conversions(m, VectorFormat::CpuCoo))
            .unwrap_or(0);
        vec_conversions(&t.a, VectorFormat::CpuCoo) + vec_conversions(&t.b, VectorFormat::CpuCoo) + mask
    }

    fn execute(&self, task: &Task<T>, block: usize, ctx: &ExecCtx<'_>) -> Result<()> {
        let Task::VEwiseAdd(t) = task else {
            return Err(crate::error::Error::invalid_state("task kind mismatch"));
        };

        let (a_ai, a_ax) = snapshot_vec_coo(&t.a, block, ctx)?;
        let (b_ai, b_ax) = snapshot_vec_coo(&t.b, block, ctx)?;
        let mask_ai = match &t.mask {
            Some(mask) => Some(snapshot_vec_coo(mask, block, ctx)?.0),
            None => None,
        };

        let (a_ai, a_ax) = match &mask_ai {
            Some(mask) => {
                let perm_a = mask_by_indices(&a_ai, mask);
                gather(&a_ai, &a_ax, &perm_a)
            }
            None => (a_ai, a_ax),
        };
        let (b_ai, b_ax) = match &mask_ai {
            Some(mask) => {
                // Sized from b's own entry count.
                let perm_b = mask_by_indices(&b_ai, mask);
                gather(&b_ai, &b_ax, &perm_b)
            }
            None => (b_ai, b_ax),
        };

        // Empty inputs short-circuit: both empty clears the block, one
        // empty copies the other through the mask.
        let (out_ai, out_ax) = if a_ai.is_empty() && b_ai.is_empty() {
            (Vec::new(), Vec::new())
        } else if a_ai.is_empty() {
            (b_ai, b_ax)
        } else if b_ai.is_empty() {
            (a_ai, a_ax)
        } else {
            let mut out_ai = Vec::with_capacity(a_ai.len() + b_ai.len());
            let mut out_ax = Vec::with_capacity(a_ai.len() + b_ai.len());
            let (mut i, mut j) = (0usize, 0usize);
            while i < a_ai.len() && j < b_ai.len() {
                if a_ai[i] < b_ai[j] {
                    out_ai.push(a_ai[i]);
                    out_ax.push(a_ax[i]);
                    i += 1;
                } else if b_ai[j] < a_ai[i] {
                    out_ai.push(b_ai[j]);
                    out_ax.push(b_ax[j]);
                    j += 1;
                } else {
                    out_ai.push(a_ai[i]);
                    out_ax.push(t.op.apply(a_ax[i], b_ax[j]));
                    i += 1;
                    j += 1;
                }
            }
            out_ai.extend_from_slice(&a_ai[i..]);
            out_ax.extend_from_slice(&a_ax[i..]);
            out_ai.extend_from_slice(&b_ai[j..]);
            out_ax.extend_from_slice(&b_ax[j..]);
            (out_ai, out_ax)
        };

        let mgr = t.w.manager();
        let mut wb = t.w.blocks()[block].write();
        mgr.validate_wd(VectorFormat::CpuCoo.index(), &mut wb);
        {
            let coo = wb.coo_mut()?;
            coo.ai = out_ai;
            coo.ax = out_ax;
        }
        mgr.commit(VectorFormat::CpuCoo.index(), &mut wb);
        Ok(())
    }
}
