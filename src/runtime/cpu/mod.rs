//! Host kernel implementations
//!
//! Every operation has at least one host implementation, so a library
//! without an accelerator is fully functional. Kernels snapshot the
//! operand blocks they need (validating formats through the storage
//! manager first) and only then take the result block's write lock: the
//! copy keeps sub-tasks deadlock-free and makes self-aliasing operands
//! (e.g. a vector masked by itself) read their pre-mutation values.

mod assign;
mod ewise;
mod map_reduce;
mod vxm;

pub use assign::VAssignMaskedCpu;
pub use ewise::VEwiseAddCpu;
pub use map_reduce::{VMapCpu, VReduceCpu};
pub use vxm::{VxmMaskedDenseCpu, VxmMaskedSparseCpu};

use std::sync::Arc;

use crate::dtype::Element;
use crate::error::Result;
use crate::format::{CsrMat, MatrixFormat, VectorFormat};
use crate::matrix::Matrix;
use crate::registry::{KernelRegistry, OpKind};
use crate::runtime::ExecCtx;
use crate::vector::Vector;

/// Register the default host kernels for one element type
pub fn register_defaults<T: Element>(reg: &KernelRegistry<T>) {
    reg.register(OpKind::VxmMasked, Arc::new(VxmMaskedSparseCpu));
    reg.register(OpKind::VxmMasked, Arc::new(VxmMaskedDenseCpu));
    reg.register(OpKind::VAssignMasked, Arc::new(VAssignMaskedCpu));
    reg.register(OpKind::VEwiseAdd, Arc::new(VEwiseAddCpu));
    reg.register(OpKind::VMap, Arc::new(VMapCpu));
    reg.register(OpKind::VReduce, Arc::new(VReduceCpu));
}

/// Dense snapshot of one vector block: values plus the block fill
pub(crate) fn snapshot_vec_dense<T: Element>(
    v: &Vector<T>,
    block: usize,
    ctx: &ExecCtx<'_>,
) -> Result<(Vec<T>, T)> {
    let mgr = v.manager();
    let mut b = v.blocks()[block].write();
    mgr.validate_rw(VectorFormat::CpuDense.index(), &mut b, ctx)?;
    Ok((b.dense()?.ax.clone(), b.fill))
}

/// Coordinate snapshot of one vector block
pub(crate) fn snapshot_vec_coo<T: Element>(
    v: &Vector<T>,
    block: usize,
    ctx: &ExecCtx<'_>,
) -> Result<(Vec<u32>, Vec<T>)> {
    let mgr = v.manager();
    let mut b = v.blocks()[block].write();
    mgr.validate_rw(VectorFormat::CpuCoo.index(), &mut b, ctx)?;
    let coo = b.coo()?;
    Ok((coo.ai.clone(), coo.ax.clone()))
}

/// Compressed-row snapshot of one matrix block
pub(crate) fn snapshot_mat_csr<T: Element>(
    m: &Matrix<T>,
    bi: usize,
    bj: usize,
    ctx: &ExecCtx<'_>,
) -> Result<CsrMat<T>> {
    let mgr = m.manager();
    let mut b = m.block(bi, bj).write();
    mgr.validate_rw(MatrixFormat::CpuCsr.index(), &mut b, ctx)?;
    Ok(b.csr()?.clone())
}

/// Conversion count contribution of requiring `format` on a vector
pub(crate) fn vec_conversions<T: Element>(v: &Vector<T>, format: VectorFormat) -> u32 {
    u32::from(!v.is_format_valid(format))
}

/// Conversion count contribution of requiring `format` on a matrix
pub(crate) fn mat_conversions<T: Element>(m: &Matrix<T>, format: MatrixFormat) -> u32 {
    u32::from(!m.is_format_valid(format))
}
