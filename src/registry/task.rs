//! Per-operation task payloads
//!
//! A task carries everything one scheduled operation needs: operand
//! handles, operators, and the descriptor. Tasks are built by the
//! expression layer, validated once at node-creation time, and handed to
//! the selected kernel once per result block.

use crate::desc::Descriptor;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::matrix::Matrix;
use crate::op::{BinaryOp, SelectOp, UnaryOp};
use crate::scalar::Scalar;
use crate::vector::Vector;

/// Operation kinds known to the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Masked vector-matrix product
    VxmMasked,
    /// Masked vector assign
    VAssignMasked,
    /// Masked element-wise vector add
    VEwiseAdd,
    /// Element-wise unary map over stored entries
    VMap,
    /// Fold of stored entries into a scalar
    VReduce,
}

/// `r <- mask (.) (v x M)` over the `(op_add, op_multiply)` semiring
pub struct TaskVxmMasked<T: Element> {
    /// Result vector of dimension `M.n_cols`
    pub r: Vector<T>,
    /// Mask over result positions
    pub mask: Vector<T>,
    /// Source vector of dimension `M.n_rows`
    pub v: Vector<T>,
    /// Matrix operand
    pub m: Matrix<T>,
    /// Multiply-like operator
    pub op_multiply: BinaryOp<T>,
    /// Add-like operator
    pub op_add: BinaryOp<T>,
    /// Mask predicate
    pub op_select: SelectOp<T>,
    /// Initial value of every selected accumulator and the fill of `r`
    pub init: Scalar<T>,
    /// Hints
    pub desc: Descriptor,
}

/// `r[i] <- op_assign(r[i], value)` where `op_select(mask[i])`
pub struct TaskVAssignMasked<T: Element> {
    /// Target vector
    pub r: Vector<T>,
    /// Mask over target positions
    pub mask: Vector<T>,
    /// Assigned value
    pub value: Scalar<T>,
    /// Combines the current entry with the value
    pub op_assign: BinaryOp<T>,
    /// Mask predicate
    pub op_select: SelectOp<T>,
    /// Hints
    pub desc: Descriptor,
}

/// `w <- mask (.) (a (+) b)` by sorted merge
pub struct TaskVEwiseAdd<T: Element> {
    /// Result vector
    pub w: Vector<T>,
    /// Optional mask filtering both inputs
    pub mask: Option<Vector<T>>,
    /// Collision operator
    pub op: BinaryOp<T>,
    /// Left input
    pub a: Vector<T>,
    /// Right input
    pub b: Vector<T>,
    /// Hints
    pub desc: Descriptor,
}

/// `r[i] <- op(v[i])` over stored entries
pub struct TaskVMap<T: Element> {
    /// Result vector
    pub r: Vector<T>,
    /// Input vector
    pub v: Vector<T>,
    /// Applied operator
    pub op: UnaryOp<T>,
    /// Hints
    pub desc: Descriptor,
}

/// `s <- fold(op, init, stored entries of v)`
pub struct TaskVReduce<T: Element> {
    /// Result cell
    pub s: Scalar<T>,
    /// Fold start value
    pub init: Scalar<T>,
    /// Input vector
    pub v: Vector<T>,
    /// Fold operator
    pub op: BinaryOp<T>,
    /// Hints
    pub desc: Descriptor,
}

/// Type-erased operation payload dispatched through the kernel registry
pub enum Task<T: Element> {
    /// Masked vector-matrix product
    VxmMasked(TaskVxmMasked<T>),
    /// Masked vector assign
    VAssignMasked(TaskVAssignMasked<T>),
    /// Masked element-wise add
    VEwiseAdd(TaskVEwiseAdd<T>),
    /// Unary map
    VMap(TaskVMap<T>),
    /// Reduction to scalar
    VReduce(TaskVReduce<T>),
}

impl<T: Element> Task<T> {
    /// Operation kind tag
    pub fn kind(&self) -> OpKind {
        match self {
            Task::VxmMasked(_) => OpKind::VxmMasked,
            Task::VAssignMasked(_) => OpKind::VAssignMasked,
            Task::VEwiseAdd(_) => OpKind::VEwiseAdd,
            Task::VMap(_) => OpKind::VMap,
            Task::VReduce(_) => OpKind::VReduce,
        }
    }

    /// Number of per-block sub-tasks this operation expands into
    ///
    /// One per result block; reductions expand coarsely into a single
    /// sub-task.
    pub fn n_blocks(&self) -> usize {
        match self {
            Task::VxmMasked(t) => t.r.grid().n_blocks(),
            Task::VAssignMasked(t) => t.r.grid().n_blocks(),
            Task::VEwiseAdd(t) => t.w.grid().n_blocks(),
            Task::VMap(t) => t.r.grid().n_blocks(),
            Task::VReduce(_) => 1,
        }
    }

    /// Shape and operand checks, run once when the node is built
    pub fn validate(&self) -> Result<()> {
        match self {
            Task::VxmMasked(t) => {
                if t.v.n_rows() != t.m.n_rows() {
                    return Err(Error::shape_mismatch(t.m.n_rows(), t.v.n_rows()));
                }
                if t.r.n_rows() != t.m.n_cols() {
                    return Err(Error::shape_mismatch(t.m.n_cols(), t.r.n_rows()));
                }
                if t.mask.n_rows() != t.r.n_rows() {
                    return Err(Error::shape_mismatch(t.r.n_rows(), t.mask.n_rows()));
                }
                Ok(())
            }
            Task::VAssignMasked(t) => {
                if t.mask.n_rows() != t.r.n_rows() {
                    return Err(Error::shape_mismatch(t.r.n_rows(), t.mask.n_rows()));
                }
                Ok(())
            }
            Task::VEwiseAdd(t) => {
                if t.a.n_rows() != t.w.n_rows() {
                    return Err(Error::shape_mismatch(t.w.n_rows(), t.a.n_rows()));
                }
                if t.b.n_rows() != t.w.n_rows() {
                    return Err(Error::shape_mismatch(t.w.n_rows(), t.b.n_rows()));
                }
                if let Some(mask) = &t.mask {
                    if mask.n_rows() != t.w.n_rows() {
                        return Err(Error::shape_mismatch(t.w.n_rows(), mask.n_rows()));
                    }
                }
                Ok(())
            }
            Task::VMap(t) => {
                if t.v.n_rows() != t.r.n_rows() {
                    return Err(Error::shape_mismatch(t.r.n_rows(), t.v.n_rows()));
                }
                Ok(())
            }
            Task::VReduce(_) => Ok(()),
        }
    }

    /// Mark the result object's storage stale after a failed sub-task so
    /// that later operations re-validate instead of reading torn state
    pub fn invalidate_result(&self) {
        let invalidate_vector = |v: &Vector<T>| {
            let mgr = v.manager();
            for block in v.blocks() {
                mgr.invalidate(&mut block.write());
            }
        };
        match self {
            Task::VxmMasked(t) => invalidate_vector(&t.r),
            Task::VAssignMasked(t) => invalidate_vector(&t.r),
            Task::VEwiseAdd(t) => invalidate_vector(&t.w),
            Task::VMap(t) => invalidate_vector(&t.r),
            Task::VReduce(_) => {}
        }
    }
}
