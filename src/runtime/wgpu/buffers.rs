//! Accelerator mirrors of the host storage formats
//!
//! Pure buffer holders; transfers live in the conversion rules and the
//! context helpers. Buffers are `Arc`'d so kernels can snapshot a handle
//! without holding the block lock.

use std::sync::Arc;

use wgpu::Buffer;

/// Dense vector mirror
#[derive(Clone)]
pub struct AccDenseVec {
    /// Values, one element per position
    pub ax: Arc<Buffer>,
    /// Block length in elements
    pub len: usize,
}

/// Coordinate vector mirror
#[derive(Clone)]
pub struct AccCooVec {
    /// Entry indices
    pub ai: Arc<Buffer>,
    /// Entry values
    pub ax: Arc<Buffer>,
    /// Logical entry count
    pub nnz: usize,
}

/// Coordinate matrix mirror
#[derive(Clone)]
pub struct AccCooMat {
    /// Row indices
    pub ai: Arc<Buffer>,
    /// Column indices
    pub aj: Arc<Buffer>,
    /// Values
    pub ax: Arc<Buffer>,
    /// Logical entry count
    pub nnz: usize,
}

/// Compressed-row matrix mirror
#[derive(Clone)]
pub struct AccCsrMat {
    /// Row pointers, `n_rows + 1` entries
    pub ap: Arc<Buffer>,
    /// Column indices
    pub aj: Arc<Buffer>,
    /// Values
    pub ax: Arc<Buffer>,
    /// Logical entry count
    pub nnz: usize,
}

impl std::fmt::Debug for AccDenseVec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccDenseVec").field("len", &self.len).finish()
    }
}

impl std::fmt::Debug for AccCooVec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccCooVec").field("nnz", &self.nnz).finish()
    }
}

impl std::fmt::Debug for AccCooMat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccCooMat").field("nnz", &self.nnz).finish()
    }
}

impl std::fmt::Debug for AccCsrMat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccCsrMat").field("nnz", &self.nnz).finish()
    }
}
