//! Host/accelerator transfer rules
//!
//! Cross-backend transitions: uploads mirror a valid host container into
//! device buffers, downloads rebuild the host container from the mirror.
//! Both directions route through the canonical host format of the object
//! kind (dense for vectors, CSR/COO for matrices), so any other path is
//! composed by the storage manager.

use std::sync::Arc;

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::format::{CooMat, CooVec, CsrMat, DenseVec, MatrixFormat, VectorFormat};
use crate::runtime::ExecCtx;
use crate::storage::{ConversionRule, MatrixBundle, StorageManager, VectorBundle};

use super::buffers::{AccCooMat, AccCooVec, AccCsrMat, AccDenseVec};
use super::AccelContext;

fn accel<'a>(ctx: &ExecCtx<'a>) -> Result<&'a AccelContext> {
    ctx.accel()
        .ok_or_else(|| Error::Device("accelerator not initialized".into()))
}

fn vec_dense_upload<T: Element>(b: &mut VectorBundle<T>, ctx: &ExecCtx<'_>) -> Result<()> {
    let acc = accel(ctx)?;
    let dense = b.dense()?;
    let buffer = acc.create_storage_with_data("vec dense", &dense.ax);
    b.acc_dense = Some(AccDenseVec {
        ax: Arc::new(buffer),
        len: b.len,
    });
    Ok(())
}

fn vec_dense_download<T: Element>(b: &mut VectorBundle<T>, ctx: &ExecCtx<'_>) -> Result<()> {
    let acc = accel(ctx)?;
    let mirror = b.acc_dense()?.clone();
    let mut ax = vec![T::zero(); mirror.len];
    acc.read_buffer(&mirror.ax, &mut ax)?;
    b.dense = Some(DenseVec { ax });
    Ok(())
}

fn vec_coo_upload<T: Element>(b: &mut VectorBundle<T>, ctx: &ExecCtx<'_>) -> Result<()> {
    let acc = accel(ctx)?;
    let coo = b.coo()?;
    let ai = acc.create_storage_with_data("vec coo indices", &coo.ai);
    let ax = acc.create_storage_with_data("vec coo values", &coo.ax);
    b.acc_coo = Some(AccCooVec {
        ai: Arc::new(ai),
        ax: Arc::new(ax),
        nnz: coo.nnz(),
    });
    Ok(())
}

fn vec_coo_download<T: Element>(b: &mut VectorBundle<T>, ctx: &ExecCtx<'_>) -> Result<()> {
    let acc = accel(ctx)?;
    let mirror = b.acc_coo()?.clone();
    let mut ai = vec![0u32; mirror.nnz];
    let mut ax = vec![T::zero(); mirror.nnz];
    acc.read_buffer(&mirror.ai, &mut ai)?;
    acc.read_buffer(&mirror.ax, &mut ax)?;
    b.coo = Some(CooVec { ai, ax });
    Ok(())
}

/// Register the accelerator edges of the vector conversion graph
pub fn register_vector_rules<T: Element>(mgr: &mut StorageManager<VectorBundle<T>>) {
    if std::mem::size_of::<T>() == 0 {
        return;
    }
    mgr.register(ConversionRule {
        from: VectorFormat::CpuDense.index(),
        to: VectorFormat::AccDense.index(),
        cost: 4,
        requires_accel: true,
        run: vec_dense_upload::<T>,
    });
    mgr.register(ConversionRule {
        from: VectorFormat::AccDense.index(),
        to: VectorFormat::CpuDense.index(),
        cost: 4,
        requires_accel: true,
        run: vec_dense_download::<T>,
    });
    mgr.register(ConversionRule {
        from: VectorFormat::CpuCoo.index(),
        to: VectorFormat::AccCoo.index(),
        cost: 4,
        requires_accel: true,
        run: vec_coo_upload::<T>,
    });
    mgr.register(ConversionRule {
        from: VectorFormat::AccCoo.index(),
        to: VectorFormat::CpuCoo.index(),
        cost: 4,
        requires_accel: true,
        run: vec_coo_download::<T>,
    });
}

fn mat_csr_upload<T: Element>(b: &mut MatrixBundle<T>, ctx: &ExecCtx<'_>) -> Result<()> {
    let acc = accel(ctx)?;
    let csr = b.csr()?;
    let ap = acc.create_storage_with_data("mat csr row pointers", &csr.ap);
    let aj = acc.create_storage_with_data("mat csr col indices", &csr.aj);
    let ax = acc.create_storage_with_data("mat csr values", &csr.ax);
    b.acc_csr = Some(AccCsrMat {
        ap: Arc::new(ap),
        aj: Arc::new(aj),
        ax: Arc::new(ax),
        nnz: csr.nnz(),
    });
    Ok(())
}

fn mat_csr_download<T: Element>(b: &mut MatrixBundle<T>, ctx: &ExecCtx<'_>) -> Result<()> {
    let acc = accel(ctx)?;
    let mirror = b.acc_csr()?.clone();
    let mut ap = vec![0u32; b.n_rows + 1];
    let mut aj = vec![0u32; mirror.nnz];
    let mut ax = vec![T::zero(); mirror.nnz];
    acc.read_buffer(&mirror.ap, &mut ap)?;
    acc.read_buffer(&mirror.aj, &mut aj)?;
    acc.read_buffer(&mirror.ax, &mut ax)?;
    b.csr = Some(CsrMat { ap, aj, ax });
    Ok(())
}

fn mat_coo_upload<T: Element>(b: &mut MatrixBundle<T>, ctx: &ExecCtx<'_>) -> Result<()> {
    let acc = accel(ctx)?;
    let coo = b.coo()?;
    let ai = acc.create_storage_with_data("mat coo row indices", &coo.ai);
    let aj = acc.create_storage_with_data("mat coo col indices", &coo.aj);
    let ax = acc.create_storage_with_data("mat coo values", &coo.ax);
    b.acc_coo = Some(AccCooMat {
        ai: Arc::new(ai),
        aj: Arc::new(aj),
        ax: Arc::new(ax),
        nnz: coo.nnz(),
    });
    Ok(())
}

fn mat_coo_download<T: Element>(b: &mut MatrixBundle<T>, ctx: &ExecCtx<'_>) -> Result<()> {
    let acc = accel(ctx)?;
    let mirror = b
        .acc_coo
        .as_ref()
        .ok_or_else(|| Error::invalid_state("acc coo format not materialized"))?
        .clone();
    let mut ai = vec![0u32; mirror.nnz];
    let mut aj = vec![0u32; mirror.nnz];
    let mut ax = vec![T::zero(); mirror.nnz];
    acc.read_buffer(&mirror.ai, &mut ai)?;
    acc.read_buffer(&mirror.aj, &mut aj)?;
    acc.read_buffer(&mirror.ax, &mut ax)?;
    b.coo = Some(CooMat { ai, aj, ax });
    Ok(())
}

/// Register the accelerator edges of the matrix conversion graph
pub fn register_matrix_rules<T: Element>(mgr: &mut StorageManager<MatrixBundle<T>>) {
    if std::mem::size_of::<T>() == 0 {
        return;
    }
    mgr.register(ConversionRule {
        from: MatrixFormat::CpuCsr.index(),
        to: MatrixFormat::AccCsr.index(),
        cost: 4,
        requires_accel: true,
        run: mat_csr_upload::<T>,
    });
    mgr.register(ConversionRule {
        from: MatrixFormat::AccCsr.index(),
        to: MatrixFormat::CpuCsr.index(),
        cost: 4,
        requires_accel: true,
        run: mat_csr_download::<T>,
    });
    mgr.register(ConversionRule {
        from: MatrixFormat::CpuCoo.index(),
        to: MatrixFormat::AccCoo.index(),
        cost: 4,
        requires_accel: true,
        run: mat_coo_upload::<T>,
    });
    mgr.register(ConversionRule {
        from: MatrixFormat::AccCoo.index(),
        to: MatrixFormat::CpuCoo.index(),
        cost: 4,
        requires_accel: true,
        run: mat_coo_download::<T>,
    });
}
