//! Matrix block bundle and its conversion rules

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::format::{CooMat, CsrMat, DokMat, FormatSet, LilMat, MatrixFormat};
use crate::runtime::ExecCtx;

use super::manager::{ConversionRule, FormatBundle, StorageManager};

#[cfg(feature = "wgpu")]
use crate::runtime::wgpu::{AccCooMat, AccCsrMat};

/// Storage bundle of one matrix block
pub struct MatrixBundle<T: Element> {
    /// Block row count
    pub n_rows: usize,
    /// Block column count
    pub n_cols: usize,
    /// Global index of the block's first row
    pub row_offset: usize,
    /// Global index of the block's first column
    pub col_offset: usize,
    /// Value of absent positions
    pub fill: T,
    /// Host list-of-lists accumulator
    pub lil: Option<LilMat<T>>,
    /// Host dictionary-of-keys
    pub dok: Option<DokMat<T>>,
    /// Host coordinate triples
    pub coo: Option<CooMat<T>>,
    /// Host compressed rows
    pub csr: Option<CsrMat<T>>,
    /// Accelerator coordinate mirror
    #[cfg(feature = "wgpu")]
    pub acc_coo: Option<AccCooMat>,
    /// Accelerator compressed-row mirror
    #[cfg(feature = "wgpu")]
    pub acc_csr: Option<AccCsrMat>,
    valid: FormatSet,
}

impl<T: Element> MatrixBundle<T> {
    /// Empty bundle for an `n_rows x n_cols` block at the given offsets
    pub fn new(n_rows: usize, n_cols: usize, row_offset: usize, col_offset: usize, fill: T) -> Self {
        Self {
            n_rows,
            n_cols,
            row_offset,
            col_offset,
            fill,
            lil: None,
            dok: None,
            coo: None,
            csr: None,
            #[cfg(feature = "wgpu")]
            acc_coo: None,
            #[cfg(feature = "wgpu")]
            acc_csr: None,
            valid: FormatSet::EMPTY,
        }
    }

    /// Whether `format` is currently valid
    #[inline]
    pub fn is_valid(&self, format: MatrixFormat) -> bool {
        self.valid.contains(format.index())
    }

    /// Logical entry count, read from any valid host format
    pub fn nnz(&self) -> usize {
        if self.is_valid(MatrixFormat::CpuCoo) {
            if let Some(coo) = &self.coo {
                return coo.nnz();
            }
        }
        if self.is_valid(MatrixFormat::CpuCsr) {
            if let Some(csr) = &self.csr {
                return csr.nnz();
            }
        }
        if self.is_valid(MatrixFormat::CpuDok) {
            if let Some(dok) = &self.dok {
                return dok.nnz();
            }
        }
        if self.is_valid(MatrixFormat::CpuLil) {
            if let Some(lil) = &self.lil {
                return lil.nnz();
            }
        }
        0
    }

    /// Valid host accumulator
    pub fn lil(&self) -> Result<&LilMat<T>> {
        self.lil
            .as_ref()
            .ok_or_else(|| Error::invalid_state("lil format not materialized"))
    }

    /// Mutable host accumulator
    pub fn lil_mut(&mut self) -> Result<&mut LilMat<T>> {
        self.lil
            .as_mut()
            .ok_or_else(|| Error::invalid_state("lil format not materialized"))
    }

    /// Valid host dictionary
    pub fn dok(&self) -> Result<&DokMat<T>> {
        self.dok
            .as_ref()
            .ok_or_else(|| Error::invalid_state("dok format not materialized"))
    }

    /// Mutable host dictionary
    pub fn dok_mut(&mut self) -> Result<&mut DokMat<T>> {
        self.dok
            .as_mut()
            .ok_or_else(|| Error::invalid_state("dok format not materialized"))
    }

    /// Valid host triples
    pub fn coo(&self) -> Result<&CooMat<T>> {
        self.coo
            .as_ref()
            .ok_or_else(|| Error::invalid_state("coo format not materialized"))
    }

    /// Mutable host triples
    pub fn coo_mut(&mut self) -> Result<&mut CooMat<T>> {
        self.coo
            .as_mut()
            .ok_or_else(|| Error::invalid_state("coo format not materialized"))
    }

    /// Valid host compressed rows
    pub fn csr(&self) -> Result<&CsrMat<T>> {
        self.csr
            .as_ref()
            .ok_or_else(|| Error::invalid_state("csr format not materialized"))
    }

    /// Valid accelerator compressed-row mirror
    #[cfg(feature = "wgpu")]
    pub fn acc_csr(&self) -> Result<&AccCsrMat> {
        self.acc_csr
            .as_ref()
            .ok_or_else(|| Error::invalid_state("acc csr format not materialized"))
    }
}

impl<T: Element> FormatBundle for MatrixBundle<T> {
    fn n_formats(&self) -> usize {
        MatrixFormat::COUNT
    }

    fn valid(&self) -> FormatSet {
        self.valid
    }

    fn set_valid(&mut self, valid: FormatSet) {
        self.valid = valid;
    }

    fn ensure_ctor(&mut self, index: usize) {
        match MatrixFormat::ALL[index] {
            MatrixFormat::CpuLil => {
                let n_rows = self.n_rows;
                self.lil.get_or_insert_with(|| LilMat::with_rows(n_rows));
            }
            MatrixFormat::CpuDok => {
                self.dok.get_or_insert_with(DokMat::new);
            }
            MatrixFormat::CpuCoo => {
                self.coo.get_or_insert_with(CooMat::new);
            }
            MatrixFormat::CpuCsr => {
                let n_rows = self.n_rows;
                self.csr.get_or_insert_with(|| CsrMat::with_rows(n_rows));
            }
            #[cfg(feature = "wgpu")]
            MatrixFormat::AccCoo | MatrixFormat::AccCsr => {
                // Device buffers are sized at transfer time.
            }
            #[cfg(not(feature = "wgpu"))]
            MatrixFormat::AccCoo | MatrixFormat::AccCsr => {}
        }
    }

    fn clear_format(&mut self, index: usize) {
        self.ensure_ctor(index);
        match MatrixFormat::ALL[index] {
            MatrixFormat::CpuLil => {
                if let Some(lil) = &mut self.lil {
                    if lil.rows.len() != self.n_rows {
                        lil.rows.resize(self.n_rows, Vec::new());
                    }
                    lil.clear();
                }
            }
            MatrixFormat::CpuDok => {
                if let Some(dok) = &mut self.dok {
                    dok.clear();
                }
            }
            MatrixFormat::CpuCoo => {
                if let Some(coo) = &mut self.coo {
                    coo.clear();
                }
            }
            MatrixFormat::CpuCsr => {
                if let Some(csr) = &mut self.csr {
                    csr.ap.clear();
                    csr.ap.resize(self.n_rows + 1, 0);
                    csr.aj.clear();
                    csr.ax.clear();
                }
            }
            #[cfg(feature = "wgpu")]
            MatrixFormat::AccCoo => {
                self.acc_coo = None;
            }
            #[cfg(feature = "wgpu")]
            MatrixFormat::AccCsr => {
                self.acc_csr = None;
            }
            #[cfg(not(feature = "wgpu"))]
            MatrixFormat::AccCoo | MatrixFormat::AccCsr => {}
        }
    }
}

fn mat_lil_to_coo<T: Element>(b: &mut MatrixBundle<T>, _ctx: &ExecCtx<'_>) -> Result<()> {
    let coo = b.lil()?.to_coo();
    b.coo = Some(coo);
    Ok(())
}

fn mat_dok_to_coo<T: Element>(b: &mut MatrixBundle<T>, _ctx: &ExecCtx<'_>) -> Result<()> {
    let coo = b.dok()?.to_coo();
    b.coo = Some(coo);
    Ok(())
}

fn mat_coo_to_csr<T: Element>(b: &mut MatrixBundle<T>, _ctx: &ExecCtx<'_>) -> Result<()> {
    let csr = {
        let coo = b.coo()?;
        coo.to_csr(b.n_rows)
    };
    b.csr = Some(csr);
    Ok(())
}

fn mat_csr_to_coo<T: Element>(b: &mut MatrixBundle<T>, _ctx: &ExecCtx<'_>) -> Result<()> {
    let coo = b.csr()?.to_coo();
    b.coo = Some(coo);
    Ok(())
}

fn mat_coo_to_dok<T: Element>(b: &mut MatrixBundle<T>, _ctx: &ExecCtx<'_>) -> Result<()> {
    let entries = {
        let coo = b.coo()?;
        coo.ai
            .iter()
            .zip(coo.aj.iter())
            .zip(coo.ax.iter())
            .map(|((&r, &c), &x)| (r, c, x))
            .collect::<Vec<_>>()
    };
    let dok = b.dok.get_or_insert_with(DokMat::new);
    dok.clear();
    for (r, c, x) in entries {
        dok.add_element(r, c, x);
    }
    Ok(())
}

/// Build the matrix storage manager with every known conversion rule
///
/// LIL and DOK feed the COO hub; COO and CSR convert both ways. The host
/// CSR is the canonical device upload path (spec: build goes through LIL,
/// device kernels consume CSR).
pub fn matrix_manager<T: Element>() -> StorageManager<MatrixBundle<T>> {
    let mut mgr = StorageManager::new();

    mgr.register(ConversionRule {
        from: MatrixFormat::CpuLil.index(),
        to: MatrixFormat::CpuCoo.index(),
        cost: 2,
        requires_accel: false,
        run: mat_lil_to_coo::<T>,
    });
    mgr.register(ConversionRule {
        from: MatrixFormat::CpuDok.index(),
        to: MatrixFormat::CpuCoo.index(),
        cost: 2,
        requires_accel: false,
        run: mat_dok_to_coo::<T>,
    });
    mgr.register(ConversionRule {
        from: MatrixFormat::CpuCoo.index(),
        to: MatrixFormat::CpuCsr.index(),
        cost: 2,
        requires_accel: false,
        run: mat_coo_to_csr::<T>,
    });
    mgr.register(ConversionRule {
        from: MatrixFormat::CpuCsr.index(),
        to: MatrixFormat::CpuCoo.index(),
        cost: 1,
        requires_accel: false,
        run: mat_csr_to_coo::<T>,
    });
    mgr.register(ConversionRule {
        from: MatrixFormat::CpuCoo.index(),
        to: MatrixFormat::CpuDok.index(),
        cost: 2,
        requires_accel: false,
        run: mat_coo_to_dok::<T>,
    });

    #[cfg(feature = "wgpu")]
    crate::runtime::wgpu::register_matrix_rules(&mut mgr);

    mgr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Library;
    use crate::op;

    #[test]
    fn test_lil_build_to_csr_path() {
        let lib = Library::new();
        let ctx = ExecCtx::direct(&lib);
        let mgr = matrix_manager::<i32>();
        let mut b = MatrixBundle::new(2, 2, 0, 0, 0);

        mgr.validate_rwd(MatrixFormat::CpuLil.index(), &mut b);
        {
            let lil = b.lil_mut().unwrap();
            lil.reduce = Some(op::plus::<i32>());
            lil.add_element(0, 0, 1);
            lil.add_element(0, 0, 2);
            lil.add_element(1, 1, 3);
        }

        mgr.validate_rw(MatrixFormat::CpuCsr.index(), &mut b, &ctx)
            .unwrap();
        let csr = b.csr().unwrap();
        assert_eq!(csr.ap, vec![0, 1, 2]);
        assert_eq!(csr.aj, vec![0, 1]);
        assert_eq!(csr.ax, vec![3, 3]);
        // The intermediate hub was materialized along the path.
        assert!(b.is_valid(MatrixFormat::CpuCoo));
        assert!(b.is_valid(MatrixFormat::CpuLil));
    }

    #[test]
    fn test_point_query_via_dok() {
        let lib = Library::new();
        let ctx = ExecCtx::direct(&lib);
        let mgr = matrix_manager::<f32>();
        let mut b = MatrixBundle::new(3, 3, 0, 0, 0.0f32);

        mgr.validate_rwd(MatrixFormat::CpuCoo.index(), &mut b);
        {
            let coo = b.coo_mut().unwrap();
            coo.ai.extend([0, 2]);
            coo.aj.extend([1, 2]);
            coo.ax.extend([4.0, 9.0]);
        }

        mgr.validate_rw(MatrixFormat::CpuDok.index(), &mut b, &ctx)
            .unwrap();
        assert_eq!(b.dok().unwrap().get(0, 1), Some(4.0));
        assert_eq!(b.dok().unwrap().get(1, 1), None);
    }

    #[test]
    fn test_rwd_discards_other_formats() {
        let mgr = matrix_manager::<i32>();
        let mut b = MatrixBundle::new(2, 2, 0, 0, 0);

        mgr.validate_rwd(MatrixFormat::CpuCoo.index(), &mut b);
        b.coo_mut().unwrap().ai.push(0);
        b.coo_mut().unwrap().aj.push(0);
        b.coo_mut().unwrap().ax.push(5);

        mgr.validate_rwd(MatrixFormat::CpuLil.index(), &mut b);
        assert_eq!(b.valid(), FormatSet::only(MatrixFormat::CpuLil.index()));
        assert_eq!(b.lil().unwrap().nnz(), 0);
    }

    #[test]
    fn test_reduce_survives_clear() {
        let mgr = matrix_manager::<i32>();
        let mut b = MatrixBundle::new(2, 2, 0, 0, 0);

        mgr.validate_ctor(MatrixFormat::CpuLil.index(), &mut b);
        b.lil_mut().unwrap().reduce = Some(op::plus::<i32>());
        mgr.validate_rwd(MatrixFormat::CpuLil.index(), &mut b);
        assert!(b.lil().unwrap().reduce.is_some());
    }
}
