//! Vector block bundle and its conversion rules

use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::format::{CooVec, DenseVec, FormatSet, VectorFormat};
use crate::runtime::ExecCtx;

use super::manager::{ConversionRule, FormatBundle, StorageManager};

#[cfg(feature = "wgpu")]
use crate::runtime::wgpu::{AccCooVec, AccDenseVec};

/// Storage bundle of one vector block
///
/// Holds zero or more representations of the block's entries, each slot
/// flagged valid or stale through the bitmask.
pub struct VectorBundle<T: Element> {
    /// Block length
    pub len: usize,
    /// Global index of the block's first position
    pub offset: usize,
    /// Value of absent positions
    pub fill: T,
    /// Host coordinate list
    pub coo: Option<CooVec<T>>,
    /// Host dense array
    pub dense: Option<DenseVec<T>>,
    /// Accelerator coordinate mirror
    #[cfg(feature = "wgpu")]
    pub acc_coo: Option<AccCooVec>,
    /// Accelerator dense mirror
    #[cfg(feature = "wgpu")]
    pub acc_dense: Option<AccDenseVec>,
    valid: FormatSet,
}

impl<T: Element> VectorBundle<T> {
    /// Empty bundle for a block of `len` positions starting at `offset`
    pub fn new(len: usize, offset: usize, fill: T) -> Self {
        Self {
            len,
            offset,
            fill,
            coo: None,
            dense: None,
            #[cfg(feature = "wgpu")]
            acc_coo: None,
            #[cfg(feature = "wgpu")]
            acc_dense: None,
            valid: FormatSet::EMPTY,
        }
    }

    /// Whether `format` is currently valid
    #[inline]
    pub fn is_valid(&self, format: VectorFormat) -> bool {
        self.valid.contains(format.index())
    }

    /// Logical entry count, read from any valid host format
    pub fn nnz(&self) -> usize {
        if self.is_valid(VectorFormat::CpuCoo) {
            if let Some(coo) = &self.coo {
                return coo.nnz();
            }
        }
        if self.is_valid(VectorFormat::CpuDense) {
            if let Some(dense) = &self.dense {
                return dense.ax.iter().filter(|&&x| x != self.fill).count();
            }
        }
        0
    }

    /// Valid host coordinate list
    pub fn coo(&self) -> Result<&CooVec<T>> {
        self.coo
            .as_ref()
            .ok_or_else(|| Error::invalid_state("coo format not materialized"))
    }

    /// Mutable host coordinate list
    pub fn coo_mut(&mut self) -> Result<&mut CooVec<T>> {
        self.coo
            .as_mut()
            .ok_or_else(|| Error::invalid_state("coo format not materialized"))
    }

    /// Valid host dense array
    pub fn dense(&self) -> Result<&DenseVec<T>> {
        self.dense
            .as_ref()
            .ok_or_else(|| Error::invalid_state("dense format not materialized"))
    }

    /// Mutable host dense array
    pub fn dense_mut(&mut self) -> Result<&mut DenseVec<T>> {
        self.dense
            .as_mut()
            .ok_or_else(|| Error::invalid_state("dense format not materialized"))
    }

    /// Valid accelerator coordinate mirror
    #[cfg(feature = "wgpu")]
    pub fn acc_coo(&self) -> Result<&AccCooVec> {
        self.acc_coo
            .as_ref()
            .ok_or_else(|| Error::invalid_state("acc coo format not materialized"))
    }

    /// Valid accelerator dense mirror
    #[cfg(feature = "wgpu")]
    pub fn acc_dense(&self) -> Result<&AccDenseVec> {
        self.acc_dense
            .as_ref()
            .ok_or_else(|| Error::invalid_state("acc dense format not materialized"))
    }
}

impl<T: Element> FormatBundle for VectorBundle<T> {
    fn n_formats(&self) -> usize {
        VectorFormat::COUNT
    }

    fn valid(&self) -> FormatSet {
        self.valid
    }

    fn set_valid(&mut self, valid: FormatSet) {
        self.valid = valid;
    }

    fn ensure_ctor(&mut self, index: usize) {
        match VectorFormat::ALL[index] {
            VectorFormat::CpuCoo => {
                self.coo.get_or_insert_with(CooVec::new);
            }
            VectorFormat::CpuDense => {
                let len = self.len;
                let fill = self.fill;
                self.dense.get_or_insert_with(|| DenseVec::filled(len, fill));
            }
            #[cfg(feature = "wgpu")]
            VectorFormat::AccCoo | VectorFormat::AccDense => {
                // Device buffers are sized at transfer time.
            }
            #[cfg(not(feature = "wgpu"))]
            VectorFormat::AccCoo | VectorFormat::AccDense => {}
        }
    }

    fn clear_format(&mut self, index: usize) {
        match VectorFormat::ALL[index] {
            VectorFormat::CpuCoo => {
                self.coo.get_or_insert_with(CooVec::new).clear();
            }
            VectorFormat::CpuDense => {
                let len = self.len;
                let fill = self.fill;
                self.dense
                    .get_or_insert_with(|| DenseVec::filled(len, fill))
                    .reset(len, fill);
            }
            #[cfg(feature = "wgpu")]
            VectorFormat::AccCoo => {
                self.acc_coo = None;
            }
            #[cfg(feature = "wgpu")]
            VectorFormat::AccDense => {
                self.acc_dense = None;
            }
            #[cfg(not(feature = "wgpu"))]
            VectorFormat::AccCoo | VectorFormat::AccDense => {}
        }
    }
}

fn vec_coo_to_dense<T: Element>(b: &mut VectorBundle<T>, _ctx: &ExecCtx<'_>) -> Result<()> {
    let dense = {
        let coo = b.coo()?;
        coo.to_dense(b.len, b.fill)
    };
    b.dense = Some(dense);
    Ok(())
}

fn vec_dense_to_coo<T: Element>(b: &mut VectorBundle<T>, _ctx: &ExecCtx<'_>) -> Result<()> {
    let coo = {
        let dense = b.dense()?;
        dense.to_coo(b.fill)
    };
    b.coo = Some(coo);
    Ok(())
}

/// Build the vector storage manager with every known conversion rule
///
/// Host edges are always present; accelerator edges are added when the
/// `wgpu` feature is compiled in and the element type has a nonzero byte
/// width. The host dense format is the canonical hub: cross-backend paths
/// route through it unless a direct edge exists.
pub fn vector_manager<T: Element>() -> StorageManager<VectorBundle<T>> {
    let mut mgr = StorageManager::new();

    mgr.register(ConversionRule {
        from: VectorFormat::CpuCoo.index(),
        to: VectorFormat::CpuDense.index(),
        cost: 2,
        requires_accel: false,
        run: vec_coo_to_dense::<T>,
    });
    mgr.register(ConversionRule {
        from: VectorFormat::CpuDense.index(),
        to: VectorFormat::CpuCoo.index(),
        cost: 3,
        requires_accel: false,
        run: vec_dense_to_coo::<T>,
    });

    #[cfg(feature = "wgpu")]
    crate::runtime::wgpu::register_vector_rules(&mut mgr);

    mgr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Library;

    fn bundle_with_entries() -> VectorBundle<i32> {
        let mut b = VectorBundle::new(5, 0, 0);
        b.clear_format(VectorFormat::CpuCoo.index());
        let coo = b.coo.as_mut().unwrap();
        coo.set_pairs(&[1, 3], &[10, 30], None, true, true);
        b.set_valid(FormatSet::only(VectorFormat::CpuCoo.index()));
        b
    }

    #[test]
    fn test_validate_rw_converts_and_preserves_source() {
        let lib = Library::new();
        let ctx = ExecCtx::direct(&lib);
        let mgr = vector_manager::<i32>();
        let mut b = bundle_with_entries();

        mgr.validate_rw(VectorFormat::CpuDense.index(), &mut b, &ctx)
            .unwrap();
        assert!(b.is_valid(VectorFormat::CpuDense));
        assert!(b.is_valid(VectorFormat::CpuCoo));
        assert_eq!(b.dense().unwrap().ax, vec![0, 10, 0, 30, 0]);
    }

    #[test]
    fn test_validate_rw_idempotent() {
        let lib = Library::new();
        let ctx = ExecCtx::direct(&lib);
        let mgr = vector_manager::<i32>();
        let mut b = bundle_with_entries();

        mgr.validate_rw(VectorFormat::CpuDense.index(), &mut b, &ctx)
            .unwrap();
        let after_first = mgr.conversions();
        mgr.validate_rw(VectorFormat::CpuDense.index(), &mut b, &ctx)
            .unwrap();
        assert_eq!(mgr.conversions(), after_first);
    }

    #[test]
    fn test_validate_rwd_exactly_one_valid_and_empty() {
        let mgr = vector_manager::<i32>();
        let mut b = bundle_with_entries();

        mgr.validate_rwd(VectorFormat::CpuDense.index(), &mut b);
        assert!(b.is_valid(VectorFormat::CpuDense));
        assert!(!b.is_valid(VectorFormat::CpuCoo));
        assert_eq!(b.valid(), FormatSet::only(VectorFormat::CpuDense.index()));
        assert_eq!(b.dense().unwrap().ax, vec![0; 5]);
    }

    #[test]
    fn test_validate_rwd_idempotent_keeps_content() {
        let mgr = vector_manager::<i32>();
        let mut b = VectorBundle::new(3, 0, 0);
        mgr.validate_rwd(VectorFormat::CpuDense.index(), &mut b);
        b.dense_mut().unwrap().ax[1] = 7;
        mgr.validate_rwd(VectorFormat::CpuDense.index(), &mut b);
        assert_eq!(b.dense().unwrap().ax, vec![0, 7, 0]);
    }

    #[test]
    fn test_commit_invalidates_others() {
        let lib = Library::new();
        let ctx = ExecCtx::direct(&lib);
        let mgr = vector_manager::<i32>();
        let mut b = bundle_with_entries();

        mgr.validate_rw(VectorFormat::CpuDense.index(), &mut b, &ctx)
            .unwrap();
        b.dense_mut().unwrap().ax[0] = 99;
        mgr.commit(VectorFormat::CpuDense.index(), &mut b);
        assert!(b.is_valid(VectorFormat::CpuDense));
        assert!(!b.is_valid(VectorFormat::CpuCoo));
    }

    #[test]
    fn test_empty_object_validates_empty() {
        let lib = Library::new();
        let ctx = ExecCtx::direct(&lib);
        let mgr = vector_manager::<f32>();
        let mut b = VectorBundle::<f32>::new(4, 0, 0.0);

        mgr.validate_rw(VectorFormat::CpuCoo.index(), &mut b, &ctx)
            .unwrap();
        assert!(b.is_valid(VectorFormat::CpuCoo));
        assert_eq!(b.coo().unwrap().nnz(), 0);
    }

    #[test]
    fn test_nonzero_fill_dense_round_trip() {
        let lib = Library::new();
        let ctx = ExecCtx::direct(&lib);
        let mgr = vector_manager::<f32>();
        let mut b = VectorBundle::new(4, 0, -1.0f32);
        b.clear_format(VectorFormat::CpuCoo.index());
        b.coo.as_mut().unwrap().set_pairs(&[2], &[5.0], None, true, true);
        b.set_valid(FormatSet::only(VectorFormat::CpuCoo.index()));

        mgr.validate_rw(VectorFormat::CpuDense.index(), &mut b, &ctx)
            .unwrap();
        assert_eq!(b.dense().unwrap().ax, vec![-1.0, -1.0, 5.0, -1.0]);

        mgr.commit(VectorFormat::CpuDense.index(), &mut b);
        mgr.validate_rw(VectorFormat::CpuCoo.index(), &mut b, &ctx)
            .unwrap();
        assert_eq!(b.coo().unwrap().ai, vec![2]);
        assert_eq!(b.coo().unwrap().ax, vec![5.0]);
    }
}
