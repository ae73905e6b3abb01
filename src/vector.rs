//! Vector handle

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::format::VectorFormat;
use crate::grid::BlockGrid;
use crate::library::Library;
use crate::op::BinaryOp;
use crate::runtime::ExecCtx;
use crate::storage::{StorageManager, VectorBundle};

struct VectorInner<T: Element> {
    lib: Library,
    n_rows: usize,
    grid: BlockGrid,
    blocks: Vec<RwLock<VectorBundle<T>>>,
    reduce: Mutex<Option<BinaryOp<T>>>,
}

/// Sparse vector of dimension `n` over element type `T`
///
/// The handle is cheaply cloneable and shared between user code and
/// scheduled expression nodes. Data lives in a block grid of storage
/// bundles; each operation materializes the representation it needs
/// through the storage manager.
pub struct Vector<T: Element> {
    inner: Arc<VectorInner<T>>,
}

impl<T: Element> Clone for Vector<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Element> Vector<T> {
    /// Create an empty vector of dimension `n_rows` with fill value zero
    pub fn new(lib: &Library, n_rows: usize) -> Result<Self> {
        if n_rows > u32::MAX as usize {
            return Err(Error::invalid_argument(
                "n_rows",
                "dimension exceeds u32 index range",
            ));
        }
        let grid = BlockGrid::new(n_rows, lib.config().block_size);
        let blocks = (0..grid.n_blocks())
            .map(|i| RwLock::new(VectorBundle::new(grid.block_len(i), grid.offset(i), T::zero())))
            .collect();
        Ok(Self {
            inner: Arc::new(VectorInner {
                lib: lib.clone(),
                n_rows,
                grid,
                blocks,
                reduce: Mutex::new(None),
            }),
        })
    }

    /// Dimension
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.inner.n_rows
    }

    /// Element type tag
    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    /// Owning library
    pub fn library(&self) -> &Library {
        &self.inner.lib
    }

    pub(crate) fn grid(&self) -> &BlockGrid {
        &self.inner.grid
    }

    pub(crate) fn blocks(&self) -> &[RwLock<VectorBundle<T>>] {
        &self.inner.blocks
    }

    pub(crate) fn manager(&self) -> Arc<StorageManager<VectorBundle<T>>> {
        self.inner.lib.vector_manager::<T>()
    }

    /// Whether two handles refer to the same object
    pub fn same_object(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether `format` is valid on every block
    pub fn is_format_valid(&self, format: VectorFormat) -> bool {
        self.inner.blocks.iter().all(|b| b.read().is_valid(format))
    }

    /// Force-materialize `format` on every block
    pub fn set_format(&self, format: VectorFormat) -> Result<()> {
        let mgr = self.manager();
        let ctx = ExecCtx::direct(&self.inner.lib);
        for block in &self.inner.blocks {
            mgr.validate_rw(format.index(), &mut block.write(), &ctx)?;
        }
        Ok(())
    }

    /// Value of absent positions
    pub fn fill_value(&self) -> T {
        self.inner.blocks[0].read().fill
    }

    /// Change the fill value, marking all formats stale
    pub fn set_fill_value(&self, fill: T) {
        for block in &self.inner.blocks {
            let mut b = block.write();
            b.fill = fill;
            let mgr = self.manager();
            mgr.invalidate(&mut b);
        }
    }

    /// Register the operator folding duplicate indices during build
    pub fn set_reduce(&self, reduce: BinaryOp<T>) -> Result<()> {
        *self.inner.reduce.lock() = Some(reduce);
        Ok(())
    }

    /// Write one element
    ///
    /// Point writes go through the dense discard path: the first write
    /// after other formats were valid drops them, successive writes
    /// accumulate.
    pub fn set(&self, index: usize, value: T) -> Result<()> {
        if index >= self.inner.n_rows {
            return Err(Error::IndexOutOfBounds {
                index,
                size: self.inner.n_rows,
            });
        }
        let (bi, local) = self.inner.grid.locate(index);
        let mgr = self.manager();
        let mut b = self.inner.blocks[bi].write();
        mgr.validate_rwd(VectorFormat::CpuDense.index(), &mut b);
        b.dense_mut()?.ax[local as usize] = value;
        Ok(())
    }

    /// Read one element; absent positions return the fill value
    pub fn get(&self, index: usize) -> Result<T> {
        if index >= self.inner.n_rows {
            return Err(Error::IndexOutOfBounds {
                index,
                size: self.inner.n_rows,
            });
        }
        let (bi, local) = self.inner.grid.locate(index);
        let mgr = self.manager();
        let ctx = ExecCtx::direct(&self.inner.lib);
        let mut b = self.inner.blocks[bi].write();
        mgr.validate_rw(VectorFormat::CpuDense.index(), &mut b, &ctx)?;
        Ok(b.dense()?.ax[local as usize])
    }

    /// Build from parallel index/value arrays, replacing current contents
    ///
    /// Duplicate indices fold through the registered reduce operator
    /// (last-wins when none is set). The `values-sorted` and
    /// `no-duplicates` descriptor flags skip the corresponding passes.
    pub fn build(&self, indices: &[u32], values: &[T], desc: crate::desc::Descriptor) -> Result<()> {
        if indices.len() != values.len() {
            return Err(Error::invalid_argument(
                "values",
                format!("length {} != indices length {}", values.len(), indices.len()),
            ));
        }
        for &i in indices {
            if i as usize >= self.inner.n_rows {
                return Err(Error::IndexOutOfBounds {
                    index: i as usize,
                    size: self.inner.n_rows,
                });
            }
        }

        // Partition entries per block, preserving input order.
        let nb = self.inner.grid.n_blocks();
        let mut staged_i: Vec<Vec<u32>> = vec![Vec::new(); nb];
        let mut staged_x: Vec<Vec<T>> = vec![Vec::new(); nb];
        for (&i, &x) in indices.iter().zip(values.iter()) {
            let (bi, local) = self.inner.grid.locate(i as usize);
            staged_i[bi].push(local);
            staged_x[bi].push(x);
        }

        let mgr = self.manager();
        let reduce = self.inner.reduce.lock().clone();
        for (bi, block) in self.inner.blocks.iter().enumerate() {
            let mut b = block.write();
            mgr.validate_rwd(VectorFormat::CpuCoo.index(), &mut b);
            b.coo_mut()?.clear();
            b.coo_mut()?.set_pairs(
                &staged_i[bi],
                &staged_x[bi],
                reduce.as_ref(),
                desc.is_values_sorted(),
                desc.is_no_duplicates(),
            );
            mgr.commit(VectorFormat::CpuCoo.index(), &mut b);
        }
        Ok(())
    }

    /// Read back all stored entries in canonical index order
    pub fn read(&self) -> Result<(Vec<u32>, Vec<T>)> {
        let mgr = self.manager();
        let ctx = ExecCtx::direct(&self.inner.lib);
        let mut indices = Vec::new();
        let mut values = Vec::new();
        for block in &self.inner.blocks {
            let mut b = block.write();
            mgr.validate_rw(VectorFormat::CpuCoo.index(), &mut b, &ctx)?;
            let coo = b.coo()?;
            let offset = b.offset as u32;
            indices.extend(coo.ai.iter().map(|&i| offset + i));
            values.extend_from_slice(&coo.ax);
        }
        Ok((indices, values))
    }

    /// Number of stored entries
    pub fn nnz(&self) -> Result<usize> {
        let mgr = self.manager();
        let ctx = ExecCtx::direct(&self.inner.lib);
        let mut total = 0;
        for block in &self.inner.blocks {
            let mut b = block.write();
            if !b.is_valid(VectorFormat::CpuCoo) && !b.is_valid(VectorFormat::CpuDense) {
                mgr.validate_rw(VectorFormat::CpuCoo.index(), &mut b, &ctx)?;
            }
            total += b.nnz();
        }
        Ok(total)
    }

    /// Drop all entries, marking every format stale
    pub fn clear(&self) -> Result<()> {
        let mgr = self.manager();
        for block in &self.inner.blocks {
            mgr.invalidate(&mut block.write());
        }
        Ok(())
    }
}

impl<T: Element> std::fmt::Debug for Vector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vector")
            .field("n_rows", &self.inner.n_rows)
            .field("dtype", &T::DTYPE)
            .field("n_blocks", &self.inner.grid.n_blocks())
            .finish()
    }
}
