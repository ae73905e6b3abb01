//! Matrix handle

use std::sync::Arc;

use parking_lot::RwLock;

use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::format::MatrixFormat;
use crate::grid::BlockGrid;
use crate::library::Library;
use crate::op::BinaryOp;
use crate::runtime::ExecCtx;
use crate::storage::{MatrixBundle, StorageManager};

struct MatrixInner<T: Element> {
    lib: Library,
    n_rows: usize,
    n_cols: usize,
    row_grid: BlockGrid,
    col_grid: BlockGrid,
    blocks: Vec<RwLock<MatrixBundle<T>>>,
}

/// Sparse matrix of shape `n_rows x n_cols` over element type `T`
///
/// Data lives in a `bi x bj` block grid fixed at construction; blocks are
/// enumerated row-major and each owns an independent storage bundle.
pub struct Matrix<T: Element> {
    inner: Arc<MatrixInner<T>>,
}

impl<T: Element> Clone for Matrix<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Element> Matrix<T> {
    /// Create an empty matrix with fill value zero
    pub fn new(lib: &Library, n_rows: usize, n_cols: usize) -> Result<Self> {
        if n_rows > u32::MAX as usize || n_cols > u32::MAX as usize {
            return Err(Error::invalid_argument(
                "n_rows",
                "dimension exceeds u32 index range",
            ));
        }
        let row_grid = BlockGrid::new(n_rows, lib.config().block_size);
        let col_grid = BlockGrid::new(n_cols, lib.config().block_size);
        let mut blocks = Vec::with_capacity(row_grid.n_blocks() * col_grid.n_blocks());
        for bi in 0..row_grid.n_blocks() {
            for bj in 0..col_grid.n_blocks() {
                blocks.push(RwLock::new(MatrixBundle::new(
                    row_grid.block_len(bi),
                    col_grid.block_len(bj),
                    row_grid.offset(bi),
                    col_grid.offset(bj),
                    T::zero(),
                )));
            }
        }
        Ok(Self {
            inner: Arc::new(MatrixInner {
                lib: lib.clone(),
                n_rows,
                n_cols,
                row_grid,
                col_grid,
                blocks,
            }),
        })
    }

    /// Number of rows
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.inner.n_rows
    }

    /// Number of columns
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.inner.n_cols
    }

    /// Element type tag
    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    /// Owning library
    pub fn library(&self) -> &Library {
        &self.inner.lib
    }

    pub(crate) fn row_grid(&self) -> &BlockGrid {
        &self.inner.row_grid
    }

    pub(crate) fn col_grid(&self) -> &BlockGrid {
        &self.inner.col_grid
    }

    pub(crate) fn block(&self, bi: usize, bj: usize) -> &RwLock<MatrixBundle<T>> {
        &self.inner.blocks[bi * self.inner.col_grid.n_blocks() + bj]
    }

    pub(crate) fn manager(&self) -> Arc<StorageManager<MatrixBundle<T>>> {
        self.inner.lib.matrix_manager::<T>()
    }

    /// Whether two handles refer to the same object
    pub fn same_object(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether `format` is valid on every block
    pub fn is_format_valid(&self, format: MatrixFormat) -> bool {
        self.inner.blocks.iter().all(|b| b.read().is_valid(format))
    }

    /// Force-materialize `format` on every block
    pub fn set_format(&self, format: MatrixFormat) -> Result<()> {
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
        let mgr = self.manager();
        for block in &self.inner.blocks {
            let mut b = block.write();
            b.fill = fill;
            mgr.invalidate(&mut b);
        }
    }

    /// Register the operator folding duplicate `(row, col)` keys
    ///
    /// Installed on the LIL and DOK accumulators of every block.
    pub fn set_reduce(&self, reduce: BinaryOp<T>) -> Result<()> {
        let mgr = self.manager();
        for block in &self.inner.blocks {
            let mut b = block.write();
            mgr.validate_ctor(MatrixFormat::CpuLil.index(), &mut b);
            b.lil_mut()?.reduce = Some(reduce.clone());
            mgr.validate_ctor(MatrixFormat::CpuDok.index(), &mut b);
            b.dok_mut()?.reduce = Some(reduce.clone());
        }
        Ok(())
    }

    /// Write one element through the LIL accumulator
    pub fn set(&self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.inner.n_rows {
            return Err(Error::IndexOutOfBounds {
                index: row,
                size: self.inner.n_rows,
            });
        }
        if col >= self.inner.n_cols {
            return Err(Error::IndexOutOfBounds {
                index: col,
                size: self.inner.n_cols,
            });
        }
        let (bi, local_r) = self.inner.row_grid.locate(row);
        let (bj, local_c) = self.inner.col_grid.locate(col);
        let mgr = self.manager();
        let mut b = self.block(bi, bj).write();
        mgr.validate_rwd(MatrixFormat::CpuLil.index(), &mut b);
        b.lil_mut()?.add_element(local_r, local_c, value);
        Ok(())
    }

    /// Point query through the DOK format; absent keys return the fill
    /// value
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        if row >= self.inner.n_rows {
            return Err(Error::IndexOutOfBounds {
                index: row,
                size: self.inner.n_rows,
            });
        }
        if col >= self.inner.n_cols {
            return Err(Error::IndexOutOfBounds {
                index: col,
                size: self.inner.n_cols,
            });
        }
        let (bi, local_r) = self.inner.row_grid.locate(row);
        let (bj, local_c) = self.inner.col_grid.locate(col);
        let mgr = self.manager();
        let ctx = ExecCtx::direct(&self.inner.lib);
        let mut b = self.block(bi, bj).write();
        mgr.validate_rw(MatrixFormat::CpuDok.index(), &mut b, &ctx)?;
        Ok(b.dok()?.get(local_r, local_c).unwrap_or(b.fill))
    }

    /// Build from parallel `(rows, cols, values)` arrays, replacing
    /// current contents
    ///
    /// Mismatched array lengths fail with `InvalidArgument`. The default
    /// path accumulates through LIL and folds duplicate keys with the
    /// registered reduce operator on read-out; when the descriptor
    /// promises `values-sorted` and `no-duplicates` the triples go
    /// straight to COO.
    pub fn build(
        &self,
        rows: &[u32],
        cols: &[u32],
        values: &[T],
        desc: crate::desc::Descriptor,
    ) -> Result<()> {
        if rows.len() != cols.len() || rows.len() != values.len() {
            return Err(Error::invalid_argument(
                "values",
                format!(
                    "length tuple ({}, {}, {}) is not uniform",
                    rows.len(),
                    cols.len(),
                    values.len()
                ),
            ));
        }
        for (&r, &c) in rows.iter().zip(cols.iter()) {
            if r as usize >= self.inner.n_rows {
                return Err(Error::IndexOutOfBounds {
                    index: r as usize,
                    size: self.inner.n_rows,
                });
            }
            if c as usize >= self.inner.n_cols {
                return Err(Error::IndexOutOfBounds {
                    index: c as usize,
                    size: self.inner.n_cols,
                });
            }
        }

        let nb = self.inner.row_grid.n_blocks() * self.inner.col_grid.n_blocks();
        let ncb = self.inner.col_grid.n_blocks();
        let mut staged: Vec<Vec<(u32, u32, T)>> = vec![Vec::new(); nb];
        for ((&r, &c), &x) in rows.iter().zip(cols.iter()).zip(values.iter()) {
            let (bi, local_r) = self.inner.row_grid.locate(r as usize);
            let (bj, local_c) = self.inner.col_grid.locate(c as usize);
            staged[bi * ncb + bj].push((local_r, local_c, x));
        }

        let mgr = self.manager();
        let direct = desc.is_values_sorted() && desc.is_no_duplicates();
        for (idx, block) in self.inner.blocks.iter().enumerate() {
            let mut b = block.write();
            if direct {
                mgr.validate_rwd(MatrixFormat::CpuCoo.index(), &mut b);
                let coo = b.coo_mut()?;
                coo.clear();
                for &(r, c, x) in &staged[idx] {
                    coo.ai.push(r);
                    coo.aj.push(c);
                    coo.ax.push(x);
                }
            } else {
                mgr.validate_rwd(MatrixFormat::CpuLil.index(), &mut b);
                let lil = b.lil_mut()?;
                for &(r, c, x) in &staged[idx] {
                    lil.add_element(r, c, x);
                }
            }
        }
        Ok(())
    }

    /// Read back all stored entries as canonical row-major triples
    pub fn read(&self) -> Result<(Vec<u32>, Vec<u32>, Vec<T>)> {
        let mgr = self.manager();
        let ctx = ExecCtx::direct(&self.inner.lib);
        let mut triples = Vec::new();
        for block in &self.inner.blocks {
            let mut b = block.write();
            mgr.validate_rw(MatrixFormat::CpuCoo.index(), &mut b, &ctx)?;
            let coo = b.coo()?;
            let ro = b.row_offset as u32;
            let co = b.col_offset as u32;
            for ((&r, &c), &x) in coo.ai.iter().zip(coo.aj.iter()).zip(coo.ax.iter()) {
                triples.push((ro + r, co + c, x));
            }
        }
        triples.sort_by_key(|&(r, c, _)| (r, c));

        let mut rows = Vec::with_capacity(triples.len());
        let mut cols = Vec::with_capacity(triples.len());
        let mut values = Vec::with_capacity(triples.len());
        for (r, c, x) in triples {
            rows.push(r);
            cols.push(c);
            values.push(x);
        }
        Ok((rows, cols, values))
    }

    /// Number of stored entries
    pub fn nnz(&self) -> Result<usize> {
        let mgr = self.manager();
        let ctx = ExecCtx::direct(&self.inner.lib);
        let mut total = 0;
        for block in &self.inner.blocks {
            let mut b = block.write();
            if !b.is_valid(MatrixFormat::CpuCoo)
                && !b.is_valid(MatrixFormat::CpuCsr)
                && !b.is_valid(MatrixFormat::CpuDok)
                && !b.is_valid(MatrixFormat::CpuLil)
            {
                mgr.validate_rw(MatrixFormat::CpuCoo.index(), &mut b, &ctx)?;
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

impl<T: Element> std::fmt::Debug for Matrix<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matrix")
            .field("n_rows", &self.inner.n_rows)
            .field("n_cols", &self.inner.n_cols)
            .field("dtype", &T::DTYPE)
            .field(
                "blocks",
                &(self.inner.row_grid.n_blocks(), self.inner.col_grid.n_blocks()),
            )
            .finish()
    }
}
