//! Host coordinate-triples matrix block

use crate::dtype::Element;

/// Coordinate format: parallel `(row, col, val)` arrays
///
/// Canonical order is row-major: sorted by row, then by column within a
/// row. `to_csr` requires only row order and preserves within-row order
/// stably.
#[derive(Debug, Clone, Default)]
pub struct CooMat<T> {
    /// Row indices
    pub ai: Vec<u32>,
    /// Column indices, parallel to `ai`
    pub aj: Vec<u32>,
    /// Values, parallel to `ai`
    pub ax: Vec<T>,
}

impl<T: Element> CooMat<T> {
    /// Empty container
    pub fn new() -> Self {
        Self {
            ai: Vec::new(),
            aj: Vec::new(),
            ax: Vec::new(),
        }
    }

    /// Logical entry count
    #[inline]
    pub fn nnz(&self) -> usize {
        self.ai.len()
    }

    /// Drop all entries, keeping allocations
    pub fn clear(&mut self) {
        self.ai.clear();
        self.aj.clear();
        self.ax.clear();
    }

    /// Compress into row-pointer form over `n_rows` rows
    ///
    /// Stable sort by row, then prefix-sum the per-row counts. Entries
    /// within a row keep their existing order.
    pub fn to_csr(&self, n_rows: usize) -> super::CsrMat<T> {
        let nnz = self.nnz();

        let mut perm: Vec<usize> = (0..nnz).collect();
        perm.sort_by_key(|&k| self.ai[k]);

        let mut ap = vec![0u32; n_rows + 1];
        for &k in &perm {
            ap[self.ai[k] as usize + 1] += 1;
        }
        for r in 1..=n_rows {
            ap[r] += ap[r - 1];
        }

        super::CsrMat {
            ap,
            aj: perm.iter().map(|&k| self.aj[k]).collect(),
            ax: perm.iter().map(|&k| self.ax[k]).collect(),
        }
    }
}
