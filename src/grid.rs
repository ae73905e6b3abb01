//! Fixed block partitioning of object dimensions
//!
//! A vector of length `n` is split into `ceil(n / block_size)` blocks; a
//! matrix uses one grid per dimension, enumerating blocks in row-major
//! order. The grid is fixed at object construction from the library
//! block-size hint, and every block owns an independent storage bundle.

/// Partition of one dimension into fixed-size blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGrid {
    len: usize,
    block_size: usize,
    n_blocks: usize,
}

impl BlockGrid {
    /// Partition `len` positions into blocks of at most `block_size`
    ///
    /// A zero-length dimension still gets one (empty) block so that every
    /// object owns at least one bundle.
    pub fn new(len: usize, block_size: usize) -> Self {
        let block_size = block_size.max(1);
        let n_blocks = len.div_ceil(block_size).max(1);
        Self {
            len,
            block_size,
            n_blocks,
        }
    }

    /// Partitioned dimension length
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the partitioned dimension is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of blocks
    #[inline]
    pub fn n_blocks(&self) -> usize {
        self.n_blocks
    }

    /// Global index range covered by block `i`
    #[inline]
    pub fn range(&self, i: usize) -> std::ops::Range<usize> {
        let start = i * self.block_size;
        let end = ((i + 1) * self.block_size).min(self.len);
        start..end.max(start)
    }

    /// Length of block `i`
    #[inline]
    pub fn block_len(&self, i: usize) -> usize {
        self.range(i).len()
    }

    /// Global start offset of block `i`
    #[inline]
    pub fn offset(&self, i: usize) -> usize {
        i * self.block_size
    }

    /// Block index and block-local offset of a global position
    #[inline]
    pub fn locate(&self, index: usize) -> (usize, u32) {
        (index / self.block_size, (index % self.block_size) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_block() {
        let g = BlockGrid::new(10, 1024);
        assert_eq!(g.n_blocks(), 1);
        assert_eq!(g.range(0), 0..10);
        assert_eq!(g.locate(7), (0, 7));
    }

    #[test]
    fn test_multi_block_with_tail() {
        let g = BlockGrid::new(10, 4);
        assert_eq!(g.n_blocks(), 3);
        assert_eq!(g.range(0), 0..4);
        assert_eq!(g.range(1), 4..8);
        assert_eq!(g.range(2), 8..10);
        assert_eq!(g.block_len(2), 2);
        assert_eq!(g.locate(9), (2, 1));
    }

    #[test]
    fn test_exact_fit() {
        let g = BlockGrid::new(8, 4);
        assert_eq!(g.n_blocks(), 2);
        assert_eq!(g.block_len(1), 4);
    }

    #[test]
    fn test_empty_dimension() {
        let g = BlockGrid::new(0, 4);
        assert_eq!(g.n_blocks(), 1);
        assert_eq!(g.block_len(0), 0);
        assert!(g.is_empty());
    }
}
