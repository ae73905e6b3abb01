//! Host coordinate-list vector block

use crate::dtype::Element;
use crate::op::BinaryOp;

/// Sparse vector block as parallel index/value arrays
///
/// Indices are block-local and strictly increasing. The logical entry
/// count is `ai.len()`; `Vec` capacity may exceed it.
#[derive(Debug, Clone, Default)]
pub struct CooVec<T> {
    /// Entry indices, strictly increasing
    pub ai: Vec<u32>,
    /// Entry values, parallel to `ai`
    pub ax: Vec<T>,
}

impl<T: Element> CooVec<T> {
    /// Empty container
    pub fn new() -> Self {
        Self {
            ai: Vec::new(),
            ax: Vec::new(),
        }
    }

    /// Logical number of stored entries
    #[inline]
    pub fn nnz(&self) -> usize {
        self.ai.len()
    }

    /// Drop all entries, keeping allocations
    pub fn clear(&mut self) {
        self.ai.clear();
        self.ax.clear();
    }

    /// Rebuild from unsorted `(index, value)` pairs: stable sort by index,
    /// then fold duplicates left-to-right with `reduce` (last-wins when no
    /// operator is given). `sorted`/`dedup` skip the respective passes when
    /// the caller promised those properties.
    pub fn set_pairs(
        &mut self,
        indices: &[u32],
        values: &[T],
        reduce: Option<&BinaryOp<T>>,
        sorted: bool,
        dedup: bool,
    ) {
        self.clear();

        let mut perm: Vec<usize> = (0..indices.len()).collect();
        if !sorted {
            perm.sort_by_key(|&k| indices[k]);
        }

        if dedup {
            self.ai.extend(perm.iter().map(|&k| indices[k]));
            self.ax.extend(perm.iter().map(|&k| values[k]));
            return;
        }

        for &k in &perm {
            let i = indices[k];
            let x = values[k];
            if self.ai.last().copied() == Some(i) {
                if let Some(prev) = self.ax.last_mut() {
                    *prev = match reduce {
                        Some(op) => op.apply(*prev, x),
                        None => x,
                    };
                }
            } else {
                self.ai.push(i);
                self.ax.push(x);
            }
        }
    }

    /// Materialize as a dense block of length `len`, filling gaps with
    /// `fill`
    pub fn to_dense(&self, len: usize, fill: T) -> super::DenseVec<T> {
        let mut ax = vec![fill; len];
        for (&i, &x) in self.ai.iter().zip(self.ax.iter()) {
            ax[i as usize] = x;
        }
        super::DenseVec { ax }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op;

    #[test]
    fn test_set_pairs_sorts_and_folds() {
        let mut coo = CooVec::<i32>::new();
        let plus = op::plus::<i32>();
        coo.set_pairs(&[3, 1, 3], &[5, 2, 7], Some(&plus), false, false);
        assert_eq!(coo.ai, vec![1, 3]);
        assert_eq!(coo.ax, vec![2, 12]);
        assert_eq!(coo.nnz(), 2);
    }

    #[test]
    fn test_set_pairs_last_wins_without_reduce() {
        let mut coo = CooVec::<i32>::new();
        coo.set_pairs(&[0, 0], &[1, 9], None, true, false);
        assert_eq!(coo.ax, vec![9]);
    }

    #[test]
    fn test_set_pairs_trusts_promises() {
        let mut coo = CooVec::<i32>::new();
        coo.set_pairs(&[0, 2, 5], &[1, 2, 3], None, true, true);
        assert_eq!(coo.ai, vec![0, 2, 5]);
        assert_eq!(coo.ax, vec![1, 2, 3]);
    }

    #[test]
    fn test_to_dense_respects_fill() {
        let mut coo = CooVec::<f32>::new();
        coo.set_pairs(&[1, 3], &[2.0, 4.0], None, true, true);
        let dense = coo.to_dense(5, -1.0);
        assert_eq!(dense.ax, vec![-1.0, 2.0, -1.0, 4.0, -1.0]);
    }
}
