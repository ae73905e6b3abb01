//! Host list-of-lists matrix block

use crate::dtype::Element;
use crate::op::BinaryOp;

/// Write-only accumulator format: per-row lists of `(col, val)` tuples
///
/// Writes append without searching; rows are sorted (stably, preserving
/// insertion order for equal keys) and duplicates folded only when the
/// block is read out to another format.
#[derive(Debug, Clone, Default)]
pub struct LilMat<T> {
    /// Per-row tuples in insertion order
    pub rows: Vec<Vec<(u32, T)>>,
    /// Operator folding duplicate `(row, col)` keys on read-out;
    /// last-wins when absent
    pub reduce: Option<BinaryOp<T>>,
}

impl<T: Element> LilMat<T> {
    /// Accumulator for `n_rows` rows
    pub fn with_rows(n_rows: usize) -> Self {
        Self {
            rows: vec![Vec::new(); n_rows],
            reduce: None,
        }
    }

    /// Logical entry count before duplicate folding
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Drop all entries, keeping the row list and reduce operator
    pub fn clear(&mut self) {
        for row in &mut self.rows {
            row.clear();
        }
    }

    /// Append one element; duplicate keys are resolved later
    #[inline]
    pub fn add_element(&mut self, row: u32, col: u32, value: T) {
        self.rows[row as usize].push((col, value));
    }

    /// Read out as sorted, duplicate-free coordinate triples
    pub fn to_coo(&self) -> super::CooMat<T> {
        let mut out = super::CooMat::new();
        for (r, row) in self.rows.iter().enumerate() {
            let mut entries = row.clone();
            entries.sort_by_key(|&(c, _)| c);

            for (c, x) in entries {
                let same_key =
                    out.ai.last().copied() == Some(r as u32) && out.aj.last().copied() == Some(c);
                if same_key {
                    if let Some(prev) = out.ax.last_mut() {
                        *prev = match &self.reduce {
                            Some(op) => op.apply(*prev, x),
                            None => x,
                        };
                    }
                } else {
                    out.ai.push(r as u32);
                    out.aj.push(c);
                    out.ax.push(x);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op;

    #[test]
    fn test_append_then_fold_on_read() {
        let mut lil = LilMat::<i32>::with_rows(2);
        lil.reduce = Some(op::plus::<i32>());
        lil.add_element(0, 0, 1);
        lil.add_element(0, 0, 2);
        lil.add_element(1, 1, 3);
        assert_eq!(lil.nnz(), 3);

        let coo = lil.to_coo();
        assert_eq!(coo.ai, vec![0, 1]);
        assert_eq!(coo.aj, vec![0, 1]);
        assert_eq!(coo.ax, vec![3, 3]);
    }

    #[test]
    fn test_rows_sorted_on_read_not_on_write() {
        let mut lil = LilMat::<i32>::with_rows(1);
        lil.add_element(0, 5, 50);
        lil.add_element(0, 2, 20);
        assert_eq!(lil.rows[0], vec![(5, 50), (2, 20)]);

        let coo = lil.to_coo();
        assert_eq!(coo.aj, vec![2, 5]);
        assert_eq!(coo.ax, vec![20, 50]);
    }

    #[test]
    fn test_last_wins_without_reduce() {
        let mut lil = LilMat::<i32>::with_rows(1);
        lil.add_element(0, 3, 1);
        lil.add_element(0, 3, 9);
        let coo = lil.to_coo();
        assert_eq!(coo.ax, vec![9]);
    }
}
