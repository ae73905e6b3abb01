//! Host dictionary-of-keys matrix block

use std::collections::HashMap;

use crate::dtype::Element;
use crate::op::BinaryOp;

/// Point-query format: `(row, col) -> val` map
///
/// Duplicate keys are folded with the reduce operator at insertion time
/// (last-wins when absent).
#[derive(Debug, Clone, Default)]
pub struct DokMat<T> {
    /// Stored entries
    pub ax: HashMap<(u32, u32), T>,
    /// Operator folding a value inserted over an existing key
    pub reduce: Option<BinaryOp<T>>,
}

impl<T: Element> DokMat<T> {
    /// Empty container
    pub fn new() -> Self {
        Self {
            ax: HashMap::new(),
            reduce: None,
        }
    }

    /// Logical entry count
    #[inline]
    pub fn nnz(&self) -> usize {
        self.ax.len()
    }

    /// Drop all entries, keeping the reduce operator
    pub fn clear(&mut self) {
        self.ax.clear();
    }

    /// Insert one element, folding into an existing entry if the key is
    /// already present
    pub fn add_element(&mut self, row: u32, col: u32, value: T) {
        match self.ax.entry((row, col)) {
            std::collections::hash_map::Entry::Occupied(mut e) => {
                let folded = match &self.reduce {
                    Some(op) => op.apply(*e.get(), value),
                    None => value,
                };
                e.insert(folded);
            }
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(value);
            }
        }
    }

    /// Point query
    #[inline]
    pub fn get(&self, row: u32, col: u32) -> Option<T> {
        self.ax.get(&(row, col)).copied()
    }

    /// Read out as sorted coordinate triples
    pub fn to_coo(&self) -> super::CooMat<T> {
        let mut entries: Vec<_> = self.ax.iter().map(|(&(r, c), &x)| (r, c, x)).collect();
        entries.sort_by_key(|&(r, c, _)| (r, c));

        let mut out = super::CooMat::new();
        for (r, c, x) in entries {
            out.ai.push(r);
            out.aj.push(c);
            out.ax.push(x);
        }
        out
    }
}
