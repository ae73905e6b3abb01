//! Host dense vector block

use crate::dtype::Element;

/// Dense vector block: one value per position
///
/// Positions without a logical entry hold the owning object's fill value.
#[derive(Debug, Clone, Default)]
pub struct DenseVec<T> {
    /// Values, one per position in the block
    pub ax: Vec<T>,
}

impl<T: Element> DenseVec<T> {
    /// Dense block of length `len` filled with `fill`
    pub fn filled(len: usize, fill: T) -> Self {
        Self {
            ax: vec![fill; len],
        }
    }

    /// Block length
    #[inline]
    pub fn len(&self) -> usize {
        self.ax.len()
    }

    /// True when the block has zero positions
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ax.is_empty()
    }

    /// Reset every position to `fill`, resizing to `len`
    pub fn reset(&mut self, len: usize, fill: T) {
        self.ax.clear();
        self.ax.resize(len, fill);
    }

    /// Extract entries differing from `fill` as a coordinate list
    ///
    /// Entries explicitly written with the fill value are indistinguishable
    /// from absent positions and are dropped.
    pub fn to_coo(&self, fill: T) -> super::CooVec<T> {
        let mut coo = super::CooVec::new();
        for (i, &x) in self.ax.iter().enumerate() {
            if x != fill {
                coo.ai.push(i as u32);
                coo.ax.push(x);
            }
        }
        coo
    }
}
