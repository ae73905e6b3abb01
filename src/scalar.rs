//! Scalar handle

use std::sync::Arc;

use parking_lot::Mutex;

use crate::dtype::{DType, Element};

/// Single-value handle used as an operand or a reduction target
///
/// A scalar has no format variants; it is one `T` behind a lock so that
/// scheduled reductions can write it while user code holds a clone.
pub struct Scalar<T: Element> {
    value: Arc<Mutex<T>>,
}

impl<T: Element> Scalar<T> {
    /// Scalar holding `value`
    pub fn new(value: T) -> Self {
        Self {
            value: Arc::new(Mutex::new(value)),
        }
    }

    /// Current value
    pub fn get(&self) -> T {
        *self.value.lock()
    }

    /// Replace the value
    pub fn set(&self, value: T) {
        *self.value.lock() = value;
    }

    /// Element type tag
    pub fn dtype(&self) -> DType {
        T::DTYPE
    }
}

impl<T: Element> Clone for Scalar<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
        }
    }
}

impl<T: Element> std::fmt::Debug for Scalar<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Scalar").field(&self.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_shared_cell() {
        let s = Scalar::new(3i32);
        let t = s.clone();
        t.set(9);
        assert_eq!(s.get(), 9);
        assert_eq!(s.dtype(), DType::I32);
    }
}
