//! Element trait for mapping Rust types to DType

use super::DType;
use bytemuck::{Pod, Zeroable};

/// Trait for types that can be elements of a sparr vector or matrix
///
/// This trait connects Rust's type system to sparr's runtime dtype tags.
/// It is implemented for the three built-in scalar types and for `()`,
/// the zero-byte pattern-only type.
pub trait Element:
    Copy + Clone + Send + Sync + Pod + Zeroable + PartialEq + std::fmt::Debug + 'static
{
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Zero value (the default fill value)
    fn zero() -> Self;

    /// One value (the default loader fill for pattern files)
    fn one() -> Self;
}

impl Element for i32 {
    const DTYPE: DType = DType::I32;

    #[inline]
    fn zero() -> Self {
        0
    }

    #[inline]
    fn one() -> Self {
        1
    }
}

impl Element for u32 {
    const DTYPE: DType = DType::U32;

    #[inline]
    fn zero() -> Self {
        0
    }

    #[inline]
    fn one() -> Self {
        1
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    #[inline]
    fn zero() -> Self {
        0.0
    }

    #[inline]
    fn one() -> Self {
        1.0
    }
}

impl Element for () {
    const DTYPE: DType = DType::Void;

    #[inline]
    fn zero() -> Self {}

    #[inline]
    fn one() -> Self {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_dtype() {
        assert_eq!(i32::DTYPE, DType::I32);
        assert_eq!(u32::DTYPE, DType::U32);
        assert_eq!(f32::DTYPE, DType::F32);
        assert_eq!(<()>::DTYPE, DType::Void);
    }

    #[test]
    fn test_element_constants() {
        assert_eq!(i32::zero(), 0);
        assert_eq!(f32::one(), 1.0);
    }
}
