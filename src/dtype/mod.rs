//! Element type system for sparr objects
//!
//! This module provides the `DType` tag describing an element type at
//! runtime, along with the `Element` trait that connects Rust scalar types
//! to those tags. The tag travels with every vector and matrix handle and
//! keys the accelerator kernel caches.

mod element;

pub use element::Element;

use std::fmt;

/// Element types supported by sparr objects
///
/// Using a runtime tag (rather than generics alone) allows kernel caches
/// and dispatch tables to be keyed without monomorphized statics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DType {
    /// 32-bit signed integer
    I32 = 0,
    /// 32-bit unsigned integer
    U32 = 1,
    /// 32-bit floating point
    F32 = 2,
    /// Zero-byte pattern-only type: stored entries carry no value
    Void = 3,
}

impl DType {
    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::Void => 0,
        }
    }

    /// Returns true if stored entries carry a value
    #[inline]
    pub const fn has_values(self) -> bool {
        !matches!(self, Self::Void)
    }

    /// Short name for display (e.g., "i32", "void")
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::F32 => "f32",
            Self::Void => "void",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_size() {
        assert_eq!(DType::I32.size_in_bytes(), 4);
        assert_eq!(DType::U32.size_in_bytes(), 4);
        assert_eq!(DType::F32.size_in_bytes(), 4);
        assert_eq!(DType::Void.size_in_bytes(), 0);
    }

    #[test]
    fn test_dtype_values() {
        assert!(DType::F32.has_values());
        assert!(!DType::Void.has_values());
        assert_eq!(DType::Void.to_string(), "void");
    }
}
