//! Multi-format storage bundles and the version-map manager
//!
//! Every vector or matrix block owns a *storage bundle*: one slot per
//! format plus a validity bitmask. The [`StorageManager`] maintains the
//! version map and performs minimum-cost format transitions over a
//! registered conversion-rule graph.

mod manager;
mod matrix;
mod vector;

pub use manager::{ConversionRule, FormatBundle, StorageManager};
pub use matrix::{matrix_manager, MatrixBundle};
pub use vector::{vector_manager, VectorBundle};
