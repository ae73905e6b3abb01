//! # sparr
//!
//! **Sparse linear algebra runtime with user-defined semirings and
//! multi-backend execution.**
//!
//! sparr evaluates expressions over sparse vectors and matrices
//! parameterized by an element type and a user-supplied algebra (a pair
//! of binary operators plus a selection predicate). It targets graph
//! algorithms such as BFS, SSSP and PageRank expressed as repeated
//! masked vector-matrix products.
//!
//! ## Why sparr?
//!
//! - **Multi-format storage**: every object keeps LIL/DOK/COO/CSR/dense
//!   representations with lazy, cost-driven materialization
//! - **Custom semirings**: operators are plain Rust closures paired with
//!   accelerator source fragments; `(min, +)`, `(or, and)` and friends
//!   are one factory call away
//! - **Expression DAG**: operations are scheduled as a dependency graph
//!   and expanded into per-block sub-tasks
//! - **Portable acceleration**: an optional WebGPU backend compiles
//!   kernels from the same operator definitions
//!
//! ## Quick Start
//!
//! ```
//! use sparr::prelude::*;
//!
//! # fn main() -> sparr::error::Result<()> {
//! let lib = Library::new();
//!
//! // 4-node path graph: 0 -> 1 -> 2 -> 3
//! let a = Matrix::<i32>::new(&lib, 4, 4)?;
//! a.build(&[0, 1, 2], &[1, 2, 3], &[1, 1, 1], Descriptor::new())?;
//!
//! let mut distances = vec![-1; 4];
//! sparr::algorithm::bfs(&mut distances, &a, 0)?;
//! assert_eq!(distances, vec![0, 1, 2, 3]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): multi-threaded sub-task execution
//! - `wgpu`: WebGPU accelerator backend

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod algorithm;
pub mod desc;
pub mod dtype;
pub mod error;
pub mod expr;
pub mod format;
pub mod grid;
pub mod library;
pub mod matrix;
pub mod mtx;
pub mod op;
pub mod registry;
pub mod runtime;
pub mod scalar;
pub mod storage;
pub mod vector;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::desc::Descriptor;
    pub use crate::dtype::{DType, Element};
    pub use crate::error::{Error, Result};
    pub use crate::expr::{ExprState, Expression, NodeState};
    pub use crate::library::{Config, Library};
    pub use crate::matrix::Matrix;
    pub use crate::op::{BinaryOp, SelectOp, UnaryOp};
    pub use crate::scalar::Scalar;
    pub use crate::vector::Vector;
}
