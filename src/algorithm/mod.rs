//! Graph algorithms over the expression API
//!
//! Thin loops of masked vector-matrix products; each algorithm ships with
//! a naive host-side reference used as a test oracle.

mod bfs;
mod pagerank;
mod sssp;

pub use bfs::{bfs, bfs_naive};
pub use pagerank::{pr, pr_naive};
pub use sssp::{sssp, sssp_naive};
