//! PageRank demo over a matrix-market graph
//!
//! Pass a path to a `.mtx` file in coordinate format, or run without
//! arguments to rank a small built-in graph.

use sparr::algorithm::pr;
use sparr::error::Result;
use sparr::library::Library;
use sparr::mtx::{load_mtx, MtxOptions};

fn main() -> Result<()> {
    env_logger::init();

    let lib = Library::new();
    let matrix = match std::env::args().nth(1) {
        Some(path) => {
            let data = load_mtx::<f32>(
                &path,
                &MtxOptions {
                    remove_self_loops: true,
                    ignore_values: true,
                    ..MtxOptions::default()
                },
            )?;
            data.to_matrix(&lib)?
        }
        None => {
            use sparr::desc::Descriptor;
            use sparr::matrix::Matrix;
            let m = Matrix::<f32>::new(&lib, 4, 4)?;
            m.build(
                &[0, 1, 1, 2, 3],
                &[1, 0, 2, 0, 2],
                &[1.0; 5],
                Descriptor::new(),
            )?;
            m
        }
    };

    let mut ranks = Vec::new();
    pr(&mut ranks, &matrix, 0.85, 1e-8)?;

    let mut order: Vec<usize> = (0..ranks.len()).collect();
    order.sort_by(|&a, &b| ranks[b].total_cmp(&ranks[a]));
    for vertex in order.into_iter().take(10) {
        println!("vertex {vertex}: rank {:.5}", ranks[vertex]);
    }
    Ok(())
}
