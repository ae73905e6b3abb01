//! Breadth-first search demo
//!
//! Builds a small directed graph and prints the hop count of every
//! vertex from vertex 0. Run with `RUST_LOG=debug` to watch the storage
//! transitions and scheduler decisions.

use sparr::algorithm::bfs;
use sparr::desc::Descriptor;
use sparr::error::Result;
use sparr::library::Library;
use sparr::matrix::Matrix;

fn main() -> Result<()> {
    env_logger::init();

    let lib = Library::new();

    // 0 -> 1 -> 2 -> 4
    //  \-> 3 ------^
    let rows = vec![0, 0, 1, 2, 3];
    let cols = vec![1, 3, 2, 4, 4];
    let a = Matrix::<i32>::new(&lib, 6, 6)?;
    a.build(&rows, &cols, &[1; 5], Descriptor::new())?;

    let mut levels = Vec::new();
    bfs(&mut levels, &a, 0)?;

    for (vertex, level) in levels.iter().enumerate() {
        if *level >= 0 {
            println!("vertex {vertex}: level {level}");
        } else {
            println!("vertex {vertex}: unreachable");
        }
    }
    Ok(())
}
