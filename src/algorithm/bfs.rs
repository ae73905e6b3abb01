//! Breadth-first search

use crate::desc::Descriptor;
use crate::error::{Error, Result};
use crate::expr::Expression;
use crate::matrix::Matrix;
use crate::op;
use crate::op::SelectOp;
use crate::scalar::Scalar;
use crate::vector::Vector;

/// Breadth-first search over the Boolean semiring
///
/// `a` is an adjacency matrix with a stored `1` wherever an edge `i -> j`
/// exists. On return `v[i]` holds the hop count from `s`, `-1` for
/// unreachable vertices. Each level is one masked vector-matrix product
/// with `(* = AND, + = OR)` masked by the unreached vertices, followed by
/// a masked assign of the level number and a frontier count.
pub fn bfs(v: &mut Vec<i32>, a: &Matrix<i32>, s: usize) -> Result<()> {
    let n = a.n_rows();
    if a.n_cols() != n {
        return Err(Error::invalid_argument("a", "adjacency matrix must be square"));
    }
    if s >= n {
        return Err(Error::IndexOutOfBounds { index: s, size: n });
    }

    let lib = a.library().clone();

    let depth = Vector::<i32>::new(&lib, n)?;
    depth.set_fill_value(-1);
    depth.build(&[s as u32], &[0], Descriptor::new())?;

    let mut frontier = Vector::<i32>::new(&lib, n)?;
    frontier.build(&[s as u32], &[1], Descriptor::new())?;

    let band = op::band::<i32>();
    let bor = op::bor::<i32>();
    let second = op::second::<i32>();
    let nonzero = op::nonzero::<i32>();
    let unreached = SelectOp::<i32>::new("unreached", "x == -1", |x| x == -1);
    let plus = op::plus::<i32>();
    let zero = Scalar::new(0);

    let mut level = 0i32;
    loop {
        level += 1;

        let next = Vector::<i32>::new(&lib, n)?;
        let count = Scalar::new(0);

        let mut expr = Expression::new(&lib);
        let step = expr.vxm_masked(
            &next,
            &depth,
            &frontier,
            a,
            &band,
            &bor,
            &unreached,
            &zero,
            Descriptor::new().early_exit(),
        )?;
        let mark = expr.assign_masked(
            &depth,
            &next,
            &Scalar::new(level),
            &second,
            &nonzero,
            Descriptor::new(),
        )?;
        let tally = expr.reduce(&count, &zero, &next, &plus, Descriptor::new())?;
        expr.depends(mark, step)?;
        expr.depends(tally, step)?;
        expr.submit()?;
        expr.wait()?;

        if count.get() == 0 {
            break;
        }
        frontier = next;
    }

    v.clear();
    v.resize(n, -1);
    let (indices, levels) = depth.read()?;
    for (&i, &l) in indices.iter().zip(levels.iter()) {
        v[i as usize] = l;
    }
    Ok(())
}

/// Naive breadth-first search over adjacency lists, the test oracle
pub fn bfs_naive(v: &mut Vec<i32>, adjacency: &[Vec<u32>], s: usize) -> Result<()> {
    let n = adjacency.len();
    if s >= n {
        return Err(Error::IndexOutOfBounds { index: s, size: n });
    }

    v.clear();
    v.resize(n, -1);
    v[s] = 0;

    let mut queue = std::collections::VecDeque::from([s]);
    while let Some(u) = queue.pop_front() {
        for &w in &adjacency[u] {
            let w = w as usize;
            if v[w] < 0 {
                v[w] = v[u] + 1;
                queue.push_back(w);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Library;

    #[test]
    fn test_bfs_path_graph() {
        let lib = Library::new();
        let a = Matrix::<i32>::new(&lib, 4, 4).unwrap();
        a.build(&[0, 1, 2], &[1, 2, 3], &[1, 1, 1], Descriptor::new())
            .unwrap();

        let mut v = Vec::new();
        bfs(&mut v, &a, 0).unwrap();
        assert_eq!(v, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_bfs_disconnected() {
        let lib = Library::new();
        let a = Matrix::<i32>::new(&lib, 4, 4).unwrap();
        a.build(&[0], &[1], &[1], Descriptor::new()).unwrap();

        let mut v = Vec::new();
        bfs(&mut v, &a, 0).unwrap();
        assert_eq!(v, vec![0, 1, -1, -1]);
    }

    #[test]
    fn test_bfs_matches_naive() {
        let lib = Library::new();
        // Diamond with a tail: 0 -> {1, 2} -> 3 -> 4
        let rows = vec![0, 0, 1, 2, 3];
        let cols = vec![1, 2, 3, 3, 4];
        let a = Matrix::<i32>::new(&lib, 5, 5).unwrap();
        a.build(&rows, &cols, &[1; 5], Descriptor::new()).unwrap();

        let mut adjacency = vec![Vec::new(); 5];
        for (&r, &c) in rows.iter().zip(cols.iter()) {
            adjacency[r as usize].push(c);
        }

        let mut got = Vec::new();
        bfs(&mut got, &a, 0).unwrap();
        let mut want = Vec::new();
        bfs_naive(&mut want, &adjacency, 0).unwrap();
        assert_eq!(got, want);
    }

    #[test]
    fn test_bfs_rejects_bad_source() {
        let lib = Library::new();
        let a = Matrix::<i32>::new(&lib, 2, 2).unwrap();
        let mut v = Vec::new();
        assert!(bfs(&mut v, &a, 5).is_err());
    }
}
