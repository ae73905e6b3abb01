//! Single-source shortest paths

use crate::desc::Descriptor;
use crate::error::{Error, Result};
use crate::expr::Expression;
use crate::matrix::Matrix;
use crate::op;
use crate::scalar::Scalar;
use crate::vector::Vector;

/// Single-source shortest paths over the `(min, +)` semiring
///
/// `a` holds positive edge weights where an edge `i -> j` exists. On
/// return `v[i]` is the distance from `s`, infinity for unreachable
/// vertices. Each round relaxes every reached vertex with one
/// vector-matrix product over `(* = +, + = min)` and folds the result
/// into the distances with an element-wise min; the loop stops when a
/// round changes nothing.
pub fn sssp(v: &mut Vec<f32>, a: &Matrix<f32>, s: usize) -> Result<()> {
    let n = a.n_rows();
    if a.n_cols() != n {
        return Err(Error::invalid_argument("a", "adjacency matrix must be square"));
    }
    if s >= n {
        return Err(Error::IndexOutOfBounds { index: s, size: n });
    }

    let lib = a.library().clone();

    let mut dist = Vector::<f32>::new(&lib, n)?;
    dist.set_fill_value(f32::INFINITY);
    dist.build(&[s as u32], &[0.0], Descriptor::new())?;

    // All-true mask: no stored entries, fill 1.
    let ones = Vector::<f32>::new(&lib, n)?;
    ones.set_fill_value(1.0);

    let plus = op::plus::<f32>();
    let min = op::min::<f32>();
    let nonzero = op::nonzero::<f32>();
    let inf = Scalar::new(f32::INFINITY);

    // Distances settle after at most n - 1 relaxation rounds.
    for _ in 0..n.max(1) {
        let relax = Vector::<f32>::new(&lib, n)?;
        relax.set_fill_value(f32::INFINITY);
        let folded = Vector::<f32>::new(&lib, n)?;
        folded.set_fill_value(f32::INFINITY);

        let mut expr = Expression::new(&lib);
        let step = expr.vxm_masked(
            &relax,
            &ones,
            &dist,
            a,
            &plus,
            &min,
            &nonzero,
            &inf,
            Descriptor::new(),
        )?;
        let fold = expr.ewise_add(&folded, None, &min, &dist, &relax, Descriptor::new())?;
        expr.depends(fold, step)?;
        expr.submit()?;
        expr.wait()?;

        let (old_i, old_x) = dist.read()?;
        let (new_i, new_x) = folded.read()?;
        let unchanged = old_i == new_i && old_x == new_x;
        dist = folded;
        if unchanged {
            break;
        }
    }

    v.clear();
    v.resize(n, f32::INFINITY);
    let (indices, distances) = dist.read()?;
    for (&i, &d) in indices.iter().zip(distances.iter()) {
        v[i as usize] = d;
    }
    Ok(())
}

/// Naive Bellman-Ford over adjacency lists, the test oracle
pub fn sssp_naive(
    v: &mut Vec<f32>,
    adjacency: &[Vec<u32>],
    weights: &[Vec<f32>],
    s: usize,
) -> Result<()> {
    let n = adjacency.len();
    if s >= n {
        return Err(Error::IndexOutOfBounds { index: s, size: n });
    }

    v.clear();
    v.resize(n, f32::INFINITY);
    v[s] = 0.0;

    for _ in 0..n {
        let mut changed = false;
        for u in 0..n {
            if v[u].is_finite() {
                for (&w, &x) in adjacency[u].iter().zip(weights[u].iter()) {
                    let cand = v[u] + x;
                    if cand < v[w as usize] {
                        v[w as usize] = cand;
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Library;

    #[test]
    fn test_sssp_picks_shorter_route() {
        let lib = Library::new();
        // 0 -> 1 costs 5 directly, 3 via 2.
        let a = Matrix::<f32>::new(&lib, 3, 3).unwrap();
        a.build(
            &[0, 0, 2],
            &[1, 2, 1],
            &[5.0, 2.0, 1.0],
            Descriptor::new(),
        )
        .unwrap();

        let mut v = Vec::new();
        sssp(&mut v, &a, 0).unwrap();
        assert_eq!(v, vec![0.0, 3.0, 2.0]);
    }

    #[test]
    fn test_sssp_unreachable_is_infinite() {
        let lib = Library::new();
        let a = Matrix::<f32>::new(&lib, 3, 3).unwrap();
        a.build(&[0], &[1], &[1.0], Descriptor::new()).unwrap();

        let mut v = Vec::new();
        sssp(&mut v, &a, 0).unwrap();
        assert_eq!(v[0], 0.0);
        assert_eq!(v[1], 1.0);
        assert!(v[2].is_infinite());
    }

    #[test]
    fn test_sssp_matches_naive() {
        let lib = Library::new();
        let rows = vec![0, 0, 1, 2, 3, 1];
        let cols = vec![1, 2, 3, 3, 4, 4];
        let vals = vec![2.0, 7.0, 1.0, 1.5, 4.0, 9.0];

        let a = Matrix::<f32>::new(&lib, 5, 5).unwrap();
        a.build(&rows, &cols, &vals, Descriptor::new()).unwrap();

        let mut adjacency = vec![Vec::new(); 5];
        let mut weights = vec![Vec::new(); 5];
        for ((&r, &c), &x) in rows.iter().zip(cols.iter()).zip(vals.iter()) {
            adjacency[r as usize].push(c);
            weights[r as usize].push(x);
        }

        let mut got = Vec::new();
        sssp(&mut got, &a, 0).unwrap();
        let mut want = Vec::new();
        sssp_naive(&mut want, &adjacency, &weights, 0).unwrap();
        assert_eq!(got, want);
    }
}
