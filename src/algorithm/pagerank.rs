//! PageRank

use crate::desc::Descriptor;
use crate::error::{Error, Result};
use crate::expr::Expression;
use crate::matrix::Matrix;
use crate::op;
use crate::scalar::Scalar;
use crate::vector::Vector;

const MAX_ITERATIONS: usize = 100;

/// PageRank by power iteration
///
/// `a` is an adjacency matrix; edge weights are row-normalized
/// internally. `alpha` is the damping factor in `[0, 1)`, `eps` the
/// L1 convergence tolerance. On return `p` holds the rank vector,
/// normalized to sum 1.
pub fn pr(p: &mut Vec<f32>, a: &Matrix<f32>, alpha: f32, eps: f32) -> Result<()> {
    let n = a.n_rows();
    if a.n_cols() != n {
        return Err(Error::invalid_argument("a", "adjacency matrix must be square"));
    }
    if n == 0 {
        p.clear();
        return Ok(());
    }
    if !(0.0..1.0).contains(&alpha) {
        return Err(Error::invalid_argument("alpha", "damping must be in [0, 1)"));
    }

    let lib = a.library().clone();

    // Row-normalize the edge weights so each vertex distributes its rank.
    let (rows, cols, vals) = a.read()?;
    let mut out_weight = vec![0.0f32; n];
    for (&r, &x) in rows.iter().zip(vals.iter()) {
        out_weight[r as usize] += x;
    }
    let normalized: Vec<f32> = rows
        .iter()
        .zip(vals.iter())
        .map(|(&r, &x)| x / out_weight[r as usize])
        .collect();
    let m = Matrix::<f32>::new(&lib, n, n)?;
    m.build(
        &rows,
        &cols,
        &normalized,
        Descriptor::new().values_sorted().no_duplicates(),
    )?;

    let mut rank = Vector::<f32>::new(&lib, n)?;
    let uniform: Vec<u32> = (0..n as u32).collect();
    rank.build(&uniform, &vec![1.0 / n as f32; n], Descriptor::new())?;

    let ones = Vector::<f32>::new(&lib, n)?;
    ones.set_fill_value(1.0);

    let mult = op::mult::<f32>();
    let plus = op::plus::<f32>();
    let minus = op::minus::<f32>();
    let abs = op::abs::<f32>();
    let nonzero = op::nonzero::<f32>();
    let zero = Scalar::new(0.0f32);
    let teleport = Scalar::new((1.0 - alpha) / n as f32);

    for _ in 0..MAX_ITERATIONS {
        let spread = Vector::<f32>::new(&lib, n)?;
        let sum = Scalar::new(0.0f32);

        let mut expr = Expression::new(&lib);
        let step = expr.vxm_masked(
            &spread,
            &ones,
            &rank,
            &m,
            &mult,
            &plus,
            &nonzero,
            &zero,
            Descriptor::new(),
        )?;
        let damp = expr.map(&spread, &spread, &op::scale(alpha), Descriptor::new())?;
        let tele = expr.assign_masked(
            &spread,
            &ones,
            &teleport,
            &plus,
            &nonzero,
            Descriptor::new(),
        )?;
        let tally = expr.reduce(&sum, &zero, &spread, &plus, Descriptor::new())?;
        expr.depends(damp, step)?;
        expr.depends(tele, damp)?;
        expr.depends(tally, tele)?;
        expr.submit()?;
        expr.wait()?;

        let total = sum.get();
        if total <= 0.0 {
            break;
        }

        let next = Vector::<f32>::new(&lib, n)?;
        let diff = Vector::<f32>::new(&lib, n)?;
        let err = Scalar::new(0.0f32);

        let mut expr = Expression::new(&lib);
        let norm = expr.map(&next, &spread, &op::scale(1.0 / total), Descriptor::new())?;
        let sub = expr.ewise_add(&diff, None, &minus, &next, &rank, Descriptor::new())?;
        let mag = expr.map(&diff, &diff, &abs, Descriptor::new())?;
        let fold = expr.reduce(&err, &zero, &diff, &plus, Descriptor::new())?;
        expr.depends(sub, norm)?;
        expr.depends(mag, sub)?;
        expr.depends(fold, mag)?;
        expr.submit()?;
        expr.wait()?;

        rank = next;
        if err.get() < eps {
            break;
        }
    }

    p.clear();
    p.resize(n, 0.0);
    let (indices, values) = rank.read()?;
    for (&i, &x) in indices.iter().zip(values.iter()) {
        p[i as usize] = x;
    }
    Ok(())
}

/// Naive power iteration over adjacency lists, the test oracle
pub fn pr_naive(
    p: &mut Vec<f32>,
    adjacency: &[Vec<u32>],
    alpha: f32,
    eps: f32,
) -> Result<()> {
    let n = adjacency.len();
    if n == 0 {
        p.clear();
        return Ok(());
    }

    p.clear();
    p.resize(n, 1.0 / n as f32);

    for _ in 0..MAX_ITERATIONS {
        let mut next = vec![(1.0 - alpha) / n as f32; n];
        for (u, edges) in adjacency.iter().enumerate() {
            if edges.is_empty() {
                continue;
            }
            let share = alpha * p[u] / edges.len() as f32;
            for &w in edges {
                next[w as usize] += share;
            }
        }
        let total: f32 = next.iter().sum();
        for x in &mut next {
            *x /= total;
        }

        let err: f32 = next.iter().zip(p.iter()).map(|(a, b)| (a - b).abs()).sum();
        p.copy_from_slice(&next);
        if err < eps {
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
    fn test_pagerank_isolated_vertex() {
        let lib = Library::new();
        let a = Matrix::<f32>::new(&lib, 1, 1).unwrap();

        let mut p = Vec::new();
        pr(&mut p, &a, 0.85, 1e-6).unwrap();
        assert_eq!(p, vec![1.0]);
    }

    #[test]
    fn test_pagerank_cycle_is_uniform() {
        let lib = Library::new();
        // 3-cycle: every vertex has the same rank.
        let a = Matrix::<f32>::new(&lib, 3, 3).unwrap();
        a.build(&[0, 1, 2], &[1, 2, 0], &[1.0, 1.0, 1.0], Descriptor::new())
            .unwrap();

        let mut p = Vec::new();
        pr(&mut p, &a, 0.85, 1e-6).unwrap();
        for &x in &p {
            assert!((x - 1.0 / 3.0).abs() < 1e-4, "got {p:?}");
        }
    }

    #[test]
    fn test_pagerank_matches_naive() {
        let lib = Library::new();
        let rows = vec![0, 1, 1, 2, 3];
        let cols = vec![1, 0, 2, 0, 2];
        let a = Matrix::<f32>::new(&lib, 4, 4).unwrap();
        a.build(&rows, &cols, &[1.0; 5], Descriptor::new()).unwrap();

        let mut adjacency = vec![Vec::new(); 4];
        for (&r, &c) in rows.iter().zip(cols.iter()) {
            adjacency[r as usize].push(c);
        }

        let mut got = Vec::new();
        pr(&mut got, &a, 0.85, 1e-7).unwrap();
        let mut want = Vec::new();
        pr_naive(&mut want, &adjacency, 0.85, 1e-7).unwrap();

        for (g, w) in got.iter().zip(want.iter()) {
            assert!((g - w).abs() < 1e-3, "got {got:?}, want {want:?}");
        }
    }
}
