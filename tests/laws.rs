//! Algebraic laws the runtime must satisfy regardless of formats

use approx::assert_relative_eq;

use sparr::desc::Descriptor;
use sparr::expr::Expression;
use sparr::library::{Config, Library};
use sparr::matrix::Matrix;
use sparr::op;
use sparr::scalar::Scalar;
use sparr::vector::Vector;

fn run_vxm(
    lib: &Library,
    v: &Vector<f32>,
    m: &Matrix<f32>,
    mask: &Vector<f32>,
    early_exit: bool,
) -> Vec<f32> {
    let r = Vector::<f32>::new(lib, m.n_cols()).unwrap();
    let mult = op::mult::<f32>();
    let plus = op::plus::<f32>();
    let nonzero = op::nonzero::<f32>();
    let desc = if early_exit {
        Descriptor::new().early_exit()
    } else {
        Descriptor::new()
    };

    let mut expr = Expression::new(lib);
    expr.vxm_masked(&r, mask, v, m, &mult, &plus, &nonzero, &Scalar::new(0.0), desc)
        .unwrap();
    expr.submit().unwrap();
    expr.wait().unwrap();

    (0..m.n_cols()).map(|i| r.get(i).unwrap()).collect()
}

fn reference_vxm(v: &[f32], triples: &[(usize, usize, f32)], n_cols: usize) -> Vec<f32> {
    let mut r = vec![0.0f32; n_cols];
    for &(i, j, x) in triples {
        if v[i] != 0.0 {
            r[j] += v[i] * x;
        }
    }
    r
}

#[test]
fn test_all_true_mask_equals_unmasked_product() {
    let lib = Library::new();
    let triples = vec![(0, 1, 2.0), (1, 2, 3.0), (2, 0, 4.0), (2, 2, 5.0)];
    let m = Matrix::<f32>::new(&lib, 3, 3).unwrap();
    for &(i, j, x) in &triples {
        m.set(i, j, x).unwrap();
    }

    let dense_v = vec![1.0f32, 2.0, 0.5];
    let v = Vector::<f32>::new(&lib, 3).unwrap();
    v.build(&[0, 1, 2], &dense_v, Descriptor::new()).unwrap();

    let all_true = Vector::<f32>::new(&lib, 3).unwrap();
    all_true.set_fill_value(1.0);

    let got = run_vxm(&lib, &v, &m, &all_true, false);
    let want = reference_vxm(&dense_v, &triples, 3);
    for (g, w) in got.iter().zip(want.iter()) {
        assert_relative_eq!(*g, *w);
    }
}

#[test]
fn test_all_false_mask_leaves_fill() {
    let lib = Library::new();
    let m = Matrix::<f32>::new(&lib, 3, 3).unwrap();
    m.build(&[0, 1], &[1, 2], &[2.0, 3.0], Descriptor::new())
        .unwrap();

    let v = Vector::<f32>::new(&lib, 3).unwrap();
    v.build(&[0, 1, 2], &[1.0, 1.0, 1.0], Descriptor::new())
        .unwrap();

    // Fill 0 and no entries: nothing is ever selected.
    let all_false = Vector::<f32>::new(&lib, 3).unwrap();

    for early_exit in [false, true] {
        let got = run_vxm(&lib, &v, &m, &all_false, early_exit);
        assert_eq!(got, vec![0.0, 0.0, 0.0]);
    }
}

#[test]
fn test_ewise_add_is_format_independent() {
    let lib = Library::new();

    // a arrives dense (point writes), b arrives as coordinates.
    let a = Vector::<f32>::new(&lib, 5).unwrap();
    a.set(0, 1.0).unwrap();
    a.set(3, 4.0).unwrap();

    let b = Vector::<f32>::new(&lib, 5).unwrap();
    b.build(&[0, 2], &[10.0, 20.0], Descriptor::new()).unwrap();

    let w = Vector::<f32>::new(&lib, 5).unwrap();
    let plus = op::plus::<f32>();

    let mut expr = Expression::new(&lib);
    expr.ewise_add(&w, None, &plus, &a, &b, Descriptor::new())
        .unwrap();
    expr.submit().unwrap();
    expr.wait().unwrap();

    let (idx, val) = w.read().unwrap();
    assert_eq!(idx, vec![0, 2, 3]);
    assert_eq!(val, vec![11.0, 20.0, 4.0]);
}

#[test]
fn test_build_is_order_independent() {
    let lib = Library::new();

    let m1 = Matrix::<i32>::new(&lib, 3, 3).unwrap();
    m1.set_reduce(op::plus::<i32>()).unwrap();
    m1.build(&[0, 2, 0], &[1, 2, 1], &[3, 7, 4], Descriptor::new())
        .unwrap();

    let m2 = Matrix::<i32>::new(&lib, 3, 3).unwrap();
    m2.set_reduce(op::plus::<i32>()).unwrap();
    m2.build(&[2, 0, 0], &[2, 1, 1], &[7, 4, 3], Descriptor::new())
        .unwrap();

    assert_eq!(m1.read().unwrap(), m2.read().unwrap());
}

#[test]
fn test_self_mask_vxm() {
    // Mask and source are the same object; the product must read the
    // mask's pre-update values.
    let lib = Library::new();
    let m = Matrix::<f32>::new(&lib, 3, 3).unwrap();
    m.build(&[0, 1], &[1, 2], &[1.0, 1.0], Descriptor::new())
        .unwrap();

    let v = Vector::<f32>::new(&lib, 3).unwrap();
    v.build(&[0], &[1.0], Descriptor::new()).unwrap();

    let got = run_vxm(&lib, &v, &m, &v, false);
    // Only column 1 receives a contribution, but mask v is 0 there; the
    // sole selected position is 0 where nothing lands.
    assert_eq!(got, vec![0.0, 0.0, 0.0]);
}

#[test]
fn test_laws_hold_across_block_grids() {
    for block_size in [1usize, 2, 64] {
        let lib = Library::with_config(Config {
            block_size,
            ..Config::default()
        });
        let triples = vec![(0, 1, 2.0), (1, 3, 3.0), (3, 0, 4.0), (2, 2, 1.5)];
        let m = Matrix::<f32>::new(&lib, 4, 4).unwrap();
        for &(i, j, x) in &triples {
            m.set(i, j, x).unwrap();
        }

        let dense_v = vec![1.0f32, 0.0, 2.0, 1.0];
        let v = Vector::<f32>::new(&lib, 4).unwrap();
        v.build(&[0, 2, 3], &[1.0, 2.0, 1.0], Descriptor::new())
            .unwrap();

        let all_true = Vector::<f32>::new(&lib, 4).unwrap();
        all_true.set_fill_value(1.0);

        let got = run_vxm(&lib, &v, &m, &all_true, false);
        let want = reference_vxm(&dense_v, &triples, 4);
        assert_eq!(got, want, "block_size {block_size}");
    }
}
