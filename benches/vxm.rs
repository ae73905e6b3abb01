//! Masked vxm micro-benchmark

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use sparr::desc::Descriptor;
use sparr::expr::Expression;
use sparr::library::Library;
use sparr::matrix::Matrix;
use sparr::op;
use sparr::scalar::Scalar;
use sparr::vector::Vector;

fn bench_vxm(c: &mut Criterion) {
    let n = 4096usize;
    let nnz = 8 * n;
    let mut rng = StdRng::seed_from_u64(1);

    let lib = Library::new();
    let m = Matrix::<f32>::new(&lib, n, n).unwrap();
    let rows: Vec<u32> = (0..nnz).map(|_| rng.random_range(0..n) as u32).collect();
    let cols: Vec<u32> = (0..nnz).map(|_| rng.random_range(0..n) as u32).collect();
    let vals: Vec<f32> = (0..nnz).map(|_| rng.random_range(1..100) as f32).collect();
    m.set_reduce(op::plus::<f32>()).unwrap();
    m.build(&rows, &cols, &vals, Descriptor::new()).unwrap();

    let v = Vector::<f32>::new(&lib, n).unwrap();
    let v_idx: Vec<u32> = (0..n as u32 / 8).map(|i| i * 8).collect();
    v.build(&v_idx, &vec![1.0; v_idx.len()], Descriptor::new())
        .unwrap();

    let mask = Vector::<f32>::new(&lib, n).unwrap();
    mask.set_fill_value(1.0);

    let mult = op::mult::<f32>();
    let plus = op::plus::<f32>();
    let nonzero = op::nonzero::<f32>();

    c.bench_function("vxm_masked_4096", |b| {
        b.iter(|| {
            let r = Vector::<f32>::new(&lib, n).unwrap();
            let mut expr = Expression::new(&lib);
            expr.vxm_masked(
                &r,
                &mask,
                &v,
                &m,
                &mult,
                &plus,
                &nonzero,
                &Scalar::new(0.0),
                Descriptor::new(),
            )
            .unwrap();
            expr.submit().unwrap();
            expr.wait().unwrap();
            black_box(r.nnz().unwrap())
        });
    });
}

criterion_group!(benches, bench_vxm);
criterion_main!(benches);
