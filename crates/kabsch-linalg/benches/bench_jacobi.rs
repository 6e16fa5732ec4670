use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{DMat3, DVec3};
use kabsch_linalg::{
    jacobi::{jacobi_eigen, jacobi_eigen3, JacobiParams},
    mat3,
};

fn bench_jacobi(c: &mut Criterion) {
    let mut group = c.benchmark_group("jacobi");

    let r = DMat3::from_rotation_y(0.7) * DMat3::from_rotation_x(-0.3);
    let a = r * DMat3::from_diagonal(DVec3::new(9.0, 4.0, 1.0)) * r.transpose();
    let a = (a + a.transpose()) * 0.5;

    for (name, params) in [
        ("relative", JacobiParams::default()),
        ("absolute", JacobiParams::absolute()),
    ] {
        group.bench_with_input(BenchmarkId::new("eigen3", name), &params, |b, params| {
            b.iter(|| jacobi_eigen3(black_box(&a), params))
        });
    }

    for n in [3, 6, 10] {
        let m = faer::Mat::<f64>::from_fn(n, n, |i, j| 1.0 / ((i + j + 1) as f64));
        group.bench_with_input(BenchmarkId::new("eigen_hilbert", n), &m, |b, m| {
            b.iter(|| jacobi_eigen(black_box(m), &JacobiParams::default()))
        });
    }

    group.bench_function("aat_ata", |b| {
        b.iter(|| (mat3::aat(black_box(&a)), mat3::ata(black_box(&a))))
    });

    group.finish();
}

criterion_group!(benches, bench_jacobi);
criterion_main!(benches);
