use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use densemul::{
    GemmConfig, HostOnly, Layout, MatrixView, MatrixViewMut, SimdLevel, VectorView, VectorViewMut,
    multiply_matrix_matrix_with_config, multiply_matrix_vector_with_config, multiply_vector_matrix_with_config,
};

fn bench_gemv(c: &mut Criterion) {
    let mut group = c.benchmark_group("gemv");

    // Both sides of the 72k-element small/large threshold
    let shapes = [(64, 64), (256, 256), (512, 368), (1024, 1024)];

    for (m, n) in shapes {
        let a: Vec<f64> = (0..m * n).map(|i| (i % 100) as f64).collect();
        let b: Vec<f64> = (0..n).map(|i| (i % 10) as f64).collect();
        let mut out = vec![0.0; m];

        for level in SimdLevel::available() {
            let config = GemmConfig::default().with_simd(level);
            let id = BenchmarkId::new(format!("{level:?}"), format!("{m}x{n}"));
            group.bench_with_input(id, &config, |bench, config| {
                bench.iter(|| {
                    multiply_matrix_vector_with_config(
                        &MatrixView::new(black_box(&a), m, n),
                        &VectorView::new(black_box(&b)),
                        &mut VectorViewMut::new(&mut out),
                        config,
                    )
                    .unwrap()
                    .notify(&HostOnly);
                });
            });
        }
    }

    group.finish();
}

fn bench_gevm(c: &mut Criterion) {
    let mut group = c.benchmark_group("gevm");

    for (m, n) in [(64, 64), (256, 256), (368, 512), (1024, 1024)] {
        let a: Vec<f64> = (0..m).map(|i| (i % 10) as f64).collect();
        let b: Vec<f64> = (0..m * n).map(|i| (i % 100) as f64).collect();
        let mut out = vec![0.0; n];

        for level in SimdLevel::available() {
            let config = GemmConfig::default().with_simd(level);
            let id = BenchmarkId::new(format!("{level:?}"), format!("{m}x{n}"));
            group.bench_with_input(id, &config, |bench, config| {
                bench.iter(|| {
                    multiply_vector_matrix_with_config(
                        &VectorView::new(black_box(&a)),
                        &MatrixView::new(black_box(&b), m, n),
                        &mut VectorViewMut::new(&mut out),
                        config,
                    )
                    .unwrap()
                    .notify(&HostOnly);
                });
            });
        }
    }

    group.finish();
}

fn bench_gemm(c: &mut Criterion) {
    let mut group = c.benchmark_group("gemm");
    group.sample_size(20);

    // 64x64 runs the small kernel, the rest the blocked one
    for size in [64, 128, 256, 512] {
        let a: Vec<f64> = (0..size * size).map(|i| (i % 100) as f64).collect();
        let b: Vec<f64> = (0..size * size).map(|i| ((i * 2) % 100) as f64).collect();
        let mut out = vec![0.0; size * size];

        for level in SimdLevel::available() {
            let config = GemmConfig::default().with_simd(level);
            let id = BenchmarkId::new(format!("{level:?}"), size);
            group.bench_with_input(id, &config, |bench, config| {
                bench.iter(|| {
                    multiply_matrix_matrix_with_config(
                        &MatrixView::new(black_box(&a), size, size),
                        &MatrixView::new(black_box(&b), size, size),
                        &mut MatrixViewMut::new(&mut out, size, size),
                        config,
                    )
                    .unwrap()
                    .notify(&HostOnly);
                });
            });
        }

        group.bench_with_input(BenchmarkId::new("naive", size), &size, |bench, &size| {
            bench.iter(|| {
                multiply_matrix_matrix_with_config(
                    &MatrixView::with_layout(black_box(&a), size, size, Layout::ColumnMajor),
                    &MatrixView::new(black_box(&b), size, size),
                    &mut MatrixViewMut::new(&mut out, size, size),
                    &GemmConfig::default(),
                )
                .unwrap()
                .notify(&HostOnly);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_gemv, bench_gevm, bench_gemm);
criterion_main!(benches);
