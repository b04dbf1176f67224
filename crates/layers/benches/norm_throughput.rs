use candle_core::{DType, Device, Tensor};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use layers::{
    dtypes::PrecisionPolicy,
    norm::{build_norm, NormConfig, NormKind},
};

fn bench_norms(c: &mut Criterion) {
    let device = Device::Cpu;
    let batch = 8usize;
    let seq = 32usize;
    let hidden_sizes = &[512usize, 1024, 2048];
    let dtypes = &[DType::F16, DType::BF16, DType::F32];

    for &dtype in dtypes {
        let mut group = c.benchmark_group(format!("norm/{dtype:?}"));
        let policy = PrecisionPolicy::from_parameter_dtype(dtype);
        for &hidden in hidden_sizes {
            let input = Tensor::randn(0f32, 1.0, (batch, seq, hidden), &device)
                .and_then(|t| t.to_dtype(dtype))
                .expect("input");
            group.throughput(Throughput::Elements((batch * seq * hidden) as u64));

            for (label, kind) in [("layer", NormKind::LayerNorm), ("rms", NormKind::RmsNorm)] {
                let norm = build_norm(NormConfig::new(hidden, kind), dtype, &device).expect("norm");
                group.bench_with_input(BenchmarkId::new(label, hidden), &input, |b, input| {
                    b.iter(|| {
                        let out = norm.forward(black_box(input), &policy).expect("forward");
                        black_box(out);
                    });
                });
            }
        }
        group.finish();
    }
}

criterion_group!(benches, bench_norms);
criterion_main!(benches);
