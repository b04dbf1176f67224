use candle_core::{Device, Tensor};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use model::{BaoBao, ModelConfig};

fn bench_forward(c: &mut Criterion) {
    let device = Device::Cpu;
    let num_tokens = 4096usize;
    let mut group = c.benchmark_group("baobao/forward");
    group.sample_size(10);

    for &(dim, depth, seq) in &[(256usize, 2usize, 128usize), (512, 6, 256)] {
        let mut config = ModelConfig::language_model(num_tokens, seq, dim, depth);
        config.device = device.clone();
        let model = BaoBao::new(config).expect("model");
        model.set_training(false);

        let ids = Tensor::arange(0u32, seq as u32, &device)
            .and_then(|t| t.reshape((1, seq)))
            .expect("ids");
        group.throughput(Throughput::Elements(seq as u64));
        group.bench_with_input(
            BenchmarkId::new(format!("dim{dim}_depth{depth}"), seq),
            &ids,
            |b, ids| {
                b.iter(|| {
                    let logits = model.forward(black_box(ids)).expect("forward");
                    black_box(logits);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_forward);
criterion_main!(benches);
