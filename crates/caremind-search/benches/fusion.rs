use caremind_core::{Hit, HitMeta, HitSource};
use caremind_search::FusionStrategy;
use caremind_search::semantic::{Embedder, HashEmbedder};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

const SIZES: [usize; 3] = [8, 64, 512];

#[allow(clippy::cast_precision_loss)]
fn hit_list(len: usize, source: HitSource) -> Vec<Hit> {
    (0..len)
        .map(|i| {
            let score = ((i * 7919) % 1000) as f32 / 1000.0;
            let id = match source {
                HitSource::Guideline => format!("g{i}"),
                HitSource::Drug => format!("drug:{i}"),
            };
            Hit::new(id, "content", HitMeta::default(), score, source)
        })
        .collect()
}

fn bench_fusion(c: &mut Criterion) {
    let mut group = c.benchmark_group("fusion.fuse");

    for size in SIZES {
        let guideline = hit_list(size, HitSource::Guideline);
        let drug = hit_list(size, HitSource::Drug);
        group.throughput(Throughput::Elements((size * 2) as u64));

        for strategy in [FusionStrategy::default(), FusionStrategy::Rrf { k: 60.0 }] {
            let label = format!("{}/{size}", strategy.kind().as_str());
            group.bench_with_input(BenchmarkId::from_parameter(label), &size, |b, _| {
                b.iter(|| {
                    let fused = strategy
                        .fuse(black_box(&guideline), black_box(&drug), 8)
                        .unwrap_or_default();
                    black_box(fused.len())
                });
            });
        }
    }

    group.finish();
}

fn bench_embedding(c: &mut Criterion) {
    let embedder = HashEmbedder::default();
    let text = "老年高血压合并2型糖尿病患者的血压与血糖控制目标及阿司匹林一级预防的禁忌症";

    c.bench_function("embed.hash_384", |b| {
        b.iter(|| black_box(embedder.embed(black_box(text)).map(|v| v.len()).unwrap_or(0)));
    });
}

criterion_group!(benches, bench_fusion, bench_embedding);
criterion_main!(benches);
