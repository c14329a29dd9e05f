use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use facetriage_store::{Identity, MemoryStore};
use facetriage_template::{Matcher, MatcherConfig, Metric, TemplateStore};

fn pseudo_vec(dim: usize, seed: u64) -> Vec<f32> {
    let mut state = seed;
    (0..dim)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((state >> 33) as f32) / (u32::MAX as f32) - 0.5
        })
        .collect()
}

fn registry(dim: usize, n: usize) -> Arc<TemplateStore> {
    let store = Arc::new(TemplateStore::open(dim, Arc::new(MemoryStore::new())).unwrap());
    for i in 0..n {
        let embeddings = (0..3).map(|k| pseudo_vec(dim, (i * 3 + k) as u64)).collect();
        store
            .enroll(Identity::new(format!("P{i}")).unwrap(), embeddings)
            .unwrap();
    }
    store
}

fn bench_identify(c: &mut Criterion) {
    let dim = 128;
    for n in [100, 500] {
        let store = registry(dim, n);
        let probe = pseudo_vec(dim, 999_999);
        for metric in [Metric::Euclidean, Metric::Cosine] {
            let m = Matcher::new(
                store.clone(),
                MatcherConfig {
                    threshold: 0.6,
                    metric,
                },
            )
            .unwrap();
            let name = format!("identify_{dim}d_{n}ids_{metric:?}").to_lowercase();
            c.bench_function(&name, |b| {
                b.iter(|| {
                    let _ = black_box(m.identify(black_box(&probe)));
                });
            });
        }
    }
}

fn bench_enroll(c: &mut Criterion) {
    let dim = 128;
    c.bench_function("enroll_128d_into_200ids", |b| {
        b.iter_with_setup(
            || registry(dim, 200),
            |store| {
                store
                    .enroll(
                        Identity::new("new").unwrap(),
                        vec![pseudo_vec(dim, 1), pseudo_vec(dim, 2)],
                    )
                    .unwrap();
            },
        );
    });
}

criterion_group!(benches, bench_identify, bench_enroll);
criterion_main!(benches);
