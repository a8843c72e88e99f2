use biasgen::{Network, WeightMap, Weights};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

// `n_parents` roots of cardinality `card`, all parents of "child".
fn star(n_parents: usize, card: usize) -> (Network, WeightMap) {
    let mut net = Network::new();
    let mut p = WeightMap::new();
    for i in 0..n_parents {
        let parent = format!("p{}", i);
        net.add_edge(&parent, "child").unwrap();
        net.add_root_probability(&parent, vec![1.0; card], card)
            .unwrap();
        p.insert(parent, Weights::from([0.2, 0.5, 0.9]));
    }
    (net, p)
}

fn bench_synthesize(c: &mut Criterion) {
    for size in [2, 5] {
        let mut group = c.benchmark_group(format!("synthesize_card_{}", size));
        for n_parents in [2, 6, 10] {
            let (net, p) = star(n_parents, 3);
            group.bench_with_input(
                BenchmarkId::from_parameter(n_parents),
                &n_parents,
                |b, _| b.iter(|| net.synthesize("child", &p, size).unwrap()),
            );
        }
        group.finish();
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().significance_level(0.1).sample_size(10);
    targets = bench_synthesize
}
criterion_main!(benches);
