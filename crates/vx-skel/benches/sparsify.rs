use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vx_core::Vec3f;
use vx_skel::{sparsify_skeleton, SkeletonGraph, SparsifyConfig};

fn build_wavy_chain(n: usize) -> SkeletonGraph {
    let mut g = SkeletonGraph::new();
    for i in 0..n {
        let x = i as f32 * 80.0;
        let y = (i as f32 * 0.1).sin() * 40.0;
        g.add_node(Vec3f::new(x, y, 0.0), 1.0);
    }
    for i in 1..n {
        g.add_edge(i - 1, i);
    }
    g
}

fn bench_sparsify(c: &mut Criterion) {
    let graph = build_wavy_chain(10_000);
    let cfg = SparsifyConfig::default();

    c.bench_function("sparsify_chain_10k", |b| {
        b.iter(|| {
            let out = sparsify_skeleton(black_box(&graph), &cfg);
            black_box(out.nodes.len());
        });
    });
}

criterion_group!(benches, bench_sparsify);
criterion_main!(benches);
