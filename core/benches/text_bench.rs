use criterion::{criterion_group, criterion_main, Criterion};
use wikirec_core::text::normalize;

fn bench_normalize(c: &mut Criterion) {
    let page = "The quick brown fox jumps over the lazy dog, running through \
                fields of wheat and barley near the old stone bridge. "
        .repeat(200);
    c.bench_function("normalize_page", |b| b.iter(|| normalize(&page)));
}

criterion_group!(benches, bench_normalize);
criterion_main!(benches);
