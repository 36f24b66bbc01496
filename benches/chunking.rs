use corpus_rag::embeddings::chunking::{ChunkingConfig, chunk_text};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn sample_document() -> String {
    let paragraph = "The Githyanki hunt the Mind Flayers across the Astral Plane, \
        guided by their lich-queen Vlaakith. Their silver swords cut the silver cords \
        of astral travellers. Ünïcödé characters keep the boundaries honest. ";
    paragraph.repeat(400)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let content = sample_document();
    let config = ChunkingConfig::default();
    c.bench_function("chunking", |b| {
        b.iter(|| chunk_text(black_box(&content), black_box(&config)))
    });

    let small = ChunkingConfig::new(64, 16).expect("valid chunking config");
    c.bench_function("chunking_small_window", |b| {
        b.iter(|| chunk_text(black_box(&content), black_box(&small)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
