//! Benchmarks for the synchronous hot paths
//!
//! The fast path budget is spent almost entirely in store round-trips; these
//! benches guard the in-process pieces (classification, hashing, embedding)
//! against regressions that would eat into it.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use smriti_context::engine::classifier;
use smriti_context::engine::types::content_hash;
use smriti_context::stores::mem::{extract_entities, hash_embedding};

fn bench_classifier(c: &mut Criterion) {
    let queries = [
        "What's my dog's name?",
        "When did I visit Lisbon last year?",
        "How is Priya related to Arjun?",
        "Tell me everything you know about me",
        "thoughts on that restaurant we discussed",
    ];

    c.bench_function("classify_routing_class", |b| {
        b.iter(|| {
            for query in &queries {
                black_box(classifier::classify(black_box(query)));
            }
        })
    });
}

fn bench_content_hash(c: &mut Criterion) {
    let content = "User prefers dark mode in every editor and terminal they use, \
                   and has mentioned it at least three times across conversations";

    c.bench_function("content_hash", |b| {
        b.iter(|| black_box(content_hash(black_box(content))))
    });
}

fn bench_hash_embedding(c: &mut Criterion) {
    let content = "Alice works on distributed systems at Corvid Labs and has a \
                   golden retriever named Biscuit who hates thunderstorms";

    c.bench_function("hash_embedding_64", |b| {
        b.iter(|| black_box(hash_embedding(black_box(content), 64)))
    });
}

fn bench_extract_entities(c: &mut Criterion) {
    let content = "Priya met Arjun at the Montlake office before the Lisbon \
                   offsite with Sam and Caroline from Corvid Labs";

    c.bench_function("extract_entities", |b| {
        b.iter(|| black_box(extract_entities(black_box(content), 10)))
    });
}

criterion_group!(
    benches,
    bench_classifier,
    bench_content_hash,
    bench_hash_embedding,
    bench_extract_entities
);
criterion_main!(benches);
