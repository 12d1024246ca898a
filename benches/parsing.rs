use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

fn bench_parse_message(c: &mut Criterion) {
    let fixture_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("maildir")
        .join("allen-p")
        .join("sent_items")
        .join("1.");
    let raw = std::fs::read(&fixture_path).unwrap();

    c.bench_function("parse_multipart_message", |b| {
        b.iter(|| mailgraph::parser::eml::parse_message(&raw, &fixture_path).unwrap())
    });
}

fn bench_walk_maildir(c: &mut Criterion) {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("maildir")
        .join("allen-p");

    c.bench_function("walk_fixture_maildir", |b| {
        b.iter(|| {
            let mut walker = mailgraph::corpus::CorpusWalker::new();
            walker.process(&[root.clone()], None, None).unwrap()
        })
    });
}

criterion_group!(benches, bench_parse_message, bench_walk_maildir);
criterion_main!(benches);
