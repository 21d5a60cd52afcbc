use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use mimeview::message::{Message, RenderMode};

fn fixture_bytes(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read(path).unwrap()
}

fn bench_build_tree(c: &mut Criterion) {
    let raw = fixture_bytes("nested.eml");

    c.bench_function("build_tree_nested", |b| {
        b.iter(|| Message::from_bytes(raw.as_slice()).unwrap().root().node_count())
    });
}

fn bench_viewable_text(c: &mut Criterion) {
    let message = Message::from_bytes(fixture_bytes("alternative.eml")).unwrap();
    let attachments = Message::from_bytes(fixture_bytes("attachments.eml")).unwrap();

    c.bench_function("viewable_text_html", |b| {
        b.iter(|| message.viewable_text(RenderMode::Html))
    });
    c.bench_function("viewable_text_fallback", |b| {
        b.iter(|| message.viewable_text(RenderMode::HtmlFallback))
    });
    c.bench_function("attachment_contents", |b| {
        b.iter(|| {
            attachments
                .attachments()
                .iter()
                .map(|n| n.raw_contents().unwrap().len())
                .sum::<usize>()
        })
    });
}

criterion_group!(benches, bench_build_tree, bench_viewable_text);
criterion_main!(benches);
