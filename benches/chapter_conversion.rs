use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mkabook::chapters::parse_chapters;
use mkabook::ChapterLayout;

/// A long chapter file: 200 parts with 10 indented chapters each
fn sample_chapters() -> String {
    let mut content = String::new();
    for part in 0..200 {
        content.push_str(&format!("{:02}:{:02}:00.000 Part {}\n", part / 60, part % 60, part));
        for chapter in 0..10 {
            content.push_str(&format!(
                "{:02}:{:02}:{:02}.000 \tChapter {} & more\n",
                part / 60,
                part % 60,
                chapter * 5,
                chapter
            ));
        }
    }
    content
}

/// Benchmark parsing the indented text format
fn bench_parse(c: &mut Criterion) {
    let content = sample_chapters();
    c.bench_function("parse_chapters", |b| {
        b.iter(|| parse_chapters(black_box(&content)))
    });
}

/// Benchmark both XML layouts
fn bench_render(c: &mut Criterion) {
    let tree = match parse_chapters(&sample_chapters()) {
        Ok(tree) => tree,
        Err(e) => panic!("sample chapters should parse: {e}"),
    };

    c.bench_function("render_xml_flattened", |b| {
        b.iter(|| black_box(&tree).to_xml(ChapterLayout::Flattened))
    });
    c.bench_function("render_xml_nested", |b| {
        b.iter(|| black_box(&tree).to_xml(ChapterLayout::Nested))
    });
}

criterion_group!(benches, bench_parse, bench_render);
criterion_main!(benches);
