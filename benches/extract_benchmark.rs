//! Benchmarks for pdfsift extraction performance.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream, StringFormat};
use pdfsift::parser::{InMemoryLoader, InMemoryProvider};
use pdfsift::pipeline::RevisionScan;
use pdfsift::{Extractor, Metadata};

/// Creates a PDF with the given number of pages, a few lines of text each.
fn create_test_pdf(page_count: usize) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for i in 0..page_count {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("TL", vec![14.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
        ];
        for line in 0..20 {
            let text = format!("Page {} line {line}: benchmark content for pdfsift.", i + 1);
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(text.into_bytes(), StringFormat::Literal)],
            ));
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("ET", vec![]));
        let content = Content { operations }.encode().unwrap();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        });
        kids.push(Object::from(page_id));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Benchmark PDF format detection.
fn bench_format_detection(c: &mut Criterion) {
    let pdf_data = create_test_pdf(1);
    let non_pdf_data = b"Not a PDF file at all, just random text content";

    c.bench_function("detect_valid_pdf", |b| {
        b.iter(|| pdfsift::detect_format_from_bytes(black_box(&pdf_data)).unwrap());
    });

    c.bench_function("detect_non_pdf", |b| {
        b.iter(|| pdfsift::detect_format_from_bytes(black_box(non_pdf_data)).is_err());
    });
}

/// Benchmark the trailer scan over a file with many saves.
fn bench_revision_scan(c: &mut Criterion) {
    let mut data = create_test_pdf(10);
    for i in 0..50 {
        let update = format!("\n% update {i}\nstartxref\n{}\n%%EOF\n", 1000 + i);
        data.extend_from_slice(update.as_bytes());
    }

    c.bench_function("revision_scan_50_updates", |b| {
        b.iter(|| RevisionScan::scan(black_box(&data)).update_count());
    });
}

/// Benchmark full extraction at various sizes.
fn bench_extraction(c: &mut Criterion) {
    let extractor = Extractor::new();
    let mut group = c.benchmark_group("extraction");

    for page_count in [1, 5, 10] {
        let data = create_test_pdf(page_count);
        group.bench_function(format!("{page_count}_pages"), |b| {
            b.iter(|| extractor.extract_to_events(black_box(&data), Metadata::new()).unwrap());
        });
    }

    let text = "The quick brown fox jumps over the lazy dog.\n".repeat(40);
    let provider = (0..10).fold(InMemoryProvider::with_pages(10), |p, i| p.with_text(i, &text));
    let in_memory = Extractor::builder()
        .loader(InMemoryLoader::new(provider))
        .build()
        .unwrap();
    group.bench_function("in_memory_10_pages", |b| {
        b.iter(|| in_memory.extract_to_events(black_box(b""), Metadata::new()).unwrap());
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_format_detection,
    bench_revision_scan,
    bench_extraction,
);
criterion_main!(benches);
