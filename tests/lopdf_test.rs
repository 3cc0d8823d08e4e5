//! Integration tests for extraction from real PDF bytes.

use std::fs;
use std::sync::Arc;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream, StringFormat};
use pdfsift::model::keys;
use pdfsift::render::ContentEvent;
use pdfsift::{
    detect_format_from_bytes, extract_batch, extract_bytes, extract_file, EmbeddedCollector, Error,
    ExtractOptions, Extractor, Metadata,
};
use tempfile::TempDir;

fn text(s: &str) -> Object {
    Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
}

fn page_content(word: &str) -> Vec<u8> {
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![text(word)]),
            Operation::new("ET", vec![]),
        ],
    };
    content.encode().unwrap()
}

/// One page per word, a Helvetica font, an Info dictionary and a flat
/// outline with one entry per page.
fn create_test_pdf(words: &[&str]) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for word in words {
        let content_id = doc.add_object(Stream::new(dictionary! {}, page_content(word)));
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
            "Count" => words.len() as i64,
        }),
    );

    let outlines_id = doc.new_object_id();
    let item_ids: Vec<_> = words.iter().map(|_| doc.new_object_id()).collect();
    for (i, (word, id)) in words.iter().zip(&item_ids).enumerate() {
        let mut item = dictionary! {
            "Title" => text(&format!("Section {word}")),
            "Parent" => outlines_id,
        };
        if let Some(next) = item_ids.get(i + 1) {
            item.set("Next", *next);
        }
        doc.objects.insert(*id, Object::Dictionary(item));
    }
    let mut outlines = dictionary! { "Type" => "Outlines" };
    if let (Some(first), Some(last)) = (item_ids.first(), item_ids.last()) {
        outlines.set("First", *first);
        outlines.set("Last", *last);
    }
    doc.objects.insert(outlines_id, Object::Dictionary(outlines));

    let info_id = doc.add_object(dictionary! {
        "Title" => text("Quarterly Report"),
        "Author" => text("Finance Team"),
        "Keywords" => text("budget; forecast"),
        "Producer" => text("pdfsift tests"),
    });
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "Outlines" => outlines_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Append a second trailer pointing at the existing cross-reference table,
/// as an empty incremental save would.
fn append_update(data: &[u8]) -> Vec<u8> {
    let tail = String::from_utf8_lossy(data);
    let start = tail.rfind("startxref").unwrap() + "startxref".len();
    let offset: u64 = tail[start..]
        .split_whitespace()
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap();
    let mut updated = data.to_vec();
    updated.extend_from_slice(format!("\n% empty update\nstartxref\n{offset}\n%%EOF\n").as_bytes());
    updated
}

#[test]
fn test_extract_bytes_text_and_pages() {
    let data = create_test_pdf(&["Alpha", "Beta"]);
    let extraction = extract_bytes(&data).unwrap();

    assert_eq!(extraction.stats.page_count, 2);
    assert!(!extraction.is_partial());
    let text = extraction.text();
    assert!(text.contains("Alpha"));
    assert!(text.contains("Beta"));
    assert!(text.find("Alpha").unwrap() < text.find("Beta").unwrap());

    let metadata = &extraction.metadata;
    assert_eq!(metadata.get(keys::N_PAGES), Some("2"));
    assert_eq!(metadata.get(keys::CONTENT_TYPE), Some("application/pdf"));
    assert_eq!(metadata.get(keys::PDF_VERSION), Some("1.5"));
    assert_eq!(metadata.get(keys::ENCRYPTED), Some("false"));
    assert_eq!(metadata.get_all(keys::CHARS_PER_PAGE), &["5", "4"]);
}

#[test]
fn test_info_dictionary_metadata() {
    let extraction = extract_bytes(&create_test_pdf(&["Alpha"])).unwrap();
    let metadata = &extraction.metadata;

    assert_eq!(metadata.get(keys::TITLE), Some("Quarterly Report"));
    assert_eq!(metadata.get(keys::DOC_INFO_TITLE), Some("Quarterly Report"));
    assert_eq!(metadata.get(keys::CREATOR), Some("Finance Team"));
    assert_eq!(metadata.get(keys::PRODUCER), Some("pdfsift tests"));
    assert_eq!(metadata.get_all(keys::SUBJECT), &["budget", "forecast"]);
}

#[test]
fn test_outline_becomes_list() {
    let data = create_test_pdf(&["Alpha", "Beta", "Gamma"]);
    let extraction = extract_bytes(&data).unwrap();
    let text = extraction.text();
    for title in ["Section Alpha", "Section Beta", "Section Gamma"] {
        assert!(text.contains(title), "missing bookmark {title}");
    }

    let extractor = Extractor::new()
        .with_options(ExtractOptions::default().with_bookmarks_text(false))
        .unwrap();
    let extraction = pdfsift::extract_bytes_with(&extractor, &data, Default::default()).unwrap();
    assert!(!extraction.text().contains("Section"));
}

#[test]
fn test_extract_file_names_resource() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("report.pdf");
    fs::write(&path, create_test_pdf(&["Alpha"])).unwrap();

    let extraction = extract_file(&path).unwrap();
    assert_eq!(extraction.metadata.get(keys::RESOURCE_NAME), Some("report.pdf"));
    assert!(extraction.text().contains("Alpha"));
    assert_eq!(pdfsift::extract_text(&path).unwrap(), extraction.text());
}

#[test]
fn test_incremental_update_counted() {
    let original = create_test_pdf(&["Alpha"]);
    let extraction = extract_bytes(&original).unwrap();
    assert_eq!(extraction.metadata.get(keys::INCREMENTAL_UPDATE_COUNT), Some("0"));

    let updated = append_update(&original);
    let extraction = extract_bytes(&updated).unwrap();
    assert_eq!(extraction.metadata.get(keys::INCREMENTAL_UPDATE_COUNT), Some("1"));
    assert_eq!(extraction.metadata.get_all(keys::EOF_OFFSETS).len(), 2);
    assert!(extraction.text().contains("Alpha"));
}

#[test]
fn test_format_detection() {
    let data = create_test_pdf(&["Alpha"]);
    let format = detect_format_from_bytes(&data).unwrap();
    assert_eq!(format.version, "1.5");

    assert!(matches!(extract_bytes(b"GIF89a\x01\x00\x01\x00"), Err(Error::UnknownFormat)));
    let truncated = &data[..data.len() / 3];
    assert!(extract_bytes(truncated).is_err());
}

#[test]
fn test_batch_keeps_input_order() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.pdf");
    let bad = dir.path().join("bad.pdf");
    let other = dir.path().join("other.pdf");
    fs::write(&good, create_test_pdf(&["Alpha"])).unwrap();
    fs::write(&bad, b"%PDF-1.4\nthis is not really a pdf").unwrap();
    fs::write(&other, create_test_pdf(&["Beta", "Gamma"])).unwrap();

    let paths = [good.clone(), bad.clone(), other.clone()];
    let results = extract_batch(&Extractor::new(), &paths);

    let order: Vec<_> = results.iter().map(|(p, _)| p.clone()).collect();
    assert_eq!(order, vec![good, bad, other]);
    assert!(results[0].1.as_ref().is_ok_and(|e| e.text().contains("Alpha")));
    assert!(results[1].1.is_err());
    assert!(results[2].1.as_ref().is_ok_and(|e| e.stats.page_count == 2));
}

/// One page with a stamp annotation that carries an embedded file spec
/// three dictionaries down.
fn create_nested_attachment_pdf() -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let file_id = doc.add_object(Stream::new(
        dictionary! { "Type" => "EmbeddedFile" },
        b"deep".to_vec(),
    ));
    let spec_id = doc.add_object(dictionary! {
        "Type" => "Filespec",
        "F" => text("deep.txt"),
        "EF" => dictionary! { "F" => file_id },
    });
    let annot_id = doc.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Stamp",
        "Rect" => vec![0.into(), 0.into(), 10.into(), 10.into()],
        "Extra" => dictionary! { "Deeper" => dictionary! { "Spec" => spec_id } },
    });
    let content_id = doc.add_object(Stream::new(dictionary! {}, page_content("Stamped")));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Annots" => vec![annot_id.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

fn embedded_sources(extractor: &Extractor, data: &[u8]) -> Vec<String> {
    let extraction = extractor.extract_to_events(data, Metadata::new()).unwrap();
    extraction
        .events
        .iter()
        .filter_map(|e| match e {
            ContentEvent::StartElement { attributes, .. }
                if attributes.get("class") == Some("embedded") =>
            {
                attributes.get("source").map(str::to_string)
            }
            _ => None,
        })
        .collect()
}

#[test]
fn test_recursion_depth_reaches_graph_reader() {
    let data = create_nested_attachment_pdf();
    let collector = Arc::new(EmbeddedCollector::new());
    let extractor = Extractor::builder()
        .embedded_extractor(collector.clone())
        .build()
        .unwrap();
    assert_eq!(embedded_sources(&extractor, &data), vec!["Stamp"]);

    // too shallow to find the spec under the annotation; the document
    // scan still picks it up
    let shallow = extractor
        .with_options(ExtractOptions::default().with_max_recursion_depth(2))
        .unwrap();
    assert_eq!(embedded_sources(&shallow, &data), vec!["attachment"]);

    let resources = collector.take();
    assert_eq!(resources.len(), 2);
    assert!(resources.iter().all(|r| r.bytes == b"deep"));
}
