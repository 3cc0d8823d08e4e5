//! Integration tests for the page walk, driven through in-memory documents.

use pdfsift::model::{
    keys, AcroForm, Action, ActionTrigger, Annotation, AnnotationKind, Document, FieldKind,
    FormField, Glyph, MarkupText, Matrix, Metadata, Outline, Permissions, Signature, StructKid,
    StructTree, TriggeredAction,
};
use pdfsift::parser::{InMemoryLoader, InMemoryProvider};
use pdfsift::render::{ContentEvent, EventRecorder};
use pdfsift::{
    AccessCheckMode, CancellationToken, Error, ExtractOptions, Extraction, ExtractionSummary,
    Extractor,
};

const NOT_A_FILE: &[u8] = b"%PDF-1.7\n";

fn extractor(provider: InMemoryProvider, options: ExtractOptions) -> Extractor {
    Extractor::builder()
        .options(options)
        .loader(InMemoryLoader::new(provider))
        .build()
        .unwrap()
}

fn run(extractor: &Extractor) -> (EventRecorder, Metadata, ExtractionSummary) {
    let mut recorder = EventRecorder::new();
    let mut metadata = Metadata::new();
    let summary = extractor
        .extract(NOT_A_FILE, &mut metadata, &mut recorder, None)
        .unwrap();
    (recorder, metadata, summary)
}

fn extract(provider: InMemoryProvider, options: ExtractOptions) -> Extraction {
    extractor(provider, options)
        .extract_to_events(NOT_A_FILE, Metadata::new())
        .unwrap()
}

/// Start elements with the given name and class.
fn classed<'a>(events: &'a [ContentEvent], name: &'a str, class: &'a str) -> usize {
    events
        .iter()
        .filter(|e| match e {
            ContentEvent::StartElement { name: n, attributes } => {
                n == name && attributes.get("class") == Some(class)
            }
            _ => false,
        })
        .count()
}

#[test]
fn test_text_in_page_divs() {
    let provider = InMemoryProvider::with_pages(2)
        .with_text(0, "Hello world")
        .with_text(1, "Second page");
    let (recorder, metadata, summary) = run(&extractor(provider, ExtractOptions::default()));

    assert_eq!(recorder.page_count(), 2);
    assert_eq!(summary.page_count, 2);
    assert!(!summary.is_partial());
    let text = recorder.text();
    assert!(text.contains("Hello world"));
    assert!(text.find("Hello").unwrap() < text.find("Second").unwrap());

    assert_eq!(recorder.events().first(), Some(&ContentEvent::StartDocument));
    assert_eq!(recorder.events().last(), Some(&ContentEvent::EndDocument));
    assert_eq!(metadata.get(keys::N_PAGES), Some("2"));
    assert_eq!(metadata.get_all(keys::CHARS_PER_PAGE), &["11", "11"]);
    assert_eq!(metadata.get(keys::TOTAL_UNMAPPED_CHARS), Some("0"));
}

#[test]
fn test_every_page_fails_but_every_page_div_is_written() {
    let provider = InMemoryProvider::with_pages(3)
        .with_page_failure(0, "bad operator")
        .with_page_failure(1, "bad operator")
        .with_page_failure(2, "bad operator");
    let (recorder, metadata, summary) = run(&extractor(provider, ExtractOptions::default()));

    assert_eq!(recorder.page_count(), 3);
    assert_eq!(summary.warnings.len(), 3);
    assert!(summary.is_partial());
    assert_eq!(metadata.get_all(keys::WARNING).len(), 3);
    assert!(matches!(summary.warnings[1], Error::MalformedStream { page: 2, .. }));
}

#[test]
fn test_strict_mode_stops_at_first_failure() {
    let provider = InMemoryProvider::with_pages(3)
        .with_text(0, "fine")
        .with_page_failure(1, "bad operator");
    let extractor = extractor(provider, ExtractOptions::default().strict());
    let mut recorder = EventRecorder::new();
    let result = extractor.extract(NOT_A_FILE, &mut Metadata::new(), &mut recorder, None);

    assert!(matches!(result, Err(Error::MalformedStream { page: 2, .. })));
    assert_eq!(recorder.page_count(), 2);
    // every element opened before the failure is closed again
    let starts = recorder
        .events()
        .iter()
        .filter(|e| matches!(e, ContentEvent::StartElement { .. }))
        .count();
    let ends = recorder
        .events()
        .iter()
        .filter(|e| matches!(e, ContentEvent::EndElement { .. }))
        .count();
    assert_eq!(starts, ends);
}

#[test]
fn test_enforced_access_emits_nothing() {
    let mut doc = Document::with_pages(2);
    doc.permissions = Permissions::default().with_extraction(false, true);
    let provider = InMemoryProvider::new(doc).with_text(0, "secret");
    let options = ExtractOptions::default().with_access_check(AccessCheckMode::Enforce);
    let extractor = extractor(provider, options);

    let mut recorder = EventRecorder::new();
    let mut metadata = Metadata::new();
    let result = extractor.extract(NOT_A_FILE, &mut metadata, &mut recorder, None);

    assert!(matches!(result, Err(Error::AccessDenied(_))));
    assert!(result.unwrap_err().is_terminal());
    assert!(recorder.events().is_empty());
    assert_eq!(metadata.get_bool(keys::EXTRACT_CONTENT), Some(false));
}

#[test]
fn test_accessibility_mode_allows_accessible_documents() {
    let mut doc = Document::with_pages(1);
    doc.permissions = Permissions::default().with_extraction(false, true);
    let provider = InMemoryProvider::new(doc).with_text(0, "readable");
    let options = ExtractOptions::default().with_access_check(AccessCheckMode::AllowForAccessibility);
    let extraction = extract(provider, options);
    assert!(extraction.text().contains("readable"));
}

#[test]
fn test_password_handling() {
    let provider = InMemoryProvider::with_pages(1).with_text(0, "unlocked");
    let loader = InMemoryLoader::new(provider).with_password("s3cret");

    let locked = Extractor::builder().loader(loader.clone()).build().unwrap();
    let mut metadata = Metadata::new();
    let result = locked.extract(NOT_A_FILE, &mut metadata, &mut EventRecorder::new(), None);
    assert!(matches!(result, Err(Error::Encrypted)));
    assert_eq!(metadata.get_bool(keys::ENCRYPTED), Some(true));

    let wrong = Extractor::builder()
        .options(ExtractOptions::default().with_password("guess"))
        .loader(loader.clone())
        .build()
        .unwrap();
    let result = wrong.extract(NOT_A_FILE, &mut Metadata::new(), &mut EventRecorder::new(), None);
    assert!(matches!(result, Err(Error::InvalidPassword)));

    let from_provider = Extractor::builder()
        .loader(loader)
        .password_provider("s3cret".to_string())
        .build()
        .unwrap();
    let extraction = from_provider
        .extract_to_events(NOT_A_FILE, Metadata::new())
        .unwrap();
    assert!(extraction.text().contains("unlocked"));
    assert_eq!(extraction.metadata.get_bool(keys::ENCRYPTED), Some(true));
}

#[test]
fn test_write_limit() {
    let provider = InMemoryProvider::with_pages(2)
        .with_text(0, "abcdefghij")
        .with_text(1, "klmnopqrst");
    let extractor = extractor(provider, ExtractOptions::default().with_write_limit(5));
    let mut recorder = EventRecorder::new();
    let mut metadata = Metadata::new();
    let result = extractor.extract(NOT_A_FILE, &mut metadata, &mut recorder, None);

    assert!(matches!(result, Err(Error::WriteLimitReached(5))));
    assert_eq!(recorder.text(), "abcde");
    assert_eq!(metadata.get_bool(keys::WRITE_LIMIT_REACHED), Some(true));
}

#[test]
fn test_cancelled_before_first_page() {
    let extractor = extractor(InMemoryProvider::with_pages(4), ExtractOptions::default());
    let token = CancellationToken::new();
    token.cancel();
    let mut recorder = EventRecorder::new();
    let result = extractor.extract(NOT_A_FILE, &mut Metadata::new(), &mut recorder, Some(&token));

    assert!(matches!(result, Err(Error::Cancelled(0))));
    assert_eq!(recorder.page_count(), 0);
}

#[test]
fn test_bookmarks_bounded() {
    let mut doc = Document::with_pages(1);
    let mut outline = Outline::from_titles(["Intro", "Body", "End"]);
    let child = outline.push("Body details");
    outline.items[1].first_child = Some(child);
    // End points back at Intro
    outline.items[2].next_sibling = Some(0);
    doc.outline = Some(outline);

    let extraction = extract(InMemoryProvider::new(doc.clone()), ExtractOptions::default());
    let titles: Vec<_> = extraction
        .events
        .iter()
        .filter_map(ContentEvent::content)
        .collect();
    assert_eq!(titles, vec!["Intro", "Body", "Body details", "End"]);
    assert_eq!(extraction.stats.list_item_count, 4);

    let capped = extract(
        InMemoryProvider::new(doc.clone()),
        ExtractOptions::default().with_max_bookmark_items(2),
    );
    assert_eq!(capped.stats.list_item_count, 2);

    let off = extract(
        InMemoryProvider::new(doc),
        ExtractOptions::default().with_bookmarks_text(false),
    );
    assert_eq!(off.stats.list_item_count, 0);
}

#[test]
fn test_annotation_text_and_types() {
    let mut doc = Document::with_pages(1);
    doc.pages[0].add_annotation(Annotation::link("https://example.com/report"));
    let mut note = Annotation::new(
        "Text",
        AnnotationKind::Markup(MarkupText {
            title: Some("Reviewer".to_string()),
            subject: None,
            contents: Some("Check the totals".to_string()),
        }),
    );
    note.name = Some("note-1".to_string());
    doc.pages[0].add_annotation(note);
    doc.pages[0].add_annotation(Annotation::new("3D", AnnotationKind::Other));

    let extraction = extract(InMemoryProvider::new(doc.clone()), ExtractOptions::default());
    let text = extraction.text();
    assert!(text.contains("https://example.com/report"));
    assert!(text.contains("Reviewer"));
    assert!(text.contains("Check the totals"));
    assert_eq!(classed(&extraction.events, "div", "annotationContents"), 1);
    assert_eq!(extraction.stats.link_count, 1);

    let metadata = &extraction.metadata;
    assert_eq!(metadata.get_all(keys::ANNOTATION_SUBTYPES), &["3D", "Link", "Text"]);
    assert_eq!(metadata.get_all(keys::ANNOTATION_TYPES), &["note-1", "null"]);
    assert_eq!(metadata.get_bool(keys::HAS_3D), Some(true));

    let quiet = extract(
        InMemoryProvider::new(doc),
        ExtractOptions::default().with_annotation_text(false),
    );
    assert!(!quiet.text().contains("Check the totals"));
    assert_eq!(quiet.metadata.get_all(keys::ANNOTATION_SUBTYPES).len(), 3);
}

#[test]
fn test_actions_only_when_enabled() {
    let mut doc = Document::with_pages(1);
    doc.actions.open = Some(Action::javascript("app.alert('hi')"));
    doc.actions.before_print = Some(Action::uri("https://example.com"));
    doc.pages[0].actions.open = Some(Action::javascript("this.print()"));
    let widget = Annotation::new("Widget", AnnotationKind::Widget)
        .with_action(Action::javascript("submit()"))
        .with_additional_action(TriggeredAction::new(
            ActionTrigger::AnnotationCursorExit,
            Action::javascript("leave()"),
        ))
        .with_additional_action(TriggeredAction::new(
            ActionTrigger::AnnotationMouseClick,
            Action::javascript("click()"),
        ));
    doc.pages[0].add_annotation(widget);

    let off = extract(InMemoryProvider::new(doc.clone()), ExtractOptions::default());
    assert_eq!(classed(&off.events, "div", "javascript"), 0);
    assert!(!off.metadata.contains(keys::ACTION_TRIGGERS));

    let on = extract(
        InMemoryProvider::new(doc),
        ExtractOptions::default().with_actions(true),
    );
    assert_eq!(classed(&on.events, "div", "javascript"), 5);
    assert_eq!(classed(&on.events, "div", "action"), 1);

    let triggers: Vec<_> = on
        .events
        .iter()
        .filter_map(|e| match e {
            ContentEvent::StartElement { attributes, .. } => attributes.get("trigger"),
            _ => None,
        })
        .collect();
    assert_eq!(
        triggers,
        vec![
            "DOCUMENT_OPEN",
            "ANNOTATION_WIDGET",
            "ANNOTATION_MOUSE_CLICK",
            "ANNOTATION_CURSOR_EXIT",
            "PAGE_OPEN",
            "BEFORE_DOCUMENT_PRINT",
        ]
    );
    assert!(on.metadata.get_all(keys::ACTION_TYPES).iter().any(|t| t == "JavaScript"));
    assert!(on.metadata.get_all(keys::ACTION_TRIGGERS).iter().any(|t| t == "PAGE_OPEN"));
}

#[test]
fn test_acroform_fields() {
    let mut doc = Document::with_pages(1);
    let mut form = AcroForm::default();
    let name = form.push(FormField::text("Name", "Ada"));
    let city = form.push(FormField::text("City", "null"));
    let mut address = FormField::text("Address", "");
    address.value = None;
    address.kind = FieldKind::NonTerminal {
        children: vec![city],
    };
    let address = form.push(address);
    let mut signed = FormField::text("Signature1", "");
    signed.value = None;
    signed.alternate_name = Some("Approver".to_string());
    signed.kind = FieldKind::Signature {
        signature: Some(Signature {
            name: Some("A. Lovelace".to_string()),
            reason: Some("Approved".to_string()),
            ..Signature::default()
        }),
    };
    let signed = form.push(signed);
    form.roots = vec![name, address, signed];
    doc.acro_form = Some(form);

    let extraction = extract(InMemoryProvider::new(doc), ExtractOptions::default());
    assert_eq!(classed(&extraction.events, "div", "acroform"), 1);
    let text = extraction.text();
    assert!(text.contains("Name: Ada"));
    assert!(text.contains("City: "));
    assert!(!text.contains("null"));
    assert!(text.contains("A. Lovelace"));

    let metadata = &extraction.metadata;
    assert_eq!(metadata.get_bool(keys::HAS_ACROFORM_FIELDS), Some(true));
    assert_eq!(metadata.get_bool(keys::HAS_SIGNATURE), Some(true));
}

const XFA_PACKET: &str = r#"<xdp:xdp xmlns:xdp="http://ns.adobe.com/xdp/">
  <template xmlns="http://www.xfa.org/schema/xfa-template/3.3/">
    <subform name="form1">
      <field name="Total"/>
      <draw><value><text>Expense claim</text></value></draw>
    </subform>
  </template>
  <xfa:datasets xmlns:xfa="http://www.xfa.org/schema/xfa-data/1.0/">
    <xfa:data><form1><Total>42.00</Total></form1></xfa:data>
  </xfa:datasets>
</xdp:xdp>"#;

fn xfa_document() -> Document {
    let mut doc = Document::with_pages(1);
    let mut form = AcroForm::default();
    let field = form.push(FormField::text("Total", "0"));
    form.roots.push(field);
    form.xfa = Some(XFA_PACKET.as_bytes().to_vec());
    doc.acro_form = Some(form);
    doc
}

#[test]
fn test_xfa_replaces_field_list() {
    let provider = InMemoryProvider::new(xfa_document()).with_text(0, "Page body");
    let extraction = extract(provider, ExtractOptions::default());

    assert_eq!(classed(&extraction.events, "div", "xfa_content"), 1);
    assert_eq!(classed(&extraction.events, "div", "acroform"), 0);
    let text = extraction.text();
    assert!(text.contains("Expense claim"));
    assert!(text.contains("Total: 42.00"));
    assert!(text.contains("Page body"));
    assert_eq!(extraction.metadata.get_bool(keys::HAS_XFA), Some(true));
}

#[test]
fn test_xfa_only_skips_pages() {
    let provider = InMemoryProvider::new(xfa_document()).with_text(0, "Page body");
    let extraction = extract(provider, ExtractOptions::default().with_xfa_only(true));

    assert_eq!(extraction.stats.page_count, 0);
    assert!(extraction.text().contains("Total: 42.00"));
    assert!(!extraction.text().contains("Page body"));
}

#[test]
fn test_malformed_xfa_falls_back_to_fields() {
    let mut doc = xfa_document();
    if let Some(form) = doc.acro_form.as_mut() {
        form.xfa = Some(b"<template><field name=\"a\"></template>".to_vec());
    }
    let extraction = extract(InMemoryProvider::new(doc), ExtractOptions::default());

    assert_eq!(classed(&extraction.events, "div", "acroform"), 1);
    assert!(extraction.text().contains("Total: 0"));
    assert!(extraction.is_partial());
}

fn tagged_document() -> (Document, Vec<Glyph>) {
    let mut doc = Document::with_pages(1);
    doc.pages[0].object_id = Some((10, 0));
    let mut tree = StructTree::default();
    let heading = tree.push("H1", Some((10, 0)), vec![StructKid::Mcid { mcid: 1, page: None }]);
    let body = tree.push("P", Some((10, 0)), vec![StructKid::Mcid { mcid: 0, page: None }]);
    let link = tree.push(
        "Link",
        Some((10, 0)),
        vec![
            StructKid::Mcid { mcid: 2, page: None },
            StructKid::Link {
                uri: Some("https://example.com".to_string()),
            },
        ],
    );
    tree.root = vec![
        StructKid::Element(heading),
        StructKid::Element(body),
        StructKid::Element(link),
    ];
    doc.structure = Some(tree);

    let mut glyphs = Vec::new();
    for (i, ch) in " body ".chars().enumerate() {
        glyphs.push(Glyph::new(ch.to_string(), 72.0 + 6.0 * i as f32, 600.0, 6.0, 12.0).with_mcid(0));
    }
    for (i, ch) in "Title".chars().enumerate() {
        glyphs.push(Glyph::new(ch.to_string(), 72.0 + 6.0 * i as f32, 700.0, 6.0, 12.0).with_mcid(1));
    }
    for (i, ch) in "here".chars().enumerate() {
        glyphs.push(Glyph::new(ch.to_string(), 72.0 + 6.0 * i as f32, 500.0, 6.0, 12.0).with_mcid(2));
    }
    glyphs.push(Glyph::new("x", 300.0, 100.0, 6.0, 12.0));
    (doc, glyphs)
}

#[test]
fn test_marked_content_follows_structure_tree() {
    let (doc, glyphs) = tagged_document();
    let provider = InMemoryProvider::new(doc).with_glyphs(0, glyphs);
    let extraction = extract(provider, ExtractOptions::default().with_marked_content(true));

    let events = &extraction.events;
    let heading = events
        .iter()
        .position(|e| e.element_name() == Some("h1"))
        .unwrap();
    assert_eq!(events[heading + 1], ContentEvent::characters("Title"));
    // P content is trimmed
    assert!(events.contains(&ContentEvent::characters("body")));
    let link = events
        .iter()
        .find_map(|e| match e {
            ContentEvent::StartElement { name, attributes } if name == "a" => attributes.get("href"),
            _ => None,
        })
        .unwrap();
    assert_eq!(link, "https://example.com");
    assert!(events.contains(&ContentEvent::characters("here")));
    // text outside any marked sequence still comes out
    assert!(extraction.text().contains('x'));
    assert_eq!(extraction.stats.page_count, 1);
    assert_eq!(extraction.metadata.get_bool(keys::HAS_MARKED_CONTENT), Some(true));
}

#[test]
fn test_marked_content_ignored_when_disabled() {
    let (doc, glyphs) = tagged_document();
    let provider = InMemoryProvider::new(doc).with_glyphs(0, glyphs);
    let extraction = extract(provider, ExtractOptions::default());
    assert!(!extraction.events.iter().any(|e| e.element_name() == Some("h1")));
    assert!(extraction.text().contains("Title"));
}

fn rotated(text: &str, x: f32, y: f32) -> Glyph {
    Glyph::new(text, x, y, 14.0, 12.0).with_matrix(
        Matrix::new(12.0, 0.0, 0.0, 12.0, 0.0, 0.0)
            .multiply(&Matrix::rotation_degrees(90.0))
            .multiply(&Matrix::translation(x, y)),
    )
}

#[test]
fn test_angle_detection_straightens_rotated_lines() {
    let glyphs = vec![
        Glyph::new("A", 72.0, 700.0, 6.0, 12.0),
        rotated("U", 300.0, 200.0),
        rotated("P", 300.0, 214.0),
    ];
    let mut doc = Document::with_pages(1);
    doc.pages[0].rotation = 90;
    let provider = InMemoryProvider::new(doc.clone()).with_glyphs(0, glyphs.clone());
    let detected = extract(provider, ExtractOptions::default().with_angle_detection(true));
    assert!(detected.text().contains("UP"));
    assert_eq!(detected.metadata.get(keys::CHARS_PER_PAGE), Some("3"));

    let provider = InMemoryProvider::new(doc).with_glyphs(0, glyphs);
    let plain = extract(provider, ExtractOptions::default());
    assert!(!plain.text().contains("UP"));
}

#[test]
fn test_unmapped_counters() {
    let mut glyphs: Vec<Glyph> = (0..30)
        .map(|i| Glyph::new("a", 72.0 + 6.0 * i as f32, 700.0, 6.0, 12.0))
        .collect();
    glyphs.extend((0..10).map(|i| Glyph::unmapped(72.0 + 6.0 * i as f32, 680.0, 6.0, 12.0)));
    let provider = InMemoryProvider::with_pages(2).with_glyphs(0, glyphs);
    let extraction = extract(provider, ExtractOptions::default());

    let metadata = &extraction.metadata;
    assert_eq!(metadata.get_all(keys::CHARS_PER_PAGE), &["40", "0"]);
    assert_eq!(metadata.get_all(keys::UNMAPPED_CHARS_PER_PAGE), &["10", "0"]);
    assert_eq!(metadata.get(keys::TOTAL_UNMAPPED_CHARS), Some("10"));
    assert_eq!(metadata.get(keys::OVERALL_PERCENTAGE_UNMAPPED), Some("0.25"));
}

#[test]
fn test_font_names_collected() {
    let mut doc = Document::with_pages(2);
    doc.pages[0].font_names = vec!["Helvetica".to_string(), "Courier".to_string()];
    doc.pages[1].font_names = vec!["Helvetica".to_string(), String::new()];

    let off = extract(InMemoryProvider::new(doc.clone()), ExtractOptions::default());
    assert!(!off.metadata.contains(keys::FONT_NAMES));

    let on = extract(
        InMemoryProvider::new(doc),
        ExtractOptions::default().with_font_names(true),
    );
    assert_eq!(on.metadata.get_all(keys::FONT_NAMES), &["Courier", "Helvetica"]);
}

#[test]
fn test_documents_do_not_share_state() {
    let mut doc = Document::with_pages(1);
    doc.pages[0].add_annotation(Annotation::link("https://example.com"));
    let extractor = extractor(InMemoryProvider::new(doc), ExtractOptions::default());

    let first = extractor.extract_to_events(NOT_A_FILE, Metadata::new()).unwrap();
    let second = extractor.extract_to_events(NOT_A_FILE, Metadata::new()).unwrap();
    assert_eq!(first.events, second.events);
    assert_eq!(
        first.metadata.get_all(keys::CHARS_PER_PAGE),
        second.metadata.get_all(keys::CHARS_PER_PAGE)
    );
}
