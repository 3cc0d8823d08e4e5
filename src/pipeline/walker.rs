//! The page walk.
//!
//! One [`Walk`] drives a single document from `start_document` to
//! `end_document`. It owns every piece of per-document state, so nothing
//! leaks between documents and a batch can run walks on separate threads.
//! The feature passes (annotations, actions, embedded files, forms, marked
//! content, OCR) live in sibling modules as further `impl Walk` blocks.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use log::{debug, trace, warn};

use super::aggregate;
use super::options::{ExtractOptions, OcrStrategy};
use super::rendering::RenderingAdapter;
use super::revisions::RevisionScan;
use super::text::{TextAssembler, TextLayout};
use super::xfa::parse_xfa;
use super::{CancellationToken, ExtractionSummary, Extractor};
use crate::error::{Error, Result};
use crate::model::{keys, ActionTrigger, Document, Glyph, Matrix, Metadata, ObjectId, Page};
use crate::parser::PageModelProvider;
use crate::render::{Attributes, ContentHandler};

/// Counters and de-duplication sets of one document.
#[derive(Debug, Default)]
pub(crate) struct ExtractionState {
    pub page_chars: usize,
    pub page_unmapped: usize,
    pub total_chars: usize,
    pub total_unmapped: usize,
    pub pages_processed: usize,
    pub ocr_pages: usize,
    /// Embedded file streams already handed off
    pub extracted_files: HashSet<ObjectId>,
    pub embedded_count: usize,
    /// Image stream to its assigned number
    pub inline_images: HashMap<ObjectId, usize>,
    pub image_counter: usize,
    pub annotation_types: BTreeSet<String>,
    pub annotation_subtypes: BTreeSet<String>,
    pub font_names: BTreeSet<String>,
    pub warnings: Vec<Error>,
}

impl ExtractionState {
    pub fn begin_page(&mut self) {
        self.page_chars = 0;
        self.page_unmapped = 0;
    }

    /// Add the page counters to the document totals and reset them.
    pub fn fold_page(&mut self) {
        self.total_chars += self.page_chars;
        self.total_unmapped += self.page_unmapped;
        self.pages_processed += 1;
        self.begin_page();
    }
}

pub(crate) struct Walk<'a> {
    pub(super) extractor: &'a Extractor,
    pub(super) options: &'a ExtractOptions,
    pub(super) data: &'a [u8],
    /// Snapshot of the provider's graph; pages borrow from it while the
    /// walk mutates itself.
    pub(super) doc: Rc<Document>,
    pub(super) provider: Box<dyn PageModelProvider>,
    pub(super) handler: &'a mut dyn ContentHandler,
    pub(super) metadata: &'a mut Metadata,
    pub(super) state: ExtractionState,
    pub(super) renderer: RenderingAdapter,
    pub(super) revisions: Option<RevisionScan>,
    cancel: Option<&'a CancellationToken>,
    text: TextAssembler,
    /// Elements started and not yet ended, innermost last
    open: Vec<String>,
}

impl<'a> Walk<'a> {
    pub(super) fn new(
        extractor: &'a Extractor,
        data: &'a [u8],
        provider: Box<dyn PageModelProvider>,
        handler: &'a mut dyn ContentHandler,
        metadata: &'a mut Metadata,
        revisions: Option<RevisionScan>,
        cancel: Option<&'a CancellationToken>,
    ) -> Self {
        let options = extractor.options();
        let doc = Rc::new(provider.document().clone());
        Self {
            extractor,
            options,
            data,
            doc,
            provider,
            handler,
            metadata,
            state: ExtractionState::default(),
            renderer: RenderingAdapter::new(extractor.renderer.clone(), &options.ocr),
            revisions,
            cancel,
            text: TextAssembler::new(TextLayout::from(options)),
            open: Vec::new(),
        }
    }

    /// Walk the document and finalize the metadata record.
    ///
    /// On failure every element still open is ended so the handler sees a
    /// balanced stream; the document itself is not ended.
    pub(super) fn run(mut self) -> Result<ExtractionSummary> {
        if let Err(err) = self.walk_document() {
            self.close_to(0);
            return Err(err);
        }
        aggregate::finalize(self.metadata, &self.state, self.revisions.as_ref(), self.options);
        Ok(self.summary())
    }

    fn summary(self) -> ExtractionSummary {
        ExtractionSummary {
            page_count: self.state.pages_processed,
            ocr_page_count: self.state.ocr_pages,
            total_chars: self.state.total_chars,
            unmapped_chars: self.state.total_unmapped,
            embedded_count: self.state.embedded_count,
            warnings: self.state.warnings,
        }
    }

    fn walk_document(&mut self) -> Result<()> {
        let doc = Rc::clone(&self.doc);
        if self.options.if_xfa_extract_only_xfa {
            if let Some(xfa) = doc.acro_form.as_ref().and_then(|form| form.xfa.as_deref()) {
                debug!("XFA packet present, skipping page content");
                self.handler.start_document()?;
                let content = parse_xfa(xfa)?;
                self.write_xfa(&content)?;
                return self.handler.end_document();
            }
        }

        self.start_document()?;
        match self.options.ocr.strategy {
            OcrStrategy::OcrOnly => self.walk_ocr_only(&doc)?,
            _ if self.options.extract_marked_content && aggregate::has_marked_content(&doc) => {
                self.walk_marked(&doc)?
            }
            _ => self.walk_text(&doc)?,
        }
        self.end_document()
    }

    fn walk_text(&mut self, doc: &Document) -> Result<()> {
        debug!("walking {} pages", doc.page_count());
        for page in &doc.pages {
            self.check_cancelled(page.index)?;
            self.process_page(page)?;
        }
        Ok(())
    }

    fn walk_ocr_only(&mut self, doc: &Document) -> Result<()> {
        debug!("OCR only, skipping the text layer of {} pages", doc.page_count());
        for page in &doc.pages {
            self.check_cancelled(page.index)?;
            self.state.begin_page();
            self.start("div", &Attributes::new().with("class", "page"))?;
            self.guarded(|walk| walk.ocr_current_page(page))?;
            self.record_page_counters();
            self.end("div")?;
            self.state.fold_page();
        }
        Ok(())
    }

    fn process_page(&mut self, page: &Page) -> Result<()> {
        trace!("page {}", page.number());
        self.start_page(page)?;
        let body = if self.options.detect_angles {
            self.angle_pass(page)
        } else {
            self.glyph_pass(page.index, None, false)
        };
        if let Err(err) = body {
            self.catchable(err)?;
        }
        self.end_page(page)
    }

    pub(super) fn start_page(&mut self, _page: &Page) -> Result<()> {
        self.state.begin_page();
        self.start("div", &Attributes::new().with("class", "page"))?;
        self.start("p", &Attributes::new())
    }

    /// Run the content stream of one page into the text assembler.
    ///
    /// With `upright_only`, glyphs still rotated after `prefix` belong to
    /// another angle pass and are skipped.
    pub(super) fn glyph_pass(
        &mut self,
        page_index: usize,
        prefix: Option<&Matrix>,
        upright_only: bool,
    ) -> Result<()> {
        let provider = &self.provider;
        let text = &mut self.text;
        let state = &mut self.state;
        let mut visit = |glyph: &Glyph| -> Result<()> {
            if upright_only && glyph.angle() != 0 {
                return Ok(());
            }
            state.page_chars += 1;
            if !glyph.is_mapped() {
                state.page_unmapped += 1;
            }
            trace!("glyph {:?} at ({}, {})", glyph.unicode, glyph.x(), glyph.y());
            text.push(glyph);
            Ok(())
        };
        provider.visit_glyphs(page_index, prefix, &mut visit)
    }

    pub(super) fn end_page(&mut self, page: &Page) -> Result<()> {
        self.text.flush(&mut *self.handler)?;
        self.end("p")?;
        self.guarded(|walk| walk.extract_page_images(page))?;
        if self.options.render_pages_at_page_end {
            self.guarded(|walk| walk.hand_off_rendered_page(page))?;
        }
        self.end_page_common(page)
    }

    fn end_page_common(&mut self, page: &Page) -> Result<()> {
        self.record_page_counters();
        for annotation in &page.annotations {
            self.guarded(|walk| walk.process_annotation(annotation))?;
        }
        if self.should_ocr_page() {
            self.guarded(|walk| walk.ocr_current_page(page))?;
        }
        self.guarded(|walk| {
            walk.handle_action(page.actions.close.as_ref(), ActionTrigger::PageClose)?;
            walk.handle_action(page.actions.open.as_ref(), ActionTrigger::PageOpen)
        })?;
        self.end("div")?;
        self.state.fold_page();

        if self.options.extract_font_names {
            self.state
                .font_names
                .extend(page.font_names.iter().filter(|n| !n.is_empty()).cloned());
        }
        Ok(())
    }

    fn record_page_counters(&mut self) {
        self.metadata.add(keys::CHARS_PER_PAGE, self.state.page_chars);
        self.metadata
            .add(keys::UNMAPPED_CHARS_PER_PAGE, self.state.page_unmapped);
    }

    fn start_document(&mut self) -> Result<()> {
        self.handler.start_document()?;
        let doc = Rc::clone(&self.doc);
        match self.handle_action(doc.actions.open.as_ref(), ActionTrigger::DocumentOpen) {
            Err(err) if err.is_recoverable() => {
                debug!("ignoring document open action: {err}");
                Ok(())
            }
            other => other,
        }
    }

    fn end_document(&mut self) -> Result<()> {
        let doc = Rc::clone(&self.doc);
        if self.options.extract_bookmarks_text {
            self.guarded(|walk| walk.extract_bookmarks(&doc))?;
        }
        self.guarded(|walk| walk.extract_embedded_documents(&doc))?;
        self.guarded(|walk| walk.hand_off_xmp(&doc))?;
        if self.options.extract_acroform_content {
            self.guarded(|walk| walk.extract_acroform(&doc))?;
        }

        let actions = &doc.actions;
        self.guarded(|walk| {
            for (action, trigger) in [
                (&actions.after_print, ActionTrigger::AfterDocumentPrint),
                (&actions.after_save, ActionTrigger::AfterDocumentSave),
                (&actions.before_close, ActionTrigger::BeforeDocumentClose),
                (&actions.before_print, ActionTrigger::BeforeDocumentPrint),
                (&actions.before_save, ActionTrigger::BeforeDocumentSave),
            ] {
                walk.handle_action(action.as_ref(), trigger)?;
            }
            Ok(())
        })?;
        self.guarded(|walk| walk.hand_off_revisions())?;

        for name in &self.state.annotation_types {
            self.metadata.add(keys::ANNOTATION_TYPES, name);
        }
        for name in &self.state.annotation_subtypes {
            self.metadata.add(keys::ANNOTATION_SUBTYPES, name);
        }
        self.handler.end_document()?;

        for name in &self.state.font_names {
            self.metadata.add(keys::FONT_NAMES, name);
        }
        Ok(())
    }

    fn should_ocr_page(&self) -> bool {
        let ocr = &self.options.ocr;
        match ocr.strategy {
            OcrStrategy::OcrAndTextExtraction => true,
            OcrStrategy::Auto => super::ocr::needs_ocr(
                ocr.strategy,
                &ocr.auto,
                self.state.page_chars,
                self.state.page_unmapped,
            ),
            OcrStrategy::NoOcr | OcrStrategy::OcrOnly => false,
        }
    }

    pub(super) fn check_cancelled(&self, page_index: usize) -> Result<()> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(Error::Cancelled(page_index)),
            _ => Ok(()),
        }
    }

    /// Downgrade a recoverable error to a warning, or hand it back.
    pub(super) fn catchable(&mut self, err: Error) -> Result<()> {
        if matches!(err, Error::WriteLimitReached(_)) {
            self.metadata.set(keys::WRITE_LIMIT_REACHED, true);
            return Err(err);
        }
        if err.is_terminal() || !err.is_recoverable() || !self.options.catch_intermediate_errors {
            return Err(err);
        }
        self.record_warning(err);
        Ok(())
    }

    pub(super) fn record_warning(&mut self, err: Error) {
        warn!("{err}");
        self.metadata.add(keys::WARNING, err.to_string());
        self.state.warnings.push(err);
    }

    /// Run `f`; on error end whatever it left open, then treat the error as
    /// catchable.
    pub(super) fn guarded<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let depth = self.open.len();
        match f(self) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.close_to(depth);
                self.catchable(err)
            }
        }
    }

    fn close_to(&mut self, depth: usize) {
        while self.open.len() > depth {
            if let Some(name) = self.open.pop() {
                if let Err(err) = self.handler.end_element(&name) {
                    debug!("could not end <{name}>: {err}");
                }
            }
        }
    }

    pub(super) fn start(&mut self, name: &str, attributes: &Attributes) -> Result<()> {
        self.handler.start_element(name, attributes)?;
        self.open.push(name.to_string());
        Ok(())
    }

    pub(super) fn end(&mut self, name: &str) -> Result<()> {
        if self.open.last().is_some_and(|open| open == name) {
            self.open.pop();
        }
        self.handler.end_element(name)
    }

    pub(super) fn chars(&mut self, text: &str) -> Result<()> {
        self.handler.characters(text)
    }

    /// A start, its text and the matching end.
    pub(super) fn element(&mut self, name: &str, attributes: &Attributes, text: &str) -> Result<()> {
        self.start(name, attributes)?;
        self.chars(text)?;
        self.end(name)
    }

    /// An element with no content.
    pub(super) fn empty(&mut self, name: &str, attributes: &Attributes) -> Result<()> {
        self.start(name, attributes)?;
        self.end(name)
    }
}
