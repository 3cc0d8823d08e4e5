//! The extraction pipeline.
//!
//! An [`Extractor`] bundles the options with the collaborators (loader,
//! renderer, OCR engine, embedded-document extractor, password provider).
//! Each call to [`Extractor::extract`] loads one document, checks access and
//! hands it to a fresh page walk.
//!
//! # Example
//!
//! ```no_run
//! use pdfsift::pipeline::{options::ExtractOptions, Extractor};
//! use pdfsift::render::TextHandler;
//! use pdfsift::Metadata;
//!
//! fn main() -> pdfsift::Result<()> {
//!     let data = std::fs::read("document.pdf")?;
//!     let extractor = Extractor::builder()
//!         .options(ExtractOptions::new().with_actions(true))
//!         .build()?;
//!
//!     let mut metadata = Metadata::new();
//!     let mut text = TextHandler::new();
//!     let summary = extractor.extract(&data, &mut metadata, &mut text, None)?;
//!     println!("{} pages, {} warnings", summary.page_count, summary.warnings.len());
//!     println!("{}", text.into_string());
//!     Ok(())
//! }
//! ```

mod access;
mod actions;
mod aggregate;
mod angles;
mod annotations;
mod bookmarks;
mod embedded;
mod forms;
mod images;
mod marked;
mod ocr;
pub mod options;
mod rendering;
mod revisions;
mod text;
mod walker;
mod xfa;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::debug;

pub use access::check_access;
pub use marked::{HtmlTag, TagMapper};
pub use ocr::needs_ocr;
pub use rendering::{RenderResult, RenderStatus};
pub use revisions::{Revision, RevisionScan};
pub use xfa::{parse_xfa, XfaContent, XfaField};

use self::options::{ExtractOptions, OcrStrategy};
use self::walker::Walk;
use crate::error::{Error, Result};
use crate::model::{keys, Metadata};
use crate::parser::{
    DocumentLoader, EmbeddedDocumentExtractor, LopdfLoader, OcrEngine, PageRenderer,
    PasswordProvider,
};
use crate::render::{Attributes, ContentHandler, EventRecorder, Extraction, LimitedHandler};

/// Outcome of one extraction.
#[derive(Debug, Default)]
pub struct ExtractionSummary {
    pub page_count: usize,
    pub ocr_page_count: usize,
    pub total_chars: usize,
    pub unmapped_chars: usize,
    /// Payloads handed to the embedded-document extractor
    pub embedded_count: usize,
    /// Errors downgraded to warnings; non-empty for a partial extraction
    pub warnings: Vec<Error>,
}

impl ExtractionSummary {
    pub fn is_partial(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Stops a running extraction before its next page.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Extracts PDF documents into a content stream and a metadata record.
#[derive(Clone)]
pub struct Extractor {
    options: ExtractOptions,
    loader: Arc<dyn DocumentLoader>,
    /// The loader is the lopdf default and follows `max_recursion_depth`
    default_loader: bool,
    pub(crate) renderer: Option<Arc<dyn PageRenderer>>,
    pub(crate) ocr: Option<Arc<dyn OcrEngine>>,
    pub(crate) embedded: Arc<dyn EmbeddedDocumentExtractor>,
    passwords: Option<Arc<dyn PasswordProvider>>,
    /// Engine and renderer present, and the engine takes the configured
    /// image type
    pub(crate) ocr_supported: bool,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor")
            .field("options", &self.options)
            .field("renderer", &self.renderer.is_some())
            .field("ocr", &self.ocr.is_some())
            .field("ocr_supported", &self.ocr_supported)
            .finish()
    }
}

fn probe_ocr(
    options: &ExtractOptions,
    renderer: &Option<Arc<dyn PageRenderer>>,
    engine: &Option<Arc<dyn OcrEngine>>,
) -> bool {
    let media_type = options.ocr.media_type();
    let supported = renderer.is_some() && engine.as_ref().is_some_and(|e| e.supports(&media_type));
    debug!("OCR for {media_type}: {}", if supported { "available" } else { "unavailable" });
    supported
}

fn lopdf_loader(options: &ExtractOptions) -> Arc<dyn DocumentLoader> {
    Arc::new(LopdfLoader::new().with_max_depth(options.max_recursion_depth))
}

impl Extractor {
    /// Default options, the lopdf loader, no OCR and an embedded-document
    /// extractor that discards payloads.
    pub fn new() -> Self {
        let options = ExtractOptions::default();
        Self {
            loader: lopdf_loader(&options),
            default_loader: true,
            options,
            renderer: None,
            ocr: None,
            embedded: Arc::new(DiscardEmbedded),
            passwords: None,
            ocr_supported: false,
        }
    }

    pub fn builder() -> ExtractorBuilder {
        ExtractorBuilder::default()
    }

    /// The same collaborators with other options; OCR support is probed
    /// again.
    pub fn with_options(&self, options: ExtractOptions) -> Result<Self> {
        options.validate()?;
        let ocr_supported = probe_ocr(&options, &self.renderer, &self.ocr);
        let loader = if self.default_loader {
            lopdf_loader(&options)
        } else {
            Arc::clone(&self.loader)
        };
        Ok(Self {
            options,
            loader,
            ocr_supported,
            ..self.clone()
        })
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    pub fn ocr_supported(&self) -> bool {
        self.ocr_supported
    }

    /// Extract `data` into `handler`, recording facts in `metadata`.
    ///
    /// Terminal errors (password, access, write limit, unavailable OCR)
    /// come back as `Err`; recoverable ones end up in the summary's
    /// warnings when `catch_intermediate_errors` is on.
    pub fn extract(
        &self,
        data: &[u8],
        metadata: &mut Metadata,
        handler: &mut dyn ContentHandler,
        cancel: Option<&CancellationToken>,
    ) -> Result<ExtractionSummary> {
        let options = &self.options;
        let mut limited;
        let handler: &mut dyn ContentHandler = match options.write_limit {
            Some(limit) => {
                limited = LimitedHandler::new(handler, limit);
                &mut limited
            }
            None => handler,
        };

        metadata.set(keys::CONTENT_TYPE, "application/pdf");
        let revisions = if metadata.contains(keys::INCREMENTAL_UPDATE_NUMBER) {
            None
        } else {
            Some(RevisionScan::scan(data))
        };

        let password = options
            .password
            .clone()
            .or_else(|| self.passwords.as_ref().and_then(|p| p.password(metadata)));
        let provider = match self.loader.load(data, password.as_deref()) {
            Ok(provider) => provider,
            Err(err) => {
                if matches!(err, Error::Encrypted | Error::InvalidPassword) {
                    metadata.set(keys::ENCRYPTED, true);
                }
                return Err(err);
            }
        };

        let doc = provider.document();
        debug!("loaded PDF {} with {} pages", doc.version, doc.page_count());
        aggregate::record_document(metadata, doc);
        check_access(options.access_check_mode, &doc.permissions)?;

        if !self.ocr_supported
            && matches!(
                options.ocr.strategy,
                OcrStrategy::OcrOnly | OcrStrategy::OcrAndTextExtraction
            )
        {
            return Err(Error::OcrUnavailable(options.ocr.media_type()));
        }

        let result = Walk::new(self, data, provider, handler, metadata, revisions, cancel).run();
        if let Err(Error::WriteLimitReached(_)) = &result {
            metadata.set(keys::WRITE_LIMIT_REACHED, true);
        }
        result
    }

    /// Extract into memory.
    pub fn extract_to_events(&self, data: &[u8], metadata: Metadata) -> Result<Extraction> {
        let mut metadata = metadata;
        let mut recorder = EventRecorder::new();
        let summary = self.extract(data, &mut metadata, &mut recorder, None)?;
        Ok(Extraction::new(metadata, recorder.into_events(), &summary))
    }
}

/// Assembles an [`Extractor`].
#[derive(Default)]
pub struct ExtractorBuilder {
    options: ExtractOptions,
    loader: Option<Arc<dyn DocumentLoader>>,
    renderer: Option<Arc<dyn PageRenderer>>,
    ocr: Option<Arc<dyn OcrEngine>>,
    embedded: Option<Arc<dyn EmbeddedDocumentExtractor>>,
    passwords: Option<Arc<dyn PasswordProvider>>,
}

impl ExtractorBuilder {
    pub fn options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn loader(mut self, loader: impl DocumentLoader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    pub fn renderer(mut self, renderer: impl PageRenderer + 'static) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    pub fn ocr_engine(mut self, engine: impl OcrEngine + 'static) -> Self {
        self.ocr = Some(Arc::new(engine));
        self
    }

    pub fn embedded_extractor(mut self, extractor: Arc<dyn EmbeddedDocumentExtractor>) -> Self {
        self.embedded = Some(extractor);
        self
    }

    pub fn password_provider(mut self, provider: impl PasswordProvider + 'static) -> Self {
        self.passwords = Some(Arc::new(provider));
        self
    }

    /// Validate the options and probe OCR support.
    pub fn build(self) -> Result<Extractor> {
        self.options.validate()?;
        let ocr_supported = probe_ocr(&self.options, &self.renderer, &self.ocr);
        let default = self.loader.is_none();
        let loader = self.loader.unwrap_or_else(|| lopdf_loader(&self.options));
        Ok(Extractor {
            options: self.options,
            loader,
            default_loader: default,
            renderer: self.renderer,
            ocr: self.ocr,
            embedded: self.embedded.unwrap_or_else(|| Arc::new(DiscardEmbedded)),
            passwords: self.passwords,
            ocr_supported,
        })
    }
}

/// `div class=package-entry` with the resource name as heading.
fn write_entry_markup(metadata: &Metadata, handler: &mut dyn ContentHandler) -> Result<()> {
    handler.start_element("div", &Attributes::new().with("class", "package-entry"))?;
    if let Some(name) = metadata.get(keys::RESOURCE_NAME) {
        handler.start_element("h1", &Attributes::new())?;
        handler.characters(name)?;
        handler.end_element("h1")?;
    }
    handler.end_element("div")
}

/// Accepts every payload and drops its bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardEmbedded;

impl EmbeddedDocumentExtractor for DiscardEmbedded {
    fn should_parse(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn parse_embedded(
        &self,
        _bytes: &[u8],
        metadata: &Metadata,
        handler: &mut dyn ContentHandler,
        emit_markup: bool,
    ) -> Result<()> {
        if emit_markup {
            write_entry_markup(metadata, handler)?;
        }
        Ok(())
    }
}

/// One payload kept by an [`EmbeddedCollector`].
#[derive(Debug, Clone)]
pub struct EmbeddedResource {
    pub metadata: Metadata,
    pub bytes: Vec<u8>,
}

impl EmbeddedResource {
    pub fn resource_type(&self) -> Option<&str> {
        self.metadata.get(keys::EMBEDDED_RESOURCE_TYPE)
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.get(keys::RESOURCE_NAME)
    }
}

/// Keeps every payload in memory, for saving attachments or inspecting
/// what a document carries.
#[derive(Debug, Default)]
pub struct EmbeddedCollector {
    resources: Mutex<Vec<EmbeddedResource>>,
}

impl EmbeddedCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads collected so far.
    pub fn resources(&self) -> Vec<EmbeddedResource> {
        self.resources
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn take(&self) -> Vec<EmbeddedResource> {
        self.resources
            .lock()
            .map(|mut guard| std::mem::take(&mut *guard))
            .unwrap_or_default()
    }
}

impl EmbeddedDocumentExtractor for EmbeddedCollector {
    fn should_parse(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn parse_embedded(
        &self,
        bytes: &[u8],
        metadata: &Metadata,
        handler: &mut dyn ContentHandler,
        emit_markup: bool,
    ) -> Result<()> {
        self.resources
            .lock()
            .map_err(|_| Error::Embedded("collector lock poisoned".to_string()))?
            .push(EmbeddedResource {
                metadata: metadata.clone(),
                bytes: bytes.to_vec(),
            });
        if emit_markup {
            write_entry_markup(metadata, handler)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_token_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_collector_keeps_payloads() {
        let collector = EmbeddedCollector::new();
        let mut metadata = Metadata::new();
        metadata.set(keys::RESOURCE_NAME, "notes.txt");
        let mut recorder = EventRecorder::new();
        collector
            .parse_embedded(b"hello", &metadata, &mut recorder, true)
            .unwrap();

        let resources = collector.take();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].name(), Some("notes.txt"));
        assert_eq!(resources[0].bytes, b"hello");
        assert_eq!(recorder.text(), "notes.txt");
        assert!(collector.resources().is_empty());
    }

    #[test]
    fn test_build_rejects_invalid_options() {
        let mut options = ExtractOptions::default();
        options.ocr.dpi = 0;
        assert!(matches!(
            Extractor::builder().options(options).build(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_no_engine_means_no_ocr() {
        let extractor = Extractor::new();
        assert!(!extractor.ocr_supported());
    }
}
