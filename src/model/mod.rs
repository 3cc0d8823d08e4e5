//! Document model consumed by the extraction pipeline.
//!
//! The model is what a page-model provider hands over: pages with their
//! annotations and actions, the file-specification table, and the arenas
//! for the trees the pipeline walks (embedded-files name tree, outline,
//! form fields, structure tree). Arena links are plain indices, so cyclic
//! or absurdly deep inputs survive loading and are bounded by the walkers.

mod action;
mod annotation;
mod document;
mod filespec;
mod form;
pub mod metadata;
mod outline;
mod page;
mod structure;

/// Object identity in the document graph: (object number, generation).
pub type ObjectId = (u32, u16);

pub use action::{Action, ActionKind, ActionTrigger, TriggeredAction};
pub use annotation::{Annotation, AnnotationKind, MarkupText};
pub use document::{DocInfo, Document, DocumentActions, NameTree, NameTreeNode, Permissions};
pub use filespec::{ComplexFileSpec, EmbeddedFile, FileSpec, FileSpecId, FileVariant, Platform};
pub use form::{AcroForm, FieldKind, FormField, Signature};
pub use metadata::{keys, EmbeddedResourceType, Metadata};
pub use outline::{Outline, OutlineItem};
pub use page::{Glyph, ImagePayload, Matrix, Page, PageActions, PageImage, Rect};
pub use structure::{StructElement, StructKid, StructTree};
