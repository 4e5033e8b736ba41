//! Construct, parse, transform, and merge EPUB 2.0.1 / 3.3 publications.
//!
//! A [`Publication`] owns its chapters, images, and stylesheets as a flat
//! arena keyed by opaque id, with parent/child links forming the reading
//! hierarchy. Build one from scratch with [`Publication::new`] and the
//! methods in `publication`, or recover one from an existing archive with
//! [`Publication::open`] / [`Publication::from_bytes`]. [`merge`] splices
//! publications together; [`validate`] runs cheap structural checks before
//! [`Publication::export_to_bytes`] writes an archive.

mod archive;
mod chapter_markup;
mod deserialize;
mod error;
mod model;
mod navigation;
mod package;
pub mod publication;
mod serialize;
mod util;
mod validate;
mod xml_util;

pub mod merge;

pub use error::{EpubError, Result};
pub use model::{
    Chapter, ChapterBody, ChapterId, DublinCoreMetadata, ExportOptions, FormatVersion, Image,
    MetadataPatch, Publication, PublicationOptions, Stylesheet, TitleSource,
};
pub use publication::{NewChapter, NewImage, NewStylesheet};
pub use validate::ValidationReport;
