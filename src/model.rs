//! The in-memory document model: `Publication` and the records it owns.
//!
//! All entities are owned by the publication; no external references escape
//! (see spec §3). Mutation happens only through the build API in
//! `publication.rs`, which is responsible for upholding the invariants
//! documented on `Publication`.

use std::collections::HashMap;

/// Opaque, stable chapter identifier. Implementers are free to choose any
/// scheme; this crate mints `chapter-<uuid>`.
pub type ChapterId = String;

/// Default EPUB 3 stylesheet bundled with every publication unless
/// `PublicationOptions::add_default_stylesheet` is false.
pub const DEFAULT_STYLESHEET_CONTENT: &str = "body { font-family: serif; line-height: 1.5; }\np { margin: 0 0 1em 0; text-indent: 0; }\nh1, h2, h3, h4, h5, h6 { font-family: sans-serif; }\n";

/// Target serialization format.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    V2,
    #[default]
    V3,
}

/// Source preference order when a chapter title must be inferred from
/// parsed markup (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleSource {
    Head,
    Content,
    Nav,
}

/// Recognized build/parse options (spec §6 "Options surface").
#[derive(Debug, Clone)]
pub struct PublicationOptions {
    pub add_default_stylesheet: bool,
    pub ignore_head_title: bool,
    pub title_extraction: Vec<TitleSource>,
}

impl Default for PublicationOptions {
    fn default() -> Self {
        Self {
            add_default_stylesheet: true,
            ignore_head_title: false,
            title_extraction: vec![TitleSource::Head, TitleSource::Content, TitleSource::Nav],
        }
    }
}

/// Export-time options (spec §6).
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub validate: bool,
    pub compression_level: i64,
    pub version: FormatVersion,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            validate: true,
            compression_level: 9,
            version: FormatVersion::V3,
        }
    }
}

/// Dublin Core metadata fields (spec §3).
#[derive(Debug, Clone)]
pub struct DublinCoreMetadata {
    pub title: String,
    pub creator: String,
    pub language: String,
    pub identifier: String,
    pub date: String,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub subject: Vec<String>,
    pub rights: Option<String>,
    pub contributor: Vec<String>,
    pub kind: Option<String>,
    pub format: Option<String>,
    pub source: Option<String>,
    pub relation: Option<String>,
    pub coverage: Option<String>,
}

impl DublinCoreMetadata {
    pub(crate) fn with_defaults(title: String, creator: String) -> Self {
        Self {
            title,
            creator,
            language: "en".to_string(),
            identifier: format!("urn:uuid:{}", uuid::Uuid::new_v4()),
            date: crate::util::format_iso8601_date(),
            publisher: None,
            description: None,
            subject: Vec::new(),
            rights: None,
            contributor: Vec::new(),
            kind: None,
            format: None,
            source: None,
            relation: None,
            coverage: None,
        }
    }
}

/// A partial metadata update for `Publication::set_metadata` — every field
/// present is shallow-merged into the existing metadata; `None`/empty
/// sequences leave the corresponding field untouched.
#[derive(Debug, Clone, Default)]
pub struct MetadataPatch {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub language: Option<String>,
    pub identifier: Option<String>,
    pub date: Option<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub subject: Option<Vec<String>>,
    pub rights: Option<String>,
    pub contributor: Option<Vec<String>>,
    pub kind: Option<String>,
    pub format: Option<String>,
    pub source: Option<String>,
    pub relation: Option<String>,
    pub coverage: Option<String>,
}

/// A chapter's backing content: either inline markup or a named anchor into
/// another chapter's markup (spec Design Notes §9).
#[derive(Debug, Clone)]
pub enum ChapterBody {
    Inline(String),
    FragmentOf {
        source_chapter_id: ChapterId,
        fragment: String,
    },
}

impl ChapterBody {
    pub fn as_inline(&self) -> Option<&str> {
        match self {
            ChapterBody::Inline(s) => Some(s),
            ChapterBody::FragmentOf { .. } => None,
        }
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self, ChapterBody::FragmentOf { .. })
    }
}

/// A node in the chapter tree (spec §3).
#[derive(Debug, Clone)]
pub struct Chapter {
    pub id: ChapterId,
    pub title: String,
    pub body: ChapterBody,
    pub filename: String,
    pub parent_id: Option<ChapterId>,
    pub order: u32,
    pub children: Vec<ChapterId>,
    pub heading_level: u8,
    pub linear: bool,
}

impl Chapter {
    /// Inline markup content, or empty string for a fragment chapter (its
    /// content lives inside the source chapter's markup).
    pub fn content(&self) -> &str {
        self.body.as_inline().unwrap_or("")
    }
}

/// An embedded raster/vector image (spec §3).
#[derive(Debug, Clone)]
pub struct Image {
    pub id: String,
    pub filename: String,
    pub data: Vec<u8>,
    pub mime_type: String,
    pub alt: Option<String>,
    pub is_cover: bool,
}

/// An embedded stylesheet (spec §3).
#[derive(Debug, Clone)]
pub struct Stylesheet {
    pub id: String,
    pub filename: String,
    pub content: String,
    /// Set on the stylesheet `Publication::new` injects when
    /// `options.add_default_stylesheet` is true. The merge pipeline uses
    /// this to skip copying a destination's own default sheet in (spec
    /// §4.8 step 2, "for each non-default stylesheet in the source").
    pub is_default: bool,
}

/// The root aggregate. All entities are owned here; no references escape
/// (spec §3 "Lifecycles").
#[derive(Debug, Clone)]
pub struct Publication {
    pub metadata: DublinCoreMetadata,
    pub(crate) chapters: HashMap<ChapterId, Chapter>,
    pub(crate) chapter_order_hint: Vec<ChapterId>,
    pub root_chapter_ids: Vec<ChapterId>,
    pub(crate) images: HashMap<String, Image>,
    pub(crate) image_order_hint: Vec<String>,
    pub(crate) stylesheets: HashMap<String, Stylesheet>,
    pub(crate) stylesheet_order_hint: Vec<String>,
    pub(crate) chapter_counter: u32,
    pub options: PublicationOptions,
}
