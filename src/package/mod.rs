//! OPF package-document types shared between parsing and serialization.
//! Grounded in the teacher's `epub::{opf, writer}` pair, generalized to the
//! hierarchical chapter/image/stylesheet model.

pub mod opf;

/// A `<manifest><item>` entry.
#[derive(Debug, Clone)]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

/// A `<spine><itemref>` entry.
#[derive(Debug, Clone)]
pub struct SpineItem {
    pub idref: String,
    pub linear: bool,
}

/// Dublin Core metadata as read off an OPF document: every element may
/// repeat, so this stays list-shaped until the deserializer picks the
/// values that become a `DublinCoreMetadata` (spec §4.7).
#[derive(Debug, Clone, Default)]
pub struct RawMetadata {
    pub titles: Vec<String>,
    pub creators: Vec<String>,
    pub languages: Vec<String>,
    pub identifiers: Vec<String>,
    pub dates: Vec<String>,
    pub publishers: Vec<String>,
    pub description: Option<String>,
    pub subjects: Vec<String>,
    pub rights: Option<String>,
    pub contributors: Vec<String>,
    pub kind: Option<String>,
    pub format: Option<String>,
    pub source: Option<String>,
    pub relation: Option<String>,
    pub coverage: Option<String>,
    pub modified: Option<String>,
    pub cover_id: Option<String>,
}

/// Result of parsing an OPF package document.
#[derive(Debug, Clone, Default)]
pub struct ParsedOpf {
    pub is_v2: bool,
    pub metadata: RawMetadata,
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
}
