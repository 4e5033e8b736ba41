//! Structural validation: cheap, non-exhaustive checks run before export
//! (spec §4.9). Grounded in the teacher's absence of any such pass —
//! generalized from the invariants the build API (`publication.rs`)
//! otherwise leaves implicit.

use crate::model::Publication;

/// Result of validating a publication. Not a conformance checker: it
/// catches the structural mistakes a caller is likely to make, nothing
/// more.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

pub fn validate(publication: &Publication) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if publication.metadata.title.trim().is_empty() {
        errors.push("Title is required".to_string());
    }
    if publication.metadata.creator.trim().is_empty() {
        errors.push("Creator/Author is required".to_string());
    }

    let chapters = publication.get_all_chapters();
    if chapters.is_empty() {
        warnings.push("No chapters added to EPUB".to_string());
    }

    for chapter in &chapters {
        if let Some(parent) = &chapter.parent_id
            && publication.get_chapter(parent).is_none()
        {
            errors.push(format!(
                "Chapter \"{}\" ({}) references non-existent parent \"{parent}\"",
                chapter.title, chapter.id
            ));
        }
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}
