//! Merge pipeline: splice a source publication's chapters under a new
//! section chapter in a destination publication, deduplicating shared
//! stylesheets/images by content hash and rewriting embedded references in
//! copied markup. Grounded in the teacher's CLI-level "process many
//! sources into one book" loop (`cli::mod`), generalized into a
//! library-level operation and reworked to hash content with `sha1`
//! instead of the truncated-base64 key a naive port would reach for.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use sha1::{Digest, Sha1};

use crate::error::Result;
use crate::model::{ChapterId, Image, Publication, Stylesheet};
use crate::publication::NewChapter;

/// Options controlling how a source publication's chapters are spliced in.
#[derive(Debug, Clone)]
pub struct SectionOptions {
    pub title: String,
    pub heading_level: u8,
}

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Copy `source`'s chapters into `destination` under a new section chapter.
/// `seen_stylesheets`/`seen_images` map content hash to the destination
/// filename already assigned to that content, and persist across repeated
/// calls so later sources reuse assets earlier sources already copied in.
pub fn add_publication_as_chapter(
    destination: &mut Publication,
    section: &SectionOptions,
    source: &Publication,
    seen_stylesheets: &mut HashMap<String, String>,
    seen_images: &mut HashMap<String, String>,
    book_number: u32,
) -> Result<ChapterId> {
    let section_id = destination.add_chapter(NewChapter {
        title: section.title.clone(),
        heading_level: Some(section.heading_level),
        ..Default::default()
    })?;

    let mut stylesheet_map: HashMap<String, String> = HashMap::new();
    for stylesheet in source.get_all_stylesheets() {
        if stylesheet.is_default {
            continue;
        }
        let hash = content_hash(stylesheet.content.as_bytes());
        let new_filename = match seen_stylesheets.get(&hash) {
            Some(existing) => existing.clone(),
            None => {
                let basename = basename(&stylesheet.filename);
                let new_filename = format!("css/book{book_number}-{basename}");
                let id = format!("style-{}", uuid::Uuid::new_v4());
                destination.stylesheets.insert(
                    id.clone(),
                    Stylesheet {
                        id: id.clone(),
                        filename: new_filename.clone(),
                        content: stylesheet.content.clone(),
                        is_default: false,
                    },
                );
                destination.stylesheet_order_hint.push(id);
                seen_stylesheets.insert(hash, new_filename.clone());
                new_filename
            }
        };
        stylesheet_map.insert(stylesheet.filename.clone(), new_filename);
    }

    let mut image_map: HashMap<String, String> = HashMap::new();
    for image in source.get_all_images() {
        let hash = content_hash(&image.data);
        let new_filename = match seen_images.get(&hash) {
            Some(existing) => existing.clone(),
            None => {
                let basename = basename(&image.filename);
                let new_filename = format!("images/book{book_number}-{basename}");
                let id = format!("image-{}", uuid::Uuid::new_v4());
                destination.images.insert(
                    id.clone(),
                    Image {
                        id,
                        filename: new_filename.clone(),
                        data: image.data.clone(),
                        mime_type: image.mime_type.clone(),
                        alt: image.alt.clone(),
                        is_cover: false,
                    },
                );
                seen_images.insert(hash, new_filename.clone());
                new_filename
            }
        };
        image_map.insert(image.filename.clone(), new_filename);
    }

    for root_id in &source.root_chapter_ids {
        copy_chapter_tree(destination, source, root_id, &section_id, &stylesheet_map, &image_map)?;
    }

    Ok(section_id)
}

fn copy_chapter_tree(
    destination: &mut Publication,
    source: &Publication,
    chapter_id: &ChapterId,
    new_parent: &ChapterId,
    stylesheet_map: &HashMap<String, String>,
    image_map: &HashMap<String, String>,
) -> Result<()> {
    let Some(chapter) = source.get_chapter(chapter_id) else {
        return Ok(());
    };

    let rewritten = rewrite_references(chapter.content(), stylesheet_map, "styles/")
        .pipe(|text| rewrite_references(&text, image_map, "images/"));

    let new_id = destination.add_chapter(NewChapter {
        title: chapter.title.clone(),
        content: Some(rewritten),
        parent_id: Some(new_parent.clone()),
        heading_level: Some(chapter.heading_level),
        linear: Some(chapter.linear),
    })?;

    for child_id in &chapter.children {
        copy_chapter_tree(destination, source, child_id, &new_id, stylesheet_map, image_map)?;
    }

    Ok(())
}

trait Pipe: Sized {
    fn pipe<T>(self, f: impl FnOnce(Self) -> T) -> T {
        f(self)
    }
}
impl<T> Pipe for T {}

fn basename(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
}

/// Rewrite `src="..."` references to old filenames into references to
/// their new filenames under `target_dir`, trying the four documented
/// fallback patterns (full old path with/without `../`, then basename
/// with/without `../`) in order for every `(old, new)` pair.
fn rewrite_references(markup: &str, mapping: &HashMap<String, String>, target_dir: &str) -> String {
    let mut result = markup.to_string();
    for (old_path, new_path) in mapping {
        let new_basename = basename(new_path);
        let replacement = format!(r#"src="../{target_dir}{new_basename}""#);
        let old_basename = regex::escape(basename(old_path));
        let old_full = regex::escape(old_path);

        for pattern in [
            format!(r#"src=["']\.\./{old_full}["']"#),
            format!(r#"src=["']{old_full}["']"#),
            format!(r#"src=["']\.\./{old_basename}["']"#),
            format!(r#"src=["']{old_basename}["']"#),
        ] {
            if let Ok(re) = Regex::new(&pattern) {
                result = re.replace_all(&result, replacement.as_str()).into_owned();
            }
        }
    }
    result
}

/// Merge several source publications into one, each under its own section
/// chapter, in order. Generalizes `add_publication_as_chapter`'s pairwise
/// shape to an arbitrary list of sources sharing one destination.
pub fn merge_publications(
    destination_title: &str,
    destination_creator: &str,
    options: crate::model::PublicationOptions,
    sections: Vec<(SectionOptions, &Publication)>,
) -> Result<Publication> {
    let mut destination = Publication::new(destination_title, destination_creator, options)?;
    let mut seen_stylesheets = HashMap::new();
    let mut seen_images = HashMap::new();

    for (book_number, (section, source)) in sections.into_iter().enumerate() {
        add_publication_as_chapter(
            &mut destination,
            &section,
            source,
            &mut seen_stylesheets,
            &mut seen_images,
            book_number as u32 + 1,
        )?;
    }

    Ok(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PublicationOptions;
    use crate::publication::{NewChapter, NewImage, NewStylesheet};

    fn source_with_asset() -> Publication {
        let mut p = Publication::new("Source", "Author", PublicationOptions::default()).unwrap();
        let style_id = p
            .add_stylesheet(NewStylesheet {
                filename: "book.css".into(),
                content: "body { color: red; }".into(),
            })
            .unwrap();
        let style_filename = p.get_stylesheet(&style_id).unwrap().filename.clone();
        p.add_image(NewImage {
            filename: "pic.png".into(),
            data: vec![1, 2, 3, 4],
            alt: None,
            is_cover: false,
        })
        .unwrap();
        p.add_chapter(NewChapter {
            title: "Only Chapter".into(),
            content: Some(format!(r#"<img src="../{}"/>"#, style_filename)),
            ..Default::default()
        })
        .unwrap();
        p
    }

    #[test]
    fn merge_splices_chapters_under_new_section() {
        let mut destination =
            Publication::new("Dest", "Editor", PublicationOptions::default()).unwrap();
        let source = source_with_asset();
        let mut seen_styles = HashMap::new();
        let mut seen_images = HashMap::new();
        let section_id = add_publication_as_chapter(
            &mut destination,
            &SectionOptions {
                title: "Book One".into(),
                heading_level: 1,
            },
            &source,
            &mut seen_styles,
            &mut seen_images,
            1,
        )
        .unwrap();

        let section = destination.get_chapter(&section_id).unwrap();
        assert_eq!(section.children.len(), 1);
        let chapter = destination.get_chapter(&section.children[0]).unwrap();
        assert_eq!(chapter.title, "Only Chapter");
    }

    #[test]
    fn merge_skips_the_source_default_stylesheet() {
        let mut destination =
            Publication::new("Dest", "Editor", PublicationOptions::default()).unwrap();
        let source = Publication::new("Source", "Author", PublicationOptions::default()).unwrap();
        let mut seen_styles = HashMap::new();
        let mut seen_images = HashMap::new();

        add_publication_as_chapter(
            &mut destination,
            &SectionOptions {
                title: "Book One".into(),
                heading_level: 1,
            },
            &source,
            &mut seen_styles,
            &mut seen_images,
            1,
        )
        .unwrap();

        // source carries only its own default stylesheet; none of it should
        // have been copied into the destination.
        assert_eq!(destination.get_all_stylesheets().len(), 1);
        assert!(destination.get_all_stylesheets()[0].is_default);
    }

    #[test]
    fn merge_deduplicates_identical_content_across_sources() {
        let mut destination =
            Publication::new("Dest", "Editor", PublicationOptions::default()).unwrap();
        let source_a = source_with_asset();
        let source_b = source_with_asset();
        let mut seen_styles = HashMap::new();
        let mut seen_images = HashMap::new();

        add_publication_as_chapter(
            &mut destination,
            &SectionOptions {
                title: "Book One".into(),
                heading_level: 1,
            },
            &source_a,
            &mut seen_styles,
            &mut seen_images,
            1,
        )
        .unwrap();
        add_publication_as_chapter(
            &mut destination,
            &SectionOptions {
                title: "Book Two".into(),
                heading_level: 1,
            },
            &source_b,
            &mut seen_styles,
            &mut seen_images,
            2,
        )
        .unwrap();

        // destination's own default stylesheet plus the one deduplicated
        // custom sheet shared by both sources.
        assert_eq!(destination.get_all_stylesheets().len(), 2);
        assert_eq!(destination.get_all_images().len(), 1);
    }

    #[test]
    fn rewrite_references_matches_all_four_patterns() {
        let mut mapping = HashMap::new();
        mapping.insert("old.css".to_string(), "css/book1-old.css".to_string());

        for markup in [
            r#"<link href="../old.css"/>"#,
            r#"<link href="old.css"/>"#,
        ] {
            let _ = markup; // link href isn't rewritten, only src=; kept for documentation
        }

        let cases = [
            (r#"<img src="../old.css">"#, true),
            (r#"<img src="old.css">"#, true),
        ];
        for (markup, should_match) in cases {
            let rewritten = rewrite_references(markup, &mapping, "styles/");
            assert_eq!(
                rewritten.contains(r#"src="../styles/old.css""#),
                should_match,
                "failed for {markup}"
            );
        }
    }

    #[test]
    fn cover_flag_is_not_preserved_across_merge() {
        let mut source = Publication::new("Source", "Author", PublicationOptions::default()).unwrap();
        source
            .add_image(NewImage {
                filename: "cover.png".into(),
                data: vec![9, 9, 9],
                alt: None,
                is_cover: true,
            })
            .unwrap();
        let mut destination =
            Publication::new("Dest", "Editor", PublicationOptions::default()).unwrap();
        let mut seen_styles = HashMap::new();
        let mut seen_images = HashMap::new();
        add_publication_as_chapter(
            &mut destination,
            &SectionOptions {
                title: "Book".into(),
                heading_level: 1,
            },
            &source,
            &mut seen_styles,
            &mut seen_images,
            1,
        )
        .unwrap();
        assert!(destination.get_all_images().iter().all(|i| !i.is_cover));
    }
}
