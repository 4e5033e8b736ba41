//! Deserialization orchestrator: rebuilds a `Publication` from parsed
//! archive pieces, merging information from the navigation document and
//! the spine. Grounded in the teacher's `epub::reader::read_epub`
//! orchestration (open → container → OPF → navigation → resources),
//! generalized to the hierarchical chapter tree, fragment chapters, and
//! the orphan-promotion / nav-fallback rules spec §4.7 describes.

use std::collections::HashMap;
use std::io::{Read, Seek};

use crate::archive::{self, container};
use crate::chapter_markup;
use crate::error::{EpubError, Result};
use crate::model::{
    Chapter, ChapterBody, ChapterId, DublinCoreMetadata, Publication, PublicationOptions,
};
use crate::navigation::{nav_xhtml, ncx, NavPoint};
use crate::package::opf;
use crate::package::{ManifestItem, ParsedOpf};
use crate::util;

/// A successfully rebuilt publication plus the non-fatal diagnostics
/// collected along the way (spec's "never logs on its own" policy — these
/// are returned, not printed).
pub struct Deserialized {
    pub publication: Publication,
    pub warnings: Vec<String>,
}

pub fn deserialize<R: Read + Seek>(reader: R, options: PublicationOptions) -> Result<Deserialized> {
    let mut archive = archive::open_safely(reader)?;
    archive::validate_mimetype(&mut archive)?;

    let container_xml = archive::read_entry_string(&mut archive, "META-INF/container.xml")
        .map_err(|_| EpubError::ArchiveMalformed("missing META-INF/container.xml".into()))?;
    let opf_path = container::parse_rootfile_path(&container_xml)?;
    let opf_xml = archive::read_entry_string(&mut archive, &opf_path)
        .map_err(|_| EpubError::ArchiveMalformed(format!("missing package document: {opf_path}")))?;
    let parsed = opf::parse(&opf_xml)?;

    let opf_dir = parent_dir(&opf_path);

    let mut warnings = Vec::new();
    let metadata = resolve_metadata(&parsed);

    let mut bootstrap_options = options.clone();
    bootstrap_options.add_default_stylesheet = false;
    let mut publication = Publication::new(&metadata.title, &metadata.creator, bootstrap_options)?;
    publication.options = options.clone();
    publication.metadata = metadata;

    let manifest_by_id: HashMap<&str, &ManifestItem> =
        parsed.manifest.iter().map(|m| (m.id.as_str(), m)).collect();
    let spine_order: HashMap<&str, (u32, bool)> = parsed
        .spine
        .iter()
        .enumerate()
        .map(|(i, s)| (s.idref.as_str(), (i as u32, s.linear)))
        .collect();

    let nav_tree = locate_and_parse_navigation(
        &mut archive,
        &opf_dir,
        &parsed,
        &mut warnings,
    );

    let mut href_to_chapter: HashMap<String, ChapterId> = HashMap::new();
    let mut fallback_counter: u32 = 1;
    let mut seen_spine_hrefs: std::collections::HashSet<String> = std::collections::HashSet::new();

    if let Some(tree) = &nav_tree {
        walk_nav(
            tree,
            None,
            &mut archive,
            &opf_dir,
            &manifest_by_id,
            &spine_order,
            &options,
            &mut publication,
            &mut href_to_chapter,
            &mut fallback_counter,
            &mut seen_spine_hrefs,
            &mut warnings,
        )?;
    }

    // Orphan promotion: spine entries never reached through navigation.
    for spine_item in &parsed.spine {
        let Some(manifest_item) = manifest_by_id.get(spine_item.idref.as_str()) else {
            continue;
        };
        if seen_spine_hrefs.contains(&manifest_item.href) {
            continue;
        }
        if !is_document_media_type(&manifest_item.media_type) {
            continue;
        }
        let content = read_relative(&mut archive, &opf_dir, &manifest_item.href)
            .unwrap_or_default();
        let extracted = chapter_markup::extract(&content);
        let title = chapter_markup::resolve_title(
            &extracted,
            None,
            &options.title_extraction,
            options.ignore_head_title,
            fallback_counter,
        );
        fallback_counter += 1;
        let id = format!("chapter-{}", uuid::Uuid::new_v4());
        let order = spine_order
            .get(spine_item.idref.as_str())
            .map(|(o, _)| *o)
            .unwrap_or(9999);
        publication.chapters.insert(
            id.clone(),
            Chapter {
                id: id.clone(),
                title,
                body: ChapterBody::Inline(extracted.body),
                filename: manifest_item.href.clone(),
                parent_id: None,
                order,
                children: Vec::new(),
                heading_level: extracted.heading_level.max(1),
                linear: spine_item.linear,
            },
        );
        publication.chapter_order_hint.push(id.clone());
        publication.root_chapter_ids.push(id);
        warnings.push(format!(
            "orphan chapter promoted to root: {}",
            manifest_item.href
        ));
    }

    // Stylesheet harvesting.
    for item in &parsed.manifest {
        if item.media_type != "text/css" {
            continue;
        }
        let content = read_relative(&mut archive, &opf_dir, &item.href).unwrap_or_default();
        let id = format!("style-{}", uuid::Uuid::new_v4());
        publication.stylesheets.insert(
            id.clone(),
            crate::model::Stylesheet {
                id: id.clone(),
                filename: item.href.clone(),
                content,
                is_default: false,
            },
        );
        publication.stylesheet_order_hint.push(id);
    }

    // Image harvesting.
    for item in &parsed.manifest {
        if !item.media_type.starts_with("image/") {
            continue;
        }
        let data = read_relative_bytes(&mut archive, &opf_dir, &item.href).unwrap_or_default();
        let is_cover = item
            .properties
            .as_deref()
            .is_some_and(|p| p.contains("cover-image"))
            || parsed.metadata.cover_id.as_deref() == Some(item.id.as_str());
        let id = format!("image-{}", uuid::Uuid::new_v4());
        let ext = item.href.rsplit('.').next().unwrap_or("");
        publication.images.insert(
            id.clone(),
            crate::model::Image {
                id: id.clone(),
                filename: item.href.clone(),
                data,
                mime_type: util::mime_type_for_any_extension(ext).to_string(),
                alt: None,
                is_cover,
            },
        );
        publication.image_order_hint.push(id);
    }

    publication.chapter_counter = publication.chapters.len() as u32;

    Ok(Deserialized { publication, warnings })
}

fn resolve_metadata(parsed: &ParsedOpf) -> DublinCoreMetadata {
    let mut metadata = DublinCoreMetadata::with_defaults(
        parsed.metadata.titles.first().cloned().unwrap_or_default(),
        parsed.metadata.creators.first().cloned().unwrap_or_default(),
    );
    if let Some(language) = parsed.metadata.languages.first() {
        metadata.language = language.clone();
    }
    if let Some(identifier) = parsed.metadata.identifiers.first() {
        metadata.identifier = identifier.clone();
    }
    if let Some(date) = parsed.metadata.dates.first() {
        metadata.date = date.clone();
    }
    metadata.publisher = parsed.metadata.publishers.first().cloned();
    metadata.description = parsed.metadata.description.clone();
    metadata.subject = parsed.metadata.subjects.clone();
    metadata.rights = parsed.metadata.rights.clone();
    metadata.contributor = parsed.metadata.contributors.clone();
    metadata.kind = parsed.metadata.kind.clone();
    metadata.format = parsed.metadata.format.clone();
    metadata.source = parsed.metadata.source.clone();
    metadata.relation = parsed.metadata.relation.clone();
    metadata.coverage = parsed.metadata.coverage.clone();
    metadata
}

fn locate_and_parse_navigation<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    opf_dir: &str,
    parsed: &ParsedOpf,
    warnings: &mut Vec<String>,
) -> Option<Vec<NavPoint>> {
    if !parsed.is_v2 {
        if let Some(nav_item) = parsed
            .manifest
            .iter()
            .find(|m| m.properties.as_deref().is_some_and(|p| p.contains("nav")))
        {
            match read_relative(archive, opf_dir, &nav_item.href) {
                Ok(content) => match nav_xhtml::parse(&content) {
                    Ok(tree) => return Some(tree),
                    Err(e) => warnings.push(format!("malformed navigation document: {e}")),
                },
                Err(e) => warnings.push(format!("could not read navigation document: {e}")),
            }
        } else {
            warnings.push("no navigation document found; falling back to spine order".into());
        }
        return None;
    }

    if let Some(ncx_item) = parsed
        .manifest
        .iter()
        .find(|m| m.media_type == "application/x-dtbncx+xml")
    {
        match read_relative(archive, opf_dir, &ncx_item.href) {
            Ok(content) => match ncx::parse(&content) {
                Ok(tree) => return Some(tree),
                Err(e) => warnings.push(format!("malformed NCX document: {e}")),
            },
            Err(e) => warnings.push(format!("could not read NCX document: {e}")),
        }
    } else {
        warnings.push("no NCX document found; falling back to spine order".into());
    }
    None
}

#[allow(clippy::too_many_arguments)]
fn walk_nav<R: Read + Seek>(
    points: &[NavPoint],
    parent: Option<ChapterId>,
    archive: &mut zip::ZipArchive<R>,
    opf_dir: &str,
    manifest_by_id: &HashMap<&str, &ManifestItem>,
    spine_order: &HashMap<&str, (u32, bool)>,
    options: &PublicationOptions,
    publication: &mut Publication,
    href_to_chapter: &mut HashMap<String, ChapterId>,
    fallback_counter: &mut u32,
    seen_spine_hrefs: &mut std::collections::HashSet<String>,
    warnings: &mut Vec<String>,
) -> Result<()> {
    for point in points {
        let (file, fragment) = split_fragment(&point.href);

        if let Some(fragment) = fragment {
            let backing_id = ensure_backing_chapter(
                file,
                None,
                archive,
                opf_dir,
                manifest_by_id,
                spine_order,
                options,
                publication,
                href_to_chapter,
                fallback_counter,
                seen_spine_hrefs,
                warnings,
            )?;

            let id = format!("chapter-{}", uuid::Uuid::new_v4());
            publication.chapters.insert(
                id.clone(),
                Chapter {
                    id: id.clone(),
                    title: point.label.clone(),
                    body: ChapterBody::FragmentOf {
                        source_chapter_id: backing_id,
                        fragment: fragment.to_string(),
                    },
                    filename: file.to_string(),
                    parent_id: parent.clone(),
                    order: 9999,
                    children: Vec::new(),
                    heading_level: 2,
                    linear: false,
                },
            );
            publication.chapter_order_hint.push(id.clone());
            link_to_parent(publication, &id, &parent);

            walk_nav(
                &point.children,
                Some(id),
                archive,
                opf_dir,
                manifest_by_id,
                spine_order,
                options,
                publication,
                href_to_chapter,
                fallback_counter,
                seen_spine_hrefs,
                warnings,
            )?;
            continue;
        }

        let id = if let Some(existing) = href_to_chapter.get(file).cloned() {
            let needs_relink = publication
                .chapters
                .get(&existing)
                .is_some_and(|chapter| chapter.parent_id != parent);
            if needs_relink {
                unlink_from_parent(publication, &existing);
                if let Some(chapter) = publication.chapters.get_mut(&existing) {
                    chapter.parent_id = parent.clone();
                }
            }
            if let Some(chapter) = publication.chapters.get_mut(&existing)
                && options.title_extraction.contains(&crate::model::TitleSource::Nav)
            {
                chapter.title = point.label.clone();
            }
            link_to_parent(publication, &existing, &parent);
            existing
        } else {
            ensure_backing_chapter(
                file,
                Some(point.label.as_str()),
                archive,
                opf_dir,
                manifest_by_id,
                spine_order,
                options,
                publication,
                href_to_chapter,
                fallback_counter,
                seen_spine_hrefs,
                warnings,
            )?;
            let new_id = href_to_chapter.get(file).cloned().unwrap();
            if let Some(chapter) = publication.chapters.get_mut(&new_id) {
                chapter.parent_id = parent.clone();
            }
            link_to_parent(publication, &new_id, &parent);
            new_id
        };

        walk_nav(
            &point.children,
            Some(id),
            archive,
            opf_dir,
            manifest_by_id,
            spine_order,
            options,
            publication,
            href_to_chapter,
            fallback_counter,
            seen_spine_hrefs,
            warnings,
        )?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn ensure_backing_chapter<R: Read + Seek>(
    file: &str,
    nav_label: Option<&str>,
    archive: &mut zip::ZipArchive<R>,
    opf_dir: &str,
    manifest_by_id: &HashMap<&str, &ManifestItem>,
    spine_order: &HashMap<&str, (u32, bool)>,
    options: &PublicationOptions,
    publication: &mut Publication,
    href_to_chapter: &mut HashMap<String, ChapterId>,
    fallback_counter: &mut u32,
    seen_spine_hrefs: &mut std::collections::HashSet<String>,
    warnings: &mut Vec<String>,
) -> Result<ChapterId> {
    if let Some(existing) = href_to_chapter.get(file) {
        return Ok(existing.clone());
    }

    let manifest_item = manifest_by_id.values().find(|m| m.href == file);
    let content = read_relative(archive, opf_dir, file).unwrap_or_default();
    let extracted = chapter_markup::extract(&content);
    let title = chapter_markup::resolve_title(
        &extracted,
        nav_label,
        &options.title_extraction,
        options.ignore_head_title,
        *fallback_counter,
    );
    *fallback_counter += 1;

    let idref = manifest_item.map(|m| m.id.as_str()).unwrap_or_default();
    let (order, linear) = match spine_order.get(idref) {
        Some((order, linear)) => (*order, *linear),
        None => {
            warnings.push(format!("navigation entry {file} is missing from the spine"));
            (9999, false)
        }
    };

    let id = format!("chapter-{}", uuid::Uuid::new_v4());
    publication.chapters.insert(
        id.clone(),
        Chapter {
            id: id.clone(),
            title,
            body: ChapterBody::Inline(extracted.body),
            filename: file.to_string(),
            parent_id: None,
            order,
            children: Vec::new(),
            heading_level: extracted.heading_level.max(1),
            linear,
        },
    );
    publication.chapter_order_hint.push(id.clone());
    publication.root_chapter_ids.push(id.clone());
    href_to_chapter.insert(file.to_string(), id.clone());
    seen_spine_hrefs.insert(file.to_string());
    Ok(id)
}

fn link_to_parent(publication: &mut Publication, id: &str, parent: &Option<ChapterId>) {
    match parent {
        Some(parent_id) => {
            if let Some(parent_chapter) = publication.chapters.get_mut(parent_id)
                && !parent_chapter.children.iter().any(|c| c == id)
            {
                parent_chapter.children.push(id.to_string());
            }
        }
        None => {
            if !publication.root_chapter_ids.iter().any(|c| c == id) {
                publication.root_chapter_ids.push(id.to_string());
            }
        }
    }
}

fn unlink_from_parent(publication: &mut Publication, id: &str) {
    let old_parent = publication.chapters.get(id).and_then(|c| c.parent_id.clone());
    match old_parent {
        Some(parent_id) => {
            if let Some(parent_chapter) = publication.chapters.get_mut(&parent_id) {
                parent_chapter.children.retain(|c| c != id);
            }
        }
        None => publication.root_chapter_ids.retain(|c| c != id),
    }
}

fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((file, frag)) => (file, Some(frag)),
        None => (href, None),
    }
}

fn is_document_media_type(media_type: &str) -> bool {
    media_type == "application/xhtml+xml"
}

fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

fn read_relative<R: Read + Seek>(archive: &mut zip::ZipArchive<R>, dir: &str, href: &str) -> Result<String> {
    let full_path = if dir.is_empty() {
        href.to_string()
    } else {
        format!("{dir}/{href}")
    };
    archive::read_entry_string(archive, &full_path)
}

fn read_relative_bytes<R: Read + Seek>(archive: &mut zip::ZipArchive<R>, dir: &str, href: &str) -> Result<Vec<u8>> {
    let full_path = if dir.is_empty() {
        href.to_string()
    } else {
        format!("{dir}/{href}")
    };
    archive::read_entry(archive, &full_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExportOptions;
    use crate::publication::NewChapter;
    use std::io::Cursor;

    fn round_trip_bytes() -> Vec<u8> {
        let mut publication =
            Publication::new("Round Trip", "Author A", PublicationOptions::default()).unwrap();
        let part = publication
            .add_chapter(NewChapter {
                title: "Part I".into(),
                content: Some("<p>Intro.</p>".into()),
                ..Default::default()
            })
            .unwrap();
        publication
            .add_chapter(NewChapter {
                title: "Chapter 1".into(),
                content: Some("<p>Body.</p>".into()),
                parent_id: Some(part),
                ..Default::default()
            })
            .unwrap();
        publication.export_to_bytes(&ExportOptions::default()).unwrap()
    }

    #[test]
    fn round_trips_titles_and_tree_shape() {
        let bytes = round_trip_bytes();
        let result = deserialize(Cursor::new(bytes), PublicationOptions::default()).unwrap();
        assert_eq!(result.publication.metadata.title, "Round Trip");
        assert_eq!(result.publication.root_chapter_ids.len(), 1);
        let part = result
            .publication
            .get_chapter(&result.publication.root_chapter_ids[0])
            .unwrap();
        assert_eq!(part.title, "Part I");
        assert_eq!(part.children.len(), 1);
        let child = result.publication.get_chapter(&part.children[0]).unwrap();
        assert_eq!(child.title, "Chapter 1");
        assert!(child.content().contains("Body."));
    }

    #[test]
    fn split_fragment_separates_file_and_anchor() {
        assert_eq!(split_fragment("ch1.xhtml#s1"), ("ch1.xhtml", Some("s1")));
        assert_eq!(split_fragment("ch1.xhtml"), ("ch1.xhtml", None));
    }
}
