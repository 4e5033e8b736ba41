//! Top-level export pipeline: turns a `Publication` into EPUB archive
//! bytes. Grounded in the teacher's `epub::writer::write_epub`, which
//! drives the same mimetype → container → package → navigation →
//! resources sequence; generalized here to the hierarchical chapter model
//! and to either target format version.

use std::io::{Cursor, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::archive::container;
use crate::chapter_markup;
use crate::error::Result;
use crate::model::{Chapter, ExportOptions, FormatVersion, Publication};
use crate::navigation::{self, nav_xhtml, ncx};
use crate::package::opf;
use crate::package::{ManifestItem, SpineItem};

const OPF_DIR: &str = "EPUB";

pub fn serialize(publication: &Publication, options: &ExportOptions) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_to(publication, options, Cursor::new(&mut buffer))?;
    Ok(buffer)
}

pub fn serialize_to_file(publication: &Publication, options: &ExportOptions, path: &Path) -> Result<()> {
    let tmp_path = path.with_extension("epub.tmp");
    let file = std::fs::File::create(&tmp_path)?;
    write_to(publication, options, file)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn write_to<W: Write + std::io::Seek>(publication: &Publication, options: &ExportOptions, writer: W) -> Result<()> {
    let mut zip = ZipWriter::new(writer);
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflate_level = options.compression_level.clamp(0, 9) as i64;
    let deflate = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(deflate_level));

    zip.start_file("mimetype", stored)?;
    zip.write_all(b"application/epub+zip")?;

    zip.start_file("META-INF/container.xml", deflate)?;
    zip.write_all(container::render(&format!("{OPF_DIR}/{}", opf_filename())).as_bytes())?;

    let chapters_in_order = sorted_chapters(publication);
    let stylesheet_hrefs: Vec<String> = publication
        .get_all_stylesheets()
        .iter()
        .map(|s| format!("../{}", s.filename))
        .collect();

    let nav_tree = navigation::build_nav_tree(publication);
    let mut manifest = Vec::new();
    let mut spine = Vec::new();

    match options.version {
        FormatVersion::V3 => {
            let nav_xhtml = nav_xhtml::render(&publication.metadata.title, &nav_tree);
            zip.start_file(format!("{OPF_DIR}/nav.xhtml"), deflate)?;
            zip.write_all(nav_xhtml.as_bytes())?;
            manifest.push(ManifestItem {
                id: "nav".into(),
                href: "nav.xhtml".into(),
                media_type: "application/xhtml+xml".into(),
                properties: Some("nav".into()),
            });
        }
        FormatVersion::V2 => {
            let ncx_xml = ncx::render(
                &publication.metadata.title,
                &publication.metadata.creator,
                &publication.metadata.identifier,
                &nav_tree,
            );
            zip.start_file(format!("{OPF_DIR}/toc.ncx"), deflate)?;
            zip.write_all(ncx_xml.as_bytes())?;
            manifest.push(ManifestItem {
                id: "ncx".into(),
                href: "toc.ncx".into(),
                media_type: "application/x-dtbncx+xml".into(),
                properties: None,
            });
        }
    }

    for chapter in &chapters_in_order {
        if chapter.body.is_fragment() {
            continue;
        }
        let xhtml = chapter_markup::render(
            options.version,
            &chapter.id,
            &chapter.title,
            chapter.heading_level,
            chapter.content(),
            &stylesheet_hrefs,
        );
        zip.start_file(format!("{OPF_DIR}/{}", chapter.filename), deflate)?;
        zip.write_all(xhtml.as_bytes())?;
        manifest.push(ManifestItem {
            id: chapter.id.clone(),
            href: chapter.filename.clone(),
            media_type: "application/xhtml+xml".into(),
            properties: None,
        });
        spine.push(SpineItem {
            idref: chapter.id.clone(),
            linear: chapter.linear,
        });
    }

    for stylesheet in publication.get_all_stylesheets() {
        zip.start_file(format!("{OPF_DIR}/{}", stylesheet.filename), deflate)?;
        zip.write_all(stylesheet.content.as_bytes())?;
        manifest.push(ManifestItem {
            id: stylesheet.id.clone(),
            href: stylesheet.filename.clone(),
            media_type: "text/css".into(),
            properties: None,
        });
    }

    let mut cover_image_id = None;
    for image in publication.get_all_images() {
        zip.start_file(format!("{OPF_DIR}/{}", image.filename), deflate)?;
        zip.write_all(&image.data)?;
        let properties = if image.is_cover && matches!(options.version, FormatVersion::V3) {
            Some("cover-image".to_string())
        } else {
            None
        };
        if image.is_cover {
            cover_image_id = Some(image.id.clone());
        }
        manifest.push(ManifestItem {
            id: image.id.clone(),
            href: image.filename.clone(),
            media_type: image.mime_type.clone(),
            properties,
        });
    }

    let opf_xml = opf::render(
        options.version,
        &publication.metadata,
        cover_image_id.as_deref(),
        &manifest,
        &spine,
    );
    zip.start_file(format!("{OPF_DIR}/{}", opf_filename()), deflate)?;
    zip.write_all(opf_xml.as_bytes())?;

    zip.finish()?;
    Ok(())
}

fn opf_filename() -> &'static str {
    "package.opf"
}

/// Chapters in ascending `order`, ties broken by insertion order (spec §5).
fn sorted_chapters(publication: &Publication) -> Vec<&Chapter> {
    let mut chapters = publication.get_all_chapters();
    chapters.sort_by_key(|c| c.order);
    chapters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PublicationOptions;
    use crate::publication::NewChapter;

    fn sample() -> Publication {
        let mut p = Publication::new("Sample", "Author", PublicationOptions::default()).unwrap();
        p.add_chapter(NewChapter {
            title: "Chapter One".into(),
            content: Some("<p>Hello.</p>".into()),
            ..Default::default()
        })
        .unwrap();
        p
    }

    #[test]
    fn serializes_v3_with_mimetype_first_and_uncompressed() {
        let publication = sample();
        let bytes = serialize(&publication, &ExportOptions::default()).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.by_index(0).unwrap().name(), "mimetype");
        assert_eq!(
            archive.by_index(0).unwrap().compression(),
            CompressionMethod::Stored
        );
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.iter().any(|n| n == "EPUB/nav.xhtml"));
        assert!(!names.iter().any(|n| n == "EPUB/toc.ncx"));
    }

    #[test]
    fn serializes_v2_with_ncx_not_nav() {
        let publication = sample();
        let mut options = ExportOptions::default();
        options.version = FormatVersion::V2;
        let bytes = serialize(&publication, &options).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.iter().any(|n| n == "EPUB/toc.ncx"));
        assert!(!names.iter().any(|n| n == "EPUB/nav.xhtml"));
    }
}
