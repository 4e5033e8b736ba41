//! End-to-end build -> export -> reopen coverage across both format
//! versions, exercising the on-disk path (not just in-memory bytes).

use epubkit::{
    ExportOptions, FormatVersion, MetadataPatch, NewChapter, NewImage, NewStylesheet, Publication,
    PublicationOptions,
};

fn build_sample() -> Publication {
    let mut publication = Publication::new("Sample Book", "Jane Doe", PublicationOptions::default()).unwrap();
    publication.set_metadata(MetadataPatch {
        publisher: Some("Acme Press".into()),
        subject: Some(vec!["Fiction".into(), "Adventure".into()]),
        rights: Some("All rights reserved".into()),
        ..Default::default()
    });

    let style_id = publication
        .add_stylesheet(NewStylesheet {
            filename: "book.css".into(),
            content: "p { color: black; }".into(),
        })
        .unwrap();
    let style_filename = publication.get_stylesheet(&style_id).unwrap().filename.clone();

    let cover_id = publication
        .add_image(NewImage {
            filename: "cover.png".into(),
            data: vec![0x89, 0x50, 0x4e, 0x47],
            alt: Some("Cover art".into()),
            is_cover: true,
        })
        .unwrap();
    assert!(publication.get_image(&cover_id).unwrap().is_cover);

    let part = publication
        .add_chapter(NewChapter {
            title: "Part I".into(),
            ..Default::default()
        })
        .unwrap();
    publication
        .add_chapter(NewChapter {
            title: "Chapter 1".into(),
            content: Some(format!(
                r#"<p>The cover used <code>{style_filename}</code>.</p>"#
            )),
            parent_id: Some(part.clone()),
            ..Default::default()
        })
        .unwrap();
    publication
        .add_chapter(NewChapter {
            title: "Chapter 2".into(),
            content: Some("<p>Second chapter.</p>".into()),
            parent_id: Some(part),
            linear: Some(false),
            ..Default::default()
        })
        .unwrap();

    publication
}

#[test]
fn v3_round_trip_preserves_tree_and_metadata() {
    let publication = build_sample();
    let bytes = publication.export_to_bytes(&ExportOptions::default()).unwrap();
    let (reopened, warnings) = Publication::from_bytes(bytes, PublicationOptions::default()).unwrap();

    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    assert_eq!(reopened.metadata.title, "Sample Book");
    assert_eq!(reopened.metadata.creator, "Jane Doe");
    assert_eq!(reopened.metadata.publisher.as_deref(), Some("Acme Press"));
    assert_eq!(reopened.metadata.subject, vec!["Fiction".to_string(), "Adventure".to_string()]);

    assert_eq!(reopened.root_chapter_ids.len(), 1);
    let part = reopened.get_chapter(&reopened.root_chapter_ids[0]).unwrap();
    assert_eq!(part.title, "Part I");
    assert_eq!(part.children.len(), 2);

    let chapter1 = reopened.get_chapter(&part.children[0]).unwrap();
    assert_eq!(chapter1.title, "Chapter 1");
    assert!(chapter1.content().contains("The cover used"));

    let chapter2 = reopened.get_chapter(&part.children[1]).unwrap();
    assert!(!chapter2.linear);

    let images = reopened.get_all_images();
    assert_eq!(images.len(), 1);
    assert!(images[0].is_cover);
}

#[test]
fn v2_round_trip_uses_ncx_not_nav() {
    let publication = build_sample();
    let mut options = ExportOptions::default();
    options.version = FormatVersion::V2;
    let bytes = publication.export_to_bytes(&options).unwrap();

    let (reopened, warnings) = Publication::from_bytes(bytes, PublicationOptions::default()).unwrap();
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    assert_eq!(reopened.metadata.title, "Sample Book");
    assert_eq!(reopened.root_chapter_ids.len(), 1);
}

#[test]
fn round_trip_through_disk_file() {
    let publication = build_sample();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.epub");

    publication.export_to_file(&path, &ExportOptions::default()).unwrap();
    assert!(path.exists());

    let (reopened, warnings) = Publication::open(&path, PublicationOptions::default()).unwrap();
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    assert_eq!(reopened.metadata.title, "Sample Book");
    assert_eq!(reopened.get_all_chapters().len(), 3);
}

#[test]
fn default_metadata_survives_when_unset() {
    let publication = Publication::new("Minimal", "Author", PublicationOptions::default()).unwrap();
    let original_identifier = publication.metadata.identifier.clone();
    let bytes = publication.export_to_bytes(&ExportOptions::default()).unwrap();
    let (reopened, _) = Publication::from_bytes(bytes, PublicationOptions::default()).unwrap();

    assert_eq!(reopened.metadata.language, "en");
    assert_eq!(reopened.metadata.identifier, original_identifier);
}
