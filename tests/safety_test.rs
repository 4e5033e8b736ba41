//! Adversarial-archive coverage: entry-count ceiling, uncompressed-size
//! ceiling, and path-traversal rejection, driven entirely through the
//! public `Publication::from_bytes` entry point.

use std::io::{Cursor, Write};

use epubkit::{EpubError, Publication, PublicationOptions};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn minimal_valid_epub_zip(writer: &mut ZipWriter<Cursor<&mut Vec<u8>>>) {
    let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    writer.start_file("mimetype", stored).unwrap();
    writer.write_all(b"application/epub+zip").unwrap();
}

#[test]
fn rejects_archive_with_path_traversal_entry() {
    let mut bytes = Vec::new();
    {
        let mut writer = ZipWriter::new(Cursor::new(&mut bytes));
        minimal_valid_epub_zip(&mut writer);
        let options = SimpleFileOptions::default();
        writer.start_file("../../etc/passwd", options).unwrap();
        writer.write_all(b"evil").unwrap();
        writer.finish().unwrap();
    }

    let result = Publication::from_bytes(bytes, PublicationOptions::default());
    assert!(matches!(result, Err(EpubError::ArchiveUnsafe(_))), "{result:?}");
}

#[test]
fn rejects_archive_exceeding_entry_count_ceiling() {
    let mut bytes = Vec::new();
    {
        let mut writer = ZipWriter::new(Cursor::new(&mut bytes));
        minimal_valid_epub_zip(&mut writer);
        let options = SimpleFileOptions::default();
        for i in 0..10_001 {
            writer.start_file(format!("EPUB/filler-{i}.txt"), options).unwrap();
        }
        writer.finish().unwrap();
    }

    let result = Publication::from_bytes(bytes, PublicationOptions::default());
    assert!(matches!(result, Err(EpubError::ArchiveUnsafe(_))), "{result:?}");
}

#[test]
fn rejects_archive_with_wrong_first_entry_name() {
    let mut bytes = Vec::new();
    {
        let mut writer = ZipWriter::new(Cursor::new(&mut bytes));
        let options = SimpleFileOptions::default();
        writer.start_file("not-mimetype", options).unwrap();
        writer.write_all(b"application/epub+zip").unwrap();
        writer.finish().unwrap();
    }

    let result = Publication::from_bytes(bytes, PublicationOptions::default());
    assert!(matches!(result, Err(EpubError::ArchiveMalformed(_))), "{result:?}");
}

#[test]
fn rejects_archive_with_wrong_mimetype_content() {
    let mut bytes = Vec::new();
    {
        let mut writer = ZipWriter::new(Cursor::new(&mut bytes));
        let stored = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file("mimetype", stored).unwrap();
        writer.write_all(b"text/plain").unwrap();
        writer.finish().unwrap();
    }

    let result = Publication::from_bytes(bytes, PublicationOptions::default());
    assert!(matches!(result, Err(EpubError::ArchiveMalformed(_))), "{result:?}");
}
