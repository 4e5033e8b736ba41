//! Safe ZIP container I/O: the only place this crate touches the `zip`
//! crate directly. Grounded in the teacher's `epub::zip_utils`, extended
//! with the entry-count and uncompressed-size ceilings and the
//! path-traversal check spec §4.7 requires of a "safe unzip".

pub mod container;

use std::io::{Read, Seek};

use zip::ZipArchive;

use crate::error::{EpubError, Result};

/// Archives with more entries than this are rejected outright (zip-bomb
/// guard; spec §4.7 edge case).
pub const MAX_ENTRY_COUNT: usize = 10_000;

/// Archives whose entries sum to more uncompressed bytes than this are
/// rejected outright (zip-bomb guard; spec §4.7 edge case).
pub const MAX_TOTAL_UNCOMPRESSED_BYTES: u64 = 1024 * 1024 * 1024;

/// Open a ZIP archive from any `Read + Seek` source and run the safety
/// checks that must hold before any entry is trusted: entry-count ceiling,
/// uncompressed-size ceiling, and no path-traversal entry names.
pub fn open_safely<R: Read + Seek>(reader: R) -> Result<ZipArchive<R>> {
    let mut archive = ZipArchive::new(reader)?;
    enforce_entry_count(&archive)?;
    enforce_uncompressed_size(&mut archive)?;
    reject_unsafe_paths(&archive)?;
    Ok(archive)
}

fn enforce_entry_count<R: Read + Seek>(archive: &ZipArchive<R>) -> Result<()> {
    if archive.len() > MAX_ENTRY_COUNT {
        return Err(EpubError::ArchiveUnsafe(format!(
            "archive has {} entries, exceeding the {MAX_ENTRY_COUNT} limit",
            archive.len()
        )));
    }
    Ok(())
}

fn enforce_uncompressed_size<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<()> {
    let mut total: u64 = 0;
    for i in 0..archive.len() {
        if let Ok(raw) = archive.by_index_raw(i) {
            total += raw.size();
        }
    }
    if total > MAX_TOTAL_UNCOMPRESSED_BYTES {
        return Err(EpubError::ArchiveUnsafe(format!(
            "archive expands to {total} bytes, exceeding the {MAX_TOTAL_UNCOMPRESSED_BYTES} byte limit"
        )));
    }
    Ok(())
}

fn reject_unsafe_paths<R: Read + Seek>(archive: &ZipArchive<R>) -> Result<()> {
    for i in 0..archive.len() {
        if let Some(name) = archive.name_for_index(i) {
            validate_entry_name(name)?;
        }
    }
    Ok(())
}

fn validate_entry_name(name: &str) -> Result<()> {
    if name.starts_with('/') || name.contains("..") {
        return Err(EpubError::ArchiveUnsafe(format!(
            "unsafe entry path: {name}"
        )));
    }
    Ok(())
}

/// The first entry must be a stored, uncompressed `mimetype` file whose
/// content is exactly `application/epub+zip` (spec §4.7).
pub fn validate_mimetype<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<()> {
    let mut entry = archive
        .by_index(0)
        .map_err(|_| EpubError::ArchiveMalformed("missing mimetype entry".into()))?;

    if entry.name() != "mimetype" {
        return Err(EpubError::ArchiveMalformed(
            "first archive entry must be named 'mimetype'".into(),
        ));
    }

    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    if content.trim() != "application/epub+zip" {
        return Err(EpubError::ArchiveMalformed(format!(
            "invalid mimetype content: {content}"
        )));
    }
    Ok(())
}

pub fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut entry = archive
        .by_name(name)
        .map_err(|_| EpubError::ArchiveMalformed(format!("missing entry: {name}")))?;
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf)?;
    Ok(buf)
}

pub fn read_entry_string<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String> {
    let bytes = read_entry(archive, name)?;
    String::from_utf8(bytes)
        .map_err(|e| EpubError::ArchiveMalformed(format!("invalid UTF-8 in {name}: {e}")))
}

pub fn list_entries<R: Read + Seek>(archive: &ZipArchive<R>) -> Vec<String> {
    (0..archive.len())
        .filter_map(|i| archive.name_for_index(i).map(|s| s.to_string()))
        .collect()
}
