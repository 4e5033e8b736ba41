//! `META-INF/container.xml`: the fixed bootstrap entry pointing at the OPF
//! package document. Grounded in the teacher's `epub::container` (parse
//! side) and `epub::writer::write_container_xml` (emit side).

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{EpubError, Result};

/// The OPF package document always lives here in publications this crate
/// builds; parsed publications may use any path the archive's container.xml
/// names.
pub const DEFAULT_OPF_PATH: &str = "EPUB/package.opf";

/// Extract the `full-path` of the first `<rootfile>` entry.
pub fn parse_rootfile_path(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"rootfile" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        return Ok(String::from_utf8_lossy(&attr.value).into_owned());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(EpubError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Err(EpubError::ArchiveMalformed(
        "no rootfile found in container.xml".into(),
    ))
}

/// Render `META-INF/container.xml` pointing at `opf_path`.
pub fn render(opf_path: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{opf_path}" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rootfile_path() {
        let xml = render(DEFAULT_OPF_PATH);
        assert_eq!(parse_rootfile_path(&xml).unwrap(), DEFAULT_OPF_PATH);
    }

    #[test]
    fn missing_rootfile_errors() {
        let xml = r#"<?xml version="1.0"?><container><rootfiles></rootfiles></container>"#;
        assert!(parse_rootfile_path(xml).is_err());
    }

    #[test]
    fn render_round_trips() {
        let xml = render("EPUB/book.opf");
        assert!(xml.contains(r#"full-path="EPUB/book.opf""#));
    }
}
