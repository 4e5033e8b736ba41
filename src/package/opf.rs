//! Parsing and rendering of the OPF package document. Grounded in the
//! teacher's `epub::opf::parse_opf` (parse side) and
//! `epub::writer::generate_opf` (render side), extended to emit both the
//! EPUB 2 and EPUB 3 metadata shapes spec §4.3 distinguishes.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{EpubError, Result};
use crate::model::{DublinCoreMetadata, FormatVersion};
use crate::package::{ManifestItem, ParsedOpf, SpineItem};
use crate::xml_util::escape;

pub fn parse(xml: &str) -> Result<ParsedOpf> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut result = ParsedOpf::default();
    let mut in_metadata = false;
    let mut current_element = String::new();
    let mut current_text = String::new();
    let mut current_meta_property = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if local == "package" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"version" {
                            let v = String::from_utf8_lossy(&attr.value);
                            result.is_v2 = v.starts_with('2');
                        }
                    }
                } else if local == "metadata" {
                    in_metadata = true;
                } else if in_metadata {
                    current_element = local.clone();
                    current_text.clear();
                    current_meta_property.clear();
                    if local == "meta" {
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"property" {
                                current_meta_property = String::from_utf8_lossy(&attr.value).into_owned();
                            }
                        }
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if local == "metadata" {
                    in_metadata = false;
                } else if in_metadata && !current_text.is_empty() {
                    let text = current_text.trim().to_string();
                    match current_element.as_str() {
                        "identifier" => result.metadata.identifiers.push(text),
                        "title" => result.metadata.titles.push(text),
                        "language" => result.metadata.languages.push(text),
                        "creator" => result.metadata.creators.push(text),
                        "publisher" => result.metadata.publishers.push(text),
                        "date" => result.metadata.dates.push(text),
                        "description" => result.metadata.description = Some(text),
                        "subject" => result.metadata.subjects.push(text),
                        "rights" => result.metadata.rights = Some(text),
                        "contributor" => result.metadata.contributors.push(text),
                        "type" => result.metadata.kind = Some(text),
                        "format" => result.metadata.format = Some(text),
                        "source" => result.metadata.source = Some(text),
                        "relation" => result.metadata.relation = Some(text),
                        "coverage" => result.metadata.coverage = Some(text),
                        "meta" if current_meta_property == "dcterms:modified" => {
                            result.metadata.modified = Some(text);
                        }
                        _ => {}
                    }
                    current_text.clear();
                    current_element.clear();
                    current_meta_property.clear();
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_metadata {
                    current_text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::Empty(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if local == "item" {
                    let mut item = ManifestItem {
                        id: String::new(),
                        href: String::new(),
                        media_type: String::new(),
                        properties: None,
                    };
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"id" => item.id = String::from_utf8_lossy(&attr.value).into_owned(),
                            b"href" => item.href = String::from_utf8_lossy(&attr.value).into_owned(),
                            b"media-type" => {
                                item.media_type = String::from_utf8_lossy(&attr.value).into_owned()
                            }
                            b"properties" => {
                                item.properties = Some(String::from_utf8_lossy(&attr.value).into_owned())
                            }
                            _ => {}
                        }
                    }
                    result.manifest.push(item);
                } else if local == "itemref" {
                    let mut spine_item = SpineItem {
                        idref: String::new(),
                        linear: true,
                    };
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"idref" => {
                                spine_item.idref = String::from_utf8_lossy(&attr.value).into_owned()
                            }
                            b"linear" => spine_item.linear = String::from_utf8_lossy(&attr.value) != "no",
                            _ => {}
                        }
                    }
                    result.spine.push(spine_item);
                } else if in_metadata && local == "meta" {
                    let mut name = String::new();
                    let mut content = String::new();
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"name" => name = String::from_utf8_lossy(&attr.value).into_owned(),
                            b"content" => content = String::from_utf8_lossy(&attr.value).into_owned(),
                            _ => {}
                        }
                    }
                    if name == "cover" {
                        result.metadata.cover_id = Some(content);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(EpubError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(result)
}

/// Render a complete OPF package document.
pub fn render(
    version: FormatVersion,
    metadata: &DublinCoreMetadata,
    cover_image_id: Option<&str>,
    manifest: &[ManifestItem],
    spine: &[SpineItem],
) -> String {
    let version_attr = match version {
        FormatVersion::V2 => "2.0",
        FormatVersion::V3 => "3.0",
    };

    let mut opf = String::new();
    opf.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    opf.push_str("<package xmlns=\"http://www.idpf.org/2007/opf\"");
    opf.push_str(&format!(" version=\"{version_attr}\" unique-identifier=\"uid\""));
    if matches!(version, FormatVersion::V3) {
        opf.push_str(&format!(" xml:lang=\"{}\"", escape(&metadata.language)));
    }
    opf.push_str(">\n");

    opf.push_str("  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\"");
    if matches!(version, FormatVersion::V3) {
        opf.push_str(" xmlns:opf=\"http://www.idpf.org/2007/opf\"");
    }
    opf.push_str(">\n");

    opf.push_str(&format!(
        "    <dc:identifier id=\"uid\">{}</dc:identifier>\n",
        escape(&metadata.identifier)
    ));
    opf.push_str(&format!("    <dc:title>{}</dc:title>\n", escape(&metadata.title)));
    opf.push_str(&format!("    <dc:creator>{}</dc:creator>\n", escape(&metadata.creator)));
    opf.push_str(&format!(
        "    <dc:language>{}</dc:language>\n",
        escape(&metadata.language)
    ));
    opf.push_str(&format!("    <dc:date>{}</dc:date>\n", escape(&metadata.date)));

    if matches!(version, FormatVersion::V3) {
        opf.push_str(&format!(
            "    <meta property=\"dcterms:modified\">{}</meta>\n",
            crate::util::format_iso8601()
        ));
    }

    if let Some(publisher) = &metadata.publisher {
        opf.push_str(&format!("    <dc:publisher>{}</dc:publisher>\n", escape(publisher)));
    }
    if let Some(description) = &metadata.description {
        opf.push_str(&format!(
            "    <dc:description>{}</dc:description>\n",
            escape(description)
        ));
    }
    for subject in &metadata.subject {
        opf.push_str(&format!("    <dc:subject>{}</dc:subject>\n", escape(subject)));
    }
    if let Some(rights) = &metadata.rights {
        opf.push_str(&format!("    <dc:rights>{}</dc:rights>\n", escape(rights)));
    }
    for contributor in &metadata.contributor {
        opf.push_str(&format!(
            "    <dc:contributor>{}</dc:contributor>\n",
            escape(contributor)
        ));
    }
    if let Some(kind) = &metadata.kind {
        opf.push_str(&format!("    <dc:type>{}</dc:type>\n", escape(kind)));
    }
    if let Some(format) = &metadata.format {
        opf.push_str(&format!("    <dc:format>{}</dc:format>\n", escape(format)));
    }
    if let Some(source) = &metadata.source {
        opf.push_str(&format!("    <dc:source>{}</dc:source>\n", escape(source)));
    }
    if let Some(relation) = &metadata.relation {
        opf.push_str(&format!("    <dc:relation>{}</dc:relation>\n", escape(relation)));
    }
    if let Some(coverage) = &metadata.coverage {
        opf.push_str(&format!("    <dc:coverage>{}</dc:coverage>\n", escape(coverage)));
    }

    if matches!(version, FormatVersion::V2)
        && let Some(cover_id) = cover_image_id
    {
        opf.push_str(&format!(
            "    <meta name=\"cover\" content=\"{}\"/>\n",
            escape(cover_id)
        ));
    }

    opf.push_str("  </metadata>\n");

    opf.push_str("  <manifest>\n");
    for item in manifest {
        let props = item
            .properties
            .as_ref()
            .map(|p| format!(" properties=\"{}\"", escape(p)))
            .unwrap_or_default();
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"{}\"{props}/>\n",
            escape(&item.id),
            escape(&item.href),
            escape(&item.media_type)
        ));
    }
    opf.push_str("  </manifest>\n");

    let toc_attr = if matches!(version, FormatVersion::V2) {
        " toc=\"ncx\""
    } else {
        ""
    };
    opf.push_str(&format!("  <spine{toc_attr}>\n"));
    for item in spine {
        let linear = if item.linear { "" } else { " linear=\"no\"" };
        opf.push_str(&format!(
            "    <itemref idref=\"{}\"{linear}/>\n",
            escape(&item.idref)
        ));
    }
    opf.push_str("  </spine>\n");
    opf.push_str("</package>\n");
    opf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_metadata() -> DublinCoreMetadata {
        DublinCoreMetadata::with_defaults("My Book".into(), "Jane Doe".into())
    }

    #[test]
    fn renders_and_parses_v3_round_trip() {
        let metadata = sample_metadata();
        let manifest = vec![ManifestItem {
            id: "ch1".into(),
            href: "text/chapter-1.xhtml".into(),
            media_type: "application/xhtml+xml".into(),
            properties: None,
        }];
        let spine = vec![SpineItem {
            idref: "ch1".into(),
            linear: true,
        }];
        let xml = render(FormatVersion::V3, &metadata, None, &manifest, &spine);
        let parsed = parse(&xml).unwrap();
        assert!(!parsed.is_v2);
        assert_eq!(parsed.metadata.titles, vec!["My Book".to_string()]);
        assert_eq!(parsed.metadata.creators, vec!["Jane Doe".to_string()]);
        assert_eq!(parsed.manifest.len(), 1);
        assert_eq!(parsed.spine.len(), 1);
    }

    #[test]
    fn v3_package_root_carries_xml_lang() {
        let xml = render(FormatVersion::V3, &sample_metadata(), None, &[], &[]);
        assert!(xml.contains(r#"xml:lang="en""#));
        let xml_v2 = render(FormatVersion::V2, &sample_metadata(), None, &[], &[]);
        assert!(!xml_v2.contains("xml:lang"));
    }

    #[test]
    fn v3_metadata_element_order_matches_fixed_sequence() {
        let xml = render(FormatVersion::V3, &sample_metadata(), None, &[], &[]);
        let identifier_pos = xml.find("<dc:identifier").unwrap();
        let title_pos = xml.find("<dc:title").unwrap();
        let creator_pos = xml.find("<dc:creator").unwrap();
        let language_pos = xml.find("<dc:language").unwrap();
        let date_pos = xml.find("<dc:date").unwrap();
        let modified_pos = xml.find("dcterms:modified").unwrap();
        assert!(identifier_pos < title_pos);
        assert!(title_pos < creator_pos);
        assert!(creator_pos < language_pos);
        assert!(language_pos < date_pos);
        assert!(date_pos < modified_pos);
    }

    #[test]
    fn v2_emits_cover_meta_not_dcterms_modified() {
        let metadata = sample_metadata();
        let xml = render(FormatVersion::V2, &metadata, Some("cover-img"), &[], &[]);
        assert!(xml.contains(r#"<meta name="cover" content="cover-img"/>"#));
        assert!(!xml.contains("dcterms:modified"));
    }

    #[test]
    fn spine_linear_no_round_trips() {
        let spine = vec![SpineItem {
            idref: "ch2".into(),
            linear: false,
        }];
        let xml = render(FormatVersion::V3, &sample_metadata(), None, &[], &spine);
        let parsed = parse(&xml).unwrap();
        assert!(!parsed.spine[0].linear);
    }
}
