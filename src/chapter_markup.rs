//! Per-chapter XHTML: emission and extraction of a single chapter's markup
//! document. Grounded in the teacher's `epub::writer`/`epub::reader` body
//! handling, generalized from the teacher's flat chapter list to
//! version-dependent wrappers (`<section epub:type="chapter">` for v3,
//! `<div>` for v2) and the configurable title-extraction order spec §4.6
//! describes.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::model::{FormatVersion, TitleSource};
use crate::xml_util::escape;

/// Render a single chapter document.
pub fn render(
    version: FormatVersion,
    chapter_id: &str,
    title: &str,
    heading_level: u8,
    content: &str,
    stylesheet_hrefs: &[String],
) -> String {
    match version {
        FormatVersion::V3 => render_v3(chapter_id, title, heading_level, content, stylesheet_hrefs),
        FormatVersion::V2 => render_v2(chapter_id, title, heading_level, content, stylesheet_hrefs),
    }
}

fn render_v3(
    chapter_id: &str,
    title: &str,
    heading_level: u8,
    content: &str,
    stylesheet_hrefs: &[String],
) -> String {
    let mut html = String::new();
    html.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    html.push_str("<!DOCTYPE html>\n");
    html.push_str(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\">\n",
    );
    html.push_str("<head>\n");
    html.push_str(&format!("<title>{}</title>\n", escape(title)));
    for href in stylesheet_hrefs {
        html.push_str(&format!(
            "<link rel=\"stylesheet\" type=\"text/css\" href=\"{}\"/>\n",
            escape(href)
        ));
    }
    html.push_str("</head>\n");
    html.push_str("<body>\n");
    html.push_str(&format!(
        "<section id=\"{}\" epub:type=\"chapter\">\n",
        escape(chapter_id)
    ));
    html.push_str(&format!("<h{heading_level}>{}</h{heading_level}>\n", escape(title)));
    html.push_str(content);
    html.push('\n');
    html.push_str("</section>\n");
    html.push_str("</body>\n</html>\n");
    html
}

fn render_v2(
    chapter_id: &str,
    title: &str,
    heading_level: u8,
    content: &str,
    stylesheet_hrefs: &[String],
) -> String {
    let mut html = String::new();
    html.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    html.push_str(
        "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.1//EN\" \"http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd\">\n",
    );
    html.push_str("<html xmlns=\"http://www.w3.org/1999/xhtml\">\n");
    html.push_str("<head>\n");
    html.push_str(&format!("<title>{}</title>\n", escape(title)));
    for href in stylesheet_hrefs {
        html.push_str(&format!(
            "<link rel=\"stylesheet\" type=\"text/css\" href=\"{}\"/>\n",
            escape(href)
        ));
    }
    html.push_str("</head>\n");
    html.push_str("<body>\n");
    html.push_str(&format!("<div id=\"{}\">\n", escape(chapter_id)));
    html.push_str(&format!("<h{heading_level}>{}</h{heading_level}>\n", escape(title)));
    html.push_str(content);
    html.push('\n');
    html.push_str("</div>\n");
    html.push_str("</body>\n</html>\n");
    html
}

/// Everything extracted from a parsed chapter document before titles are
/// resolved against `options.title_extraction` (the nav label, which the
/// orchestrator alone knows, is folded in by the caller).
#[derive(Debug, Clone, Default)]
pub struct ExtractedChapter {
    pub head_title: Option<String>,
    pub first_h1: Option<String>,
    pub first_h2: Option<String>,
    pub heading_level: u8,
    pub body: String,
}

/// Extract body content and title candidates from a chapter document.
/// Strips the wrapping `<section>`/`<div>` and its leading heading.
pub fn extract(xhtml: &str) -> ExtractedChapter {
    let mut reader = Reader::from_str(xhtml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut extracted = ExtractedChapter {
        heading_level: 1,
        ..Default::default()
    };

    let mut in_head = false;
    let mut in_title = false;
    let mut in_body = false;
    let mut wrapper_depth: i32 = -1;
    let mut depth: i32 = 0;
    let mut heading_tag: Option<String> = None;
    let mut heading_text = String::new();
    let mut body_text = String::new();
    let mut skipping_heading = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                depth += 1;
                if local == "head" {
                    in_head = true;
                } else if local == "title" && in_head {
                    in_title = true;
                } else if local == "body" {
                    in_body = true;
                } else if in_body && wrapper_depth < 0 && (local == "section" || local == "div") {
                    wrapper_depth = depth;
                } else if in_body
                    && wrapper_depth >= 0
                    && depth == wrapper_depth + 1
                    && heading_tag.is_none()
                    && local.len() == 2
                    && local.starts_with('h')
                    && local.as_bytes()[1].is_ascii_digit()
                {
                    heading_tag = Some(local.clone());
                    heading_text.clear();
                    skipping_heading = true;
                    if let Some(n) = local.as_bytes().get(1) {
                        extracted.heading_level = n - b'0';
                    }
                } else if in_body && wrapper_depth >= 0 && !skipping_heading {
                    body_text.push_str(&render_open_tag(e));
                }
            }
            Ok(Event::Empty(ref e)) => {
                if in_body && wrapper_depth >= 0 && !skipping_heading {
                    body_text.push_str(&render_empty_tag(e));
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default();
                if in_title {
                    extracted.head_title.get_or_insert_with(String::new).push_str(&text);
                } else if skipping_heading {
                    heading_text.push_str(&text);
                } else if in_body && wrapper_depth >= 0 {
                    body_text.push_str(&escape(&text));
                }
            }
            Ok(Event::End(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if local == "head" {
                    in_head = false;
                } else if local == "title" {
                    in_title = false;
                } else if local == "body" {
                    in_body = false;
                } else if Some(&local) == heading_tag.as_ref() && skipping_heading {
                    let text = heading_text.trim().to_string();
                    if extracted.heading_level == 1 {
                        extracted.first_h1 = Some(text);
                    } else if extracted.heading_level == 2 {
                        extracted.first_h2 = Some(text);
                    }
                    heading_tag = None;
                    skipping_heading = false;
                } else if wrapper_depth >= 0 && depth == wrapper_depth {
                    wrapper_depth = -1;
                } else if in_body && wrapper_depth >= 0 && !skipping_heading {
                    body_text.push_str(&format!("</{local}>"));
                }
                depth -= 1;
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    extracted.body = body_text.trim().to_string();
    extracted
}

fn render_open_tag(e: &quick_xml::events::BytesStart) -> String {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
    let mut tag = format!("<{name}");
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref());
        let value = String::from_utf8_lossy(&attr.value);
        tag.push_str(&format!(" {key}=\"{value}\""));
    }
    tag.push('>');
    tag
}

fn render_empty_tag(e: &quick_xml::events::BytesStart) -> String {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
    let mut tag = format!("<{name}");
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref());
        let value = String::from_utf8_lossy(&attr.value);
        tag.push_str(&format!(" {key}=\"{value}\""));
    }
    tag.push_str("/>");
    tag
}

/// Pick a title from the extracted candidates plus an externally supplied
/// navigation label, in the order `options.title_extraction` names.
pub fn resolve_title(
    extracted: &ExtractedChapter,
    nav_label: Option<&str>,
    title_extraction: &[TitleSource],
    ignore_head_title: bool,
    fallback_counter: u32,
) -> String {
    for source in title_extraction {
        let candidate = match source {
            TitleSource::Head if !ignore_head_title => extracted.head_title.as_deref(),
            TitleSource::Head => None,
            TitleSource::Content => extracted
                .first_h1
                .as_deref()
                .or(extracted.first_h2.as_deref()),
            TitleSource::Nav => nav_label,
        };
        if let Some(candidate) = candidate {
            let trimmed = candidate.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    format!("Chapter {fallback_counter}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_v3_with_section_wrapper() {
        let xhtml = render(
            FormatVersion::V3,
            "chapter-1",
            "Chapter One",
            1,
            "<p>Hello</p>",
            &["../css/styles.css".to_string()],
        );
        assert!(xhtml.contains(r#"<section id="chapter-1" epub:type="chapter">"#));
        assert!(xhtml.contains("<h1>Chapter One</h1>"));
        assert!(xhtml.contains(r#"<link rel="stylesheet""#));
    }

    #[test]
    fn renders_v2_with_div_wrapper() {
        let xhtml = render(FormatVersion::V2, "chapter-1", "Chapter One", 2, "<p>Hi</p>", &[]);
        assert!(xhtml.contains(r#"<div id="chapter-1">"#));
        assert!(xhtml.contains("<h2>Chapter One</h2>"));
    }

    #[test]
    fn extract_strips_wrapper_and_heading() {
        let xhtml = render(
            FormatVersion::V3,
            "chapter-1",
            "Chapter One",
            1,
            "<p>Body text.</p>",
            &[],
        );
        let extracted = extract(&xhtml);
        assert_eq!(extracted.head_title.as_deref(), Some("Chapter One"));
        assert_eq!(extracted.first_h1.as_deref(), Some("Chapter One"));
        assert!(extracted.body.contains("Body text."));
        assert!(!extracted.body.contains("<h1>"));
        assert!(!extracted.body.contains("<section"));
    }

    #[test]
    fn resolve_title_falls_back_to_counter() {
        let extracted = ExtractedChapter::default();
        let title = resolve_title(
            &extracted,
            None,
            &[TitleSource::Head, TitleSource::Content, TitleSource::Nav],
            false,
            7,
        );
        assert_eq!(title, "Chapter 7");
    }

    #[test]
    fn resolve_title_prefers_nav_over_missing_head() {
        let extracted = ExtractedChapter::default();
        let title = resolve_title(
            &extracted,
            Some("From Nav"),
            &[TitleSource::Head, TitleSource::Content, TitleSource::Nav],
            false,
            1,
        );
        assert_eq!(title, "From Nav");
    }

    #[test]
    fn resolve_title_skips_head_when_ignored() {
        let mut extracted = ExtractedChapter::default();
        extracted.head_title = Some("Ignored".into());
        extracted.first_h1 = Some("From Content".into());
        let title = resolve_title(
            &extracted,
            None,
            &[TitleSource::Head, TitleSource::Content, TitleSource::Nav],
            true,
            1,
        );
        assert_eq!(title, "From Content");
    }
}
