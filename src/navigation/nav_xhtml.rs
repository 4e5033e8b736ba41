//! EPUB 3 `nav.xhtml` document: the XHTML `<nav epub:type="toc">` tree.
//! Grounded in the teacher's `epub::navigation::parse_nav_xhtml` (parse
//! side) and `epub::writer::{generate_toc_xhtml, write_nav_ol}` (render
//! side).

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{EpubError, Result};
use crate::navigation::NavPoint;
use crate::xml_util::escape;

/// Parse the `<nav epub:type="toc">` list out of an XHTML document.
pub fn parse(xhtml: &str) -> Result<Vec<NavPoint>> {
    let mut reader = Reader::from_str(xhtml);
    let mut buf = Vec::new();
    let mut in_nav_toc = false;
    let mut stack: Vec<Vec<NavPoint>> = vec![Vec::new()];
    let mut current_href = String::new();
    let mut current_label = String::new();
    let mut in_a = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if local == "nav" {
                    for attr in e.attributes().flatten() {
                        let key = String::from_utf8_lossy(attr.key.as_ref());
                        if key.ends_with("type") && String::from_utf8_lossy(&attr.value) == "toc" {
                            in_nav_toc = true;
                        }
                    }
                } else if in_nav_toc {
                    if local == "ol" {
                        stack.push(Vec::new());
                    } else if local == "a" {
                        in_a = true;
                        current_label.clear();
                        current_href.clear();
                        for attr in e.attributes().flatten() {
                            if attr.key.as_ref() == b"href" {
                                current_href = String::from_utf8_lossy(&attr.value).into_owned();
                            }
                        }
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_a && in_nav_toc {
                    current_label.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if local == "nav" && in_nav_toc {
                    in_nav_toc = false;
                } else if in_nav_toc {
                    if local == "a" {
                        in_a = false;
                        if let Some(current) = stack.last_mut() {
                            current.push(NavPoint {
                                label: current_label.trim().to_string(),
                                href: current_href.clone(),
                                children: Vec::new(),
                            });
                        }
                    } else if local == "ol" {
                        let children = stack.pop().unwrap_or_default();
                        if let Some(parent_list) = stack.last_mut() {
                            if let Some(parent) = parent_list.last_mut() {
                                parent.children = children;
                            } else {
                                parent_list.extend(children);
                            }
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(EpubError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(stack.into_iter().next().unwrap_or_default())
}

/// Render a complete `nav.xhtml` document.
pub fn render(title: &str, points: &[NavPoint]) -> String {
    let mut html = String::new();
    html.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    html.push_str("<!DOCTYPE html>\n");
    html.push_str(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\">\n",
    );
    html.push_str("<head><title>");
    html.push_str(&escape(title));
    html.push_str("</title></head>\n");
    html.push_str("<body>\n");
    html.push_str("<nav epub:type=\"toc\">\n");
    html.push_str("<h1>Table of Contents</h1>\n");
    write_ol(&mut html, points);
    html.push_str("</nav>\n");
    html.push_str("</body>\n</html>\n");
    html
}

fn write_ol(html: &mut String, points: &[NavPoint]) {
    if points.is_empty() {
        return;
    }
    html.push_str("<ol>\n");
    for point in points {
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a>",
            escape(&point.href),
            escape(&point.label)
        ));
        if !point.children.is_empty() {
            html.push('\n');
            write_ol(html, &point.children);
        }
        html.push_str("</li>\n");
    }
    html.push_str("</ol>\n");
}
