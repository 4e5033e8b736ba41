//! EPUB 2 `toc.ncx` document. Grounded in the teacher's
//! `epub::navigation::parse_ncx` (parse side) and
//! `epub::writer::{generate_toc_ncx, write_ncx_points}` (render side),
//! extended with `dtb:depth`/`docAuthor`/page-count meta the teacher
//! omitted.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{EpubError, Result};
use crate::navigation::NavPoint;
use crate::xml_util::escape;

pub fn parse(xml: &str) -> Result<Vec<NavPoint>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut nav_points = Vec::new();
    let mut stack: Vec<NavPoint> = Vec::new();
    let mut in_text = false;
    let mut current_label = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if local == "navPoint" {
                    stack.push(NavPoint::default());
                } else if local == "text" {
                    in_text = true;
                    current_label.clear();
                }
            }
            Ok(Event::Empty(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if local == "content"
                    && let Some(current) = stack.last_mut()
                {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"src" {
                            current.href = String::from_utf8_lossy(&attr.value).into_owned();
                        }
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_text {
                    current_label.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if local == "text" {
                    in_text = false;
                    if let Some(current) = stack.last_mut() {
                        current.label = current_label.trim().to_string();
                    }
                } else if local == "navPoint" {
                    let point = stack.pop().unwrap();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(point);
                    } else {
                        nav_points.push(point);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(EpubError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(nav_points)
}

fn max_depth(points: &[NavPoint]) -> usize {
    points
        .iter()
        .map(|p| 1 + max_depth(&p.children))
        .max()
        .unwrap_or(0)
}

/// Render a complete `toc.ncx` document.
pub fn render(title: &str, author: &str, identifier: &str, points: &[NavPoint]) -> String {
    let mut ncx = String::new();
    ncx.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    ncx.push_str("<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n");
    ncx.push_str("<head>\n");
    ncx.push_str(&format!(
        "  <meta name=\"dtb:uid\" content=\"{}\"/>\n",
        escape(identifier)
    ));
    ncx.push_str(&format!(
        "  <meta name=\"dtb:depth\" content=\"{}\"/>\n",
        max_depth(points).max(1)
    ));
    ncx.push_str("  <meta name=\"dtb:totalPageCount\" content=\"0\"/>\n");
    ncx.push_str("  <meta name=\"dtb:maxPageNumber\" content=\"0\"/>\n");
    ncx.push_str("</head>\n");
    ncx.push_str(&format!("<docTitle><text>{}</text></docTitle>\n", escape(title)));
    ncx.push_str(&format!(
        "<docAuthor><text>{}</text></docAuthor>\n",
        escape(author)
    ));
    ncx.push_str("<navMap>\n");
    let mut counter = 1usize;
    write_points(&mut ncx, points, &mut counter);
    ncx.push_str("</navMap>\n");
    ncx.push_str("</ncx>\n");
    ncx
}

fn write_points(ncx: &mut String, points: &[NavPoint], counter: &mut usize) {
    for point in points {
        let id = *counter;
        *counter += 1;
        ncx.push_str(&format!("<navPoint id=\"navpoint-{id}\" playOrder=\"{id}\">\n"));
        ncx.push_str(&format!(
            "  <navLabel><text>{}</text></navLabel>\n",
            escape(&point.label)
        ));
        ncx.push_str(&format!("  <content src=\"{}\"/>\n", escape(&point.href)));
        write_points(ncx, &point.children, counter);
        ncx.push_str("</navPoint>\n");
    }
}
