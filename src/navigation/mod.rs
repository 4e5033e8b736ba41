//! Table-of-contents tree shared by both navigation document formats, plus
//! the glue that builds it from (or applies it back onto) a chapter tree.
//! Grounded in the teacher's `epub::navigation`, which represents both the
//! v3 nav and the v2 NCX with the same `NavPoint` shape.

pub mod nav_xhtml;
pub mod ncx;

use crate::model::{ChapterId, Publication};

/// One entry in a table of contents: a label, the href it points at, and
/// nested entries beneath it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NavPoint {
    pub label: String,
    pub href: String,
    pub children: Vec<NavPoint>,
}

/// Build the navigation tree from the publication's chapter hierarchy,
/// following `root_chapter_ids`/`children` order rather than
/// `chapter_order_hint` so the reading order matches the document tree
/// (spec §4.4).
pub fn build_nav_tree(publication: &Publication) -> Vec<NavPoint> {
    build_subtree(publication, &publication.root_chapter_ids)
}

fn build_subtree(publication: &Publication, ids: &[ChapterId]) -> Vec<NavPoint> {
    let mut points: Vec<(u32, NavPoint)> = ids
        .iter()
        .filter_map(|id| publication.get_chapter(id))
        .map(|chapter| {
            (
                chapter.order,
                NavPoint {
                    label: chapter.title.clone(),
                    href: chapter.filename.clone(),
                    children: build_subtree(publication, &chapter.children),
                },
            )
        })
        .collect();
    points.sort_by_key(|(order, _)| *order);
    points.into_iter().map(|(_, point)| point).collect()
}

/// Flatten a nav tree into a `(chapter title candidate, href)` list in
/// document order, used by the deserializer to recover titles when an
/// XHTML chapter has none of its own (spec §4.6 `TitleSource::Nav`).
pub fn flatten(points: &[NavPoint]) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    flatten_into(points, &mut out);
    out
}

fn flatten_into<'a>(points: &'a [NavPoint], out: &mut Vec<(&'a str, &'a str)>) {
    for point in points {
        out.push((point.label.as_str(), point.href.as_str()));
        flatten_into(&point.children, out);
    }
}
