//! Build API: the only way to mutate a `Publication` once constructed.
//!
//! Every method here is responsible for upholding the invariants listed on
//! `Publication` (spec §3): no dangling parents, no cycles, unique
//! filenames, non-empty required metadata. Grounded in the teacher's
//! `manipulate::chapter_manage`/`manipulate::asset_manage` modules, which
//! expose the same shape of operation (add/remove/reorder) against a parsed
//! book; generalized here to a freshly-built-or-parsed `Publication` and to
//! the hierarchical (not flat-spine) chapter model.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{EpubError, Result};
use crate::model::{
    Chapter, ChapterBody, ChapterId, DublinCoreMetadata, ExportOptions, Image, MetadataPatch,
    Publication, PublicationOptions, Stylesheet, DEFAULT_STYLESHEET_CONTENT,
};
use crate::util;
use crate::validate::ValidationReport;

/// Inputs for `Publication::add_chapter`.
#[derive(Debug, Clone, Default)]
pub struct NewChapter {
    pub title: String,
    pub content: Option<String>,
    pub parent_id: Option<ChapterId>,
    pub heading_level: Option<u8>,
    pub linear: Option<bool>,
}

/// Inputs for `Publication::add_image`.
#[derive(Debug, Clone)]
pub struct NewImage {
    pub filename: String,
    pub data: Vec<u8>,
    pub alt: Option<String>,
    pub is_cover: bool,
}

/// Inputs for `Publication::add_stylesheet`.
#[derive(Debug, Clone)]
pub struct NewStylesheet {
    pub filename: String,
    pub content: String,
}

impl Publication {
    /// Construct a fresh, empty publication.
    ///
    /// Fails with `InvalidMetadata` when title or creator is empty. Injects
    /// the default stylesheet when `options.add_default_stylesheet` is true.
    pub fn new(title: &str, creator: &str, options: PublicationOptions) -> Result<Self> {
        if title.trim().is_empty() {
            return Err(EpubError::InvalidMetadata("title is required".into()));
        }
        if creator.trim().is_empty() {
            return Err(EpubError::InvalidMetadata("creator is required".into()));
        }

        let mut pub_ = Publication {
            metadata: DublinCoreMetadata::with_defaults(title.to_string(), creator.to_string()),
            chapters: HashMap::new(),
            chapter_order_hint: Vec::new(),
            root_chapter_ids: Vec::new(),
            images: HashMap::new(),
            image_order_hint: Vec::new(),
            stylesheets: HashMap::new(),
            stylesheet_order_hint: Vec::new(),
            chapter_counter: 0,
            options,
        };

        if pub_.options.add_default_stylesheet {
            let id = pub_.add_stylesheet(NewStylesheet {
                filename: "styles.css".to_string(),
                content: DEFAULT_STYLESHEET_CONTENT.to_string(),
            })?;
            if let Some(sheet) = pub_.stylesheets.get_mut(&id) {
                sheet.is_default = true;
            }
        }

        Ok(pub_)
    }

    // ---- chapters ----------------------------------------------------

    /// Add a chapter. Mints a new opaque id and assigns
    /// `order = 1 + max(existing order)`.
    pub fn add_chapter(&mut self, new: NewChapter) -> Result<ChapterId> {
        if let Some(parent) = &new.parent_id
            && !self.chapters.contains_key(parent)
        {
            return Err(EpubError::UnknownParent(parent.clone()));
        }
        let heading_level = new.heading_level.unwrap_or(1);
        if !(1..=6).contains(&heading_level) {
            return Err(EpubError::InvalidHeadingLevel(heading_level));
        }

        let id = format!("chapter-{}", uuid::Uuid::new_v4());
        self.chapter_counter += 1;
        let filename = format!("text/chapter-{}.xhtml", self.chapter_counter);
        let order = self.chapters.values().map(|c| c.order).max().map_or(0, |m| m + 1);

        let chapter = Chapter {
            id: id.clone(),
            title: new.title,
            body: ChapterBody::Inline(new.content.unwrap_or_default()),
            filename,
            parent_id: new.parent_id.clone(),
            order,
            children: Vec::new(),
            heading_level,
            linear: new.linear.unwrap_or(true),
        };

        self.chapters.insert(id.clone(), chapter);
        self.chapter_order_hint.push(id.clone());
        match &new.parent_id {
            Some(parent) => {
                self.chapters.get_mut(parent).unwrap().children.push(id.clone());
            }
            None => self.root_chapter_ids.push(id.clone()),
        }

        Ok(id)
    }

    pub fn set_chapter_content(&mut self, id: &str, content: impl Into<String>) -> Result<()> {
        let chapter = self
            .chapters
            .get_mut(id)
            .ok_or_else(|| EpubError::UnknownChapter(id.to_string()))?;
        chapter.body = ChapterBody::Inline(content.into());
        Ok(())
    }

    pub fn append_to_chapter(&mut self, id: &str, content: &str) -> Result<()> {
        let chapter = self
            .chapters
            .get_mut(id)
            .ok_or_else(|| EpubError::UnknownChapter(id.to_string()))?;
        match &mut chapter.body {
            ChapterBody::Inline(existing) => existing.push_str(content),
            ChapterBody::FragmentOf { .. } => {
                chapter.body = ChapterBody::Inline(content.to_string());
            }
        }
        Ok(())
    }

    pub fn get_chapter(&self, id: &str) -> Option<&Chapter> {
        self.chapters.get(id)
    }

    pub fn get_root_chapters(&self) -> Vec<&Chapter> {
        self.root_chapter_ids
            .iter()
            .filter_map(|id| self.chapters.get(id))
            .collect()
    }

    pub fn get_children(&self, id: &str) -> Vec<&Chapter> {
        self.chapters
            .get(id)
            .map(|c| c.children.iter().filter_map(|cid| self.chapters.get(cid)).collect())
            .unwrap_or_default()
    }

    /// All chapters in build order (insertion order, not tree order).
    pub fn get_all_chapters(&self) -> Vec<&Chapter> {
        self.chapter_order_hint
            .iter()
            .filter_map(|id| self.chapters.get(id))
            .collect()
    }

    /// Remove a chapter and its transitive descendants. Other chapters'
    /// `order` values are preserved even if holes appear.
    pub fn delete_chapter(&mut self, id: &str) -> Result<()> {
        if !self.chapters.contains_key(id) {
            return Err(EpubError::UnknownChapter(id.to_string()));
        }

        let mut to_remove = vec![id.to_string()];
        let mut frontier = vec![id.to_string()];
        while let Some(current) = frontier.pop() {
            if let Some(chapter) = self.chapters.get(&current) {
                for child in &chapter.children {
                    to_remove.push(child.clone());
                    frontier.push(child.clone());
                }
            }
        }

        let parent_id = self.chapters.get(id).and_then(|chapter| chapter.parent_id.clone());
        match parent_id {
            Some(parent) => {
                if let Some(parent_chapter) = self.chapters.get_mut(&parent) {
                    parent_chapter.children.retain(|c| c != id);
                }
            }
            None => self.root_chapter_ids.retain(|c| c != id),
        }

        for doomed in &to_remove {
            self.chapters.remove(doomed);
            self.chapter_order_hint.retain(|c| c != doomed);
        }

        Ok(())
    }

    /// Reassign a chapter's `order` without moving it in the parent tree.
    pub fn reorder_chapter(&mut self, id: &str, new_order: u32) -> Result<()> {
        let chapter = self
            .chapters
            .get_mut(id)
            .ok_or_else(|| EpubError::UnknownChapter(id.to_string()))?;
        chapter.order = new_order;
        Ok(())
    }

    // ---- images --------------------------------------------------------

    pub fn add_image(&mut self, new: NewImage) -> Result<String> {
        let ext = Path::new(&new.filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        if !util::is_addable_image_extension(ext) {
            return Err(EpubError::InvalidImageExtension(ext.to_string()));
        }
        let stem = Path::new(&new.filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("image");
        let sanitized = util::sanitize_filename_stem(stem);
        let filename = format!("images/{sanitized}.{}", ext.to_lowercase());

        if self.images.values().any(|i| i.filename == filename) {
            return Err(EpubError::DuplicateFilename(filename));
        }

        let id = format!("image-{}", uuid::Uuid::new_v4());
        let mime_type = util::mime_type_for_any_extension(ext).to_string();
        self.images.insert(
            id.clone(),
            Image {
                id: id.clone(),
                filename,
                data: new.data,
                mime_type,
                alt: new.alt,
                is_cover: new.is_cover,
            },
        );
        self.image_order_hint.push(id.clone());
        Ok(id)
    }

    pub fn remove_image(&mut self, id: &str) -> Result<()> {
        if self.images.remove(id).is_none() {
            return Err(EpubError::UnknownImage(id.to_string()));
        }
        self.image_order_hint.retain(|i| i != id);
        Ok(())
    }

    pub fn get_image(&self, id: &str) -> Option<&Image> {
        self.images.get(id)
    }

    pub fn get_all_images(&self) -> Vec<&Image> {
        self.image_order_hint.iter().filter_map(|id| self.images.get(id)).collect()
    }

    // ---- stylesheets -----------------------------------------------------

    pub fn add_stylesheet(&mut self, new: NewStylesheet) -> Result<String> {
        let stem = Path::new(&new.filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("style");
        let sanitized = util::sanitize_filename_stem(stem);
        let filename = format!("css/{sanitized}.css");

        if self.stylesheets.values().any(|s| s.filename == filename) {
            return Err(EpubError::DuplicateFilename(filename));
        }

        let id = format!("style-{}", uuid::Uuid::new_v4());
        self.stylesheets.insert(
            id.clone(),
            Stylesheet {
                id: id.clone(),
                filename,
                content: new.content,
                is_default: false,
            },
        );
        self.stylesheet_order_hint.push(id.clone());
        Ok(id)
    }

    pub fn remove_stylesheet(&mut self, id: &str) -> Result<()> {
        if self.stylesheets.remove(id).is_none() {
            return Err(EpubError::UnknownStylesheet(id.to_string()));
        }
        self.stylesheet_order_hint.retain(|s| s != id);
        Ok(())
    }

    pub fn get_stylesheet(&self, id: &str) -> Option<&Stylesheet> {
        self.stylesheets.get(id)
    }

    pub fn get_all_stylesheets(&self) -> Vec<&Stylesheet> {
        self.stylesheet_order_hint
            .iter()
            .filter_map(|id| self.stylesheets.get(id))
            .collect()
    }

    // ---- metadata --------------------------------------------------------

    /// Shallow-merge a partial metadata update into the existing metadata.
    pub fn set_metadata(&mut self, patch: MetadataPatch) {
        if let Some(title) = patch.title {
            self.metadata.title = title;
        }
        if let Some(creator) = patch.creator {
            self.metadata.creator = creator;
        }
        if let Some(language) = patch.language {
            self.metadata.language = language;
        }
        if let Some(identifier) = patch.identifier {
            self.metadata.identifier = identifier;
        }
        if let Some(date) = patch.date {
            self.metadata.date = date;
        }
        if patch.publisher.is_some() {
            self.metadata.publisher = patch.publisher;
        }
        if patch.description.is_some() {
            self.metadata.description = patch.description;
        }
        if let Some(subject) = patch.subject {
            self.metadata.subject = subject;
        }
        if patch.rights.is_some() {
            self.metadata.rights = patch.rights;
        }
        if let Some(contributor) = patch.contributor {
            self.metadata.contributor = contributor;
        }
        if patch.kind.is_some() {
            self.metadata.kind = patch.kind;
        }
        if patch.format.is_some() {
            self.metadata.format = patch.format;
        }
        if patch.source.is_some() {
            self.metadata.source = patch.source;
        }
        if patch.relation.is_some() {
            self.metadata.relation = patch.relation;
        }
        if patch.coverage.is_some() {
            self.metadata.coverage = patch.coverage;
        }
    }

    // ---- validation / export ---------------------------------------------

    pub fn validate(&self) -> ValidationReport {
        crate::validate::validate(self)
    }

    /// Serialize to archive bytes, optionally refusing on validation errors
    /// first (spec §7 `ValidationRejected`).
    pub fn export_to_bytes(&self, options: &ExportOptions) -> Result<Vec<u8>> {
        if options.validate {
            let report = self.validate();
            if !report.is_valid {
                return Err(EpubError::ValidationRejected(report.errors));
            }
        }
        crate::serialize::serialize(self, options)
    }

    /// Serialize to an archive on disk via a temp-file-then-rename swap, so
    /// a failed write never leaves a half-written EPUB at `path`.
    pub fn export_to_file(&self, path: &Path, options: &ExportOptions) -> Result<()> {
        if options.validate {
            let report = self.validate();
            if !report.is_valid {
                return Err(EpubError::ValidationRejected(report.errors));
            }
        }
        crate::serialize::serialize_to_file(self, options, path)
    }

    /// Parse an EPUB archive from an open file.
    pub fn open(path: &Path, options: PublicationOptions) -> Result<(Self, Vec<String>)> {
        let file = std::fs::File::open(path)?;
        let result = crate::deserialize::deserialize(file, options)?;
        Ok((result.publication, result.warnings))
    }

    /// Parse an EPUB archive already fully loaded into memory.
    pub fn from_bytes(bytes: Vec<u8>, options: PublicationOptions) -> Result<(Self, Vec<String>)> {
        let result = crate::deserialize::deserialize(std::io::Cursor::new(bytes), options)?;
        Ok((result.publication, result.warnings))
    }
}
