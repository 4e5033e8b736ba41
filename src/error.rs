use thiserror::Error;

/// All failure modes the crate can surface.
///
/// Build-API errors are synchronous and surface immediately. Deserialization
/// errors carry a stage prefix describing which pipeline stage failed; the
/// library never exits the process or writes to stderr on its own.
#[derive(Error, Debug)]
pub enum EpubError {
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("unknown chapter: {0}")]
    UnknownChapter(String),

    #[error("unknown parent chapter: {0}")]
    UnknownParent(String),

    #[error("unknown image: {0}")]
    UnknownImage(String),

    #[error("unknown stylesheet: {0}")]
    UnknownStylesheet(String),

    #[error("invalid heading level: {0} (must be 1-6)")]
    InvalidHeadingLevel(u8),

    #[error("invalid or unrecognized image extension: {0}")]
    InvalidImageExtension(String),

    #[error("duplicate filename: {0}")]
    DuplicateFilename(String),

    #[error("malformed EPUB archive: {0}")]
    ArchiveMalformed(String),

    #[error("unsafe EPUB archive: {0}")]
    ArchiveUnsafe(String),

    #[error("validation failed: {}", .0.join("; "))]
    ValidationRejected(Vec<String>),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EpubError>;
