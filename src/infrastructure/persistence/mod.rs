//! Filesystem persistence adapters
//!
//! Stories are stored as pretty-printed JSON documents, one project
//! directory per story, through [`FileStoryRepository`].

mod document;
mod story_repository;

pub use document::{
    check_version, document_to_story, format_timestamp, parse_timestamp, slugify,
    story_to_document, CharacterDocument, MetadataDocument, PageDocument, StoryDocument,
    SCHEMA_VERSION,
};
pub use story_repository::{
    get_export_path, get_page_illustration_path, FileStoryRepository, MAX_SLUG_SUFFIX,
};
