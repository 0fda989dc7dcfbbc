//! On-disk JSON document for a story
//!
//! Conversion between [`Story`] and [`StoryDocument`] is pure; the
//! repository does the file IO. Illustration paths are stored as bare file
//! names and re-rooted under `<project>/pages` on load, so a project
//! directory can be moved freely.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::ports::outbound::PersistenceError;
use crate::domain::entities::{Character, Page, Story, StoryMetadata};
use crate::domain::value_objects::{IllustrationStyle, TargetAge};

/// Schema version written into every document
pub const SCHEMA_VERSION: &str = "1.0";

/// Directory holding page illustrations inside a project
pub const PAGES_DIR: &str = "pages";
/// Directory holding exports inside a project
pub const EXPORTS_DIR: &str = "exports";
/// Story document file name inside a project
pub const STORY_FILE: &str = "story.json";

fn legacy_version() -> String {
    SCHEMA_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryDocument {
    /// Absent in documents written before versioning, read as 1.0
    #[serde(default = "legacy_version")]
    pub version: String,
    pub metadata: MetadataDocument,
    #[serde(default)]
    pub characters: Vec<CharacterDocument>,
    #[serde(default)]
    pub pages: Vec<PageDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub target_age: TargetAge,
    pub created_at: String,
    pub modified_at: String,
    #[serde(default)]
    pub style: IllustrationStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterDocument {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub visual_traits: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDocument {
    pub page_number: u32,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub illustration_prompt: String,
    /// File name only, relative to the project's pages directory
    #[serde(default)]
    pub illustration_path: Option<String>,
}

/// Just enough of a document to list it
#[derive(Debug, Deserialize)]
pub struct DocumentHeader {
    #[serde(default = "legacy_version")]
    pub version: String,
    pub metadata: MetadataDocument,
}

/// Filesystem-safe directory name derived from a title
///
/// Lower-cased, spaces become hyphens, anything outside `[a-z0-9-]` is
/// dropped, hyphen runs collapse and edge hyphens are trimmed. An empty
/// result becomes `untitled`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.trim().to_lowercase().chars() {
        let c = if c == ' ' { '-' } else { c };
        if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            continue;
        }
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }

    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug.to_string()
    }
}

pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339()
}

/// Parse an RFC 3339 timestamp, or a naive ISO-8601 one taken as UTC
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, PersistenceError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| PersistenceError::InvalidTimestamp(value.to_string()))
}

/// Accept any 1.x document; newer major versions are refused
pub fn check_version(version: &str) -> Result<(), PersistenceError> {
    let supported_major = SCHEMA_VERSION
        .split('.')
        .next()
        .and_then(|major| major.parse::<u32>().ok())
        .unwrap_or(1);

    let major = version
        .trim()
        .split('.')
        .next()
        .and_then(|major| major.parse::<u32>().ok());

    match major {
        Some(major) if major <= supported_major => Ok(()),
        _ => Err(PersistenceError::UnsupportedVersion {
            found: version.to_string(),
            supported: SCHEMA_VERSION.to_string(),
        }),
    }
}

impl From<&StoryMetadata> for MetadataDocument {
    fn from(metadata: &StoryMetadata) -> Self {
        Self {
            title: metadata.title.clone(),
            author: metadata.author.clone(),
            target_age: metadata.target_age,
            created_at: format_timestamp(metadata.created_at()),
            modified_at: format_timestamp(metadata.modified_at()),
            style: metadata.style,
        }
    }
}

impl TryFrom<&MetadataDocument> for StoryMetadata {
    type Error = PersistenceError;

    fn try_from(doc: &MetadataDocument) -> Result<Self, Self::Error> {
        let created_at = parse_timestamp(&doc.created_at)?;
        let modified_at = parse_timestamp(&doc.modified_at)?;
        Ok(
            StoryMetadata::new(doc.title.clone(), doc.author.clone(), doc.target_age, doc.style)
                .with_timestamps(created_at, modified_at),
        )
    }
}

impl From<&Character> for CharacterDocument {
    fn from(character: &Character) -> Self {
        Self {
            name: character.name.clone(),
            description: character.description.clone(),
            visual_traits: character.visual_traits.clone(),
        }
    }
}

impl From<CharacterDocument> for Character {
    fn from(doc: CharacterDocument) -> Self {
        Character::new(doc.name, doc.description).with_traits(doc.visual_traits)
    }
}

impl From<&Page> for PageDocument {
    fn from(page: &Page) -> Self {
        Self {
            page_number: page.page_number,
            text: page.text.clone(),
            illustration_prompt: page.illustration_prompt.clone(),
            illustration_path: page
                .illustration_path
                .as_ref()
                .and_then(|path| path.file_name())
                .map(|name| name.to_string_lossy().into_owned()),
        }
    }
}

fn page_from_document(doc: PageDocument, pages_dir: Option<&Path>) -> Page {
    let page =
        Page::new(doc.page_number, doc.text).with_illustration_prompt(doc.illustration_prompt);
    match (doc.illustration_path.filter(|name| !name.is_empty()), pages_dir) {
        (Some(name), Some(dir)) => page.with_illustration_path(dir.join(name)),
        _ => page,
    }
}

pub fn story_to_document(story: &Story) -> StoryDocument {
    StoryDocument {
        version: SCHEMA_VERSION.to_string(),
        metadata: story.metadata().into(),
        characters: story.characters().iter().map(CharacterDocument::from).collect(),
        pages: story.pages().iter().map(PageDocument::from).collect(),
    }
}

/// Rebuild a story, resolving illustrations under `<project_path>/pages`
///
/// Without a project path, stored illustration names are dropped.
pub fn document_to_story(
    doc: StoryDocument,
    project_path: Option<&Path>,
) -> Result<Story, PersistenceError> {
    check_version(&doc.version)?;

    let metadata = StoryMetadata::try_from(&doc.metadata)?;
    let pages_dir = project_path.map(|path| path.join(PAGES_DIR));

    let characters = doc.characters.into_iter().map(Character::from).collect();
    let pages = doc
        .pages
        .into_iter()
        .map(|page| page_from_document(page, pages_dir.as_deref()))
        .collect();

    Ok(Story::from_parts(
        metadata,
        characters,
        pages,
        project_path.map(Path::to_path_buf),
    ))
}
