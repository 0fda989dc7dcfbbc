//! Story aggregate - Metadata, characters and pages of one storybook
//!
//! Every operation takes the current story by reference and returns a new
//! value; the input is never modified. Pages are kept sorted by page number
//! after every operation, and every content change stamps `modified_at`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::{Character, Page, PageUpdate};
use crate::domain::errors::DomainError;
use crate::domain::value_objects::{IllustrationStyle, TargetAge};

/// Descriptive data about a story project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryMetadata {
    pub title: String,
    pub author: String,
    pub target_age: TargetAge,
    pub style: IllustrationStyle,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

/// Metadata field replacements for [`Story::with_metadata`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub target_age: Option<TargetAge>,
    pub style: Option<IllustrationStyle>,
}

impl StoryMetadata {
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        target_age: TargetAge,
        style: IllustrationStyle,
    ) -> Self {
        let now = Utc::now();
        Self {
            title: title.into(),
            author: author.into(),
            target_age,
            style,
            created_at: now,
            modified_at: now,
        }
    }

    /// Rebuild metadata with known timestamps
    ///
    /// A `modified_at` earlier than `created_at` is raised to `created_at`.
    pub fn with_timestamps(
        mut self,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> Self {
        self.created_at = created_at;
        self.modified_at = modified_at.max(created_at);
        self
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    /// Copy with `modified_at` advanced to now
    pub fn touched(&self) -> Self {
        let mut metadata = self.clone();
        metadata.modified_at = Utc::now().max(self.modified_at).max(self.created_at);
        metadata
    }

    /// Copy with the given fields replaced and `modified_at` advanced
    pub fn with_updates(&self, update: &MetadataUpdate) -> Self {
        let mut metadata = self.touched();
        if let Some(title) = &update.title {
            metadata.title = title.clone();
        }
        if let Some(author) = &update.author {
            metadata.author = author.clone();
        }
        if let Some(target_age) = update.target_age {
            metadata.target_age = target_age;
        }
        if let Some(style) = update.style {
            metadata.style = style;
        }
        metadata
    }
}

/// A complete storybook project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    metadata: StoryMetadata,
    characters: Vec<Character>,
    pages: Vec<Page>,
    project_path: Option<PathBuf>,
}

impl Story {
    /// Empty story with only metadata
    pub fn new(metadata: StoryMetadata) -> Self {
        Self {
            metadata,
            characters: Vec::new(),
            pages: Vec::new(),
            project_path: None,
        }
    }

    /// Assemble a story from stored parts, restoring page order
    pub fn from_parts(
        metadata: StoryMetadata,
        characters: Vec<Character>,
        mut pages: Vec<Page>,
        project_path: Option<PathBuf>,
    ) -> Self {
        pages.sort_by_key(|p| p.page_number);
        Self {
            metadata,
            characters,
            pages,
            project_path,
        }
    }

    pub fn metadata(&self) -> &StoryMetadata {
        &self.metadata
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Directory the story is saved in, `None` while unsaved
    pub fn project_path(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// First page with the given number
    pub fn get_page(&self, page_number: u32) -> Option<&Page> {
        self.pages.iter().find(|p| p.page_number == page_number)
    }

    /// First character whose name matches, ignoring case
    pub fn get_character(&self, name: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.matches_name(name))
    }

    /// Copy with metadata fields replaced
    pub fn with_metadata(&self, update: &MetadataUpdate) -> Story {
        Story {
            metadata: self.metadata.with_updates(update),
            ..self.clone()
        }
    }

    /// Copy with `modified_at` advanced and nothing else changed
    pub fn touched(&self) -> Story {
        Story {
            metadata: self.metadata.touched(),
            ..self.clone()
        }
    }

    pub fn with_project_path(&self, path: impl Into<PathBuf>) -> Story {
        Story {
            project_path: Some(path.into()),
            ..self.clone()
        }
    }

    /// Copy with the character appended
    ///
    /// Duplicate names are allowed; lookups return the first match.
    pub fn add_character(&self, character: Character) -> Story {
        let mut characters = self.characters.clone();
        characters.push(character);
        self.replace(characters, self.pages.clone())
    }

    /// Copy without any character whose name matches, ignoring case
    pub fn remove_character(&self, name: &str) -> Story {
        let characters = self
            .characters
            .iter()
            .filter(|c| !c.matches_name(name))
            .cloned()
            .collect();
        self.replace(characters, self.pages.clone())
    }

    /// Copy with the page inserted in page-number order
    ///
    /// Duplicate page numbers are kept, in insertion order.
    pub fn add_page(&self, page: Page) -> Story {
        let mut pages = self.pages.clone();
        pages.push(page);
        pages.sort_by_key(|p| p.page_number);
        self.replace(self.characters.clone(), pages)
    }

    /// Copy with every page numbered `page_number` updated
    ///
    /// Fails with `NotFound` when no page has that number.
    pub fn update_page(
        &self,
        page_number: u32,
        update: &PageUpdate,
    ) -> Result<Story, DomainError> {
        if self.get_page(page_number).is_none() {
            return Err(DomainError::not_found(format!(
                "Page {} not found in story",
                page_number
            )));
        }

        let pages = self
            .pages
            .iter()
            .map(|p| {
                if p.page_number == page_number {
                    p.with_updates(update)
                } else {
                    p.clone()
                }
            })
            .collect();
        Ok(self.replace(self.characters.clone(), pages))
    }

    /// Copy without pages numbered `page_number`; the rest keep their numbers
    pub fn remove_page(&self, page_number: u32) -> Story {
        let pages = self
            .pages
            .iter()
            .filter(|p| p.page_number != page_number)
            .cloned()
            .collect();
        self.replace(self.characters.clone(), pages)
    }

    /// Copy with pages numbered 1..=N in their current order
    pub fn renumber_pages(&self) -> Story {
        let pages = self
            .pages
            .iter()
            .zip(1u32..)
            .map(|(p, number)| p.clone().with_page_number(number))
            .collect();
        self.replace(self.characters.clone(), pages)
    }

    fn replace(&self, characters: Vec<Character>, pages: Vec<Page>) -> Story {
        Story {
            metadata: self.metadata.touched(),
            characters,
            pages,
            project_path: self.project_path.clone(),
        }
    }
}

/// Create an empty story
pub fn create_story(
    title: impl Into<String>,
    author: impl Into<String>,
    target_age: TargetAge,
    style: IllustrationStyle,
) -> Story {
    Story::new(StoryMetadata::new(title, author, target_age, style))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{create_character, create_page};

    fn sample_story() -> Story {
        create_story(
            "Luna's Adventure",
            "Test Author",
            TargetAge::EarlyReader,
            IllustrationStyle::Watercolor,
        )
        .add_character(create_character(
            "Luna",
            "A brave little mouse",
            Some(vec!["small brown mouse".to_string(), "red scarf".to_string()]),
        ))
        .add_page(create_page(1, "Luna lived in a cozy burrow.", "A cozy burrow"))
        .add_page(create_page(2, "One day, she found a map.", "A mouse holding a map"))
    }

    fn page_numbers(story: &Story) -> Vec<u32> {
        story.pages().iter().map(|p| p.page_number).collect()
    }

    #[test]
    fn test_create_story_is_empty() {
        let story = create_story("Empty", "", TargetAge::default(), IllustrationStyle::default());
        assert_eq!(story.title(), "Empty");
        assert_eq!(story.page_count(), 0);
        assert!(story.characters().is_empty());
        assert!(story.project_path().is_none());
        assert_eq!(story.metadata().created_at(), story.metadata().modified_at());
    }

    #[test]
    fn test_get_page_and_character() {
        let story = sample_story();
        assert_eq!(story.get_page(2).map(|p| p.text.as_str()), Some("One day, she found a map."));
        assert!(story.get_page(99).is_none());
        assert!(story.get_character("luna").is_some());
        assert!(story.get_character("Max").is_none());
    }

    #[test]
    fn test_add_page_keeps_pages_sorted() {
        let mut story =
            create_story("Order", "", TargetAge::default(), IllustrationStyle::default());
        for number in [5, 1, 3, 2, 4, 3] {
            story = story.add_page(Page::new(number, format!("page {}", number)));
            let numbers = page_numbers(&story);
            let mut sorted = numbers.clone();
            sorted.sort();
            assert_eq!(numbers, sorted);
        }
        assert_eq!(page_numbers(&story), vec![1, 2, 3, 3, 4, 5]);
    }

    #[test]
    fn test_duplicate_page_numbers_keep_insertion_order() {
        let story = create_story("Dupes", "", TargetAge::default(), IllustrationStyle::default())
            .add_page(Page::new(1, "first"))
            .add_page(Page::new(1, "second"));
        assert_eq!(story.pages()[0].text, "first");
        assert_eq!(story.pages()[1].text, "second");
        assert_eq!(story.get_page(1).map(|p| p.text.as_str()), Some("first"));
    }

    #[test]
    fn test_update_page() {
        let story = sample_story();
        let updated = story
            .update_page(1, &PageUpdate::text("Luna woke up early."))
            .expect("page exists");

        assert_eq!(updated.get_page(1).unwrap().text, "Luna woke up early.");
        assert_eq!(updated.get_page(1).unwrap().illustration_prompt, "A cozy burrow");
        assert_eq!(story.get_page(1).unwrap().text, "Luna lived in a cozy burrow.");
        assert!(updated.metadata().modified_at() >= story.metadata().modified_at());
    }

    #[test]
    fn test_update_missing_page_fails_without_change() {
        let story = sample_story();
        let before = story.clone();
        let err = story.update_page(42, &PageUpdate::text("nope")).unwrap_err();

        assert!(matches!(err, DomainError::NotFound(_)));
        assert_eq!(story, before);
    }

    #[test]
    fn test_remove_page_does_not_renumber() {
        let story = sample_story().add_page(Page::new(3, "The end."));
        let removed = story.remove_page(2);
        assert_eq!(page_numbers(&removed), vec![1, 3]);
    }

    #[test]
    fn test_renumber_pages() {
        let story = sample_story()
            .add_page(Page::new(7, "Later"))
            .remove_page(2);
        let renumbered = story.renumber_pages();
        assert_eq!(page_numbers(&renumbered), vec![1, 2]);
        assert_eq!(renumbered.pages()[1].text, "Later");
    }

    #[test]
    fn test_add_and_remove_character_case_insensitive() {
        let story = sample_story().add_character(create_character("Max", "A dog", None));
        assert_eq!(story.characters().len(), 2);

        let removed = story.remove_character("LUNA");
        assert_eq!(removed.characters().len(), 1);
        assert_eq!(removed.characters()[0].name, "Max");
    }

    #[test]
    fn test_remove_absent_character_still_stamps() {
        let story = sample_story();
        let same = story.remove_character("Nobody");
        assert_eq!(same.characters(), story.characters());
        assert!(same.metadata().modified_at() >= story.metadata().modified_at());
    }

    #[test]
    fn test_with_metadata_updates_fields() {
        let story = sample_story();
        let updated = story.with_metadata(&MetadataUpdate {
            title: Some("Luna's Big Day".to_string()),
            style: Some(IllustrationStyle::Cartoon),
            ..MetadataUpdate::default()
        });
        assert_eq!(updated.title(), "Luna's Big Day");
        assert_eq!(updated.metadata().style, IllustrationStyle::Cartoon);
        assert_eq!(updated.metadata().author, "Test Author");
        assert_eq!(updated.metadata().created_at(), story.metadata().created_at());
    }

    #[test]
    fn test_modified_never_precedes_created() {
        let created = Utc::now();
        let earlier = created - chrono::Duration::days(1);
        let metadata =
            StoryMetadata::new("T", "", TargetAge::default(), IllustrationStyle::default())
                .with_timestamps(created, earlier);
        assert_eq!(metadata.modified_at(), created);
    }

    #[test]
    fn test_with_project_path() {
        let story = sample_story().with_project_path("/stories/luna");
        assert_eq!(story.project_path(), Some(Path::new("/stories/luna")));
    }
}
