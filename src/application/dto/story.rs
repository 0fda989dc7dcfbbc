use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::application::ports::outbound::StorySummary;
use crate::domain::entities::{Character, MetadataUpdate, Page, PageUpdate, Story, StoryMetadata};
use crate::application::services::GeneratorState;
use crate::domain::value_objects::{IllustrationStyle, ImageConfig, TargetAge};

fn slug_of(path: &Path) -> Option<String> {
    path.file_name().map(|name| name.to_string_lossy().into_owned())
}

// ============================================================================
// Response DTOs
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MetadataResponseDto {
    pub title: String,
    pub author: String,
    pub target_age: TargetAge,
    pub style: IllustrationStyle,
    pub created_at: String,
    pub modified_at: String,
}

impl From<&StoryMetadata> for MetadataResponseDto {
    fn from(metadata: &StoryMetadata) -> Self {
        Self {
            title: metadata.title.clone(),
            author: metadata.author.clone(),
            target_age: metadata.target_age,
            style: metadata.style,
            created_at: metadata.created_at().to_rfc3339(),
            modified_at: metadata.modified_at().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterDto {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub visual_traits: Vec<String>,
}

impl From<&Character> for CharacterDto {
    fn from(character: &Character) -> Self {
        Self {
            name: character.name.clone(),
            description: character.description.clone(),
            visual_traits: character.visual_traits.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageResponseDto {
    pub page_number: u32,
    pub text: String,
    pub illustration_prompt: String,
    pub illustration_path: Option<String>,
    pub has_illustration: bool,
}

impl From<&Page> for PageResponseDto {
    fn from(page: &Page) -> Self {
        Self {
            page_number: page.page_number,
            text: page.text.clone(),
            illustration_prompt: page.illustration_prompt.clone(),
            illustration_path: page
                .illustration_path
                .as_ref()
                .map(|p| p.display().to_string()),
            has_illustration: page.has_illustration(),
        }
    }
}

/// Full story as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct StoryResponseDto {
    /// Directory name of the saved project, `None` while unsaved
    pub slug: Option<String>,
    pub metadata: MetadataResponseDto,
    pub characters: Vec<CharacterDto>,
    pub pages: Vec<PageResponseDto>,
}

impl From<&Story> for StoryResponseDto {
    fn from(story: &Story) -> Self {
        Self {
            slug: story.project_path().and_then(slug_of),
            metadata: story.metadata().into(),
            characters: story.characters().iter().map(CharacterDto::from).collect(),
            pages: story.pages().iter().map(PageResponseDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StorySummaryResponseDto {
    pub slug: Option<String>,
    pub metadata: MetadataResponseDto,
}

impl From<&StorySummary> for StorySummaryResponseDto {
    fn from(summary: &StorySummary) -> Self {
        Self {
            slug: slug_of(&summary.project_path),
            metadata: (&summary.metadata).into(),
        }
    }
}

/// Image generator settings and model state
#[derive(Debug, Clone, Serialize)]
pub struct ImageGeneratorResponseDto {
    pub backend: String,
    pub state: GeneratorState,
    pub config: ImageConfig,
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateStoryRequestDto {
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub target_age: Option<TargetAge>,
    #[serde(default)]
    pub style: Option<IllustrationStyle>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMetadataRequestDto {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub target_age: Option<TargetAge>,
    #[serde(default)]
    pub style: Option<IllustrationStyle>,
}

impl From<UpdateMetadataRequestDto> for MetadataUpdate {
    fn from(dto: UpdateMetadataRequestDto) -> Self {
        Self {
            title: dto.title,
            author: dto.author,
            target_age: dto.target_age,
            style: dto.style,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddPageRequestDto {
    pub page_number: u32,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub illustration_prompt: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdatePageRequestDto {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub illustration_prompt: Option<String>,
}

impl From<UpdatePageRequestDto> for PageUpdate {
    fn from(dto: UpdatePageRequestDto) -> Self {
        Self {
            text: dto.text,
            illustration_prompt: dto.illustration_prompt,
            illustration_path: None,
        }
    }
}

/// Request to illustrate a page
///
/// `prompt` describes the scene. Without one, the page's stored scene or its
/// text is used. Either way the story's style and the characters the page
/// mentions are added before generation.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateIllustrationRequestDto {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub config: Option<ImageConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{create_character, create_page, create_story};

    #[test]
    fn test_story_response_uses_directory_name_as_slug() {
        let story = create_story("Pip", "Sam", TargetAge::Toddler, IllustrationStyle::Cartoon)
            .add_character(create_character("Pip", "a mouse", Some(vec!["red scarf".into()])))
            .add_page(create_page(1, "Hello", ""))
            .with_project_path("/stories/pip-1");

        let dto = StoryResponseDto::from(&story);

        assert_eq!(dto.slug.as_deref(), Some("pip-1"));
        assert_eq!(dto.characters[0].visual_traits, vec!["red scarf"]);
        assert!(!dto.pages[0].has_illustration);

        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["metadata"]["target_age"], "2-5");
        assert_eq!(json["metadata"]["style"], "cartoon");
    }

    #[test]
    fn test_update_requests_map_to_domain_updates() {
        let dto: UpdateMetadataRequestDto =
            serde_json::from_str(r#"{"title":"New","style":"pencil_sketch"}"#).unwrap();
        let update = MetadataUpdate::from(dto);
        assert_eq!(update.title.as_deref(), Some("New"));
        assert_eq!(update.style, Some(IllustrationStyle::PencilSketch));
        assert!(update.author.is_none());

        let page: UpdatePageRequestDto = serde_json::from_str("{}").unwrap();
        assert!(PageUpdate::from(page).is_empty());
    }

    #[test]
    fn test_illustration_request_validates_config() {
        let ok: GenerateIllustrationRequestDto =
            serde_json::from_str(r#"{"config":{"model":"dev","quantize":8,"steps":20}}"#).unwrap();
        assert_eq!(ok.config.unwrap().steps(), 20);

        let bad = serde_json::from_str::<GenerateIllustrationRequestDto>(
            r#"{"config":{"model":"schnell","quantize":4,"steps":20}}"#,
        );
        assert!(bad.is_err());
    }
}
