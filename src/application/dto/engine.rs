use serde::{Deserialize, Serialize};

use crate::application::services::ConversationPhase;
use crate::domain::value_objects::{IllustrationStyle, TargetAge};

use super::CharacterDto;

fn default_total_pages() -> u32 {
    10
}

fn default_mood() -> String {
    "warm and friendly".to_string()
}

fn default_time_of_day() -> String {
    "daytime".to_string()
}

#[derive(Debug, Default, Deserialize)]
pub struct StartStoryRequestDto {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub target_age: Option<TargetAge>,
    #[serde(default)]
    pub style: Option<IllustrationStyle>,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequestDto {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponseDto {
    pub reply: String,
    pub phase: ConversationPhase,
}

#[derive(Debug, Deserialize)]
pub struct GeneratePageTextRequestDto {
    pub page_purpose: String,
    #[serde(default = "default_total_pages")]
    pub total_pages: u32,
}

#[derive(Debug, Serialize)]
pub struct GeneratedTextResponseDto {
    pub page_number: u32,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct IllustrationPromptRequestDto {
    pub page_text: String,
    #[serde(default = "default_mood")]
    pub mood: String,
    #[serde(default = "default_time_of_day")]
    pub time_of_day: String,
}

#[derive(Debug, Serialize)]
pub struct IllustrationPromptResponseDto {
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct PlotPointsRequestDto {
    pub page_count: u32,
    #[serde(default)]
    pub summary: String,
}

/// Model currently answering engine requests
#[derive(Debug, Serialize)]
pub struct EngineInfoResponseDto {
    pub model: String,
    pub phase: ConversationPhase,
    pub story_title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetModelRequestDto {
    pub model: String,
}

#[derive(Debug, Deserialize)]
pub struct ExtractTraitsRequestDto {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractTraitsResponseDto {
    pub name: String,
    pub visual_traits: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractCharactersRequestDto {
    pub story_text: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractCharactersResponseDto {
    pub characters: Vec<CharacterDto>,
}
