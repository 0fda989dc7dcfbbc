//! Story Engine - Conversational story creation
//!
//! Sequences calls to a [`TextGenerator`] to guide the user through a story,
//! draft page text, write illustration prompts and pull character details
//! out of prose. The story being built lives in the engine's
//! [`ConversationState`] and is replaced, never mutated, on every change.

use tracing::{debug, info, instrument};

use crate::application::ports::outbound::{
    ChatMessage, GenerationOptions, MessageRole, TextGenerator,
};
use crate::application::services::prompts::{
    calculate_story_structure, format_character_details, format_previous_pages,
    EXTRACT_CHARACTERS_FROM_TEXT, EXTRACT_VISUAL_TRAITS, GENERATE_ILLUSTRATION_PROMPT,
    ILLUSTRATION_PROMPT_SYSTEM, PAGE_WRITER_SYSTEM, STORY_GUIDE_SYSTEM, STORY_START,
    SUGGEST_PLOT_POINTS, WRITE_PAGE_TEXT,
};
use crate::domain::entities::{
    create_character, create_page, create_story, MetadataUpdate, PageUpdate, Story,
};
use crate::domain::errors::DomainError;
use crate::domain::value_objects::{IllustrationStyle, TargetAge};

const DEFAULT_SETTING: &str = "the story world";
const DEFAULT_CHARACTER_NAME: &str = "the main character";

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No active story. Start a new story first.")]
    NoActiveStory,
    #[error("Text generation failed: {0}")]
    Llm(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<anyhow::Error> for EngineError {
    fn from(e: anyhow::Error) -> Self {
        Self::Llm(format!("{:#}", e))
    }
}

/// Where the conversation is in the creation workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationPhase {
    #[default]
    Initial,
    /// A new story is being shaped through conversation
    Ideation,
    /// An existing story was loaded for editing
    Editing,
}

/// Conversation history plus the story under construction
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    pub messages: Vec<ChatMessage>,
    pub phase: ConversationPhase,
    pub story: Option<Story>,
}

impl ConversationState {
    pub fn add_message(&mut self, role: MessageRole, content: impl Into<String>) {
        self.messages.push(ChatMessage::new(role, content));
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.phase = ConversationPhase::Initial;
        self.story = None;
    }
}

/// A character found in story text by the LLM
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExtractedCharacter {
    pub name: String,
    pub description: String,
    pub visual_traits: Vec<String>,
}

fn split_traits(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `NAME | DESCRIPTION | TRAITS` lines
///
/// Blank lines and a bare `NONE` are skipped. A line with only two columns
/// yields a character without traits; single-column lines are ignored.
pub fn parse_character_lines(response: &str) -> Vec<ExtractedCharacter> {
    response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.eq_ignore_ascii_case("none"))
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('|').map(str::trim).collect();
            match parts.as_slice() {
                [name, description, traits, ..] => Some(ExtractedCharacter {
                    name: name.to_string(),
                    description: description.to_string(),
                    visual_traits: split_traits(traits),
                }),
                [name, description] => Some(ExtractedCharacter {
                    name: name.to_string(),
                    description: description.to_string(),
                    visual_traits: Vec::new(),
                }),
                _ => None,
            }
        })
        .collect()
}

fn excerpt(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Orchestrates story creation over a language model
pub struct StoryEngine<T: TextGenerator> {
    text_generator: T,
    default_target_age: TargetAge,
    default_style: IllustrationStyle,
    options: GenerationOptions,
    state: ConversationState,
}

impl<T: TextGenerator> StoryEngine<T> {
    pub fn new(
        text_generator: T,
        default_target_age: TargetAge,
        default_style: IllustrationStyle,
    ) -> Self {
        Self {
            text_generator,
            default_target_age,
            default_style,
            options: GenerationOptions::default(),
            state: ConversationState::default(),
        }
    }

    /// Sampling settings sent with every request
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn text_generator(&self) -> &T {
        &self.text_generator
    }

    pub fn model_name(&self) -> String {
        self.text_generator.model_name()
    }

    pub fn conversation_state(&self) -> &ConversationState {
        &self.state
    }

    pub fn story(&self) -> Option<&Story> {
        self.state.story.as_ref()
    }

    fn active_story(&self) -> Result<&Story, EngineError> {
        self.state.story.as_ref().ok_or(EngineError::NoActiveStory)
    }

    /// Reset the conversation and begin a fresh story
    ///
    /// Returns the opening message to show the user.
    pub fn start_new_story(
        &mut self,
        title: &str,
        author: &str,
        target_age: Option<TargetAge>,
        style: Option<IllustrationStyle>,
    ) -> String {
        self.state.clear();

        let target_age = target_age.unwrap_or(self.default_target_age);
        let style = style.unwrap_or(self.default_style);
        let title = if title.trim().is_empty() { "Untitled Story" } else { title };

        self.state.story = Some(create_story(title, author, target_age, style));
        self.state.phase = ConversationPhase::Ideation;

        let system = STORY_GUIDE_SYSTEM.render(&[
            ("target_age", target_age.as_str()),
            ("style", style.as_str()),
        ]);
        self.state.add_message(MessageRole::System, system);

        let opening = STORY_START.render(&[]);
        self.state.add_message(MessageRole::Assistant, opening.clone());

        info!("Started new story session with model {}", self.model_name());
        opening
    }

    /// Send a user message and return the model's reply
    ///
    /// Without an active story this starts one with default settings and
    /// returns the opening message instead.
    #[instrument(skip(self, user_input))]
    pub async fn process_user_input(&mut self, user_input: &str) -> Result<String, EngineError> {
        if self.state.story.is_none() {
            return Ok(self.start_new_story("", "", None, None));
        }

        self.state.add_message(MessageRole::User, user_input);
        let response = self.text_generator.chat(&self.state.messages, Some(&self.options)).await?;
        self.state.add_message(MessageRole::Assistant, response.clone());

        debug!("Processed user input, response length: {}", response.len());
        Ok(response)
    }

    /// Draft the text for one page
    ///
    /// Earlier non-empty pages and the first character are given to the
    /// model as context. Surrounding quotes are stripped from the reply.
    #[instrument(skip(self, page_purpose))]
    pub async fn generate_page_text(
        &self,
        page_number: u32,
        page_purpose: &str,
        total_pages: u32,
    ) -> Result<String, EngineError> {
        let story = self.active_story()?;
        let metadata = story.metadata();

        let previous: Vec<(u32, &str)> = story
            .pages()
            .iter()
            .filter(|p| p.page_number < page_number && !p.text.is_empty())
            .map(|p| (p.page_number, p.text.as_str()))
            .collect();

        let (character_name, character_description) = story
            .characters()
            .first()
            .map(|c| (c.name.as_str(), c.description.as_str()))
            .unwrap_or((DEFAULT_CHARACTER_NAME, ""));

        let system = PAGE_WRITER_SYSTEM.render(&[
            ("target_age", metadata.target_age.as_str()),
            ("title", metadata.title.as_str()),
            ("style", metadata.style.as_str()),
        ]);

        let page_number_text = page_number.to_string();
        let total_pages_text = total_pages.to_string();
        let previous_text = format_previous_pages(&previous);
        let prompt = WRITE_PAGE_TEXT.render(&[
            ("page_number", page_number_text.as_str()),
            ("total_pages", total_pages_text.as_str()),
            ("title", metadata.title.as_str()),
            ("character_name", character_name),
            ("character_description", character_description),
            ("setting", DEFAULT_SETTING),
            ("previous_text", previous_text.as_str()),
            ("page_purpose", page_purpose),
            ("target_age", metadata.target_age.as_str()),
        ]);

        let response = self.text_generator.generate(&prompt, &system, Some(&self.options)).await?;
        let text = response.trim().trim_matches('"').trim_matches('\'').to_string();

        info!("Generated text for page {}: {}", page_number, excerpt(&text, 50));
        Ok(text)
    }

    /// Ask the model for an illustration prompt describing `page_text`
    #[instrument(skip(self, page_text))]
    pub async fn generate_illustration_prompt(
        &self,
        page_text: &str,
        mood: &str,
        time_of_day: &str,
    ) -> Result<String, EngineError> {
        let story = self.active_story()?;
        let style = story.metadata().style.as_str();

        let character_details = story
            .characters()
            .first()
            .map(|c| format_character_details(&c.name, &c.description, &c.visual_traits))
            .unwrap_or_else(|| "Main character to be illustrated".to_string());

        let system = ILLUSTRATION_PROMPT_SYSTEM.render(&[("style", style)]);
        let prompt = GENERATE_ILLUSTRATION_PROMPT.render(&[
            ("page_text", page_text),
            ("character_details", character_details.as_str()),
            ("setting", DEFAULT_SETTING),
            ("mood", mood),
            ("time_of_day", time_of_day),
            ("style", style),
        ]);

        let response = self.text_generator.generate(&prompt, &system, Some(&self.options)).await?;
        info!("Generated illustration prompt: {}", excerpt(&response, 100));
        Ok(response.trim().to_string())
    }

    pub fn add_character_to_story(
        &mut self,
        name: &str,
        description: &str,
        visual_traits: Option<Vec<String>>,
    ) -> Result<Story, EngineError> {
        let story = self
            .active_story()?
            .add_character(create_character(name, description, visual_traits));
        self.state.story = Some(story.clone());

        info!("Added character: {}", name);
        Ok(story)
    }

    /// Ask the model for a comma-separated list of a character's visual traits
    pub async fn extract_visual_traits(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Vec<String>, EngineError> {
        let prompt = EXTRACT_VISUAL_TRAITS.render(&[("name", name), ("description", description)]);
        let response = self.text_generator.generate(&prompt, "", Some(&self.options)).await?;

        let traits = split_traits(&response);
        info!("Extracted {} visual traits for {}", traits.len(), name);
        Ok(traits)
    }

    /// Ask the model to identify every character in `story_text`
    pub async fn extract_characters_from_text(
        &self,
        story_text: &str,
    ) -> Result<Vec<ExtractedCharacter>, EngineError> {
        let prompt = EXTRACT_CHARACTERS_FROM_TEXT.render(&[("story_text", story_text)]);
        let response = self.text_generator.generate(&prompt, "", Some(&self.options)).await?;

        let characters = parse_character_lines(&response);
        info!("Extracted {} characters from text", characters.len());
        Ok(characters)
    }

    pub fn add_page_to_story(
        &mut self,
        page_number: u32,
        text: &str,
        illustration_prompt: &str,
    ) -> Result<Story, EngineError> {
        let story = self
            .active_story()?
            .add_page(create_page(page_number, text, illustration_prompt));
        self.state.story = Some(story.clone());

        info!("Added page {} to story", page_number);
        Ok(story)
    }

    /// Replace a page's text and/or illustration prompt
    ///
    /// With neither field given the story is returned unchanged.
    pub fn update_story_page(
        &mut self,
        page_number: u32,
        text: Option<String>,
        illustration_prompt: Option<String>,
    ) -> Result<Story, EngineError> {
        let story = self.active_story()?;
        let update = PageUpdate {
            text,
            illustration_prompt,
            illustration_path: None,
        };
        if update.is_empty() {
            return Ok(story.clone());
        }

        let story = story.update_page(page_number, &update)?;
        self.state.story = Some(story.clone());

        info!("Updated page {}", page_number);
        Ok(story)
    }

    pub fn update_story_metadata(&mut self, update: &MetadataUpdate) -> Result<Story, EngineError> {
        let story = self.active_story()?.with_metadata(update);
        self.state.story = Some(story.clone());

        info!("Updated story metadata: {}", story.title());
        Ok(story)
    }

    /// Work on an existing story
    pub fn set_story(&mut self, story: Story) {
        info!("Set story: {}", story.title());
        self.state.story = Some(story);
        self.state.phase = ConversationPhase::Editing;
    }

    /// Suggested beginning/middle/ending outline for a story of `page_count` pages
    pub fn suggest_plot_points(&self, page_count: u32, summary: &str) -> String {
        let structure = calculate_story_structure(page_count);
        let character_name = self
            .story()
            .and_then(|s| s.characters().first())
            .map(|c| c.name.as_str())
            .unwrap_or(DEFAULT_CHARACTER_NAME);

        let page_count = page_count.to_string();
        let beginning_end = structure.beginning_end.to_string();
        let middle_start = structure.middle_start.to_string();
        let middle_end = structure.middle_end.to_string();
        let ending_start = structure.ending_start.to_string();

        SUGGEST_PLOT_POINTS.render(&[
            ("page_count", page_count.as_str()),
            ("summary", summary),
            ("character_name", character_name),
            ("beginning_end", beginning_end.as_str()),
            ("middle_start", middle_start.as_str()),
            ("middle_end", middle_end.as_str()),
            ("ending_start", ending_start.as_str()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies from a script and records every conversation it was sent
    #[derive(Default)]
    struct ScriptedLlm {
        replies: Mutex<VecDeque<String>>,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedLlm {
        fn with_replies(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                requests: Mutex::default(),
            }
        }

        fn last_request(&self) -> Vec<ChatMessage> {
            self.requests.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedLlm {
        fn model_name(&self) -> String {
            "scripted".to_string()
        }

        async fn chat(
            &self,
            messages: &[ChatMessage],
            _options: Option<&GenerationOptions>,
        ) -> Result<String> {
            self.requests.lock().unwrap().push(messages.to_vec());
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "ok".to_string()))
        }
    }

    fn engine(replies: &[&str]) -> StoryEngine<ScriptedLlm> {
        StoryEngine::new(
            ScriptedLlm::with_replies(replies),
            TargetAge::EarlyReader,
            IllustrationStyle::StorybookClassic,
        )
    }

    #[test]
    fn test_start_new_story_seeds_conversation() {
        let mut engine = engine(&[]);
        let opening = engine.start_new_story("", "Sam", None, Some(IllustrationStyle::Cartoon));

        assert!(opening.contains("Let's create a wonderful story together!"));
        let state = engine.conversation_state();
        assert_eq!(state.phase, ConversationPhase::Ideation);
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].role, MessageRole::System);
        assert!(state.messages[0].content.contains("Target age group: 5-8 years old"));
        assert!(state.messages[0].content.contains("Illustration style: cartoon"));
        assert_eq!(state.messages[1].role, MessageRole::Assistant);

        let story = engine.story().unwrap();
        assert_eq!(story.title(), "Untitled Story");
        assert_eq!(story.metadata().author, "Sam");
    }

    #[tokio::test]
    async fn test_process_user_input_without_story_starts_one() {
        let mut engine = engine(&["unused"]);
        let reply = engine.process_user_input("hello").await.unwrap();

        assert!(reply.contains("Let's create a wonderful story together!"));
        assert!(engine.story().is_some());
        assert!(engine.text_generator().requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_process_user_input_sends_full_history() {
        let mut engine = engine(&["What a lovely idea!"]);
        engine.start_new_story("Pip", "", None, None);

        let reply = engine.process_user_input("A mouse named Pip").await.unwrap();

        assert_eq!(reply, "What a lovely idea!");
        let sent = engine.text_generator().last_request();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[2], ChatMessage::user("A mouse named Pip"));
        assert_eq!(engine.conversation_state().messages.len(), 4);
    }

    #[tokio::test]
    async fn test_generate_page_text_strips_quotes_and_uses_context() {
        let mut engine = engine(&["  \"Pip peeked out of her burrow.\"  "]);
        engine.start_new_story("Pip's Day", "", None, None);
        engine
            .add_character_to_story("Pip", "a curious mouse", None)
            .unwrap();
        engine.add_page_to_story(1, "Morning came.", "").unwrap();

        let text = engine.generate_page_text(2, "Pip wakes up", 10).await.unwrap();

        assert_eq!(text, "Pip peeked out of her burrow.");
        let sent = engine.text_generator().last_request();
        assert_eq!(sent[0].role, MessageRole::System);
        assert!(sent[0].content.contains("Story title: Pip's Day"));
        assert!(sent[1].content.contains("Write the text for page 2 of 10."));
        assert!(sent[1].content.contains("Main character: Pip - a curious mouse"));
        assert!(sent[1].content.contains("Page 1: Morning came."));
    }

    #[tokio::test]
    async fn test_operations_require_active_story() {
        let mut engine = engine(&[]);

        assert!(matches!(
            engine.generate_page_text(1, "start", 10).await,
            Err(EngineError::NoActiveStory)
        ));
        assert!(matches!(
            engine.generate_illustration_prompt("text", "warm", "day").await,
            Err(EngineError::NoActiveStory)
        ));
        assert!(matches!(
            engine.add_page_to_story(1, "text", ""),
            Err(EngineError::NoActiveStory)
        ));
        assert!(matches!(
            engine.update_story_metadata(&MetadataUpdate::default()),
            Err(EngineError::NoActiveStory)
        ));
    }

    #[tokio::test]
    async fn test_generate_illustration_prompt_includes_character_details() {
        let mut engine = engine(&["  A mouse on a leaf  "]);
        engine.start_new_story("Pip", "", None, Some(IllustrationStyle::Watercolor));
        engine
            .add_character_to_story("Pip", "a mouse", Some(vec!["red scarf".to_string()]))
            .unwrap();

        let prompt = engine
            .generate_illustration_prompt("Pip sat on a leaf.", "warm and friendly", "daytime")
            .await
            .unwrap();

        assert_eq!(prompt, "A mouse on a leaf");
        let sent = engine.text_generator().last_request();
        assert!(sent[0].content.contains("Specify the art style: watercolor"));
        assert!(sent[1].content.contains("Pip: a mouse\nVisual traits: red scarf"));
        assert!(sent[1].content.contains("Time of day: daytime"));
    }

    #[tokio::test]
    async fn test_extract_visual_traits_drops_empty_entries() {
        let engine = engine(&["small brown mouse, , big ears ,red scarf,"]);
        let traits = engine.extract_visual_traits("Pip", "a mouse").await.unwrap();

        assert_eq!(traits, vec!["small brown mouse", "big ears", "red scarf"]);
        assert_eq!(engine.text_generator().last_request().len(), 1);
    }

    #[test]
    fn test_parse_character_lines() {
        let parsed = parse_character_lines(
            "Pip | a curious mouse | small brown mouse, red scarf\n\
             \n\
             Owl | a wise old owl\n\
             NONE\n\
             just a stray line\n",
        );

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "Pip");
        assert_eq!(parsed[0].visual_traits, vec!["small brown mouse", "red scarf"]);
        assert_eq!(parsed[1].name, "Owl");
        assert!(parsed[1].visual_traits.is_empty());
    }

    #[tokio::test]
    async fn test_extract_characters_none() {
        let engine = engine(&["NONE"]);
        let characters = engine.extract_characters_from_text("The wind blew.").await.unwrap();
        assert!(characters.is_empty());
    }

    #[test]
    fn test_update_story_page() {
        let mut engine = engine(&[]);
        engine.start_new_story("Pip", "", None, None);
        engine.add_page_to_story(1, "old", "").unwrap();

        let story = engine
            .update_story_page(1, Some("new".to_string()), None)
            .unwrap();
        assert_eq!(story.get_page(1).unwrap().text, "new");

        let unchanged = engine.update_story_page(1, None, None).unwrap();
        assert_eq!(unchanged, story);

        let missing = engine.update_story_page(9, Some("x".to_string()), None);
        assert!(matches!(missing, Err(EngineError::Domain(DomainError::NotFound(_)))));
        assert_eq!(engine.story().unwrap().get_page(1).unwrap().text, "new");
    }

    #[test]
    fn test_set_story_switches_to_editing() {
        let mut engine = engine(&[]);
        let story = create_story("Loaded", "", TargetAge::Toddler, IllustrationStyle::Cartoon);

        engine.set_story(story.clone());

        assert_eq!(engine.conversation_state().phase, ConversationPhase::Editing);
        assert_eq!(engine.story(), Some(&story));
    }

    #[test]
    fn test_update_story_metadata() {
        let mut engine = engine(&[]);
        engine.start_new_story("Draft", "", None, None);

        let story = engine
            .update_story_metadata(&MetadataUpdate {
                title: Some("Final".to_string()),
                target_age: Some(TargetAge::Independent),
                ..MetadataUpdate::default()
            })
            .unwrap();

        assert_eq!(story.title(), "Final");
        assert_eq!(story.metadata().target_age, TargetAge::Independent);
    }

    #[test]
    fn test_suggest_plot_points_uses_structure() {
        let mut engine = engine(&[]);
        engine.start_new_story("Pip", "", None, None);
        engine.add_character_to_story("Pip", "a mouse", None).unwrap();

        let outline = engine.suggest_plot_points(12, "a mouse who finds a star");

        assert!(outline.starts_with("For a 12-page story about a mouse who finds a star:"));
        assert!(outline.contains("**Beginning (Pages 1-3):**"));
        assert!(outline.contains("**Middle (Pages 4-9):**"));
        assert!(outline.contains("**End (Pages 10-12):**"));
        assert!(outline.contains("Introduce Pip and their world"));
    }
}
