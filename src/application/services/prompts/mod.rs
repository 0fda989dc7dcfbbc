//! Prompt construction - Style presets, LLM templates and illustration prompts
//!
//! Everything here is pure string building. Safety modifiers are attached by
//! [`apply_style`] and the functions built on it; text passed straight to an
//! image generator does not get them.

mod illustration;
mod styles;
mod templates;

pub use illustration::{
    build_illustration_prompt_for_page, build_illustration_prompt_simple,
    character_traits_for_page, find_characters_in_page, MAX_SCENE_DESCRIPTION_CHARS,
};
pub use styles::{
    apply_preset, apply_style, build_illustration_prompt, get_style, list_styles, preset_for,
    StylePreset, SAFETY_MODIFIERS,
};
pub use templates::{
    calculate_story_structure, format_character_details, format_previous_pages, get_all_templates,
    PromptTemplate, StoryStructure, DEFINE_CHARACTER, EXTRACT_CHARACTERS_FROM_TEXT,
    EXTRACT_VISUAL_TRAITS, GENERATE_ILLUSTRATION_PROMPT, ILLUSTRATION_PROMPT_SYSTEM,
    ILLUSTRATION_PROMPT_TEMPLATE, PAGE_WRITER_SYSTEM, REFINE_PAGE_TEXT, STORY_DEVELOPMENT,
    STORY_GUIDE_SYSTEM, STORY_START, SUGGEST_PLOT_POINTS, WRITE_PAGE_TEXT,
};
