//! Illustration prompts derived from page text

use crate::domain::entities::Character;
use crate::domain::value_objects::IllustrationStyle;

use super::styles::{apply_preset, preset_for};

/// Longest page excerpt used as a scene description, ellipsis included
pub const MAX_SCENE_DESCRIPTION_CHARS: usize = 200;

/// Characters whose name appears in `page_text` as a whole word
pub fn find_characters_in_page<'a>(
    page_text: &str,
    characters: &'a [Character],
) -> Vec<&'a Character> {
    characters
        .iter()
        .filter(|character| character.appears_in_text(page_text))
        .collect()
}

/// Visual traits of every character mentioned on the page, in story order
pub fn character_traits_for_page(page_text: &str, characters: &[Character]) -> Vec<String> {
    find_characters_in_page(page_text, characters)
        .into_iter()
        .flat_map(|character| character.visual_traits.iter().cloned())
        .collect()
}

fn truncate_scene(page_text: &str) -> String {
    let text = page_text.trim();
    if text.chars().count() <= MAX_SCENE_DESCRIPTION_CHARS {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(MAX_SCENE_DESCRIPTION_CHARS - 3).collect();
    truncated.push_str("...");
    truncated
}

/// Styled prompt built directly from page text, without an LLM round trip
///
/// Long page text is cut to [`MAX_SCENE_DESCRIPTION_CHARS`]. The result
/// always carries the safety modifiers.
pub fn build_illustration_prompt_simple(
    page_text: &str,
    character_traits: &[String],
    style: IllustrationStyle,
) -> String {
    let mut base = truncate_scene(page_text);
    if !character_traits.is_empty() {
        base.push_str(", featuring ");
        base.push_str(&character_traits.join(", "));
    }
    apply_preset(&base, preset_for(style))
}

pub fn build_illustration_prompt_for_page(
    page_text: &str,
    characters: &[Character],
    style: IllustrationStyle,
) -> String {
    let traits = character_traits_for_page(page_text, characters);
    build_illustration_prompt_simple(page_text, &traits, style)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::prompts::SAFETY_MODIFIERS;
    use crate::domain::entities::create_character;

    fn cast() -> Vec<Character> {
        vec![
            create_character(
                "Art",
                "a painter fox",
                Some(vec!["orange fox".into(), "beret".into()]),
            ),
            create_character("Luna", "a sleepy owl", Some(vec!["grey owl".into()])),
        ]
    }

    #[test]
    fn test_whole_word_matching() {
        let characters = cast();

        let found = find_characters_in_page("Art painted the sky.", &characters);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Art");

        assert!(find_characters_in_page("Arthur went to a party.", &characters).is_empty());
        assert!(find_characters_in_page("The artist smiled.", &characters).is_empty());
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let characters = cast();
        let found = find_characters_in_page("luna and ART met at noon", &characters);
        let names: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Art", "Luna"]);
    }

    #[test]
    fn test_traits_flattened_in_story_order() {
        let traits = character_traits_for_page("Luna watched Art.", &cast());
        assert_eq!(traits, vec!["orange fox", "beret", "grey owl"]);
    }

    #[test]
    fn test_simple_prompt_truncates_long_text() {
        let long_text = "a".repeat(500);
        let prompt = build_illustration_prompt_simple(&long_text, &[], IllustrationStyle::Cartoon);

        let expected_scene = format!("{}...", "a".repeat(197));
        assert!(prompt.starts_with(&format!("{}, cartoon", expected_scene)));
        assert!(!prompt.contains(&"a".repeat(198)));
        assert!(prompt.contains(SAFETY_MODIFIERS));
    }

    #[test]
    fn test_simple_prompt_keeps_short_text() {
        let prompt = build_illustration_prompt_simple(
            "Pip found a shiny acorn.",
            &["small brown mouse".to_string()],
            IllustrationStyle::Watercolor,
        );
        assert!(prompt
            .starts_with("Pip found a shiny acorn., featuring small brown mouse, watercolor"));
        assert!(!prompt.contains("..."));
        assert!(prompt.ends_with(SAFETY_MODIFIERS));
    }

    #[test]
    fn test_prompt_for_page_includes_mentioned_traits_only() {
        let prompt = build_illustration_prompt_for_page(
            "Art set up his easel.",
            &cast(),
            IllustrationStyle::PencilSketch,
        );
        assert!(prompt.contains("featuring orange fox, beret"));
        assert!(!prompt.contains("grey owl"));
        assert!(prompt.contains(SAFETY_MODIFIERS));
    }
}
