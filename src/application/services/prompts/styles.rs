//! Illustration style presets

use serde::Serialize;

use crate::domain::errors::DomainError;
use crate::domain::value_objects::IllustrationStyle;

/// Child-safety framing appended by [`apply_style`]
///
/// Not added to arbitrary prompts: callers that hand text straight to the
/// image generator must go through [`apply_style`] or
/// [`build_illustration_prompt`] to get it.
pub const SAFETY_MODIFIERS: &str = "children's book illustration, friendly and approachable, \
     warm colors, gentle and safe feeling, age-appropriate";

/// A named bundle of prompt text controlling illustration look
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StylePreset {
    pub name: &'static str,
    pub display_name: &'static str,
    pub prompt_suffix: &'static str,
    pub description: &'static str,
}

static STYLE_PRESETS: [StylePreset; 5] = [
    StylePreset {
        name: "watercolor",
        display_name: "Watercolor",
        prompt_suffix: "watercolor illustration style, soft edges, warm pastel colors, \
             dreamy atmosphere, gentle brush strokes, children's picture book art",
        description: "Soft, dreamy watercolor with pastel colors",
    },
    StylePreset {
        name: "cartoon",
        display_name: "Cartoon",
        prompt_suffix: "cartoon illustration style, bright vibrant colors, simple bold shapes, \
             clean lines, playful character design, children's picture book art",
        description: "Bright, vibrant cartoon with bold shapes",
    },
    StylePreset {
        name: "storybook_classic",
        display_name: "Storybook Classic",
        prompt_suffix: "classic children's book illustration style, warm earthy colors, \
             detailed but soft rendering, cozy inviting atmosphere, \
             reminiscent of classic picture books, nostalgic feeling",
        description: "Classic picture book style with warm, cozy feeling",
    },
    StylePreset {
        name: "modern_digital",
        display_name: "Modern Digital",
        prompt_suffix: "modern digital illustration style, bold saturated colors, \
             clean vector-like lines, contemporary character design, \
             children's picture book art, sense of wonder and adventure",
        description: "Clean, modern digital art with bold colors",
    },
    StylePreset {
        name: "pencil_sketch",
        display_name: "Pencil Sketch",
        prompt_suffix: "pencil sketch illustration style, hand-drawn look, \
             soft graphite shading, gentle lines, expressive strokes, \
             children's book art, warm and personal feeling",
        description: "Hand-drawn pencil sketch with soft shading",
    },
];

/// Look up a preset by name
///
/// Unknown names fail with `NotFound`, listing every valid name.
pub fn get_style(name: &str) -> Result<&'static StylePreset, DomainError> {
    STYLE_PRESETS.iter().find(|p| p.name == name).ok_or_else(|| {
        let available: Vec<&str> = STYLE_PRESETS.iter().map(|p| p.name).collect();
        DomainError::not_found(format!(
            "Unknown style '{}'. Available: {}",
            name,
            available.join(", ")
        ))
    })
}

/// The preset for a story's style
pub fn preset_for(style: IllustrationStyle) -> &'static StylePreset {
    let index = match style {
        IllustrationStyle::Watercolor => 0,
        IllustrationStyle::Cartoon => 1,
        IllustrationStyle::StorybookClassic => 2,
        IllustrationStyle::ModernDigital => 3,
        IllustrationStyle::PencilSketch => 4,
    };
    &STYLE_PRESETS[index]
}

pub fn list_styles() -> &'static [StylePreset] {
    &STYLE_PRESETS
}

/// `"{base}, {suffix}, {safety modifiers}"`
pub fn apply_preset(base_prompt: &str, preset: &StylePreset) -> String {
    format!("{}, {}, {}", base_prompt, preset.prompt_suffix, SAFETY_MODIFIERS)
}

/// Append a named style and the safety modifiers to a base prompt
pub fn apply_style(base_prompt: &str, style_name: &str) -> Result<String, DomainError> {
    get_style(style_name).map(|preset| apply_preset(base_prompt, preset))
}

/// Compose scene, character traits and extra context into a styled prompt
pub fn build_illustration_prompt(
    scene_description: &str,
    character_traits: &[String],
    style_name: &str,
    additional_context: Option<&str>,
) -> Result<String, DomainError> {
    let mut parts = vec![scene_description.to_string()];

    if !character_traits.is_empty() {
        parts.push(format!("featuring {}", character_traits.join(", ")));
    }

    if let Some(context) = additional_context.filter(|c| !c.is_empty()) {
        parts.push(context.to_string());
    }

    apply_style(&parts.join(", "), style_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_style_has_a_preset() {
        for style in IllustrationStyle::ALL {
            let preset = preset_for(style);
            assert_eq!(preset.name, style.as_str());
            assert_eq!(get_style(style.as_str()).unwrap(), preset);
        }
        assert_eq!(list_styles().len(), IllustrationStyle::ALL.len());
    }

    #[test]
    fn test_unknown_style_lists_available_names() {
        let err = get_style("oil_painting").unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
        let message = err.to_string();
        for preset in list_styles() {
            assert!(message.contains(preset.name));
        }
    }

    #[test]
    fn test_apply_style_layout() {
        let prompt = apply_style("A mouse in a garden", "watercolor").unwrap();
        assert!(prompt.starts_with("A mouse in a garden, watercolor illustration style"));
        assert!(prompt.ends_with(SAFETY_MODIFIERS));
    }

    #[test]
    fn test_apply_style_rejects_unknown() {
        assert!(apply_style("A mouse", "nope").is_err());
    }

    #[test]
    fn test_build_illustration_prompt_with_traits_and_context() {
        let traits = vec!["small brown mouse".to_string(), "red scarf".to_string()];
        let prompt = build_illustration_prompt(
            "A mouse exploring a sunny garden",
            &traits,
            "cartoon",
            Some("morning light"),
        )
        .unwrap();

        assert!(prompt.starts_with(
            "A mouse exploring a sunny garden, featuring small brown mouse, red scarf, morning light, cartoon"
        ));
        assert!(prompt.contains(SAFETY_MODIFIERS));
    }

    #[test]
    fn test_build_illustration_prompt_without_extras() {
        let prompt = build_illustration_prompt("A quiet pond", &[], "pencil_sketch", None).unwrap();
        assert!(!prompt.contains("featuring"));
        assert!(prompt.starts_with("A quiet pond, pencil sketch"));
    }

    #[test]
    fn test_safety_modifiers_content() {
        assert!(SAFETY_MODIFIERS.contains("children's book illustration"));
        assert!(SAFETY_MODIFIERS.contains("age-appropriate"));
    }
}
