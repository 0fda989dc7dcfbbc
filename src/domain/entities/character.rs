//! Character entity - Story characters with visual traits for consistent illustrations

use regex::Regex;

/// A character appearing in a story
///
/// `visual_traits` are short phrases ("small brown mouse", "red scarf") that
/// are copied verbatim into every illustration prompt featuring the
/// character, so it is drawn the same way on every page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub name: String,
    pub description: String,
    pub visual_traits: Vec<String>,
}

impl Character {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            visual_traits: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_traits<I, S>(mut self, traits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.visual_traits = traits.into_iter().map(Into::into).collect();
        self
    }

    /// Visual traits joined into a prompt fragment, empty if there are none
    pub fn to_prompt_fragment(&self) -> String {
        self.visual_traits.join(", ")
    }

    /// Case-insensitive name comparison used for lookups
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }

    /// Whether the character's name occurs in `text` as a whole word
    ///
    /// Matching ignores case. "Art" matches "art class" but not "Arthur" or "party".
    pub fn appears_in_text(&self, text: &str) -> bool {
        let name = self.name.trim();
        if name.is_empty() {
            return false;
        }

        let pattern = format!(r"(?i)(?:^|\W){}(?:\W|$)", regex::escape(name));
        Regex::new(&pattern)
            .map(|re| re.is_match(text))
            .unwrap_or(false)
    }
}

/// Create a character from a name, description and optional traits
pub fn create_character(
    name: impl Into<String>,
    description: impl Into<String>,
    visual_traits: Option<Vec<String>>,
) -> Character {
    Character::new(name, description).with_traits(visual_traits.unwrap_or_default())
}
