//! Named illustration styles a story can be drawn in

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Illustration style selected for a story
///
/// The prompt text for each style lives in the style preset registry; this
/// type only names the choice so it can be stored with the story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IllustrationStyle {
    Watercolor,
    Cartoon,
    #[default]
    StorybookClassic,
    ModernDigital,
    PencilSketch,
}

impl IllustrationStyle {
    pub const ALL: [IllustrationStyle; 5] = [
        Self::Watercolor,
        Self::Cartoon,
        Self::StorybookClassic,
        Self::ModernDigital,
        Self::PencilSketch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Watercolor => "watercolor",
            Self::Cartoon => "cartoon",
            Self::StorybookClassic => "storybook_classic",
            Self::ModernDigital => "modern_digital",
            Self::PencilSketch => "pencil_sketch",
        }
    }
}

impl fmt::Display for IllustrationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IllustrationStyle {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|style| style.as_str() == s.trim())
            .ok_or_else(|| {
                let valid: Vec<&str> = Self::ALL.iter().map(|s| s.as_str()).collect();
                DomainError::validation(format!(
                    "Unknown illustration style '{}'. Available: {}",
                    s,
                    valid.join(", ")
                ))
            })
    }
}
