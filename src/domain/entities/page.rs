//! Page entity - One spread of the storybook

use std::path::{Path, PathBuf};

/// A single page of a story
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Reading position, 1-indexed
    pub page_number: u32,
    pub text: String,
    /// Last prompt used (or intended) for this page's illustration
    pub illustration_prompt: String,
    pub illustration_path: Option<PathBuf>,
}

/// Field replacements for [`Page::with_updates`]
///
/// `None` leaves a field unchanged. `illustration_path: Some(None)` clears
/// the illustration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageUpdate {
    pub text: Option<String>,
    pub illustration_prompt: Option<String>,
    pub illustration_path: Option<Option<PathBuf>>,
}

impl PageUpdate {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn illustration(prompt: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            text: None,
            illustration_prompt: Some(prompt.into()),
            illustration_path: Some(Some(path.into())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.illustration_prompt.is_none()
            && self.illustration_path.is_none()
    }
}

impl Page {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
            illustration_prompt: String::new(),
            illustration_path: None,
        }
    }

    pub fn with_illustration_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.illustration_prompt = prompt.into();
        self
    }

    pub fn with_illustration_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.illustration_path = Some(path.into());
        self
    }

    pub fn with_page_number(mut self, page_number: u32) -> Self {
        self.page_number = page_number;
        self
    }

    /// Copy of this page with the fields named in `update` replaced
    pub fn with_updates(&self, update: &PageUpdate) -> Page {
        let mut page = self.clone();
        if let Some(text) = &update.text {
            page.text = text.clone();
        }
        if let Some(prompt) = &update.illustration_prompt {
            page.illustration_prompt = prompt.clone();
        }
        if let Some(path) = &update.illustration_path {
            page.illustration_path = path.clone();
        }
        page
    }

    /// True when an illustration path is set and the file exists
    pub fn has_illustration(&self) -> bool {
        self.illustration_path
            .as_deref()
            .map(Path::exists)
            .unwrap_or(false)
    }
}

/// Create a page with text and an illustration prompt
pub fn create_page(
    page_number: u32,
    text: impl Into<String>,
    illustration_prompt: impl Into<String>,
) -> Page {
    Page::new(page_number, text).with_illustration_prompt(illustration_prompt)
}
