//! Domain entities - Story aggregate and its parts

mod character;
mod page;
mod story;

pub use character::{create_character, Character};
pub use page::{create_page, Page, PageUpdate};
pub use story::{create_story, MetadataUpdate, Story, StoryMetadata};
