//! Outbound ports - Interfaces that the application requires from external systems

mod image_port;
mod llm_port;
mod story_repository_port;

pub use image_port::{DiffusionBackend, DiffusionModel, GeneratedImage, ImageRequest};
pub use llm_port::{ChatMessage, GenerationOptions, MessageRole, TextGenerator};
pub use story_repository_port::{PersistenceError, StoryRepositoryPort, StorySummary};
