//! Application services - Use case implementations
//!
//! Services depend only on the outbound ports, so every backend (language
//! model, diffusion server, storage) can be swapped for a test double.

pub mod image_generation_service;
pub mod prompts;
pub mod story_engine;

// Re-export image generation types
pub use image_generation_service::{
    resolve_seed, validate_output_path, GenerationError, GenerationProgress, GenerationResult,
    GeneratorRegistry, GeneratorState, ImageGenerator, ProgressCallback,
};

// Re-export story engine types
pub use story_engine::{
    parse_character_lines, ConversationPhase, ConversationState, EngineError,
    ExtractedCharacter, StoryEngine,
};
