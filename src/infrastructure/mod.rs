//! Infrastructure layer - External adapters and implementations
//!
//! This layer contains:
//! - Persistence: JSON story projects on the local filesystem
//! - HTTP: REST API routes
//! - Ollama: LLM integration for story writing
//! - Mock LLM: scripted text generation for development
//! - ComfyUI: FLUX illustration generation
//! - Config: Application configuration
//! - State: Shared application state

pub mod comfyui;
pub mod config;
pub mod http;
pub mod mock_llm;
pub mod ollama;
pub mod persistence;
pub mod state;
