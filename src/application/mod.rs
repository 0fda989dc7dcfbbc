//! Application layer - Use cases orchestrating the domain and external services
//!
//! This layer contains:
//! - Ports: interfaces to text generation, image generation and storage
//! - Services: story engine, prompt construction, image generation
//! - DTOs: request/response shapes for the HTTP surface

pub mod dto;
pub mod ports;
pub mod services;
