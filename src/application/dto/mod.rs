//! Data Transfer Objects - For API boundaries
//!
//! Request and response shapes for the HTTP layer, with conversions to and
//! from the domain types.

pub mod engine;
pub mod story;

pub use engine::*;
pub use story::*;
