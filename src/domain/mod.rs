//! Domain layer - Core storybook model with no external service dependencies
//!
//! This layer contains:
//! - Entities: Story, Page, Character and story metadata
//! - Value Objects: target age ranges, illustration styles, image configuration
//! - Errors: validation and lookup failures raised by the model

pub mod entities;
pub mod errors;
pub mod value_objects;
