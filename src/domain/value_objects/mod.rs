//! Value objects - Immutable values without identity

mod illustration_style;
mod image_config;
mod target_age;

pub use illustration_style::IllustrationStyle;
pub use image_config::{ImageConfig, ImageModel, Quantization, MAX_SEED};
pub use target_age::TargetAge;
