//! Image generation configuration
//!
//! An [`ImageConfig`] can only be obtained through its validating
//! constructors, so every value in circulation satisfies the step range of
//! its model variant.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Largest seed accepted by the diffusion backend (signed 32-bit max)
pub const MAX_SEED: u32 = 2_147_483_647;

/// Diffusion model variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageModel {
    /// Fast variant, few inference steps
    #[default]
    Schnell,
    /// Quality variant, many inference steps
    Dev,
}

impl ImageModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schnell => "schnell",
            Self::Dev => "dev",
        }
    }

    /// Legal inference step counts for this variant
    pub fn steps_range(&self) -> RangeInclusive<u32> {
        match self {
            Self::Schnell => 2..=8,
            Self::Dev => 15..=30,
        }
    }

    pub fn default_steps(&self) -> u32 {
        match self {
            Self::Schnell => 4,
            Self::Dev => 20,
        }
    }
}

impl fmt::Display for ImageModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageModel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "schnell" => Ok(Self::Schnell),
            "dev" => Ok(Self::Dev),
            other => Err(DomainError::validation(format!(
                "Invalid model: {}. Must be 'schnell' or 'dev'.",
                other
            ))),
        }
    }
}

/// Bit depth of the model weights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Quantization {
    #[default]
    Q4,
    Q8,
}

impl Quantization {
    pub fn bits(&self) -> u8 {
        match self {
            Self::Q4 => 4,
            Self::Q8 => 8,
        }
    }
}

impl TryFrom<u8> for Quantization {
    type Error = DomainError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            4 => Ok(Self::Q4),
            8 => Ok(Self::Q8),
            other => Err(DomainError::validation(format!(
                "Invalid quantize: {}. Must be 4 or 8.",
                other
            ))),
        }
    }
}

impl From<Quantization> for u8 {
    fn from(q: Quantization) -> u8 {
        q.bits()
    }
}

impl fmt::Display for Quantization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

/// Validated settings for one image generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawImageConfig")]
pub struct ImageConfig {
    model: ImageModel,
    quantize: Quantization,
    steps: u32,
    width: u32,
    height: u32,
    seed: Option<u32>,
}

/// Unchecked wire form, validated on the way in
#[derive(Deserialize)]
struct RawImageConfig {
    model: ImageModel,
    quantize: Quantization,
    steps: u32,
    #[serde(default = "default_dimension")]
    width: u32,
    #[serde(default = "default_dimension")]
    height: u32,
    #[serde(default)]
    seed: Option<u32>,
}

fn default_dimension() -> u32 {
    1024
}

impl TryFrom<RawImageConfig> for ImageConfig {
    type Error = DomainError;

    fn try_from(raw: RawImageConfig) -> Result<Self, Self::Error> {
        Self::new(raw.model, raw.quantize, raw.steps)?
            .with_dimensions(raw.width, raw.height)
            .map(|config| config.with_seed(raw.seed))
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self::for_model(ImageModel::default(), Quantization::default())
    }
}

impl ImageConfig {
    /// Create a configuration, failing if `steps` is outside the model's range
    pub fn new(model: ImageModel, quantize: Quantization, steps: u32) -> Result<Self, DomainError> {
        let range = model.steps_range();
        if !range.contains(&steps) {
            return Err(DomainError::validation(format!(
                "Invalid steps for {}: {}. Must be {}-{}.",
                model,
                steps,
                range.start(),
                range.end()
            )));
        }

        Ok(Self {
            model,
            quantize,
            steps,
            width: default_dimension(),
            height: default_dimension(),
            seed: None,
        })
    }

    /// Create a configuration from unvalidated raw values
    pub fn parse(model: &str, quantize: u8, steps: u32) -> Result<Self, DomainError> {
        let model: ImageModel = model.parse()?;
        let quantize = Quantization::try_from(quantize)?;
        Self::new(model, quantize, steps)
    }

    /// Configuration with the recommended step count for `model`
    pub fn for_model(model: ImageModel, quantize: Quantization) -> Self {
        Self {
            model,
            quantize,
            steps: model.default_steps(),
            width: default_dimension(),
            height: default_dimension(),
            seed: None,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Result<Self, DomainError> {
        if width == 0 || height == 0 {
            return Err(DomainError::validation(format!(
                "Invalid dimensions: {}x{}. Width and height must be positive.",
                width, height
            )));
        }
        self.width = width;
        self.height = height;
        Ok(self)
    }

    pub fn with_seed(mut self, seed: Option<u32>) -> Self {
        self.seed = seed;
        self
    }

    pub fn model(&self) -> ImageModel {
        self.model
    }

    pub fn quantize(&self) -> Quantization {
        self.quantize
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn seed(&self) -> Option<u32> {
        self.seed
    }

    /// Whether switching from `self` to `other` requires reloading the model
    pub fn requires_reload(&self, other: &ImageConfig) -> bool {
        self.model != other.model || self.quantize != other.quantize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ImageConfig::default();
        assert_eq!(config.model(), ImageModel::Schnell);
        assert_eq!(config.quantize(), Quantization::Q4);
        assert_eq!(config.steps(), 4);
        assert_eq!((config.width(), config.height()), (1024, 1024));
        assert_eq!(config.seed(), None);
    }

    #[test]
    fn test_step_ranges_per_model() {
        for quantize in [4u8, 8] {
            for steps in 0..=40 {
                let schnell = ImageConfig::parse("schnell", quantize, steps);
                assert_eq!(schnell.is_ok(), (2..=8).contains(&steps), "schnell {}", steps);

                let dev = ImageConfig::parse("dev", quantize, steps);
                assert_eq!(dev.is_ok(), (15..=30).contains(&steps), "dev {}", steps);
            }
        }
    }

    #[test]
    fn test_invalid_model_and_quantize() {
        let err = ImageConfig::parse("turbo", 4, 4).unwrap_err();
        assert!(err.to_string().contains("Invalid model"));

        let err = ImageConfig::parse("schnell", 16, 4).unwrap_err();
        assert!(err.to_string().contains("Invalid quantize"));
    }

    #[test]
    fn test_step_error_names_the_model() {
        let err = ImageConfig::parse("dev", 8, 10).unwrap_err();
        assert!(err.to_string().contains("Invalid steps for dev"));
    }

    #[test]
    fn test_for_model_defaults() {
        let dev = ImageConfig::for_model(ImageModel::Dev, Quantization::Q8);
        assert_eq!(dev.steps(), 20);
        assert_eq!(dev.quantize().bits(), 8);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(ImageConfig::default().with_dimensions(0, 512).is_err());
        let config = ImageConfig::default().with_dimensions(768, 512).unwrap();
        assert_eq!(config.width(), 768);
    }

    #[test]
    fn test_requires_reload_only_for_model_or_quantize() {
        let base = ImageConfig::default();
        let more_steps = ImageConfig::parse("schnell", 4, 6).unwrap().with_seed(Some(7));
        assert!(!base.requires_reload(&more_steps));

        let eight_bit = ImageConfig::parse("schnell", 8, 4).unwrap();
        assert!(base.requires_reload(&eight_bit));
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: ImageConfig =
            serde_json::from_str(r#"{"model":"dev","quantize":8,"steps":25}"#).unwrap();
        assert_eq!(ok.steps(), 25);

        let bad = serde_json::from_str::<ImageConfig>(r#"{"model":"dev","quantize":8,"steps":4}"#);
        assert!(bad.is_err());

        let bad_bits =
            serde_json::from_str::<ImageConfig>(r#"{"model":"schnell","quantize":2,"steps":4}"#);
        assert!(bad_bits.is_err());
    }
}
