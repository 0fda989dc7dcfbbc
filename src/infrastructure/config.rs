//! Application configuration

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::domain::value_objects::{
    IllustrationStyle, ImageConfig, ImageModel, Quantization, TargetAge,
};

/// Which text generator the engine talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Ollama,
    /// Canned replies, no model server needed
    Mock,
}

impl FromStr for LlmBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "mock" => Ok(Self::Mock),
            other => bail!("Unknown LLM_BACKEND '{}'. Must be 'ollama' or 'mock'.", other),
        }
    }
}

/// Application configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root directory holding one folder per story
    pub stories_dir: PathBuf,

    pub llm_backend: LlmBackend,
    /// Ollama API base URL (native API, not the OpenAI-compatible one)
    pub ollama_base_url: String,
    /// Default model for LLM requests
    pub ollama_model: String,
    pub llm_temperature: f32,

    /// ComfyUI server URL
    pub comfyui_base_url: String,
    /// Initial image generator settings
    pub image_config: ImageConfig,

    pub default_target_age: TargetAge,
    pub default_style: IllustrationStyle,

    /// HTTP server port
    pub server_port: u16,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let stories_dir = match var("STORYTELLER_STORIES_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("Storyteller")
                .join("stories"),
        };

        let image_model: ImageModel = var("IMAGE_MODEL")
            .unwrap_or_else(|| "schnell".to_string())
            .parse()
            .context("IMAGE_MODEL must be 'schnell' or 'dev'")?;
        let quantize_bits: u8 = var("IMAGE_QUANTIZE")
            .unwrap_or_else(|| "4".to_string())
            .parse()
            .context("IMAGE_QUANTIZE must be a number")?;
        let quantize = Quantization::try_from(quantize_bits).context("Invalid IMAGE_QUANTIZE")?;
        let steps: u32 = match var("IMAGE_STEPS") {
            Some(steps) => steps.parse().context("IMAGE_STEPS must be a number")?,
            None => image_model.default_steps(),
        };
        let width: u32 = var("IMAGE_WIDTH")
            .unwrap_or_else(|| "1024".to_string())
            .parse()
            .context("IMAGE_WIDTH must be a number")?;
        let height: u32 = var("IMAGE_HEIGHT")
            .unwrap_or_else(|| "1024".to_string())
            .parse()
            .context("IMAGE_HEIGHT must be a number")?;
        let seed: Option<u32> = var("IMAGE_SEED")
            .map(|seed| seed.parse())
            .transpose()
            .context("IMAGE_SEED must be a non-negative number")?;

        let image_config = ImageConfig::new(image_model, quantize, steps)
            .and_then(|config| config.with_dimensions(width, height))
            .context("Invalid image generation settings")?
            .with_seed(seed);

        Ok(Self {
            stories_dir,

            llm_backend: var("LLM_BACKEND")
                .unwrap_or_else(|| "ollama".to_string())
                .parse()?,
            ollama_base_url: var("OLLAMA_BASE_URL")
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            ollama_model: var("OLLAMA_MODEL").unwrap_or_else(|| "phi4".to_string()),
            llm_temperature: var("LLM_TEMPERATURE")
                .unwrap_or_else(|| "0.7".to_string())
                .parse()
                .context("LLM_TEMPERATURE must be a number")?,

            comfyui_base_url: var("COMFYUI_BASE_URL")
                .unwrap_or_else(|| "http://localhost:8188".to_string()),
            image_config,

            default_target_age: var("DEFAULT_TARGET_AGE")
                .unwrap_or_else(|| "5-8".to_string())
                .parse()
                .context("Invalid DEFAULT_TARGET_AGE")?,
            default_style: var("DEFAULT_STYLE")
                .unwrap_or_else(|| "storybook_classic".to_string())
                .parse()
                .context("Invalid DEFAULT_STYLE")?,

            server_port: var("SERVER_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
        })
    }
}
