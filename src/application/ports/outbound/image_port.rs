//! Image generation port - Text-to-image diffusion backends
//!
//! A backend hands out loaded models; a loaded model turns one request into
//! one image. Loading is separate because it is slow and the result is
//! cached by the image generator between requests.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::value_objects::{ImageModel, Quantization};

/// Parameters for a single image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub seed: u32,
    pub steps: u32,
    pub width: u32,
    pub height: u32,
}

/// Encoded image returned by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// PNG-encoded image data
    pub bytes: Vec<u8>,
}

impl GeneratedImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Write the image, creating parent directories as needed
    pub async fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, &self.bytes).await
    }
}

/// A diffusion model ready to produce images
#[async_trait]
pub trait DiffusionModel: Send + Sync {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage>;
}

/// Port for diffusion image backends
#[async_trait]
pub trait DiffusionBackend: Send + Sync {
    /// Human-readable backend name for logs and errors
    fn name(&self) -> &str;

    /// Fails with a descriptive message when this host cannot run the backend
    fn check_platform(&self) -> Result<()>;

    /// Fails with a descriptive message when the backend is not installed or reachable
    async fn check_available(&self) -> Result<()>;

    /// Load the weights for a model variant at the given quantization
    async fn load_model(
        &self,
        model: ImageModel,
        quantize: Quantization,
    ) -> Result<Arc<dyn DiffusionModel>>;
}
