//! ComfyUI client for FLUX page illustrations

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::application::ports::outbound::{
    DiffusionBackend, DiffusionModel, GeneratedImage, ImageRequest,
};
use crate::domain::value_objects::{ImageModel, Quantization};

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const GENERATION_TIMEOUT: Duration = Duration::from_secs(600);

/// Client for ComfyUI API
#[derive(Clone)]
pub struct ComfyUIClient {
    client: Client,
    base_url: String,
}

impl ComfyUIClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Queue a workflow for execution
    pub async fn queue_prompt(
        &self,
        workflow: serde_json::Value,
    ) -> Result<QueueResponse, ComfyUIError> {
        let request = QueuePromptRequest {
            prompt: workflow,
            client_id: Uuid::new_v4().to_string(),
        };

        let response = self
            .client
            .post(format!("{}/prompt", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(ComfyUIError::ApiError(error_text));
        }

        let queue_response: QueueResponse = response.json().await?;
        Ok(queue_response)
    }

    /// Get the history of a prompt; empty until the prompt finishes
    pub async fn get_history(&self, prompt_id: &str) -> Result<HistoryResponse, ComfyUIError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.base_url, prompt_id))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(ComfyUIError::ApiError(error_text));
        }

        let history: HistoryResponse = response.json().await?;
        Ok(history)
    }

    /// Download a generated image
    pub async fn get_image(&self, image: &ImageOutput) -> Result<Vec<u8>, ComfyUIError> {
        let response = self
            .client
            .get(format!("{}/view", self.base_url))
            .query(&[
                ("filename", image.filename.as_str()),
                ("subfolder", image.subfolder.as_str()),
                ("type", image.r#type.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(ComfyUIError::ApiError(error_text));
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// Check if the server is available
    pub async fn health_check(&self) -> Result<bool, ComfyUIError> {
        let response = self
            .client
            .get(format!("{}/system_stats", self.base_url))
            .send()
            .await?;

        Ok(response.status().is_success())
    }

    /// GGUF UNet files the server can load
    pub async fn available_unets(&self) -> Result<Vec<String>, ComfyUIError> {
        let response = self
            .client
            .get(format!("{}/object_info/UnetLoaderGGUF", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(ComfyUIError::ApiError(error_text));
        }

        let info: serde_json::Value = response.json().await?;
        Ok(parse_unet_names(&info))
    }

    /// Wait for a queued prompt and return its first output image
    async fn wait_for_image(&self, prompt_id: &str) -> Result<ImageOutput, ComfyUIError> {
        let started = Instant::now();

        loop {
            let mut history = self.get_history(prompt_id).await?;
            if let Some(entry) = history.prompts.remove(prompt_id) {
                if entry.status.status_str == "error" {
                    return Err(ComfyUIError::ApiError(format!(
                        "Workflow {} failed on the server",
                        prompt_id
                    )));
                }
                if entry.status.completed {
                    return entry
                        .outputs
                        .into_values()
                        .filter_map(|output| output.images)
                        .flatten()
                        .next()
                        .ok_or_else(|| {
                            ComfyUIError::ApiError("Workflow finished without an image".to_string())
                        });
                }
            }

            if started.elapsed() >= GENERATION_TIMEOUT {
                return Err(ComfyUIError::Timeout(GENERATION_TIMEOUT.as_secs()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ComfyUIError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Timed out after {0}s waiting for ComfyUI")]
    Timeout(u64),
}

#[derive(Debug, Serialize)]
struct QueuePromptRequest {
    prompt: serde_json::Value,
    client_id: String,
}

#[derive(Debug, Deserialize)]
pub struct QueueResponse {
    pub prompt_id: String,
    pub number: u32,
}

#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    #[serde(flatten)]
    pub prompts: HashMap<String, PromptHistory>,
}

#[derive(Debug, Deserialize)]
pub struct PromptHistory {
    pub outputs: HashMap<String, NodeOutput>,
    pub status: PromptStatus,
}

#[derive(Debug, Deserialize)]
pub struct NodeOutput {
    pub images: Option<Vec<ImageOutput>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageOutput {
    pub filename: String,
    pub subfolder: String,
    pub r#type: String,
}

#[derive(Debug, Deserialize)]
pub struct PromptStatus {
    pub status_str: String,
    pub completed: bool,
}

fn parse_unet_names(info: &serde_json::Value) -> Vec<String> {
    info["UnetLoaderGGUF"]["input"]["required"]["unet_name"][0]
        .as_array()
        .map(|names| {
            names
                .iter()
                .filter_map(|name| name.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Model files making up one FLUX variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FluxCheckpoint {
    pub unet: String,
    pub clip_l: String,
    pub t5xxl: String,
    pub vae: String,
}

impl FluxCheckpoint {
    pub fn resolve(model: ImageModel, quantize: Quantization) -> Self {
        let variant = match model {
            ImageModel::Schnell => "schnell",
            ImageModel::Dev => "dev",
        };
        let (unet_quant, t5xxl) = match quantize {
            Quantization::Q4 => ("Q4_K_S", "t5xxl_fp8_e4m3fn.safetensors"),
            Quantization::Q8 => ("Q8_0", "t5xxl_fp16.safetensors"),
        };

        Self {
            unet: format!("flux1-{}-{}.gguf", variant, unet_quant),
            clip_l: "clip_l.safetensors".to_string(),
            t5xxl: t5xxl.to_string(),
            vae: "ae.safetensors".to_string(),
        }
    }
}

/// Text-to-image FLUX workflow in ComfyUI's API format
pub fn build_flux_workflow(
    checkpoint: &FluxCheckpoint,
    request: &ImageRequest,
) -> serde_json::Value {
    json!({
        "1": {
            "class_type": "UnetLoaderGGUF",
            "inputs": { "unet_name": checkpoint.unet }
        },
        "2": {
            "class_type": "DualCLIPLoader",
            "inputs": {
                "clip_name1": checkpoint.t5xxl,
                "clip_name2": checkpoint.clip_l,
                "type": "flux"
            }
        },
        "3": {
            "class_type": "VAELoader",
            "inputs": { "vae_name": checkpoint.vae }
        },
        "4": {
            "class_type": "CLIPTextEncode",
            "inputs": { "text": request.prompt, "clip": ["2", 0] }
        },
        "5": {
            "class_type": "CLIPTextEncode",
            "inputs": { "text": "", "clip": ["2", 0] }
        },
        "6": {
            "class_type": "EmptySD3LatentImage",
            "inputs": { "width": request.width, "height": request.height, "batch_size": 1 }
        },
        "7": {
            "class_type": "KSampler",
            "inputs": {
                "model": ["1", 0],
                "positive": ["4", 0],
                "negative": ["5", 0],
                "latent_image": ["6", 0],
                "seed": request.seed,
                "steps": request.steps,
                "cfg": 1.0,
                "sampler_name": "euler",
                "scheduler": "simple",
                "denoise": 1.0
            }
        },
        "8": {
            "class_type": "VAEDecode",
            "inputs": { "samples": ["7", 0], "vae": ["3", 0] }
        },
        "9": {
            "class_type": "SaveImage",
            "inputs": { "images": ["8", 0], "filename_prefix": "storyteller" }
        }
    })
}

/// A FLUX variant served by ComfyUI
pub struct ComfyUIFluxModel {
    client: ComfyUIClient,
    checkpoint: FluxCheckpoint,
}

#[async_trait]
impl DiffusionModel for ComfyUIFluxModel {
    #[instrument(skip(self, request), fields(unet = %self.checkpoint.unet, seed = request.seed))]
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage> {
        let workflow = build_flux_workflow(&self.checkpoint, request);
        let queued = self
            .client
            .queue_prompt(workflow)
            .await
            .context("Failed to queue workflow")?;
        debug!(prompt_id = %queued.prompt_id, "Workflow queued");

        let image = self.client.wait_for_image(&queued.prompt_id).await?;
        let bytes = self.client.get_image(&image).await?;
        Ok(GeneratedImage::new(bytes))
    }
}

#[async_trait]
impl DiffusionBackend for ComfyUIClient {
    fn name(&self) -> &str {
        "ComfyUI"
    }

    fn check_platform(&self) -> Result<()> {
        // The server does the GPU work, so any host can drive it
        Ok(())
    }

    async fn check_available(&self) -> Result<()> {
        match self.health_check().await {
            Ok(true) => Ok(()),
            Ok(false) => bail!("ComfyUI at {} is not healthy", self.base_url),
            Err(e) => bail!(
                "ComfyUI is not reachable at {}: {}. Start the ComfyUI server and try again.",
                self.base_url,
                e
            ),
        }
    }

    async fn load_model(
        &self,
        model: ImageModel,
        quantize: Quantization,
    ) -> Result<Arc<dyn DiffusionModel>> {
        let checkpoint = FluxCheckpoint::resolve(model, quantize);
        let unets = self
            .available_unets()
            .await
            .context("ComfyUI-GGUF nodes are not installed on the server")?;
        if !unets.contains(&checkpoint.unet) {
            bail!(
                "Model file {} not found in ComfyUI's unet folder",
                checkpoint.unet
            );
        }

        info!(unet = %checkpoint.unet, "FLUX checkpoint available");
        Ok(Arc::new(ComfyUIFluxModel {
            client: self.clone(),
            checkpoint,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ImageRequest {
        ImageRequest {
            prompt: "a fox in a meadow".to_string(),
            seed: 42,
            steps: 4,
            width: 1024,
            height: 768,
        }
    }

    #[test]
    fn test_checkpoint_resolution() {
        let schnell = FluxCheckpoint::resolve(ImageModel::Schnell, Quantization::Q4);
        assert_eq!(schnell.unet, "flux1-schnell-Q4_K_S.gguf");
        assert_eq!(schnell.t5xxl, "t5xxl_fp8_e4m3fn.safetensors");

        let dev = FluxCheckpoint::resolve(ImageModel::Dev, Quantization::Q8);
        assert_eq!(dev.unet, "flux1-dev-Q8_0.gguf");
        assert_eq!(dev.t5xxl, "t5xxl_fp16.safetensors");
    }

    #[test]
    fn test_workflow_carries_request() {
        let checkpoint = FluxCheckpoint::resolve(ImageModel::Schnell, Quantization::Q4);
        let workflow = build_flux_workflow(&checkpoint, &request());

        assert_eq!(workflow["1"]["inputs"]["unet_name"], "flux1-schnell-Q4_K_S.gguf");
        assert_eq!(workflow["4"]["inputs"]["text"], "a fox in a meadow");
        assert_eq!(workflow["6"]["inputs"]["width"], 1024);
        assert_eq!(workflow["6"]["inputs"]["height"], 768);
        assert_eq!(workflow["7"]["inputs"]["seed"], 42);
        assert_eq!(workflow["7"]["inputs"]["steps"], 4);
        assert_eq!(workflow["9"]["class_type"], "SaveImage");
    }

    #[test]
    fn test_parse_history() {
        let history: HistoryResponse = serde_json::from_str(
            r#"{"abc": {
                "outputs": {"9": {"images": [{"filename": "storyteller_00001_.png", "subfolder": "", "type": "output"}]}},
                "status": {"status_str": "success", "completed": true, "messages": []}
            }}"#,
        )
        .unwrap();

        let entry = &history.prompts["abc"];
        assert!(entry.status.completed);
        let images = entry.outputs["9"].images.as_ref().unwrap();
        assert_eq!(images[0].filename, "storyteller_00001_.png");
    }

    #[test]
    fn test_parse_unet_names() {
        let info = json!({
            "UnetLoaderGGUF": {
                "input": {"required": {"unet_name": [["flux1-schnell-Q4_K_S.gguf", "flux1-dev-Q8_0.gguf"]]}}
            }
        });
        assert_eq!(
            parse_unet_names(&info),
            vec!["flux1-schnell-Q4_K_S.gguf", "flux1-dev-Q8_0.gguf"]
        );
        assert!(parse_unet_names(&json!({})).is_empty());
    }
}
