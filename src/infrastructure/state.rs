//! Shared application state

use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::application::ports::outbound::{DiffusionBackend, GenerationOptions, TextGenerator};
use crate::application::services::{
    GenerationProgress, GenerationResult, GeneratorRegistry, ImageGenerator, StoryEngine,
};
use crate::infrastructure::comfyui::ComfyUIClient;
use crate::infrastructure::config::{AppConfig, LlmBackend};
use crate::infrastructure::mock_llm::MockTextGenerator;
use crate::infrastructure::ollama::OllamaClient;
use crate::infrastructure::persistence::FileStoryRepository;

pub type SharedStoryEngine = StoryEngine<Arc<dyn TextGenerator>>;

/// Latest illustration request as seen by the status endpoint
#[derive(Debug, Clone, Default, Serialize)]
pub struct IllustrationStatus {
    pub slug: Option<String>,
    pub page_number: Option<u32>,
    pub running: bool,
    pub progress: GenerationProgress,
    pub result: Option<GenerationResult>,
}

/// Shared application state
pub struct AppState {
    pub config: AppConfig,
    pub repository: FileStoryRepository,
    /// Conversation engine; one conversation per server
    pub engine: Mutex<SharedStoryEngine>,
    /// Present when the engine talks to Ollama, for model listing and switching
    pub ollama: Option<Arc<OllamaClient>>,
    pub generators: GeneratorRegistry,
    illustration: RwLock<IllustrationStatus>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let ollama = match config.llm_backend {
            LlmBackend::Ollama => Some(Arc::new(OllamaClient::new(
                &config.ollama_base_url,
                &config.ollama_model,
            ))),
            LlmBackend::Mock => None,
        };
        let text_generator: Arc<dyn TextGenerator> = match &ollama {
            Some(client) => Arc::clone(client) as Arc<dyn TextGenerator>,
            None => Arc::new(MockTextGenerator::default()),
        };

        let backend = Arc::new(ComfyUIClient::new(&config.comfyui_base_url));

        let state = Self::with_backends(config, text_generator, backend);
        let state = Self { ollama, ..state };

        let stories_dir = state
            .repository
            .get_stories_directory()
            .await
            .context("Failed to create stories directory")?;
        info!("Stories directory: {}", stories_dir.display());

        Ok(state)
    }

    /// Assemble state around explicit text and image backends
    pub fn with_backends(
        config: AppConfig,
        text_generator: Arc<dyn TextGenerator>,
        diffusion_backend: Arc<dyn DiffusionBackend>,
    ) -> Self {
        let options = GenerationOptions::default().with_temperature(config.llm_temperature);
        let engine = StoryEngine::new(
            text_generator,
            config.default_target_age,
            config.default_style,
        )
        .with_options(options);

        Self {
            repository: FileStoryRepository::new(config.stories_dir.clone()),
            engine: Mutex::new(engine),
            ollama: None,
            generators: GeneratorRegistry::new(diffusion_backend),
            illustration: RwLock::new(IllustrationStatus::default()),
            config,
        }
    }

    /// The shared image generator, created from the configured settings on first use
    pub fn image_generator(&self) -> Arc<ImageGenerator> {
        match self.generators.current() {
            Some(generator) => generator,
            None => self
                .generators
                .get_generator(Some(self.config.image_config.clone())),
        }
    }

    pub fn illustration_status(&self) -> IllustrationStatus {
        self.illustration
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn update_illustration_status<F, R>(&self, update: F) -> R
    where
        F: FnOnce(&mut IllustrationStatus) -> R,
    {
        let mut status = self.illustration.write().unwrap_or_else(|e| e.into_inner());
        update(&mut status)
    }
}
