//! Image Generation Service - Orchestrates text-to-image generation
//!
//! The [`ImageGenerator`] owns one lazily loaded diffusion model and turns a
//! prompt into an image file. It handles:
//!
//! - Platform and backend availability checks
//! - Refusing to write into system directories
//! - Loading and caching the model per (variant, quantization)
//! - Cooperative cancellation between stages
//! - Coarse progress reporting
//!
//! [`ImageGenerator::generate`] never returns an error. Every failure is
//! folded into a [`GenerationResult`] carrying the message and elapsed time.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::application::ports::outbound::{DiffusionBackend, DiffusionModel, ImageRequest};
use crate::domain::value_objects::{ImageConfig, ImageModel, Quantization, MAX_SEED};

/// Roots that generated images must never be written under
pub const RESERVED_DIRECTORIES: &[&str] = &[
    "/etc",
    "/var",
    "/usr",
    "/bin",
    "/sbin",
    "/boot",
    "/dev",
    "/proc",
    "/sys",
    "/System",
    "/Library",
    "/private/etc",
    "/private/var",
];

/// Progress snapshot passed to a [`ProgressCallback`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationProgress {
    pub current_step: u32,
    pub total_steps: u32,
    /// Fraction complete, 0.0 to 1.0
    pub progress: f32,
    pub status: String,
}

impl Default for GenerationProgress {
    fn default() -> Self {
        Self {
            current_step: 0,
            total_steps: 1,
            progress: 0.0,
            status: "Initializing...".to_string(),
        }
    }
}

impl GenerationProgress {
    fn stage(status: &str, progress: f32, current_step: u32, total_steps: u32) -> Self {
        Self {
            current_step,
            total_steps,
            progress,
            status: status.to_string(),
        }
    }
}

pub type ProgressCallback = Arc<dyn Fn(GenerationProgress) + Send + Sync>;

/// Outcome of one generation request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    pub success: bool,
    pub image_path: Option<PathBuf>,
    /// Wall-clock seconds from request to result
    pub generation_time: f64,
    pub error: Option<String>,
    pub seed_used: Option<u32>,
}

impl GenerationResult {
    fn succeeded(image_path: PathBuf, elapsed: Duration, seed: u32) -> Self {
        Self {
            success: true,
            image_path: Some(image_path),
            generation_time: elapsed.as_secs_f64(),
            error: None,
            seed_used: Some(seed),
        }
    }

    pub fn failure(error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            success: false,
            image_path: None,
            generation_time: elapsed.as_secs_f64(),
            error: Some(error.into()),
            seed_used: None,
        }
    }
}

/// Lifecycle of a generator's model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorState {
    #[default]
    Unloaded,
    Loading,
    Ready,
    Generating,
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("{0}")]
    PlatformUnsupported(String),
    #[error("{0}")]
    BackendUnavailable(String),
    #[error("Cannot write to system directory: {}", .0.display())]
    SystemDirectory(PathBuf),
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
    #[error("Image generation failed: {0}")]
    Backend(String),
    #[error("Failed to save image: {0}")]
    Save(#[from] std::io::Error),
    #[error("Generation cancelled")]
    Cancelled,
}

/// Fold `..` and `.` without touching the filesystem
fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Follow symlinks through the deepest existing ancestor of `path`
///
/// Components below that ancestor do not exist yet and are appended as-is.
fn resolve_existing(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = std::fs::canonicalize(existing) {
            return missing
                .iter()
                .rev()
                .fold(canonical, |resolved, name| resolved.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

fn is_reserved(path: &Path) -> bool {
    RESERVED_DIRECTORIES
        .iter()
        .any(|reserved| path.starts_with(reserved))
}

/// A temp root is only exempt when it sits strictly inside a reserved root
fn exempt_temp_root(root: PathBuf) -> Option<PathBuf> {
    RESERVED_DIRECTORIES
        .iter()
        .any(|reserved| root.starts_with(reserved) && root.as_path() != Path::new(reserved))
        .then_some(root)
}

/// Reject output paths inside a reserved system directory
///
/// Returns the normalized path. The process temp directory is allowed
/// when it is nested below a reserved root, as on macOS where it lives
/// under `/var`.
pub fn validate_output_path(path: &Path) -> Result<PathBuf, GenerationError> {
    check_output_path(path, &std::env::temp_dir())
}

fn check_output_path(path: &Path, temp_dir: &Path) -> Result<PathBuf, GenerationError> {
    let normalized = normalize_path(path);
    let resolved = resolve_existing(&normalized);

    let temp = normalize_path(temp_dir);
    let temp_roots: Vec<PathBuf> = [resolve_existing(&temp), temp]
        .into_iter()
        .filter_map(exempt_temp_root)
        .collect();

    let blocked = [&normalized, &resolved].into_iter().any(|candidate| {
        is_reserved(candidate) && !temp_roots.iter().any(|root| candidate.starts_with(root))
    });
    if blocked {
        return Err(GenerationError::SystemDirectory(normalized));
    }

    Ok(normalized)
}

/// The configured seed, or one derived from the clock
pub fn resolve_seed(configured: Option<u32>) -> u32 {
    configured.unwrap_or_else(|| {
        // rem_euclid keeps the result in 0..MAX_SEED, which always fits u32
        Utc::now().timestamp_millis().rem_euclid(i64::from(MAX_SEED)) as u32
    })
}

struct LoadedModel {
    model: ImageModel,
    quantize: Quantization,
    handle: Arc<dyn DiffusionModel>,
}

fn report(progress: Option<&ProgressCallback>, update: GenerationProgress) {
    if let Some(callback) = progress {
        callback(update);
    }
}

/// Generates images with a lazily loaded, cached diffusion model
pub struct ImageGenerator {
    backend: Arc<dyn DiffusionBackend>,
    config: RwLock<ImageConfig>,
    model: tokio::sync::Mutex<Option<LoadedModel>>,
    cancel_requested: AtomicBool,
    state: Mutex<GeneratorState>,
}

impl ImageGenerator {
    pub fn new(backend: Arc<dyn DiffusionBackend>, config: ImageConfig) -> Self {
        Self {
            backend,
            config: RwLock::new(config),
            model: tokio::sync::Mutex::new(None),
            cancel_requested: AtomicBool::new(false),
            state: Mutex::new(GeneratorState::Unloaded),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn config(&self) -> ImageConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> GeneratorState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: GeneratorState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Replace the configuration
    ///
    /// A different model variant or quantization drops the cached model so
    /// the next generation reloads it. Steps, dimensions and seed apply to
    /// the next generation without a reload.
    pub fn update_config(&self, config: ImageConfig) {
        let reload = {
            let mut current = self.config.write().unwrap_or_else(PoisonError::into_inner);
            let reload = current.requires_reload(&config);
            *current = config;
            reload
        };

        if reload {
            // A load in progress holds the lock; its result is keyed by
            // variant and quantization and will be replaced on next use.
            if let Ok(mut cached) = self.model.try_lock() {
                *cached = None;
                self.set_state(GeneratorState::Unloaded);
            }
            info!("Model cache invalidated due to config change");
        }
    }

    /// Request cancellation of the current generation
    ///
    /// Best-effort: observed only between stages, never during inference.
    pub fn cancel(&self) {
        self.cancel_requested.store(true, Ordering::Relaxed);
        info!("Cancellation requested");
    }

    fn check_cancelled(&self) -> Result<(), GenerationError> {
        if self.cancel_requested.load(Ordering::Relaxed) {
            self.set_state(GeneratorState::Cancelled);
            return Err(GenerationError::Cancelled);
        }
        Ok(())
    }

    /// Generate an image from `prompt` and save it to `output_path`
    #[instrument(
        skip(self, prompt, output_path, progress),
        fields(output = %output_path.display())
    )]
    pub async fn generate(
        &self,
        prompt: &str,
        output_path: &Path,
        progress: Option<ProgressCallback>,
    ) -> GenerationResult {
        self.cancel_requested.store(false, Ordering::Relaxed);
        let start = Instant::now();

        match self.run(prompt, output_path, progress.as_ref(), start).await {
            Ok(result) => result,
            Err(GenerationError::Cancelled) => {
                info!("Generation cancelled");
                GenerationResult::failure(GenerationError::Cancelled.to_string(), start.elapsed())
            }
            Err(e) => {
                error!("Generation failed: {}", e);
                GenerationResult::failure(e.to_string(), start.elapsed())
            }
        }
    }

    /// Run [`generate`](Self::generate) on its own task
    pub fn spawn_generate(
        self: &Arc<Self>,
        prompt: String,
        output_path: PathBuf,
        progress: Option<ProgressCallback>,
    ) -> JoinHandle<GenerationResult> {
        let generator = Arc::clone(self);
        tokio::spawn(async move { generator.generate(&prompt, &output_path, progress).await })
    }

    async fn run(
        &self,
        prompt: &str,
        output_path: &Path,
        progress: Option<&ProgressCallback>,
        start: Instant,
    ) -> Result<GenerationResult, GenerationError> {
        self.backend
            .check_platform()
            .map_err(|e| GenerationError::PlatformUnsupported(format!("{:#}", e)))?;
        self.backend
            .check_available()
            .await
            .map_err(|e| GenerationError::BackendUnavailable(format!("{:#}", e)))?;

        let output_path = validate_output_path(output_path)?;
        let config = self.config();

        let model = self.ensure_model(&config, progress).await?;
        self.check_cancelled()?;

        let seed = resolve_seed(config.seed());
        report(
            progress,
            GenerationProgress::stage("Generating image...", 0.1, 0, config.steps()),
        );

        info!(seed, steps = config.steps(), "Generating image");
        debug!("Prompt: {}", prompt.chars().take(100).collect::<String>());

        self.set_state(GeneratorState::Generating);
        let request = ImageRequest {
            prompt: prompt.to_string(),
            seed,
            steps: config.steps(),
            width: config.width(),
            height: config.height(),
        };
        let image = model.generate_image(&request).await.map_err(|e| {
            self.set_state(GeneratorState::Ready);
            GenerationError::Backend(format!("{:#}", e))
        })?;

        self.check_cancelled()?;

        report(
            progress,
            GenerationProgress::stage("Saving image...", 0.95, config.steps(), config.steps()),
        );
        let saved = image.save(&output_path).await;
        self.set_state(GeneratorState::Ready);
        saved?;

        let elapsed = start.elapsed();
        info!(
            "Image generated in {:.1}s: {}",
            elapsed.as_secs_f64(),
            output_path.display()
        );

        report(
            progress,
            GenerationProgress::stage("Complete", 1.0, config.steps(), config.steps()),
        );

        Ok(GenerationResult::succeeded(output_path, elapsed, seed))
    }

    /// Return the cached model for `config`, loading it if needed
    async fn ensure_model(
        &self,
        config: &ImageConfig,
        progress: Option<&ProgressCallback>,
    ) -> Result<Arc<dyn DiffusionModel>, GenerationError> {
        let mut cached = self.model.lock().await;

        if let Some(loaded) = cached.as_ref() {
            if loaded.model == config.model() && loaded.quantize == config.quantize() {
                return Ok(Arc::clone(&loaded.handle));
            }
        }

        self.check_cancelled()?;

        *cached = None;
        self.set_state(GeneratorState::Loading);
        report(
            progress,
            GenerationProgress::stage("Loading model...", 0.05, 0, 1),
        );
        info!(
            "Loading FLUX.1-{} ({} quantization) via {}",
            config.model(),
            config.quantize(),
            self.backend.name()
        );

        match self.backend.load_model(config.model(), config.quantize()).await {
            Ok(handle) => {
                *cached = Some(LoadedModel {
                    model: config.model(),
                    quantize: config.quantize(),
                    handle: Arc::clone(&handle),
                });
                self.set_state(GeneratorState::Ready);
                info!("Model loaded successfully");
                Ok(handle)
            }
            Err(e) => {
                self.set_state(GeneratorState::Unloaded);
                warn!("Failed to load model: {:#}", e);
                Err(GenerationError::ModelLoad(format!("{:#}", e)))
            }
        }
    }
}

/// Process-wide holder of the shared [`ImageGenerator`]
///
/// The first call to [`get_generator`](Self::get_generator) creates the
/// generator; later calls return the same instance, applying a supplied
/// configuration to it.
pub struct GeneratorRegistry {
    backend: Arc<dyn DiffusionBackend>,
    generator: OnceLock<Arc<ImageGenerator>>,
}

impl GeneratorRegistry {
    pub fn new(backend: Arc<dyn DiffusionBackend>) -> Self {
        Self {
            backend,
            generator: OnceLock::new(),
        }
    }

    pub fn get_generator(&self, config: Option<ImageConfig>) -> Arc<ImageGenerator> {
        let mut created = false;
        let generator = self.generator.get_or_init(|| {
            created = true;
            Arc::new(ImageGenerator::new(
                Arc::clone(&self.backend),
                config.clone().unwrap_or_default(),
            ))
        });

        if !created {
            if let Some(config) = config {
                generator.update_config(config);
            }
        }

        Arc::clone(generator)
    }

    /// The generator, if one has been created
    pub fn current(&self) -> Option<Arc<ImageGenerator>> {
        self.generator.get().cloned()
    }
}
