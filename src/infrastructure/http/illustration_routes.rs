//! Page illustration API routes

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{error, info, warn};

use crate::application::dto::{GenerateIllustrationRequestDto, ImageGeneratorResponseDto};
use crate::application::ports::outbound::StoryRepositoryPort;
use crate::application::services::prompts::{
    build_illustration_prompt_simple, character_traits_for_page,
};
use crate::application::services::{
    GenerationProgress, GenerationResult, ImageGenerator, ProgressCallback,
};
use crate::domain::entities::PageUpdate;
use crate::domain::value_objects::ImageConfig;
use crate::infrastructure::persistence::get_page_illustration_path;
use crate::infrastructure::state::{AppState, IllustrationStatus};

use super::story_routes::load_story;
use super::{domain_error, persistence_error, ApiError};

fn generator_info(generator: &ImageGenerator) -> ImageGeneratorResponseDto {
    ImageGeneratorResponseDto {
        backend: generator.backend_name().to_string(),
        state: generator.state(),
        config: generator.config(),
    }
}

/// Start illustrating a page in the background
///
/// Returns immediately; progress and the outcome are reported by the
/// status endpoint. Only one illustration runs at a time.
pub async fn generate_illustration(
    State(state): State<Arc<AppState>>,
    Path((slug, page_number)): Path<(String, u32)>,
    Json(req): Json<GenerateIllustrationRequestDto>,
) -> Result<(StatusCode, Json<IllustrationStatus>), ApiError> {
    let (_, story) = load_story(&state, &slug).await?;
    let page = story
        .get_page(page_number)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Page {} not found", page_number)))?;

    // The page keeps the unstyled scene so regenerating styles it exactly once
    let scene = match req.prompt.filter(|p| !p.trim().is_empty()) {
        Some(prompt) => prompt,
        None if page.illustration_prompt.trim().is_empty() => page.text.clone(),
        None => page.illustration_prompt.clone(),
    };
    if scene.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Page {} has no text to illustrate", page_number),
        ));
    }
    let traits = character_traits_for_page(&page.text, story.characters());
    let prompt = build_illustration_prompt_simple(&scene, &traits, story.metadata().style);

    let output_path = get_page_illustration_path(&story, page_number).map_err(persistence_error)?;

    let started = state.update_illustration_status(|status| {
        if status.running {
            return false;
        }
        *status = IllustrationStatus {
            slug: Some(slug.clone()),
            page_number: Some(page_number),
            running: true,
            ..IllustrationStatus::default()
        };
        true
    });
    if !started {
        return Err((
            StatusCode::CONFLICT,
            "An illustration is already being generated".to_string(),
        ));
    }

    let generator = state.image_generator();
    if let Some(config) = req.config {
        generator.update_config(config);
    }

    let progress: ProgressCallback = {
        let state = Arc::clone(&state);
        Arc::new(move |progress: GenerationProgress| {
            state.update_illustration_status(|status| status.progress = progress)
        })
    };

    info!(slug = %slug, page = page_number, "Starting illustration");
    let handle = generator.spawn_generate(prompt, output_path, Some(progress));

    let job_state = Arc::clone(&state);
    tokio::spawn(async move {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => GenerationResult::failure(
                format!("Generation task failed: {}", e),
                Duration::ZERO,
            ),
        };

        if let Some(image_path) = result.image_path.as_ref().filter(|_| result.success) {
            if let Err((_, message)) =
                record_illustration(&job_state, &slug, page_number, &scene, image_path).await
            {
                error!("Failed to record illustration for page {}: {}", page_number, message);
            }
        } else if let Some(message) = &result.error {
            warn!("Illustration for page {} failed: {}", page_number, message);
        }

        job_state.update_illustration_status(|status| {
            status.running = false;
            status.result = Some(result);
        });
    });

    Ok((StatusCode::ACCEPTED, Json(state.illustration_status())))
}

/// Point the page at its new image, re-reading the story to keep concurrent edits
async fn record_illustration(
    state: &AppState,
    slug: &str,
    page_number: u32,
    scene: &str,
    image_path: &std::path::Path,
) -> Result<(), ApiError> {
    let (project_path, story) = load_story(state, slug).await?;
    let story = story
        .update_page(page_number, &PageUpdate::illustration(scene, image_path))
        .map_err(domain_error)?;
    state
        .repository
        .save(&story, Some(&project_path))
        .await
        .map_err(persistence_error)?;
    Ok(())
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<IllustrationStatus> {
    Json(state.illustration_status())
}

/// Ask the running generation to stop at its next checkpoint
pub async fn cancel_generation(State(state): State<Arc<AppState>>) -> StatusCode {
    match state.generators.current() {
        Some(generator) => {
            generator.cancel();
            StatusCode::ACCEPTED
        }
        None => StatusCode::NO_CONTENT,
    }
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<ImageGeneratorResponseDto> {
    Json(generator_info(&state.image_generator()))
}

pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(config): Json<ImageConfig>,
) -> Json<ImageGeneratorResponseDto> {
    let generator = state.image_generator();
    generator.update_config(config);
    Json(generator_info(&generator))
}
