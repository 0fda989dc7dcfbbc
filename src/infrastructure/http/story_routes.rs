//! Story project API routes

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::{
    AddPageRequestDto, CharacterDto, CreateStoryRequestDto, StoryResponseDto,
    StorySummaryResponseDto, UpdateMetadataRequestDto, UpdatePageRequestDto,
};
use crate::application::ports::outbound::StoryRepositoryPort;
use crate::application::services::prompts::{list_styles as style_presets, StylePreset};
use crate::domain::entities::{
    create_character, create_page, create_story as new_story, MetadataUpdate, PageUpdate, Story,
};
use crate::infrastructure::state::AppState;

use super::{domain_error, persistence_error, ApiError};

/// Resolve a slug and load the story stored there
pub(super) async fn load_story(state: &AppState, slug: &str) -> Result<(PathBuf, Story), ApiError> {
    let project_path = state
        .repository
        .project_path_for_slug(slug)
        .map_err(persistence_error)?;
    let story = state
        .repository
        .load(&project_path)
        .await
        .map_err(persistence_error)?;
    Ok((project_path, story))
}

async fn save_in_place(
    state: &AppState,
    story: &Story,
    project_path: &std::path::Path,
) -> Result<Json<StoryResponseDto>, ApiError> {
    let saved = state
        .repository
        .save(story, Some(project_path))
        .await
        .map_err(persistence_error)?;
    Ok(Json(StoryResponseDto::from(&saved)))
}

/// List saved stories, most recently modified first
pub async fn list_stories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StorySummaryResponseDto>>, ApiError> {
    let summaries = state.repository.list().await.map_err(persistence_error)?;
    Ok(Json(
        summaries.iter().map(StorySummaryResponseDto::from).collect(),
    ))
}

/// Create and save a new story
pub async fn create_story(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateStoryRequestDto>,
) -> Result<(StatusCode, Json<StoryResponseDto>), ApiError> {
    let story = new_story(
        &req.title,
        &req.author,
        req.target_age.unwrap_or(state.config.default_target_age),
        req.style.unwrap_or(state.config.default_style),
    );

    let saved = state
        .repository
        .save(&story, None)
        .await
        .map_err(persistence_error)?;

    Ok((StatusCode::CREATED, Json(StoryResponseDto::from(&saved))))
}

pub async fn get_story(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<StoryResponseDto>, ApiError> {
    let (_, story) = load_story(&state, &slug).await?;
    Ok(Json(StoryResponseDto::from(&story)))
}

pub async fn delete_story(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<StatusCode, ApiError> {
    let project_path = state
        .repository
        .project_path_for_slug(&slug)
        .map_err(persistence_error)?;
    state
        .repository
        .delete(&project_path)
        .await
        .map_err(persistence_error)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_metadata(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Json(req): Json<UpdateMetadataRequestDto>,
) -> Result<Json<StoryResponseDto>, ApiError> {
    let (project_path, story) = load_story(&state, &slug).await?;
    let story = story.with_metadata(&MetadataUpdate::from(req));
    save_in_place(&state, &story, &project_path).await
}

pub async fn add_character(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Json(req): Json<CharacterDto>,
) -> Result<(StatusCode, Json<StoryResponseDto>), ApiError> {
    if req.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Character name is required".to_string()));
    }

    let (project_path, story) = load_story(&state, &slug).await?;
    let character = create_character(&req.name, &req.description, Some(req.visual_traits));
    let response = save_in_place(&state, &story.add_character(character), &project_path).await?;

    Ok((StatusCode::CREATED, response))
}

pub async fn remove_character(
    State(state): State<Arc<AppState>>,
    Path((slug, name)): Path<(String, String)>,
) -> Result<Json<StoryResponseDto>, ApiError> {
    let (project_path, story) = load_story(&state, &slug).await?;
    if story.get_character(&name).is_none() {
        return Err((StatusCode::NOT_FOUND, format!("Character '{}' not found", name)));
    }
    save_in_place(&state, &story.remove_character(&name), &project_path).await
}

pub async fn add_page(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Json(req): Json<AddPageRequestDto>,
) -> Result<(StatusCode, Json<StoryResponseDto>), ApiError> {
    let (project_path, story) = load_story(&state, &slug).await?;
    let page = create_page(req.page_number, &req.text, &req.illustration_prompt);
    let response = save_in_place(&state, &story.add_page(page), &project_path).await?;

    Ok((StatusCode::CREATED, response))
}

pub async fn update_page(
    State(state): State<Arc<AppState>>,
    Path((slug, page_number)): Path<(String, u32)>,
    Json(req): Json<UpdatePageRequestDto>,
) -> Result<Json<StoryResponseDto>, ApiError> {
    let (project_path, story) = load_story(&state, &slug).await?;
    let story = story
        .update_page(page_number, &PageUpdate::from(req))
        .map_err(domain_error)?;
    save_in_place(&state, &story, &project_path).await
}

pub async fn remove_page(
    State(state): State<Arc<AppState>>,
    Path((slug, page_number)): Path<(String, u32)>,
) -> Result<Json<StoryResponseDto>, ApiError> {
    let (project_path, story) = load_story(&state, &slug).await?;
    if story.get_page(page_number).is_none() {
        return Err((StatusCode::NOT_FOUND, format!("Page {} not found", page_number)));
    }
    save_in_place(&state, &story.remove_page(page_number), &project_path).await
}

/// Close gaps in page numbering
pub async fn renumber_pages(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<StoryResponseDto>, ApiError> {
    let (project_path, story) = load_story(&state, &slug).await?;
    save_in_place(&state, &story.renumber_pages(), &project_path).await
}

pub async fn list_styles() -> Json<Vec<StylePreset>> {
    Json(style_presets().to_vec())
}
