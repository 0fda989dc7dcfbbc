//! Story engine API routes - conversational co-authoring

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::application::dto::{
    CharacterDto, EngineInfoResponseDto, ExtractCharactersRequestDto, ExtractCharactersResponseDto,
    ExtractTraitsRequestDto, ExtractTraitsResponseDto, GeneratePageTextRequestDto,
    GeneratedTextResponseDto, IllustrationPromptRequestDto, IllustrationPromptResponseDto,
    MessageRequestDto, MessageResponseDto, PlotPointsRequestDto, SetModelRequestDto,
    StartStoryRequestDto, StoryResponseDto,
};
use crate::application::ports::outbound::StoryRepositoryPort;
use crate::application::services::EngineError;
use crate::infrastructure::state::{AppState, SharedStoryEngine};

use super::story_routes::load_story;
use super::{engine_error, persistence_error, ApiError};

fn engine_info(engine: &SharedStoryEngine) -> EngineInfoResponseDto {
    EngineInfoResponseDto {
        model: engine.model_name(),
        phase: engine.conversation_state().phase,
        story_title: engine.story().map(|s| s.title().to_string()),
    }
}

pub async fn get_engine_info(State(state): State<Arc<AppState>>) -> Json<EngineInfoResponseDto> {
    let engine = state.engine.lock().await;
    Json(engine_info(&engine))
}

/// Reset the conversation around a new, unsaved story
pub async fn start_story(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartStoryRequestDto>,
) -> Json<MessageResponseDto> {
    let mut engine = state.engine.lock().await;
    let reply = engine.start_new_story(&req.title, &req.author, req.target_age, req.style);

    Json(MessageResponseDto {
        reply,
        phase: engine.conversation_state().phase,
    })
}

/// Continue working on a saved story
pub async fn open_story(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<StoryResponseDto>, ApiError> {
    let (_, story) = load_story(&state, &slug).await?;
    let response = StoryResponseDto::from(&story);

    state.engine.lock().await.set_story(story);
    Ok(Json(response))
}

/// Persist the engine's story; the engine keeps working on the saved copy
pub async fn save_story(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StoryResponseDto>, ApiError> {
    let mut engine = state.engine.lock().await;
    let story = engine
        .story()
        .cloned()
        .ok_or_else(|| engine_error(EngineError::NoActiveStory))?;

    let saved = state
        .repository
        .save(&story, None)
        .await
        .map_err(persistence_error)?;
    let response = StoryResponseDto::from(&saved);
    engine.set_story(saved);

    Ok(Json(response))
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MessageRequestDto>,
) -> Result<Json<MessageResponseDto>, ApiError> {
    if req.content.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Message is empty".to_string()));
    }

    let mut engine = state.engine.lock().await;
    let reply = engine
        .process_user_input(&req.content)
        .await
        .map_err(engine_error)?;

    Ok(Json(MessageResponseDto {
        reply,
        phase: engine.conversation_state().phase,
    }))
}

pub async fn generate_page_text(
    State(state): State<Arc<AppState>>,
    Path(page_number): Path<u32>,
    Json(req): Json<GeneratePageTextRequestDto>,
) -> Result<Json<GeneratedTextResponseDto>, ApiError> {
    let engine = state.engine.lock().await;
    let text = engine
        .generate_page_text(page_number, &req.page_purpose, req.total_pages)
        .await
        .map_err(engine_error)?;

    Ok(Json(GeneratedTextResponseDto { page_number, text }))
}

pub async fn generate_illustration_prompt(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IllustrationPromptRequestDto>,
) -> Result<Json<IllustrationPromptResponseDto>, ApiError> {
    let engine = state.engine.lock().await;
    let prompt = engine
        .generate_illustration_prompt(&req.page_text, &req.mood, &req.time_of_day)
        .await
        .map_err(engine_error)?;

    Ok(Json(IllustrationPromptResponseDto { prompt }))
}

/// Ask the model for a beginning/middle/ending outline within the conversation
pub async fn suggest_plot_points(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PlotPointsRequestDto>,
) -> Result<Json<MessageResponseDto>, ApiError> {
    let mut engine = state.engine.lock().await;
    let request = engine.suggest_plot_points(req.page_count, &req.summary);
    let reply = engine
        .process_user_input(&request)
        .await
        .map_err(engine_error)?;

    Ok(Json(MessageResponseDto {
        reply,
        phase: engine.conversation_state().phase,
    }))
}

pub async fn extract_traits(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExtractTraitsRequestDto>,
) -> Result<Json<ExtractTraitsResponseDto>, ApiError> {
    let engine = state.engine.lock().await;
    let visual_traits = engine
        .extract_visual_traits(&req.name, &req.description)
        .await
        .map_err(engine_error)?;

    Ok(Json(ExtractTraitsResponseDto {
        name: req.name,
        visual_traits,
    }))
}

pub async fn extract_characters(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExtractCharactersRequestDto>,
) -> Result<Json<ExtractCharactersResponseDto>, ApiError> {
    let engine = state.engine.lock().await;
    let characters = engine
        .extract_characters_from_text(&req.story_text)
        .await
        .map_err(engine_error)?;

    Ok(Json(ExtractCharactersResponseDto {
        characters: characters
            .into_iter()
            .map(|c| CharacterDto {
                name: c.name,
                description: c.description,
                visual_traits: c.visual_traits,
            })
            .collect(),
    }))
}

/// Models installed on the Ollama server
pub async fn list_models(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    let client = state.ollama.as_ref().ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            "Model listing requires the Ollama backend".to_string(),
        )
    })?;

    let models = client
        .list_models()
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;
    Ok(Json(models))
}

pub async fn set_model(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetModelRequestDto>,
) -> Result<Json<EngineInfoResponseDto>, ApiError> {
    let client = state.ollama.as_ref().ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            "Model switching requires the Ollama backend".to_string(),
        )
    })?;
    if req.model.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Model name is required".to_string()));
    }

    client.set_model(req.model.trim());
    let engine = state.engine.lock().await;
    Ok(Json(engine_info(&engine)))
}
