//! HTTP REST API routes

mod engine_routes;
mod illustration_routes;
mod story_routes;

use axum::{
    http::StatusCode,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tracing::error;

use crate::application::ports::outbound::PersistenceError;
use crate::application::services::EngineError;
use crate::domain::errors::DomainError;
use crate::infrastructure::state::AppState;

pub use engine_routes::*;
pub use illustration_routes::*;
pub use story_routes::*;

pub type ApiError = (StatusCode, String);

/// Create all API routes
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        // Story routes
        .route("/api/stories", get(story_routes::list_stories))
        .route("/api/stories", post(story_routes::create_story))
        .route("/api/stories/{slug}", get(story_routes::get_story))
        .route("/api/stories/{slug}", delete(story_routes::delete_story))
        .route(
            "/api/stories/{slug}/metadata",
            put(story_routes::update_metadata),
        )
        // Characters
        .route(
            "/api/stories/{slug}/characters",
            post(story_routes::add_character),
        )
        .route(
            "/api/stories/{slug}/characters/{name}",
            delete(story_routes::remove_character),
        )
        // Pages
        .route("/api/stories/{slug}/pages", post(story_routes::add_page))
        .route(
            "/api/stories/{slug}/pages/renumber",
            post(story_routes::renumber_pages),
        )
        .route(
            "/api/stories/{slug}/pages/{page_number}",
            put(story_routes::update_page),
        )
        .route(
            "/api/stories/{slug}/pages/{page_number}",
            delete(story_routes::remove_page),
        )
        // Styles
        .route("/api/styles", get(story_routes::list_styles))
        // Illustration routes
        .route(
            "/api/stories/{slug}/pages/{page_number}/illustration",
            post(illustration_routes::generate_illustration),
        )
        .route(
            "/api/illustrations/status",
            get(illustration_routes::get_status),
        )
        .route(
            "/api/illustrations/cancel",
            post(illustration_routes::cancel_generation),
        )
        .route(
            "/api/illustrations/config",
            get(illustration_routes::get_config),
        )
        .route(
            "/api/illustrations/config",
            put(illustration_routes::update_config),
        )
        // Story engine routes
        .route("/api/engine", get(engine_routes::get_engine_info))
        .route("/api/engine/start", post(engine_routes::start_story))
        .route("/api/engine/stories/{slug}", post(engine_routes::open_story))
        .route("/api/engine/save", post(engine_routes::save_story))
        .route("/api/engine/messages", post(engine_routes::send_message))
        .route(
            "/api/engine/pages/{page_number}/text",
            post(engine_routes::generate_page_text),
        )
        .route(
            "/api/engine/illustration-prompt",
            post(engine_routes::generate_illustration_prompt),
        )
        .route(
            "/api/engine/plot-points",
            post(engine_routes::suggest_plot_points),
        )
        .route("/api/engine/traits", post(engine_routes::extract_traits))
        .route(
            "/api/engine/characters/extract",
            post(engine_routes::extract_characters),
        )
        .route("/api/engine/models", get(engine_routes::list_models))
        .route("/api/engine/model", put(engine_routes::set_model))
}

async fn health_check() -> &'static str {
    "OK"
}

fn domain_error(e: DomainError) -> ApiError {
    match e {
        DomainError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        DomainError::Validation(_) => (StatusCode::BAD_REQUEST, e.to_string()),
    }
}

fn persistence_error(e: PersistenceError) -> ApiError {
    match e {
        PersistenceError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
        PersistenceError::Validation(_) => (StatusCode::BAD_REQUEST, e.to_string()),
        _ => {
            error!("Storage error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn engine_error(e: EngineError) -> ApiError {
    match e {
        EngineError::NoActiveStory => (StatusCode::CONFLICT, e.to_string()),
        EngineError::Domain(inner) => domain_error(inner),
        EngineError::Llm(_) => {
            error!("{}", e);
            (StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            domain_error(DomainError::not_found("Page 3")).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            persistence_error(PersistenceError::Validation("no title".into())).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            persistence_error(PersistenceError::InvalidTimestamp("x".into())).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            engine_error(EngineError::Domain(DomainError::validation("bad"))).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(engine_error(EngineError::NoActiveStory).0, StatusCode::CONFLICT);
    }
}
