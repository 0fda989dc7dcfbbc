//! Story repository port - Durable storage of story projects

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::entities::{Story, StoryMetadata};

/// Errors from saving, loading, listing or deleting stories
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported schema version {found} (this build reads {supported})")]
    UnsupportedVersion { found: String, supported: String },

    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A stored project found while listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorySummary {
    pub project_path: PathBuf,
    pub metadata: StoryMetadata,
}

/// Repository port for story projects
#[async_trait]
pub trait StoryRepositoryPort: Send + Sync {
    /// Save a story, returning it with its project path set
    ///
    /// The target is `path`, else the story's own project path, else a new
    /// directory derived from the title.
    async fn save(&self, story: &Story, path: Option<&Path>) -> Result<Story, PersistenceError>;

    /// Load the story stored in a project directory
    async fn load(&self, project_path: &Path) -> Result<Story, PersistenceError>;

    /// All readable projects, most recently modified first
    async fn list(&self) -> Result<Vec<StorySummary>, PersistenceError>;

    /// Remove a project directory and everything in it
    async fn delete(&self, project_path: &Path) -> Result<(), PersistenceError>;
}
