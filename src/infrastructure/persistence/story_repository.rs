//! File-backed story repository
//!
//! Each story lives in its own directory under the stories root:
//!
//! ```text
//! <root>/<slug>/
//!   story.json
//!   pages/      illustrations, page_01.png ...
//!   exports/
//! ```

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use super::document::{
    check_version, document_to_story, slugify, story_to_document, DocumentHeader, StoryDocument,
    EXPORTS_DIR, PAGES_DIR, STORY_FILE,
};
use crate::application::ports::outbound::{PersistenceError, StoryRepositoryPort, StorySummary};
use crate::domain::entities::{Story, StoryMetadata};

/// Highest numeric suffix tried when a slug directory is taken
pub const MAX_SLUG_SUFFIX: u32 = 1000;

/// Where a page's illustration is written
///
/// Fails for a story that has never been saved.
pub fn get_page_illustration_path(
    story: &Story,
    page_number: u32,
) -> Result<PathBuf, PersistenceError> {
    let project = story.project_path().ok_or_else(|| {
        PersistenceError::Validation(
            "Story must be saved before generating illustrations".to_string(),
        )
    })?;
    Ok(project.join(PAGES_DIR).join(format!("page_{:02}.png", page_number)))
}

/// Where an export file is written
///
/// Fails for a story that has never been saved.
pub fn get_export_path(story: &Story, filename: &str) -> Result<PathBuf, PersistenceError> {
    let project = story.project_path().ok_or_else(|| {
        PersistenceError::Validation("Story must be saved before exporting".to_string())
    })?;
    Ok(project.join(EXPORTS_DIR).join(filename))
}

async fn ensure_project_layout(project: &Path) -> Result<(), PersistenceError> {
    fs::create_dir_all(project.join(PAGES_DIR)).await?;
    fs::create_dir_all(project.join(EXPORTS_DIR)).await?;
    Ok(())
}

/// Story repository storing one JSON document per project directory
#[derive(Debug, Clone)]
pub struct FileStoryRepository {
    base_dir: PathBuf,
}

impl FileStoryRepository {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The stories root, created if missing
    pub async fn get_stories_directory(&self) -> Result<PathBuf, PersistenceError> {
        fs::create_dir_all(&self.base_dir).await?;
        Ok(self.base_dir.clone())
    }

    /// Project directory for a slug received from outside
    ///
    /// Only a single plain path segment is accepted.
    pub fn project_path_for_slug(&self, slug: &str) -> Result<PathBuf, PersistenceError> {
        let mut components = Path::new(slug).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.base_dir.join(slug)),
            _ => Err(PersistenceError::Validation(format!("Invalid story id: {}", slug))),
        }
    }

    /// Create a fresh, uniquely named project directory for `story`
    ///
    /// The slug of the title is used as is, or with `-1`, `-2`, ... appended
    /// when taken, up to [`MAX_SLUG_SUFFIX`].
    #[instrument(skip(self, story), fields(title = %story.title()))]
    pub async fn create_project_directory(
        &self,
        story: &Story,
    ) -> Result<PathBuf, PersistenceError> {
        let base = self.get_stories_directory().await?;
        let slug = slugify(story.title());

        let mut project = base.join(&slug);
        let mut suffix = 0;
        while fs::try_exists(&project).await? {
            suffix += 1;
            if suffix > MAX_SLUG_SUFFIX {
                return Err(PersistenceError::Validation(format!(
                    "No free directory name for '{}' after {} attempts",
                    slug, MAX_SLUG_SUFFIX
                )));
            }
            project = base.join(format!("{}-{}", slug, suffix));
        }

        fs::create_dir_all(&project).await?;
        ensure_project_layout(&project).await?;

        info!("Created project directory: {}", project.display());
        Ok(project)
    }

    async fn read_metadata(project: &Path) -> Result<StoryMetadata, PersistenceError> {
        let content = fs::read_to_string(project.join(STORY_FILE)).await?;
        let header: DocumentHeader = serde_json::from_str(&content)?;
        check_version(&header.version)?;
        StoryMetadata::try_from(&header.metadata)
    }
}

#[async_trait]
impl StoryRepositoryPort for FileStoryRepository {
    #[instrument(skip(self, story), fields(title = %story.title()))]
    async fn save(&self, story: &Story, path: Option<&Path>) -> Result<Story, PersistenceError> {
        let project = match path.or_else(|| story.project_path()) {
            Some(project) => project.to_path_buf(),
            None if story.title().is_empty() => {
                return Err(PersistenceError::Validation(
                    "Cannot save story without title or explicit path".to_string(),
                ));
            }
            None => self.create_project_directory(story).await?,
        };

        fs::create_dir_all(&project).await?;
        ensure_project_layout(&project).await?;

        let story = story.with_project_path(&project).touched();
        let content = serde_json::to_string_pretty(&story_to_document(&story))?;

        let story_file = project.join(STORY_FILE);
        fs::write(&story_file, content).await?;

        info!("Saved story to: {}", story_file.display());
        Ok(story)
    }

    async fn load(&self, project_path: &Path) -> Result<Story, PersistenceError> {
        let story_file = project_path.join(STORY_FILE);
        if !fs::try_exists(&story_file).await? {
            return Err(PersistenceError::NotFound(format!(
                "No {} found in {}",
                STORY_FILE,
                project_path.display()
            )));
        }

        let content = fs::read_to_string(&story_file).await?;
        let document: StoryDocument = serde_json::from_str(&content)?;
        let story = document_to_story(document, Some(project_path))?;

        info!("Loaded story from: {}", story_file.display());
        Ok(story)
    }

    async fn list(&self) -> Result<Vec<StorySummary>, PersistenceError> {
        let mut stories = Vec::new();
        if !fs::try_exists(&self.base_dir).await? {
            return Ok(stories);
        }

        let mut entries = fs::read_dir(&self.base_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let project = entry.path();
            if !entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            if !fs::try_exists(project.join(STORY_FILE)).await.unwrap_or(false) {
                debug!("Skipping {}: no {}", project.display(), STORY_FILE);
                continue;
            }

            match Self::read_metadata(&project).await {
                Ok(metadata) => stories.push(StorySummary {
                    project_path: project,
                    metadata,
                }),
                Err(e) => warn!("Failed to load story from {}: {}", project.display(), e),
            }
        }

        stories.sort_by(|a, b| b.metadata.modified_at().cmp(&a.metadata.modified_at()));
        Ok(stories)
    }

    async fn delete(&self, project_path: &Path) -> Result<(), PersistenceError> {
        if !fs::try_exists(project_path).await? {
            return Err(PersistenceError::NotFound(format!(
                "Project not found: {}",
                project_path.display()
            )));
        }

        fs::remove_dir_all(project_path).await?;
        info!("Deleted story project: {}", project_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{create_character, create_page, create_story, PageUpdate};
    use crate::domain::value_objects::{IllustrationStyle, TargetAge};
    use tempfile::TempDir;

    fn story(title: &str) -> Story {
        create_story(title, "Tester", TargetAge::EarlyReader, IllustrationStyle::Watercolor)
    }

    fn repository() -> (TempDir, FileStoryRepository) {
        let dir = TempDir::new().unwrap();
        let repo = FileStoryRepository::new(dir.path().join("stories"));
        (dir, repo)
    }

    #[tokio::test]
    async fn test_save_creates_project_layout() {
        let (_dir, repo) = repository();

        let saved = repo.save(&story("Luna's Adventure!"), None).await.unwrap();

        let project = saved.project_path().unwrap();
        assert_eq!(project, repo.base_dir().join("lunas-adventure"));
        assert!(project.join("story.json").is_file());
        assert!(project.join("pages").is_dir());
        assert!(project.join("exports").is_dir());
    }

    #[tokio::test]
    async fn test_colliding_titles_get_suffixes() {
        let (_dir, repo) = repository();

        let first = repo.save(&story("Test Story"), None).await.unwrap();
        let second = repo.save(&story("Test Story"), None).await.unwrap();
        let third = repo.save(&story("Test Story"), None).await.unwrap();

        let name = |s: &Story| {
            s.project_path()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
        };
        assert_eq!(name(&first).as_deref(), Some("test-story"));
        assert_eq!(name(&second).as_deref(), Some("test-story-1"));
        assert_eq!(name(&third).as_deref(), Some("test-story-2"));
    }

    #[tokio::test]
    async fn test_save_without_title_or_path_fails() {
        let (_dir, repo) = repository();

        let result = repo.save(&story(""), None).await;

        assert!(matches!(result, Err(PersistenceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_blank_title_saves_as_untitled() {
        let (_dir, repo) = repository();

        let saved = repo.save(&story("   "), None).await.unwrap();

        assert_eq!(saved.project_path(), Some(repo.base_dir().join("untitled").as_path()));
        assert_eq!(saved.title(), "   ");
    }

    #[tokio::test]
    async fn test_save_to_explicit_path_and_resave_in_place() {
        let (dir, repo) = repository();
        let target = dir.path().join("elsewhere");

        let saved = repo.save(&story(""), Some(&target)).await.unwrap();
        assert_eq!(saved.project_path(), Some(target.as_path()));
        assert!(saved.metadata().modified_at() >= saved.metadata().created_at());

        let edited = saved.add_page(create_page(1, "Hello", ""));
        let resaved = repo.save(&edited, None).await.unwrap();
        assert_eq!(resaved.project_path(), Some(target.as_path()));
        assert!(!repo.base_dir().join("untitled").exists());
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let (_dir, repo) = repository();
        let original = story("Lüna und der Mond")
            .add_character(create_character(
                "Lüna",
                "eine kleine Maus",
                Some(vec!["small brown mouse".into(), "red scarf".into()]),
            ))
            .add_page(create_page(2, "Second page", "a moonlit field"))
            .add_page(create_page(1, "First page", "a cozy burrow"));

        let saved = repo.save(&original, None).await.unwrap();
        let project = saved.project_path().unwrap().to_path_buf();
        let loaded = repo.load(&project).await.unwrap();

        assert_eq!(loaded, saved);
        assert_eq!(loaded.pages()[0].page_number, 1);
        assert_eq!(loaded.get_character("LÜNA").unwrap().visual_traits.len(), 2);

        let raw = std::fs::read_to_string(project.join("story.json")).unwrap();
        assert!(raw.contains("Lüna und der Mond"));
        assert!(raw.contains("\n  \"metadata\""));
    }

    #[tokio::test]
    async fn test_illustrations_follow_moved_project() {
        let (dir, repo) = repository();
        let saved = repo
            .save(&story("Moving Day").add_page(create_page(1, "Hi", "")), None)
            .await
            .unwrap();

        let image = get_page_illustration_path(&saved, 1).unwrap();
        std::fs::write(&image, b"png").unwrap();
        let saved = saved
            .update_page(1, &PageUpdate::illustration("a sunny day", &image))
            .unwrap();
        let saved = repo.save(&saved, None).await.unwrap();

        let moved = dir.path().join("moved");
        std::fs::rename(saved.project_path().unwrap(), &moved).unwrap();
        let loaded = repo.load(&moved).await.unwrap();

        let page = loaded.get_page(1).unwrap();
        assert_eq!(
            page.illustration_path.as_deref(),
            Some(moved.join("pages/page_01.png").as_path())
        );
        assert!(page.has_illustration());
        assert_eq!(page.illustration_prompt, "a sunny day");
    }

    #[tokio::test]
    async fn test_load_missing_and_malformed() {
        let (dir, repo) = repository();

        let missing = repo.load(&dir.path().join("nope")).await;
        assert!(matches!(missing, Err(PersistenceError::NotFound(_))));

        let broken = dir.path().join("broken");
        std::fs::create_dir_all(&broken).unwrap();
        std::fs::write(broken.join("story.json"), "{ not json").unwrap();
        assert!(matches!(repo.load(&broken).await, Err(PersistenceError::Json(_))));
    }

    #[tokio::test]
    async fn test_load_rejects_newer_schema() {
        let (_dir, repo) = repository();
        let saved = repo.save(&story("Future"), None).await.unwrap();
        let file = saved.project_path().unwrap().join("story.json");

        let raw = std::fs::read_to_string(&file).unwrap();
        std::fs::write(&file, raw.replace("\"version\": \"1.0\"", "\"version\": \"2.0\"")).unwrap();

        let result = repo.load(saved.project_path().unwrap()).await;
        assert!(matches!(result, Err(PersistenceError::UnsupportedVersion { .. })));
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_projects() {
        let (_dir, repo) = repository();
        repo.save(&story("Good Story"), None).await.unwrap();

        let base = repo.base_dir();
        std::fs::create_dir_all(base.join("corrupt")).unwrap();
        std::fs::write(base.join("corrupt/story.json"), "{\"metadata\": 42}").unwrap();
        std::fs::create_dir_all(base.join("empty")).unwrap();
        std::fs::write(base.join("stray.txt"), "not a project").unwrap();

        let stories = repo.list().await.unwrap();

        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].metadata.title, "Good Story");
        assert_eq!(stories[0].project_path, base.join("good-story"));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (_dir, repo) = repository();
        let older = repo.save(&story("Older"), None).await.unwrap();
        repo.save(&story("Newer"), None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        repo.save(&older, None).await.unwrap();

        let titles: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.metadata.title)
            .collect();

        assert_eq!(titles, vec!["Older", "Newer"]);
    }

    #[tokio::test]
    async fn test_list_missing_root_is_empty() {
        let (_dir, repo) = repository();
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let (_dir, repo) = repository();
        let saved = repo.save(&story("Doomed"), None).await.unwrap();
        let project = saved.project_path().unwrap().to_path_buf();

        repo.delete(&project).await.unwrap();
        assert!(!project.exists());

        let again = repo.delete(&project).await;
        assert!(matches!(again, Err(PersistenceError::NotFound(_))));
    }

    #[test]
    fn test_artifact_paths_require_saved_story() {
        let unsaved = story("Draft");
        assert!(matches!(
            get_page_illustration_path(&unsaved, 1),
            Err(PersistenceError::Validation(_))
        ));
        assert!(matches!(
            get_export_path(&unsaved, "draft.pdf"),
            Err(PersistenceError::Validation(_))
        ));

        let saved = unsaved.with_project_path("/stories/draft");
        assert_eq!(
            get_page_illustration_path(&saved, 3).unwrap(),
            PathBuf::from("/stories/draft/pages/page_03.png")
        );
        assert_eq!(
            get_export_path(&saved, "draft.pdf").unwrap(),
            PathBuf::from("/stories/draft/exports/draft.pdf")
        );
    }

    #[test]
    fn test_project_path_for_slug_rejects_traversal() {
        let repo = FileStoryRepository::new("/stories");
        assert_eq!(
            repo.project_path_for_slug("test-story").unwrap(),
            PathBuf::from("/stories/test-story")
        );
        assert!(repo.project_path_for_slug("../etc").is_err());
        assert!(repo.project_path_for_slug("a/b").is_err());
        assert!(repo.project_path_for_slug("").is_err());
        assert!(repo.project_path_for_slug("/abs").is_err());
    }
}
