//! Collaborator traits the generation pipeline persists through.
//!
//! The pipeline depends only on these traits, never on `sqlx` directly, so
//! it can be driven by [`PgStore`] in production and by in-memory fakes in
//! tests. [`Persistence`] is the union of all of them.

use std::collections::HashMap;

use async_trait::async_trait;
use storyreel_core::media::{MediaKind, ModelType};
use storyreel_core::shot::{DialogueLine, ShotUnit};
use storyreel_core::task::TaskStatus;
use storyreel_core::types::DbId;

use crate::models::ai_model::AiModel;
use crate::models::character::Character;
use crate::models::dialogue::Dialogue;
use crate::models::project::Project;
use crate::models::prompt::FeaturePrompt;
use crate::models::task::{GenerationTask, NewTask, TaskListQuery, TaskScope};
use crate::repositories::{
    AiModelRepo, CharacterRepo, DialogueRepo, ProjectRepo, PromptRepo, ShotRepo, TaskRepo,
};
use crate::DbPool;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A guarded status update matched no row: the task is missing or not
    /// in a state that may move to `to`.
    #[error("Task {task_id} cannot move to {to}")]
    InvalidTransition { task_id: DbId, to: TaskStatus },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn find_project(&self, project_id: DbId, owner_id: DbId) -> StoreResult<Option<Project>>;
}

#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn find_model(&self, id: DbId) -> StoreResult<Option<AiModel>>;

    /// Active models of a type ordered by id ascending.
    async fn list_active_models(&self, model_type: ModelType) -> StoreResult<Vec<AiModel>>;
}

#[async_trait]
pub trait CharacterStore: Send + Sync {
    async fn find_character(&self, id: DbId) -> StoreResult<Option<Character>>;

    async fn find_character_by_name_and_gender(
        &self,
        project_id: DbId,
        name: &str,
        gender: &str,
    ) -> StoreResult<Option<Character>>;

    async fn list_owned_characters(
        &self,
        project_id: DbId,
        owner_id: DbId,
        ids: &[DbId],
    ) -> StoreResult<Vec<Character>>;

    async fn set_character_media(
        &self,
        id: DbId,
        kind: MediaKind,
        url: &str,
        path: Option<&str>,
    ) -> StoreResult<()>;
}

#[async_trait]
pub trait ShotStore: Send + Sync {
    /// Owned shots among `ids` as generation units with dialogue attached.
    async fn list_owned_shots(
        &self,
        project_id: DbId,
        owner_id: DbId,
        ids: &[DbId],
        novel_id: Option<DbId>,
    ) -> StoreResult<Vec<ShotUnit>>;

    /// Write one video to every shot in `ids`.
    async fn set_shot_video(&self, ids: &[DbId], url: &str, path: Option<&str>)
        -> StoreResult<u64>;
}

#[async_trait]
pub trait DialogueStore: Send + Sync {
    async fn list_owned_dialogues(
        &self,
        project_id: DbId,
        owner_id: DbId,
        ids: &[DbId],
    ) -> StoreResult<Vec<Dialogue>>;

    async fn set_dialogue_audio(&self, id: DbId, url: &str, path: Option<&str>) -> StoreResult<()>;
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create all tasks of a batch atomically, in input order.
    async fn create_tasks(&self, inputs: &[NewTask]) -> StoreResult<Vec<GenerationTask>>;

    async fn mark_processing(&self, task_id: DbId) -> StoreResult<()>;

    /// Best effort: a task that is no longer processing is left untouched.
    async fn update_progress(&self, task_id: DbId, progress: i16) -> StoreResult<()>;

    async fn complete_task(
        &self,
        task_id: DbId,
        result_url: &str,
        result_path: Option<&str>,
    ) -> StoreResult<()>;

    async fn fail_task(
        &self,
        task_id: DbId,
        error_message: &str,
        metadata_patch: serde_json::Value,
    ) -> StoreResult<()>;

    async fn find_task(&self, task_id: DbId, owner_id: DbId) -> StoreResult<Option<GenerationTask>>;

    async fn list_tasks(
        &self,
        owner_id: DbId,
        scope: TaskScope,
        params: &TaskListQuery,
    ) -> StoreResult<Vec<GenerationTask>>;
}

#[async_trait]
pub trait PromptStore: Send + Sync {
    /// Template text for a pipeline function key.
    async fn system_prompt(&self, function_key: &str) -> StoreResult<Option<String>>;

    async fn feature_prompt(&self, id: DbId) -> StoreResult<Option<FeaturePrompt>>;
}

#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;
}

/// Everything the pipeline needs from storage.
pub trait Persistence:
    ProjectStore + ModelStore + CharacterStore + ShotStore + DialogueStore + TaskStore + PromptStore + StoreHealth
{
}

impl<T> Persistence for T where
    T: ProjectStore
        + ModelStore
        + CharacterStore
        + ShotStore
        + DialogueStore
        + TaskStore
        + PromptStore
        + StoreHealth
{
}

// ---------------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------------

/// [`Persistence`] backed by the repositories.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn guarded(updated: bool, task_id: DbId, to: TaskStatus) -> StoreResult<()> {
    if updated {
        Ok(())
    } else {
        Err(StoreError::InvalidTransition { task_id, to })
    }
}

#[async_trait]
impl ProjectStore for PgStore {
    async fn find_project(&self, project_id: DbId, owner_id: DbId) -> StoreResult<Option<Project>> {
        Ok(ProjectRepo::find_owned(&self.pool, project_id, owner_id).await?)
    }
}

#[async_trait]
impl ModelStore for PgStore {
    async fn find_model(&self, id: DbId) -> StoreResult<Option<AiModel>> {
        Ok(AiModelRepo::find_by_id(&self.pool, id).await?)
    }

    async fn list_active_models(&self, model_type: ModelType) -> StoreResult<Vec<AiModel>> {
        Ok(AiModelRepo::list_active(&self.pool, model_type).await?)
    }
}

#[async_trait]
impl CharacterStore for PgStore {
    async fn find_character(&self, id: DbId) -> StoreResult<Option<Character>> {
        Ok(CharacterRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_character_by_name_and_gender(
        &self,
        project_id: DbId,
        name: &str,
        gender: &str,
    ) -> StoreResult<Option<Character>> {
        Ok(CharacterRepo::find_by_name_and_gender(&self.pool, project_id, name, gender).await?)
    }

    async fn list_owned_characters(
        &self,
        project_id: DbId,
        owner_id: DbId,
        ids: &[DbId],
    ) -> StoreResult<Vec<Character>> {
        Ok(CharacterRepo::list_owned(&self.pool, project_id, owner_id, ids).await?)
    }

    async fn set_character_media(
        &self,
        id: DbId,
        kind: MediaKind,
        url: &str,
        path: Option<&str>,
    ) -> StoreResult<()> {
        if !CharacterRepo::set_media(&self.pool, id, kind, url, path).await? {
            tracing::warn!(character_id = id, kind = %kind, "Character media not written");
        }
        Ok(())
    }
}

#[async_trait]
impl ShotStore for PgStore {
    async fn list_owned_shots(
        &self,
        project_id: DbId,
        owner_id: DbId,
        ids: &[DbId],
        novel_id: Option<DbId>,
    ) -> StoreResult<Vec<ShotUnit>> {
        let shots = ShotRepo::list_owned(&self.pool, project_id, owner_id, ids, novel_id).await?;
        let shot_ids: Vec<DbId> = shots.iter().map(|s| s.id).collect();

        let mut lines: HashMap<DbId, Vec<DialogueLine>> = HashMap::new();
        for dialogue in DialogueRepo::list_for_shots(&self.pool, &shot_ids).await? {
            if let Some(shot_id) = dialogue.shot_id {
                lines.entry(shot_id).or_default().push(dialogue.to_line());
            }
        }

        Ok(shots
            .into_iter()
            .map(|shot| {
                let dialogue = lines.remove(&shot.id).unwrap_or_default();
                shot.into_unit(dialogue)
            })
            .collect())
    }

    async fn set_shot_video(
        &self,
        ids: &[DbId],
        url: &str,
        path: Option<&str>,
    ) -> StoreResult<u64> {
        Ok(ShotRepo::set_video(&self.pool, ids, url, path).await?)
    }
}

#[async_trait]
impl DialogueStore for PgStore {
    async fn list_owned_dialogues(
        &self,
        project_id: DbId,
        owner_id: DbId,
        ids: &[DbId],
    ) -> StoreResult<Vec<Dialogue>> {
        Ok(DialogueRepo::list_owned(&self.pool, project_id, owner_id, ids).await?)
    }

    async fn set_dialogue_audio(&self, id: DbId, url: &str, path: Option<&str>) -> StoreResult<()> {
        if !DialogueRepo::set_audio(&self.pool, id, url, path).await? {
            tracing::warn!(dialogue_id = id, "Dialogue audio not written");
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn create_tasks(&self, inputs: &[NewTask]) -> StoreResult<Vec<GenerationTask>> {
        Ok(TaskRepo::create_batch(&self.pool, inputs).await?)
    }

    async fn mark_processing(&self, task_id: DbId) -> StoreResult<()> {
        let updated = TaskRepo::mark_processing(&self.pool, task_id).await?;
        guarded(updated, task_id, TaskStatus::Processing)
    }

    async fn update_progress(&self, task_id: DbId, progress: i16) -> StoreResult<()> {
        if !TaskRepo::update_progress(&self.pool, task_id, progress).await? {
            tracing::debug!(task_id, progress, "Progress ignored for task not processing");
        }
        Ok(())
    }

    async fn complete_task(
        &self,
        task_id: DbId,
        result_url: &str,
        result_path: Option<&str>,
    ) -> StoreResult<()> {
        let updated = TaskRepo::complete(&self.pool, task_id, result_url, result_path).await?;
        guarded(updated, task_id, TaskStatus::Completed)
    }

    async fn fail_task(
        &self,
        task_id: DbId,
        error_message: &str,
        metadata_patch: serde_json::Value,
    ) -> StoreResult<()> {
        let updated = TaskRepo::fail(&self.pool, task_id, error_message, &metadata_patch).await?;
        guarded(updated, task_id, TaskStatus::Failed)
    }

    async fn find_task(&self, task_id: DbId, owner_id: DbId) -> StoreResult<Option<GenerationTask>> {
        Ok(TaskRepo::find_owned(&self.pool, task_id, owner_id).await?)
    }

    async fn list_tasks(
        &self,
        owner_id: DbId,
        scope: TaskScope,
        params: &TaskListQuery,
    ) -> StoreResult<Vec<GenerationTask>> {
        Ok(TaskRepo::list(&self.pool, owner_id, scope, params).await?)
    }
}

#[async_trait]
impl PromptStore for PgStore {
    async fn system_prompt(&self, function_key: &str) -> StoreResult<Option<String>> {
        Ok(PromptRepo::find_system(&self.pool, function_key)
            .await?
            .map(|p| p.content))
    }

    async fn feature_prompt(&self, id: DbId) -> StoreResult<Option<FeaturePrompt>> {
        Ok(PromptRepo::find_feature(&self.pool, id).await?.map(Into::into))
    }
}

#[async_trait]
impl StoreHealth for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(crate::health_check(&self.pool).await?)
    }
}
