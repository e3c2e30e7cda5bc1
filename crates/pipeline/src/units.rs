//! Generation units and the lane runner that executes them.
//!
//! A unit goes `pending -> processing`, then through reference resolution,
//! the provider adapter and the storage pipeline. The subject entity is
//! patched before the task is completed, so a completed task always points
//! at media the subject also carries.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use storyreel_core::grouping::ShotGroup;
use storyreel_core::media::MediaKind;
use storyreel_core::model::ModelConfig;
use storyreel_core::prompt::{compose_character_prompt, compose_shot_prompt, video_reference_links};
use storyreel_core::shot::CharacterRef;
use storyreel_core::task::{SubjectType, PROGRESS_GENERATED, PROGRESS_GENERATING};
use storyreel_core::types::DbId;
use storyreel_db::models::character::Character;
use storyreel_db::models::dialogue::Dialogue;
use storyreel_db::models::prompt::FeaturePrompt;
use storyreel_db::store::{
    CharacterStore, DialogueStore, Persistence, ShotStore, StoreError, TaskStore,
};
use storyreel_providers::{GeneratedAsset, GenerationOptions, GenerationRequest, ProviderAdapter};
use storyreel_storage::layout::now_stamp;
use storyreel_storage::{StorageMode, StoragePipeline, StorageResult, StorageTarget};
use tokio_util::sync::CancellationToken;

use crate::error::GenerationError;
use crate::reference_resolver::ReferenceResolver;
use crate::registry::TaskRegistry;

/// Error message recorded on units abandoned at shutdown.
pub const SHUTDOWN_MESSAGE: &str = "Shut down before execution";

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// What one task generates.
#[derive(Debug, Clone)]
pub enum UnitWork {
    /// One clip for a group of adjacent shots.
    Shots(ShotGroup),
    /// A portrait image or motion clip of a character.
    Character(Character),
    /// Speech for one dialogue line. `voice` is the speaking character's
    /// voice; without one the adapter's default applies.
    Dialogue {
        dialogue: Dialogue,
        voice: Option<String>,
    },
}

impl UnitWork {
    pub fn subject_type(&self) -> SubjectType {
        match self {
            UnitWork::Shots(_) => SubjectType::Shot,
            UnitWork::Character(_) => SubjectType::Character,
            UnitWork::Dialogue { .. } => SubjectType::Dialogue,
        }
    }

    /// The subject the task record is filed under (a group's first shot).
    pub fn subject_id(&self) -> DbId {
        match self {
            UnitWork::Shots(group) => group.lead().id,
            UnitWork::Character(character) => character.id,
            UnitWork::Dialogue { dialogue, .. } => dialogue.id,
        }
    }

    /// Every subject the result is written to.
    pub fn subject_ids(&self) -> Vec<DbId> {
        match self {
            UnitWork::Shots(group) => group.shot_ids(),
            _ => vec![self.subject_id()],
        }
    }

    fn storage_target(&self, kind: MediaKind, stamp: i64) -> StorageTarget {
        match self {
            UnitWork::Shots(group) if group.is_merged() => StorageTarget::merged(group.lead().id, stamp),
            UnitWork::Shots(group) => StorageTarget::shot(group.lead().id, stamp),
            UnitWork::Character(character) => StorageTarget::character(character.id, kind, stamp),
            UnitWork::Dialogue { dialogue, .. } => StorageTarget::dialogue(dialogue.id, stamp),
        }
    }
}

/// A unit bound to its task record.
#[derive(Debug, Clone)]
pub struct PlannedUnit {
    pub task_id: DbId,
    pub work: UnitWork,
}

/// Everything resolved once per batch and shared read-only by its lanes.
pub struct BatchContext {
    pub batch_id: String,
    pub project_id: DbId,
    pub kind: MediaKind,
    pub model: ModelConfig,
    pub adapter: Arc<dyn ProviderAdapter>,
    pub storage_mode: StorageMode,
    pub template: String,
    pub feature: Option<FeaturePrompt>,
    pub options: GenerationOptions,
}

impl BatchContext {
    fn feature_prefix(&self) -> Option<&str> {
        self.feature.as_ref().map(|f| f.prompt.as_str())
    }

    fn feature_links(&self) -> Vec<String> {
        self.feature
            .as_ref()
            .map(|f| video_reference_links(&f.reference_links))
            .unwrap_or_default()
    }

    fn request(&self, prompt: String, reference_urls: Vec<String>, options: GenerationOptions) -> GenerationRequest {
        GenerationRequest {
            base_url: self.model.base_url.clone(),
            api_key: self.model.api_key.clone(),
            model_name: self.model.model_name.clone(),
            prompt,
            reference_urls,
            options,
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Executes lanes of planned units.
#[derive(Clone)]
pub struct UnitRunner {
    store: Arc<dyn Persistence>,
    storage: Arc<StoragePipeline>,
    registry: Arc<TaskRegistry>,
    references: ReferenceResolver,
}

impl UnitRunner {
    pub fn new(
        store: Arc<dyn Persistence>,
        storage: Arc<StoragePipeline>,
        registry: Arc<TaskRegistry>,
    ) -> Self {
        Self {
            store,
            storage,
            registry,
            references: ReferenceResolver::new(),
        }
    }

    /// Run `units` one after another. Once `cancel` fires, units not yet
    /// started are failed without being attempted.
    pub async fn run_lane(
        self,
        ctx: Arc<BatchContext>,
        lane: usize,
        units: Vec<PlannedUnit>,
        cancel: CancellationToken,
    ) {
        tracing::debug!(batch_id = %ctx.batch_id, lane, units = units.len(), "Lane started");
        for unit in units {
            if cancel.is_cancelled() {
                self.abandon(&ctx, &unit).await;
                continue;
            }
            self.run_unit(&ctx, unit).await;
        }
        tracing::debug!(batch_id = %ctx.batch_id, lane, "Lane finished");
    }

    async fn run_unit(&self, ctx: &BatchContext, unit: PlannedUnit) {
        let task_id = unit.task_id;

        if let Err(e) = self.store.mark_processing(task_id).await {
            tracing::error!(task_id, error = %e, "Task could not start");
            // A task that already left `pending` has its own terminal state.
            if !matches!(e, StoreError::InvalidTransition { .. }) {
                self.record_failure(task_id, &GenerationError::Persistence(e)).await;
            }
            self.registry.finish(task_id);
            return;
        }
        self.registry.mark_running(task_id);
        tracing::info!(
            task_id,
            batch_id = %ctx.batch_id,
            subject_type = %unit.work.subject_type(),
            subject_id = unit.work.subject_id(),
            "Task started",
        );

        match self.execute(ctx, &unit).await {
            Ok(stored) => {
                tracing::info!(
                    task_id,
                    batch_id = %ctx.batch_id,
                    url = %stored.public_url,
                    size = stored.size,
                    "Task completed",
                );
            }
            Err(e) => {
                tracing::error!(
                    task_id,
                    batch_id = %ctx.batch_id,
                    kind = e.kind(),
                    error = %e,
                    "Task failed",
                );
                self.record_failure(task_id, &e).await;
            }
        }
        self.registry.finish(task_id);
    }

    async fn record_failure(&self, task_id: DbId, error: &GenerationError) {
        if let Err(store_err) = self
            .store
            .fail_task(task_id, &error.to_string(), error.failure_metadata())
            .await
        {
            tracing::error!(task_id, error = %store_err, "Failed to record task failure");
        }
    }

    async fn execute(&self, ctx: &BatchContext, unit: &PlannedUnit) -> Result<StorageResult, GenerationError> {
        let task_id = unit.task_id;
        let request = self.build_request(ctx, &unit.work).await?;

        self.report_progress(task_id, PROGRESS_GENERATING).await;
        let output = ctx.adapter.generate(&request).await?;
        tracing::debug!(task_id, provider = ctx.adapter.name(), metadata = %output.metadata, "Provider returned");
        self.report_progress(task_id, PROGRESS_GENERATED).await;

        let target = unit.work.storage_target(ctx.kind, now_stamp());
        let stored = match &output.asset {
            GeneratedAsset::Url(url) => self.storage.publish(url, ctx.storage_mode, &target).await?,
            GeneratedAsset::Inline { bytes, mime_type } => {
                self.storage.publish_inline(bytes, mime_type, &target).await?
            }
        };

        self.write_back(ctx, &unit.work, &stored).await?;
        self.store
            .complete_task(task_id, &stored.public_url, stored.local_path.as_deref())
            .await?;
        Ok(stored)
    }

    async fn build_request(&self, ctx: &BatchContext, work: &UnitWork) -> Result<GenerationRequest, GenerationError> {
        let mut options = ctx.options.clone();

        let request = match work {
            UnitWork::Shots(group) => {
                let refs = group_references(group);
                let mut urls = self
                    .references
                    .resolve(&*self.store, ctx.project_id, &refs, MediaKind::Video)
                    .await?;
                for link in ctx.feature_links() {
                    if !urls.contains(&link) {
                        urls.push(link);
                    }
                }
                options.duration_secs = Some(group.target_duration_secs);
                let prompt = compose_shot_prompt(
                    &ctx.template,
                    &group.shots,
                    group.target_duration_secs,
                    ctx.feature_prefix(),
                );
                ctx.request(prompt, urls, options)
            }
            UnitWork::Character(character) => {
                let prompt = compose_character_prompt(
                    &ctx.template,
                    &character.name,
                    character.appearance.as_deref(),
                    character.description.as_deref(),
                    ctx.kind,
                    ctx.feature_prefix(),
                );
                let urls = if ctx.kind == MediaKind::Video {
                    ctx.feature_links()
                } else {
                    Vec::new()
                };
                ctx.request(prompt, urls, options)
            }
            UnitWork::Dialogue { dialogue, voice } => {
                if let Some(voice) = voice {
                    options.voice = Some(voice.clone());
                }
                ctx.request(dialogue.content.clone(), Vec::new(), options)
            }
        };
        Ok(request)
    }

    async fn write_back(
        &self,
        ctx: &BatchContext,
        work: &UnitWork,
        stored: &StorageResult,
    ) -> Result<(), GenerationError> {
        let url = stored.public_url.as_str();
        let path = stored.local_path.as_deref();
        match work {
            UnitWork::Shots(group) => {
                let ids = group.shot_ids();
                let written = self.store.set_shot_video(&ids, url, path).await?;
                if written == 0 {
                    return Err(GenerationError::NotFound {
                        entity: "Shot",
                        id: group.lead().id,
                    });
                }
                if written != ids.len() as u64 {
                    tracing::warn!(
                        expected = ids.len(),
                        written,
                        lead_shot_id = group.lead().id,
                        "Not every shot in the group was updated",
                    );
                }
            }
            UnitWork::Character(character) => {
                self.store
                    .set_character_media(character.id, ctx.kind, url, path)
                    .await?;
            }
            UnitWork::Dialogue { dialogue, .. } => {
                self.store.set_dialogue_audio(dialogue.id, url, path).await?;
            }
        }
        Ok(())
    }

    /// Progress updates are informational; a failed write is logged only.
    async fn report_progress(&self, task_id: DbId, progress: i16) {
        if let Err(e) = self.store.update_progress(task_id, progress).await {
            tracing::warn!(task_id, progress, error = %e, "Progress update failed");
        }
    }

    async fn abandon(&self, ctx: &BatchContext, unit: &PlannedUnit) {
        tracing::warn!(task_id = unit.task_id, batch_id = %ctx.batch_id, "Abandoning task at shutdown");
        let metadata = json!({ "errorKind": "shutdown" });
        if let Err(e) = self.store.fail_task(unit.task_id, SHUTDOWN_MESSAGE, metadata).await {
            tracing::error!(task_id = unit.task_id, error = %e, "Failed to record abandoned task");
        }
        self.registry.finish(unit.task_id);
    }
}

/// Character references of every shot in a group, first occurrence wins.
fn group_references(group: &ShotGroup) -> Vec<CharacterRef> {
    let mut seen = HashSet::new();
    group
        .shots
        .iter()
        .flat_map(|shot| shot.characters.iter())
        .filter(|r| seen.insert(r.id))
        .cloned()
        .collect()
}
