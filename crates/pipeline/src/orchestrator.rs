//! Task Orchestrator: batch submission and task queries.
//!
//! Submission validates the whole request, resolves the model and provider,
//! creates every task record in one transaction and returns. Execution
//! happens on executor lanes: the units are cut into chunks of
//! `concurrency` and each chunk is one lane, so a batch of `N` units runs
//! `ceil(N / concurrency)` lanes side by side with units inside a lane
//! strictly in order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use storyreel_core::grouping::{group_shots, sort_by_timeline, timeline_gaps, GroupingOptions};
use storyreel_core::media::MediaKind;
use storyreel_core::scheduling::{chunk, validate_concurrency};
use storyreel_core::shot::ShotUnit;
use storyreel_core::task::SubjectType;
use storyreel_core::types::DbId;
use storyreel_db::models::character::Character;
use storyreel_db::models::dialogue::Dialogue;
use storyreel_db::models::task::{GenerationTask, NewTask, TaskListQuery, TaskProgress, TaskScope};
use storyreel_db::store::{
    CharacterStore, DialogueStore, Persistence, ProjectStore, PromptStore, ShotStore, TaskStore,
};
use storyreel_providers::{GenerationOptions, ProviderRegistry};
use storyreel_storage::{StorageMode, StoragePipeline};

use crate::config::OrchestratorConfig;
use crate::error::GenerationError;
use crate::executor::{Executor, ShutdownReport};
use crate::model_resolver::ModelResolver;
use crate::registry::{Reservation, TaskRegistry};
use crate::units::{BatchContext, PlannedUnit, UnitRunner, UnitWork};

/// Skip reason for subjects that already carry media.
pub const SKIP_HAS_MEDIA: &str = "already_has_media";

/// Skip reason for subjects another task is currently generating.
pub const SKIP_IN_PROGRESS: &str = "generation_in_progress";

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// What a batch generates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BatchTarget {
    /// Shot clips, optionally merged into groups.
    ShotVideo { grouping: GroupingOptions },
    /// Character portraits (`Image`) or motion clips (`Video`).
    CharacterMedia { kind: MediaKind },
    DialogueAudio,
}

impl BatchTarget {
    pub fn kind(&self) -> MediaKind {
        match self {
            BatchTarget::ShotVideo { .. } => MediaKind::Video,
            BatchTarget::CharacterMedia { kind } => *kind,
            BatchTarget::DialogueAudio => MediaKind::Audio,
        }
    }

    pub fn subject_type(&self) -> SubjectType {
        match self {
            BatchTarget::ShotVideo { .. } => SubjectType::Shot,
            BatchTarget::CharacterMedia { .. } => SubjectType::Character,
            BatchTarget::DialogueAudio => SubjectType::Dialogue,
        }
    }

    /// Prompt store function key of the template for this target.
    pub fn prompt_key(&self) -> &'static str {
        match self {
            BatchTarget::ShotVideo { .. } => "shot_video_generation",
            BatchTarget::CharacterMedia { kind: MediaKind::Video } => "character_video_generation",
            BatchTarget::CharacterMedia { .. } => "character_image_generation",
            BatchTarget::DialogueAudio => "dialogue_audio",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Chunk size; defaults to the configured concurrency.
    pub concurrency: Option<usize>,
    /// Regenerate subjects that already have media.
    pub allow_overwrite: bool,
    /// Regenerate subjects that already have media, keeping the old file.
    pub keep_both: bool,
    pub storage_mode: Option<StorageMode>,
    pub feature_prompt_id: Option<DbId>,
    /// Provider knobs applied to every unit.
    pub generation: GenerationOptions,
}

impl BatchOptions {
    fn regenerates_existing(&self) -> bool {
        self.allow_overwrite || self.keep_both
    }
}

#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub project_id: DbId,
    /// Narrows shot lookups to one novel.
    pub novel_id: Option<DbId>,
    /// Recorded on tasks for act-scoped listings.
    pub act_id: Option<DbId>,
    pub target: BatchTarget,
    pub subject_ids: Vec<DbId>,
    pub options: BatchOptions,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedTask {
    pub task_id: DbId,
    pub subject_id: DbId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedSubject {
    pub subject_id: DbId,
    pub reason: &'static str,
    pub existing_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSubmission {
    pub batch_id: String,
    pub tasks: Vec<SubmittedTask>,
    pub skipped: Vec<SkippedSubject>,
    /// Lanes the batch runs as: `ceil(tasks / concurrency)`.
    pub lanes: usize,
    pub message: String,
}

/// Subjects loaded for a batch.
enum Subjects {
    Shots(Vec<ShotUnit>),
    Characters(Vec<Character>),
    Dialogues(Vec<Dialogue>),
}

impl Subjects {
    fn len(&self) -> usize {
        match self {
            Subjects::Shots(v) => v.len(),
            Subjects::Characters(v) => v.len(),
            Subjects::Dialogues(v) => v.len(),
        }
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ids(&self) -> Vec<DbId> {
        match self {
            Subjects::Shots(v) => v.iter().map(|s| s.id).collect(),
            Subjects::Characters(v) => v.iter().map(|c| c.id).collect(),
            Subjects::Dialogues(v) => v.iter().map(|d| d.id).collect(),
        }
    }

    fn without(self, ids: &[DbId]) -> Self {
        if ids.is_empty() {
            return self;
        }
        match self {
            Subjects::Shots(v) => Subjects::Shots(v.into_iter().filter(|s| !ids.contains(&s.id)).collect()),
            Subjects::Characters(v) => {
                Subjects::Characters(v.into_iter().filter(|c| !ids.contains(&c.id)).collect())
            }
            Subjects::Dialogues(v) => {
                Subjects::Dialogues(v.into_iter().filter(|d| !ids.contains(&d.id)).collect())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    store: Arc<dyn Persistence>,
    providers: Arc<ProviderRegistry>,
    models: ModelResolver,
    registry: Arc<TaskRegistry>,
    runner: UnitRunner,
    executor: Executor,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Persistence>,
        providers: Arc<ProviderRegistry>,
        storage: Arc<StoragePipeline>,
        models: ModelResolver,
        config: OrchestratorConfig,
    ) -> Self {
        let registry = Arc::new(TaskRegistry::new());
        let runner = UnitRunner::new(Arc::clone(&store), storage, Arc::clone(&registry));
        Self {
            store,
            providers,
            models,
            registry,
            runner,
            executor: Executor::start(),
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Validate and schedule a batch. Returns once task records exist;
    /// generation continues in the background.
    ///
    /// Any validation or configuration failure rejects the whole batch
    /// before a task is created.
    pub async fn submit_batch(
        &self,
        owner_id: DbId,
        request: BatchRequest,
    ) -> Result<BatchSubmission, GenerationError> {
        if !self.executor.is_accepting() {
            return Err(GenerationError::Configuration(
                "Generation executor is shut down".into(),
            ));
        }

        let BatchRequest {
            project_id,
            novel_id,
            act_id,
            target,
            subject_ids,
            options,
        } = request;
        let subject_type = target.subject_type();
        let kind = target.kind();

        let subject_ids = dedupe_ids(subject_ids);
        if subject_ids.is_empty() {
            return Err(GenerationError::Validation("subject_ids must not be empty".into()));
        }
        let concurrency = options.concurrency.unwrap_or(self.config.default_concurrency);
        validate_concurrency(concurrency, self.config.max_concurrency)?;
        match target {
            BatchTarget::ShotVideo { grouping } => grouping.validate()?,
            BatchTarget::CharacterMedia { kind: MediaKind::Audio } => {
                return Err(GenerationError::Validation(
                    "character media must be image or video".into(),
                ))
            }
            _ => {}
        }

        let project = self
            .store
            .find_project(project_id, owner_id)
            .await?
            .ok_or(GenerationError::NotFound {
                entity: "Project",
                id: project_id,
            })?;

        let subjects = self
            .load_subjects(&target, project_id, owner_id, novel_id, &subject_ids)
            .await?;
        if subjects.len() != subject_ids.len() {
            return Err(GenerationError::Validation(format!(
                "{} of {} requested {subject_type}s were not found in project {project_id}",
                subject_ids.len() - subjects.len(),
                subject_ids.len(),
            )));
        }

        let batch_id = uuid::Uuid::now_v7().to_string();
        let (subjects, skipped, _reservation) =
            self.filter_subjects(subjects, kind, subject_type, &options);
        if subjects.is_empty() {
            let message = if skipped.iter().all(|s| s.reason == SKIP_HAS_MEDIA) {
                format!("All requested {subject_type}s already have {kind}; nothing to generate")
            } else {
                format!("No {subject_type}s left to generate")
            };
            tracing::info!(batch_id = %batch_id, project_id, skipped = skipped.len(), "{message}");
            return Ok(BatchSubmission {
                batch_id,
                tasks: Vec::new(),
                skipped,
                lanes: 0,
                message,
            });
        }

        let (preferred_id, credential) = project.model_preference(kind.model_type());
        let model = self
            .models
            .resolve(&*self.store, kind.model_type(), preferred_id, credential)
            .await?;
        let adapter = self.providers.resolve(kind, &model.provider_key())?;

        let template = match self.store.system_prompt(target.prompt_key()).await? {
            Some(template) => template,
            None => {
                tracing::warn!(function_key = target.prompt_key(), "No prompt template configured");
                String::new()
            }
        };
        let feature = match options.feature_prompt_id {
            Some(id) => {
                let feature = self.store.feature_prompt(id).await?;
                if feature.is_none() {
                    tracing::warn!(feature_prompt_id = id, "Feature prompt not found, continuing without it");
                }
                feature
            }
            None => None,
        };

        let works = self.plan_units(subjects, &target).await?;
        let storage_mode = options
            .storage_mode
            .unwrap_or(self.config.default_storage_mode);

        let new_tasks: Vec<NewTask> = works
            .iter()
            .enumerate()
            .map(|(index, work)| NewTask {
                owner_id,
                project_id,
                novel_id,
                act_id,
                subject_type,
                subject_id: work.subject_id(),
                kind,
                model_id: Some(model.model_id),
                metadata: task_metadata(&batch_id, storage_mode, index, work),
            })
            .collect();
        let tasks = self.store.create_tasks(&new_tasks).await?;
        if tasks.len() != works.len() {
            return Err(GenerationError::Configuration(format!(
                "created {} tasks for {} units",
                tasks.len(),
                works.len()
            )));
        }

        let mut submitted = Vec::with_capacity(tasks.len());
        let mut units = Vec::with_capacity(tasks.len());
        for (task, work) in tasks.iter().zip(works) {
            self.registry
                .register(task.id, &batch_id, subject_type, work.subject_ids());
            submitted.push(SubmittedTask {
                task_id: task.id,
                subject_id: task.subject_id,
            });
            units.push(PlannedUnit {
                task_id: task.id,
                work,
            });
        }

        let ctx = Arc::new(BatchContext {
            batch_id: batch_id.clone(),
            project_id,
            kind,
            model,
            adapter,
            storage_mode,
            template,
            feature,
            options: options.generation,
        });

        let lanes = chunk(units, concurrency);
        let lane_count = lanes.len();
        for (lane, units) in lanes.into_iter().enumerate() {
            let runner = self.runner.clone();
            let ctx = Arc::clone(&ctx);
            self.executor
                .spawn_lane(move |cancel| runner.run_lane(ctx, lane, units, cancel));
        }

        tracing::info!(
            batch_id = %batch_id,
            project_id,
            subject_type = %subject_type,
            tasks = submitted.len(),
            skipped = skipped.len(),
            concurrency,
            lanes = lane_count,
            storage_mode = storage_mode.as_str(),
            "Generation batch submitted",
        );

        let message = format!(
            "Started {} {kind} generation task(s) in {lane_count} lane(s)",
            submitted.len()
        );
        Ok(BatchSubmission {
            batch_id,
            tasks: submitted,
            skipped,
            lanes: lane_count,
            message,
        })
    }

    /// Current state of one of the owner's tasks.
    pub async fn get_task_progress(
        &self,
        owner_id: DbId,
        task_id: DbId,
    ) -> Result<TaskProgress, GenerationError> {
        self.store
            .find_task(task_id, owner_id)
            .await?
            .map(|task| task.progress_view())
            .ok_or(GenerationError::NotFound {
                entity: "GenerationTask",
                id: task_id,
            })
    }

    /// The owner's tasks within `scope`, newest first.
    pub async fn list_tasks_for(
        &self,
        owner_id: DbId,
        scope: TaskScope,
        query: &TaskListQuery,
    ) -> Result<Vec<GenerationTask>, GenerationError> {
        if let TaskScope::Project { project_id, .. } = scope {
            self.store
                .find_project(project_id, owner_id)
                .await?
                .ok_or(GenerationError::NotFound {
                    entity: "Project",
                    id: project_id,
                })?;
        }
        Ok(self.store.list_tasks(owner_id, scope, query).await?)
    }

    /// Stop accepting batches and wait for every lane to finish.
    pub async fn drain(&self) {
        self.executor.drain().await;
    }

    /// Stop accepting batches; units not yet started are failed.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        self.executor.shutdown(timeout).await
    }

    // -- helpers --

    async fn load_subjects(
        &self,
        target: &BatchTarget,
        project_id: DbId,
        owner_id: DbId,
        novel_id: Option<DbId>,
        ids: &[DbId],
    ) -> Result<Subjects, GenerationError> {
        let subjects = match target {
            BatchTarget::ShotVideo { .. } => Subjects::Shots(
                self.store
                    .list_owned_shots(project_id, owner_id, ids, novel_id)
                    .await?,
            ),
            BatchTarget::CharacterMedia { .. } => Subjects::Characters(
                self.store
                    .list_owned_characters(project_id, owner_id, ids)
                    .await?,
            ),
            BatchTarget::DialogueAudio => Subjects::Dialogues(
                self.store
                    .list_owned_dialogues(project_id, owner_id, ids)
                    .await?,
            ),
        };
        Ok(subjects)
    }

    /// Split off subjects that already have media (unless regenerating) and
    /// subjects already being generated. The rest stay claimed until the
    /// returned reservation drops, by which time their tasks are registered.
    fn filter_subjects(
        &self,
        subjects: Subjects,
        kind: MediaKind,
        subject_type: SubjectType,
        options: &BatchOptions,
    ) -> (Subjects, Vec<SkippedSubject>, Reservation) {
        let mut skipped = Vec::new();
        let overwrite = options.regenerates_existing();

        let mut keep = |id: DbId, existing: Option<&str>| -> bool {
            match existing.filter(|u| !u.trim().is_empty() && !overwrite) {
                Some(url) => {
                    skipped.push(SkippedSubject {
                        subject_id: id,
                        reason: SKIP_HAS_MEDIA,
                        existing_url: Some(url.to_string()),
                    });
                    false
                }
                None => true,
            }
        };
        let subjects = match subjects {
            Subjects::Shots(shots) => Subjects::Shots(
                shots
                    .into_iter()
                    .filter(|s| keep(s.id, s.existing_video_url.as_deref()))
                    .collect(),
            ),
            Subjects::Characters(characters) => Subjects::Characters(
                characters
                    .into_iter()
                    .filter(|c| keep(c.id, c.media_url(kind)))
                    .collect(),
            ),
            Subjects::Dialogues(dialogues) => Subjects::Dialogues(
                dialogues
                    .into_iter()
                    .filter(|d| keep(d.id, d.audio_url.as_deref()))
                    .collect(),
            ),
        };

        let (reservation, busy) = self.registry.reserve(subject_type, &subjects.ids());
        skipped.extend(busy.iter().map(|&id| SkippedSubject {
            subject_id: id,
            reason: SKIP_IN_PROGRESS,
            existing_url: None,
        }));
        (subjects.without(&busy), skipped, reservation)
    }

    /// Turn subjects into units: shots are grouped, everything else is one
    /// unit per subject.
    async fn plan_units(
        &self,
        subjects: Subjects,
        target: &BatchTarget,
    ) -> Result<Vec<UnitWork>, GenerationError> {
        match (subjects, target) {
            (Subjects::Shots(mut shots), BatchTarget::ShotVideo { grouping }) => {
                if grouping.merge {
                    sort_by_timeline(&mut shots);
                    for (prev, next) in timeline_gaps(&shots) {
                        tracing::warn!(prev, next, "Timeline gap between merged shots");
                    }
                }
                let groups = group_shots(shots, grouping)?;
                if grouping.merge {
                    tracing::info!(
                        groups = groups.len(),
                        merged = groups.iter().filter(|g| g.is_merged()).count(),
                        "Shots grouped",
                    );
                }
                Ok(groups.into_iter().map(UnitWork::Shots).collect())
            }
            (Subjects::Characters(characters), _) => {
                Ok(characters.into_iter().map(UnitWork::Character).collect())
            }
            (Subjects::Dialogues(dialogues), _) => {
                let mut works = Vec::with_capacity(dialogues.len());
                for dialogue in dialogues {
                    let voice = self.speaker_voice(&dialogue).await?;
                    works.push(UnitWork::Dialogue { dialogue, voice });
                }
                Ok(works)
            }
            (Subjects::Shots(_), _) => Err(GenerationError::Validation(
                "shots can only be used for video batches".into(),
            )),
        }
    }

    async fn speaker_voice(&self, dialogue: &Dialogue) -> Result<Option<String>, GenerationError> {
        let Some(character_id) = dialogue.character_id else {
            return Ok(None);
        };
        let voice = self
            .store
            .find_character(character_id)
            .await?
            .and_then(|c| c.voice_actor)
            .filter(|v| !v.trim().is_empty());
        Ok(voice)
    }
}

fn dedupe_ids(ids: Vec<DbId>) -> Vec<DbId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

fn task_metadata(batch_id: &str, mode: StorageMode, index: usize, work: &UnitWork) -> serde_json::Value {
    let mut metadata = json!({
        "batchId": batch_id,
        "storageMode": mode.as_str(),
        "groupIndex": index,
    });
    if let UnitWork::Shots(group) = work {
        metadata["mergedShotIds"] = json!(group.shot_ids());
        metadata["targetDuration"] = json!(group.target_duration_secs);
    }
    metadata
}
