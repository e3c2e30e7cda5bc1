//! In-memory fakes for orchestrator integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use storyreel_core::media::{MediaKind, ModelType};
use storyreel_core::shot::{CharacterRef, ShotUnit};
use storyreel_core::task::{TaskStatus, PROGRESS_DONE, PROGRESS_NONE};
use storyreel_core::types::DbId;
use storyreel_db::models::ai_model::AiModel;
use storyreel_db::models::character::Character;
use storyreel_db::models::dialogue::Dialogue;
use storyreel_db::models::project::Project;
use storyreel_db::models::prompt::FeaturePrompt;
use storyreel_db::models::task::{GenerationTask, NewTask, TaskListQuery, TaskScope};
use storyreel_db::store::{
    CharacterStore, DialogueStore, ModelStore, Persistence, ProjectStore, PromptStore, ShotStore,
    StoreError, StoreHealth, StoreResult, TaskStore,
};
use storyreel_pipeline::{ModelResolver, Orchestrator, OrchestratorConfig};
use storyreel_providers::{
    GenerationOutput, GenerationRequest, ProviderAdapter, ProviderError, ProviderRegistry,
};
use storyreel_storage::fetch::{Downloaded, FetchedBytes};
use storyreel_storage::{Fetcher, MediaHost, RetryPolicy, StorageError, StoragePipeline};

pub const OWNER: DbId = 1;
pub const PROJECT: DbId = 10;
pub const CONTENT: &[u8] = b"generated-media";

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct State {
    pub projects: Vec<Project>,
    pub models: Vec<AiModel>,
    pub characters: Vec<Character>,
    pub shots: Vec<ShotUnit>,
    pub dialogues: Vec<Dialogue>,
    pub tasks: Vec<GenerationTask>,
    pub prompts: HashMap<String, String>,
    pub features: HashMap<DbId, FeaturePrompt>,
    /// Ids passed to each `set_shot_video` call.
    pub shot_writes: Vec<Vec<DbId>>,
    /// `mark_processing` reports the store as unavailable.
    pub start_unavailable: bool,
    /// `set_shot_video` matches no rows, as if the shots were deleted.
    pub shots_vanish: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    pub state: Mutex<State>,
}

impl MemoryStore {
    pub fn new(state: State) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn task(&self, id: DbId) -> GenerationTask {
        self.state
            .lock()
            .unwrap()
            .tasks
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .expect("task exists")
    }

    pub fn tasks(&self) -> Vec<GenerationTask> {
        self.state.lock().unwrap().tasks.clone()
    }

    pub fn shot(&self, id: DbId) -> ShotUnit {
        self.state
            .lock()
            .unwrap()
            .shots
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .expect("shot exists")
    }

    pub fn character(&self, id: DbId) -> Character {
        self.state
            .lock()
            .unwrap()
            .characters
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .expect("character exists")
    }

    pub fn dialogue(&self, id: DbId) -> Dialogue {
        self.state
            .lock()
            .unwrap()
            .dialogues
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .expect("dialogue exists")
    }

    fn owns(state: &State, project_id: DbId, owner_id: DbId) -> bool {
        state
            .projects
            .iter()
            .any(|p| p.id == project_id && p.owner_id == owner_id)
    }

    fn transition(
        &self,
        task_id: DbId,
        to: TaskStatus,
        apply: impl FnOnce(&mut GenerationTask),
    ) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id && t.status.can_transition_to(to))
            .ok_or(StoreError::InvalidTransition { task_id, to })?;
        task.status = to;
        task.updated_at = Utc::now();
        apply(task);
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn find_project(&self, project_id: DbId, owner_id: DbId) -> StoreResult<Option<Project>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .projects
            .iter()
            .find(|p| p.id == project_id && p.owner_id == owner_id)
            .cloned())
    }
}

#[async_trait]
impl ModelStore for MemoryStore {
    async fn find_model(&self, id: DbId) -> StoreResult<Option<AiModel>> {
        Ok(self.state.lock().unwrap().models.iter().find(|m| m.id == id).cloned())
    }

    async fn list_active_models(&self, model_type: ModelType) -> StoreResult<Vec<AiModel>> {
        let mut models: Vec<AiModel> = self
            .state
            .lock()
            .unwrap()
            .models
            .iter()
            .filter(|m| m.serves(model_type))
            .cloned()
            .collect();
        models.sort_by_key(|m| m.id);
        Ok(models)
    }
}

#[async_trait]
impl CharacterStore for MemoryStore {
    async fn find_character(&self, id: DbId) -> StoreResult<Option<Character>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .characters
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn find_character_by_name_and_gender(
        &self,
        project_id: DbId,
        name: &str,
        gender: &str,
    ) -> StoreResult<Option<Character>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .characters
            .iter()
            .find(|c| {
                c.project_id == project_id && c.name == name && c.gender.as_deref() == Some(gender)
            })
            .cloned())
    }

    async fn list_owned_characters(
        &self,
        project_id: DbId,
        owner_id: DbId,
        ids: &[DbId],
    ) -> StoreResult<Vec<Character>> {
        let state = self.state.lock().unwrap();
        if !Self::owns(&state, project_id, owner_id) {
            return Ok(Vec::new());
        }
        Ok(state
            .characters
            .iter()
            .filter(|c| c.project_id == project_id && ids.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn set_character_media(
        &self,
        id: DbId,
        kind: MediaKind,
        url: &str,
        path: Option<&str>,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(c) = state.characters.iter_mut().find(|c| c.id == id) {
            match kind {
                MediaKind::Image => {
                    c.image_url = Some(url.into());
                    c.image_path = path.map(str::to_string);
                }
                MediaKind::Video => {
                    c.video_url = Some(url.into());
                    c.video_path = path.map(str::to_string);
                }
                MediaKind::Audio => {}
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ShotStore for MemoryStore {
    async fn list_owned_shots(
        &self,
        project_id: DbId,
        owner_id: DbId,
        ids: &[DbId],
        _novel_id: Option<DbId>,
    ) -> StoreResult<Vec<ShotUnit>> {
        let state = self.state.lock().unwrap();
        if !Self::owns(&state, project_id, owner_id) {
            return Ok(Vec::new());
        }
        Ok(state
            .shots
            .iter()
            .filter(|s| s.project_id == project_id && ids.contains(&s.id))
            .cloned()
            .collect())
    }

    async fn set_shot_video(&self, ids: &[DbId], url: &str, _path: Option<&str>) -> StoreResult<u64> {
        let mut state = self.state.lock().unwrap();
        state.shot_writes.push(ids.to_vec());
        if state.shots_vanish {
            return Ok(0);
        }
        let mut written = 0;
        for shot in state.shots.iter_mut().filter(|s| ids.contains(&s.id)) {
            shot.existing_video_url = Some(url.into());
            written += 1;
        }
        Ok(written)
    }
}

#[async_trait]
impl DialogueStore for MemoryStore {
    async fn list_owned_dialogues(
        &self,
        project_id: DbId,
        owner_id: DbId,
        ids: &[DbId],
    ) -> StoreResult<Vec<Dialogue>> {
        let state = self.state.lock().unwrap();
        if !Self::owns(&state, project_id, owner_id) {
            return Ok(Vec::new());
        }
        Ok(state
            .dialogues
            .iter()
            .filter(|d| d.project_id == project_id && ids.contains(&d.id))
            .cloned()
            .collect())
    }

    async fn set_dialogue_audio(&self, id: DbId, url: &str, path: Option<&str>) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(d) = state.dialogues.iter_mut().find(|d| d.id == id) {
            d.audio_url = Some(url.into());
            d.audio_path = path.map(str::to_string);
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn create_tasks(&self, inputs: &[NewTask]) -> StoreResult<Vec<GenerationTask>> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let mut created = Vec::with_capacity(inputs.len());
        for input in inputs {
            let task = GenerationTask {
                id: state.tasks.len() as DbId + 100,
                owner_id: input.owner_id,
                project_id: input.project_id,
                novel_id: input.novel_id,
                act_id: input.act_id,
                subject_type: input.subject_type,
                subject_id: input.subject_id,
                kind: input.kind,
                status: TaskStatus::Pending,
                progress: PROGRESS_NONE,
                model_id: input.model_id,
                result_url: None,
                result_path: None,
                error_message: None,
                metadata: input.metadata.clone(),
                created_at: now,
                started_at: None,
                completed_at: None,
                updated_at: now,
            };
            state.tasks.push(task.clone());
            created.push(task);
        }
        Ok(created)
    }

    async fn mark_processing(&self, task_id: DbId) -> StoreResult<()> {
        if self.state.lock().unwrap().start_unavailable {
            return Err(StoreError::Unavailable("connection reset".into()));
        }
        self.transition(task_id, TaskStatus::Processing, |t| {
            t.started_at = Some(Utc::now());
        })
    }

    async fn update_progress(&self, task_id: DbId, progress: i16) -> StoreResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(t) = state
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id && t.status == TaskStatus::Processing)
        {
            t.progress = progress;
        }
        Ok(())
    }

    async fn complete_task(
        &self,
        task_id: DbId,
        result_url: &str,
        result_path: Option<&str>,
    ) -> StoreResult<()> {
        self.transition(task_id, TaskStatus::Completed, |t| {
            t.progress = PROGRESS_DONE;
            t.result_url = Some(result_url.into());
            t.result_path = result_path.map(str::to_string);
            t.completed_at = Some(Utc::now());
        })
    }

    async fn fail_task(
        &self,
        task_id: DbId,
        error_message: &str,
        metadata_patch: Value,
    ) -> StoreResult<()> {
        self.transition(task_id, TaskStatus::Failed, |t| {
            t.error_message = Some(error_message.into());
            t.completed_at = Some(Utc::now());
            if let (Value::Object(base), Value::Object(patch)) = (&mut t.metadata, metadata_patch) {
                base.extend(patch);
            }
        })
    }

    async fn find_task(&self, task_id: DbId, owner_id: DbId) -> StoreResult<Option<GenerationTask>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tasks
            .iter()
            .find(|t| t.id == task_id && t.owner_id == owner_id)
            .cloned())
    }

    async fn list_tasks(
        &self,
        owner_id: DbId,
        scope: TaskScope,
        params: &TaskListQuery,
    ) -> StoreResult<Vec<GenerationTask>> {
        let state = self.state.lock().unwrap();
        let mut tasks: Vec<GenerationTask> = state
            .tasks
            .iter()
            .filter(|t| t.owner_id == owner_id)
            .filter(|t| match scope {
                TaskScope::Project { project_id, novel_id } => {
                    t.project_id == project_id && novel_id.map_or(true, |n| t.novel_id == Some(n))
                }
                TaskScope::Act { act_id } => t.act_id == Some(act_id),
                TaskScope::Owner => true,
            })
            .filter(|t| params.status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(tasks
            .into_iter()
            .skip(params.effective_offset() as usize)
            .take(params.effective_limit() as usize)
            .collect())
    }
}

#[async_trait]
impl PromptStore for MemoryStore {
    async fn system_prompt(&self, function_key: &str) -> StoreResult<Option<String>> {
        Ok(self.state.lock().unwrap().prompts.get(function_key).cloned())
    }

    async fn feature_prompt(&self, id: DbId) -> StoreResult<Option<FeaturePrompt>> {
        Ok(self.state.lock().unwrap().features.get(&id).cloned())
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn project(video_model_id: Option<DbId>, credential: Option<&str>) -> Project {
    let now = Utc::now();
    Project {
        id: PROJECT,
        owner_id: OWNER,
        name: "Night Train".into(),
        video_model_id,
        video_api_key: credential.map(str::to_string),
        image_model_id: None,
        image_api_key: credential.map(str::to_string),
        tts_model_id: None,
        tts_api_key: credential.map(str::to_string),
        created_at: now,
        updated_at: now,
    }
}

pub fn model(id: DbId, model_type: ModelType, provider: &str) -> AiModel {
    let now = Utc::now();
    AiModel {
        id,
        name: format!("{provider} {model_type}"),
        provider: provider.into(),
        model_type,
        model_name: format!("{provider}-model"),
        base_url: "https://provider.example/v1".into(),
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

pub fn character(id: DbId, name: &str, video_url: Option<&str>) -> Character {
    let now = Utc::now();
    Character {
        id,
        project_id: PROJECT,
        name: name.into(),
        gender: Some("female".into()),
        appearance: Some("long coat".into()),
        description: None,
        voice_actor: None,
        image_url: None,
        image_path: None,
        video_url: video_url.map(str::to_string),
        video_path: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn shot(id: DbId, scene_id: DbId, order: i32, duration: f64) -> ShotUnit {
    ShotUnit {
        id,
        project_id: PROJECT,
        scene_id: Some(scene_id),
        order: Some(order),
        shot_number: None,
        duration_secs: Some(duration),
        description: Some(format!("shot {id}")),
        camera: None,
        mood: None,
        dialogue: Vec::new(),
        characters: Vec::new(),
        existing_video_url: None,
    }
}

pub fn with_character(mut shot: ShotUnit, character: &Character) -> ShotUnit {
    shot.characters.push(CharacterRef {
        id: character.id,
        name: character.name.clone(),
        gender: character.gender.clone(),
    });
    shot
}

pub fn dialogue(id: DbId, character_id: Option<DbId>, content: &str) -> Dialogue {
    let now = Utc::now();
    Dialogue {
        id,
        project_id: PROJECT,
        shot_id: None,
        character_id,
        speaker: None,
        content: content.into(),
        sort_order: id as i32,
        audio_url: None,
        audio_path: None,
        created_at: now,
        updated_at: now,
    }
}

/// A project with one active model per media type, all served by `provider`.
pub fn base_state(provider: &str) -> State {
    State {
        projects: vec![project(Some(1), Some("sk-test"))],
        models: vec![
            model(1, ModelType::Video, provider),
            model(2, ModelType::Image, provider),
            model(3, ModelType::Tts, provider),
        ],
        prompts: HashMap::from([("shot_video_generation".to_string(), "CINEMATIC".to_string())]),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

type Script = Box<dyn Fn(&GenerationRequest) -> Result<GenerationOutput, ProviderError> + Send + Sync>;

/// Adapter that answers from a script after an optional delay and records
/// every request plus the peak number of concurrent calls.
pub struct FakeAdapter {
    name: &'static str,
    kind: MediaKind,
    delay: Duration,
    script: Script,
    pub requests: Mutex<Vec<GenerationRequest>>,
    in_flight: AtomicUsize,
    pub peak: AtomicUsize,
}

impl FakeAdapter {
    pub fn new(
        name: &'static str,
        kind: MediaKind,
        script: impl Fn(&GenerationRequest) -> Result<GenerationOutput, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            kind,
            delay: Duration::ZERO,
            script: Box::new(script),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Always returns a fresh URL derived from the call number.
    pub fn succeeding(name: &'static str, kind: MediaKind) -> Self {
        let calls = AtomicUsize::new(0);
        Self::new(name, kind, move |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok(GenerationOutput::url(format!("https://provider.example/out/{n}.mp4")))
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, ProviderError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = (self.script)(request);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Serves [`CONTENT`] for every URL and records the URLs it was asked for.
#[derive(Default)]
pub struct FakeFetcher {
    pub sources: Mutex<Vec<String>>,
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<FetchedBytes, StorageError> {
        self.sources.lock().unwrap().push(url.to_string());
        Ok(FetchedBytes {
            bytes: CONTENT.to_vec(),
            mime_type: Some("video/mp4".into()),
        })
    }

    async fn download_to(&self, url: &str, dest: &Path) -> Result<Downloaded, StorageError> {
        self.sources.lock().unwrap().push(url.to_string());
        if let Some(dir) = dest.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(dest, CONTENT).await?;
        Ok(Downloaded {
            size: CONTENT.len() as u64,
            mime_type: Some("video/mp4".into()),
        })
    }
}

#[derive(Default)]
pub struct FakeHost {
    pub uploads: Mutex<Vec<String>>,
}

#[async_trait]
impl MediaHost for FakeHost {
    fn name(&self) -> &'static str {
        "fake-host"
    }

    async fn upload_bytes(&self, _bytes: Vec<u8>, filename: &str, _mime_type: &str) -> Result<String, StorageError> {
        self.uploads.lock().unwrap().push(filename.to_string());
        Ok(format!("https://files.example/{filename}"))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub fetcher: Arc<FakeFetcher>,
    pub host: Arc<FakeHost>,
    pub orchestrator: Arc<Orchestrator>,
    pub dir: tempfile::TempDir,
}

pub fn harness(state: State, adapters: Vec<Arc<dyn ProviderAdapter>>) -> Harness {
    harness_with(state, adapters, ModelResolver::default(), OrchestratorConfig::default())
}

pub fn harness_with(
    state: State,
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    models: ModelResolver,
    config: OrchestratorConfig,
) -> Harness {
    let store = Arc::new(MemoryStore::new(state));
    let fetcher = Arc::new(FakeFetcher::default());
    let host = Arc::new(FakeHost::default());
    let dir = tempfile::tempdir().expect("temp dir");

    let storage = StoragePipeline::new(
        Arc::clone(&fetcher) as Arc<dyn Fetcher>,
        Arc::clone(&host) as Arc<dyn MediaHost>,
        dir.path(),
        RetryPolicy::default(),
    );
    let mut providers = ProviderRegistry::new();
    for adapter in adapters {
        providers.register(adapter);
    }

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&store) as Arc<dyn Persistence>,
        Arc::new(providers),
        Arc::new(storage),
        models,
        config,
    ));
    Harness {
        store,
        fetcher,
        host,
        orchestrator,
        dir,
    }
}

/// Metadata key lookup that tolerates missing keys.
pub fn meta<'a>(task: &'a GenerationTask, key: &str) -> &'a Value {
    task.metadata.get(key).unwrap_or(&Value::Null)
}

/// Group a list of tasks' subject ids by status.
pub fn statuses(tasks: &[GenerationTask]) -> HashMap<DbId, TaskStatus> {
    tasks.iter().map(|t| (t.subject_id, t.status)).collect()
}
