//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument. Ownership checks join through
//! `projects.owner_id`.

pub mod ai_model_repo;
pub mod character_repo;
pub mod dialogue_repo;
pub mod project_repo;
pub mod prompt_repo;
pub mod shot_repo;
pub mod task_repo;

pub use ai_model_repo::AiModelRepo;
pub use character_repo::CharacterRepo;
pub use dialogue_repo::DialogueRepo;
pub use project_repo::ProjectRepo;
pub use prompt_repo::PromptRepo;
pub use shot_repo::ShotRepo;
pub use task_repo::TaskRepo;
