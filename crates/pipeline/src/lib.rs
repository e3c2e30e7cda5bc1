//! Generation task orchestration.
//!
//! [`Orchestrator`] accepts batch requests, resolves the model once per
//! batch, creates `pending` task records and hands the work to the
//! [`Executor`] as lanes. Each lane runs its units one after another through
//! reference resolution, the provider adapter and the storage pipeline,
//! writing the outcome back to the task and the subject entity.

pub mod config;
pub mod error;
pub mod executor;
pub mod model_resolver;
pub mod orchestrator;
pub mod reference_resolver;
pub mod registry;
pub mod units;

pub use config::OrchestratorConfig;
pub use error::{GenerationError, MissingReference};
pub use executor::{Executor, ShutdownReport};
pub use model_resolver::ModelResolver;
pub use orchestrator::{
    BatchOptions, BatchRequest, BatchSubmission, BatchTarget, Orchestrator, SkippedSubject,
    SubmittedTask,
};
pub use reference_resolver::ReferenceResolver;
pub use registry::TaskRegistry;
