//! In-flight task registry.
//!
//! Tracks every task between submission and its terminal state, keyed by
//! task id, plus the subjects a submission has claimed but not yet turned
//! into tasks. Shared by reference between the orchestrator and its lanes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use storyreel_core::task::SubjectType;
use storyreel_core::types::DbId;

/// Where an in-flight task is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneState {
    Queued,
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    pub batch_id: String,
    pub subject_type: SubjectType,
    /// Every subject the task writes to (all members of a merged group).
    pub subject_ids: Vec<DbId>,
    pub state: LaneState,
}

#[derive(Debug, Default)]
struct Inner {
    tasks: HashMap<DbId, InFlight>,
    reservations: HashMap<u64, (SubjectType, Vec<DbId>)>,
    next_reservation: u64,
}

impl Inner {
    fn is_busy(&self, subject_type: SubjectType, id: DbId) -> bool {
        self.tasks
            .values()
            .any(|t| t.subject_type == subject_type && t.subject_ids.contains(&id))
            || self
                .reservations
                .values()
                .any(|(ty, ids)| *ty == subject_type && ids.contains(&id))
    }
}

#[derive(Debug, Default)]
pub struct TaskRegistry {
    inner: Mutex<Inner>,
}

/// Claim on subjects held while a submission creates its tasks. Released
/// on drop.
#[derive(Debug)]
pub struct Reservation {
    registry: Arc<TaskRegistry>,
    id: u64,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let id = self.id;
        self.registry.with_inner(|inner| {
            inner.reservations.remove(&id);
        });
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut guard = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn with_tasks<R>(&self, f: impl FnOnce(&mut HashMap<DbId, InFlight>) -> R) -> R {
        self.with_inner(|inner| f(&mut inner.tasks))
    }

    /// Atomically claim every subject in `ids` that is not already claimed
    /// or in flight. Returns the claim and the ids that were busy.
    pub fn reserve(self: &Arc<Self>, subject_type: SubjectType, ids: &[DbId]) -> (Reservation, Vec<DbId>) {
        let (id, busy) = self.with_inner(|inner| {
            let (busy, free): (Vec<DbId>, Vec<DbId>) =
                ids.iter().copied().partition(|&id| inner.is_busy(subject_type, id));
            let id = inner.next_reservation;
            inner.next_reservation += 1;
            inner.reservations.insert(id, (subject_type, free));
            (id, busy)
        });
        (
            Reservation {
                registry: Arc::clone(self),
                id,
            },
            busy,
        )
    }

    pub fn register(&self, task_id: DbId, batch_id: &str, subject_type: SubjectType, subject_ids: Vec<DbId>) {
        self.with_tasks(|tasks| {
            tasks.insert(
                task_id,
                InFlight {
                    batch_id: batch_id.to_string(),
                    subject_type,
                    subject_ids,
                    state: LaneState::Queued,
                },
            );
        });
    }

    pub fn mark_running(&self, task_id: DbId) {
        self.with_tasks(|tasks| {
            if let Some(entry) = tasks.get_mut(&task_id) {
                entry.state = LaneState::Running;
            }
        });
    }

    /// Forget a task once it is terminal.
    pub fn finish(&self, task_id: DbId) -> Option<InFlight> {
        self.with_tasks(|tasks| tasks.remove(&task_id))
    }

    pub fn get(&self, task_id: DbId) -> Option<InFlight> {
        self.with_tasks(|tasks| tasks.get(&task_id).cloned())
    }

    /// Subjects among `ids` that some in-flight task is already generating.
    pub fn busy_subjects(&self, subject_type: SubjectType, ids: &[DbId]) -> Vec<DbId> {
        self.with_inner(|inner| {
            ids.iter()
                .copied()
                .filter(|&id| inner.is_busy(subject_type, id))
                .collect()
        })
    }

    pub fn len(&self) -> usize {
        self.with_tasks(|tasks| tasks.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tasks currently executing.
    pub fn running(&self) -> usize {
        self.with_tasks(|tasks| {
            tasks
                .values()
                .filter(|t| t.state == LaneState::Running)
                .count()
        })
    }
}
