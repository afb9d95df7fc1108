//! Task registry and per-task write handles
//!
//! The registry map is only locked to insert, look up and evict. Each task's
//! record sits behind its own lock, so polls of one task never wait on
//! another task's pipeline.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::broadcast;

use crate::types::{Event, Task, TaskId, TaskResult, TaskStatus};

/// One task's record plus its run guard
pub(crate) struct TaskSlot {
    record: RwLock<Task>,
    claimed: AtomicBool,
}

impl TaskSlot {
    fn new(task: Task) -> Self {
        Self {
            record: RwLock::new(task),
            claimed: AtomicBool::new(false),
        }
    }

    /// Consistent copy of the record
    pub(crate) fn snapshot(&self) -> Task {
        self.read().clone()
    }

    /// Mark the task as started. Returns false if it already was.
    pub(crate) fn claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// Finished, or never run, and untouched since before `cutoff`
    fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        let task = self.read();
        (task.status.is_terminal() || !self.is_claimed()) && task.updated_at < cutoff
    }

    fn read(&self) -> RwLockReadGuard<'_, Task> {
        // Writes have no fallible steps, so a poisoned record is still consistent
        self.record.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Task> {
        self.record.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-wide map of task id to task slot
pub(crate) struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, Arc<TaskSlot>>>,
    max_tasks: usize,
    ttl: Duration,
}

impl TaskRegistry {
    /// `ttl` is how long a finished or never-run task is kept
    pub(crate) fn new(max_tasks: usize, ttl: Duration) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            max_tasks,
            ttl,
        }
    }

    /// Insert a fresh pending task under a newly generated id
    ///
    /// Returns the id and the number of stale tasks evicted to stay under the cap.
    pub(crate) fn insert(&self) -> (TaskId, usize) {
        let (id, _, evicted) = self.insert_slot(false);
        (id, evicted)
    }

    /// Insert a fresh pending task that is already claimed for running
    pub(crate) fn insert_claimed(&self) -> (TaskId, Arc<TaskSlot>, usize) {
        self.insert_slot(true)
    }

    fn insert_slot(&self, claimed: bool) -> (TaskId, Arc<TaskSlot>, usize) {
        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);

        let mut id = TaskId::generate();
        while tasks.contains_key(&id) {
            id = TaskId::generate();
        }
        let slot = Arc::new(TaskSlot::new(Task::pending(id.clone())));
        if claimed {
            slot.claim();
        }
        tasks.insert(id.clone(), Arc::clone(&slot));

        let evicted = evict_over_capacity(&mut tasks, self.max_tasks, cutoff(self.ttl), &id);
        (id, slot, evicted)
    }

    pub(crate) fn get(&self, id: &TaskId) -> Option<Arc<TaskSlot>> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Drop stale tasks: finished, or never run, and older than the ttl
    pub(crate) fn evict_expired(&self) -> usize {
        let Some(cutoff) = cutoff(self.ttl) else {
            return 0;
        };

        let mut tasks = self.tasks.write().unwrap_or_else(PoisonError::into_inner);
        let before = tasks.len();
        tasks.retain(|_, slot| !slot.is_stale(cutoff));
        before - tasks.len()
    }

    /// Tasks nobody has started, with their slots
    pub(crate) fn unclaimed(&self) -> Vec<(TaskId, Arc<TaskSlot>)> {
        self.tasks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, slot)| !slot.is_claimed())
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect()
    }
}

fn cutoff(ttl: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(ttl).ok().map(|ttl| Utc::now() - ttl)
}

/// Evict the oldest finished tasks until `tasks` fits in `max_tasks`
///
/// Never-run tasks older than the ttl count as finished. Running tasks,
/// recent pending ones and `keep` are never evicted, so the map may stay
/// over the cap while many tasks are in flight.
fn evict_over_capacity(
    tasks: &mut HashMap<TaskId, Arc<TaskSlot>>,
    max_tasks: usize,
    cutoff: Option<DateTime<Utc>>,
    keep: &TaskId,
) -> usize {
    let excess = tasks.len().saturating_sub(max_tasks);
    if excess == 0 {
        return 0;
    }

    let mut finished: Vec<_> = tasks
        .iter()
        .filter(|(id, _)| *id != keep)
        .filter_map(|(id, slot)| {
            let task = slot.read();
            let abandoned =
                !slot.is_claimed() && cutoff.is_some_and(|cutoff| task.updated_at < cutoff);
            (task.status.is_terminal() || abandoned).then(|| (task.updated_at, id.clone()))
        })
        .collect();
    finished.sort();

    let mut evicted = 0;
    for (_, id) in finished.into_iter().take(excess) {
        tasks.remove(&id);
        evicted += 1;
    }
    evicted
}

/// The only writer of a task's record
///
/// Owned by the pipeline that claimed the task. Every update also goes out
/// on the event channel.
pub(crate) struct TaskHandle {
    id: TaskId,
    slot: Arc<TaskSlot>,
    event_tx: broadcast::Sender<Event>,
}

impl TaskHandle {
    pub(crate) fn new(id: TaskId, slot: Arc<TaskSlot>, event_tx: broadcast::Sender<Event>) -> Self {
        Self { id, slot, event_tx }
    }

    pub(crate) fn id(&self) -> &TaskId {
        &self.id
    }

    /// Move to running
    pub(crate) fn start(&self, message: &str) {
        {
            let mut task = self.slot.write();
            if task.status != TaskStatus::Pending {
                return;
            }
            task.status = TaskStatus::Running;
            task.message = message.to_string();
            task.updated_at = Utc::now();
        }
        tracing::debug!(task_id = %self.id, "Task running");
        self.emit_progress();
    }

    /// Record a new stage
    ///
    /// Progress never moves backwards; a lower value only updates the message.
    pub(crate) fn advance(&self, progress: u8, message: impl Into<String>) {
        {
            let mut task = self.slot.write();
            if task.status.is_terminal() {
                return;
            }
            task.progress = task.progress.max(progress.min(100));
            task.message = message.into();
            task.updated_at = Utc::now();
        }
        self.emit_progress();
    }

    /// Move to completed with `result`
    pub(crate) fn complete(self, result: TaskResult) {
        let folder = result.folder.clone();
        {
            let mut task = self.slot.write();
            if task.status.is_terminal() {
                return;
            }
            task.status = TaskStatus::Completed;
            task.progress = 100;
            task.message = result.summary.clone();
            task.result = Some(result);
            task.updated_at = Utc::now();
        }
        tracing::info!(task_id = %self.id, folder = %folder, "Task completed");
        self.event_tx
            .send(Event::Completed {
                id: self.id.clone(),
                folder,
            })
            .ok();
    }

    /// Move to failed, keeping the last progress value
    pub(crate) fn fail(self, error: String) {
        {
            let mut task = self.slot.write();
            if task.status.is_terminal() {
                return;
            }
            task.status = TaskStatus::Failed;
            task.message = "Failed".to_string();
            task.error = Some(error.clone());
            task.updated_at = Utc::now();
        }
        tracing::warn!(task_id = %self.id, error = %error, "Task failed");
        self.event_tx
            .send(Event::Failed {
                id: self.id.clone(),
                error,
            })
            .ok();
    }

    fn emit_progress(&self) {
        let (progress, message) = {
            let task = self.slot.read();
            (task.progress, task.message.clone())
        };
        self.event_tx
            .send(Event::Progress {
                id: self.id.clone(),
                progress,
                message,
            })
            .ok();
    }
}
