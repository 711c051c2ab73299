//! Background fetch cycles: manually triggered tasks and the periodic
//! scheduler.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::CycleError;
use crate::fetch::Coordinator;

/// Finished tasks kept for status queries.
const MAX_FINISHED_TASKS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Started,
    Success,
    Failure,
    Revoked,
}

impl TaskState {
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Revoked)
    }
}

/// Snapshot returned by the task status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub state: TaskState,
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

struct TaskEntry {
    state: watch::Sender<TaskState>,
    result: Option<Value>,
    cancel: CancellationToken,
    finished_at: Option<Instant>,
}

type Registry = Arc<Mutex<HashMap<String, TaskEntry>>>;

/// Runs fetch cycles on demand and tracks their outcome by task id.
pub struct TaskManager {
    coordinator: Arc<Coordinator>,
    tasks: Registry,
}

impl TaskManager {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            tasks: Arc::default(),
        }
    }

    /// Start one cycle in the background and return its task id.
    ///
    /// Must be called from within a tokio runtime.
    pub fn trigger(&self) -> String {
        let task_id = hex::encode(rand::random::<[u8; 16]>());
        let cancel = CancellationToken::new();
        let (state, _) = watch::channel(TaskState::Pending);

        {
            let mut tasks = lock(&self.tasks);
            prune_finished(&mut tasks);
            tasks.insert(
                task_id.clone(),
                TaskEntry {
                    state,
                    result: None,
                    cancel: cancel.clone(),
                    finished_at: None,
                },
            );
        }

        let coordinator = self.coordinator.clone();
        let registry = self.tasks.clone();
        let id = task_id.clone();

        tokio::spawn(async move {
            if cancel.is_cancelled() {
                return;
            }
            mark_started(&registry, &id);
            log::info!("▶️  Task {} started", id);

            let (state, result) = match coordinator.run_cycle(&cancel).await {
                Ok(report) => (TaskState::Success, serde_json::to_value(&report).ok()),
                Err(CycleError::Cancelled) => (TaskState::Revoked, None),
                Err(e) => {
                    log::error!("❌ Task {} failed: {}", id, e);
                    (TaskState::Failure, Some(Value::String(e.to_string())))
                }
            };
            finish(&registry, &id, state, result);
        });

        log::info!("📨 Fetch cycle queued as task {}", task_id);
        task_id
    }

    pub fn status(&self, task_id: &str) -> Option<TaskStatus> {
        let tasks = lock(&self.tasks);
        tasks.get(task_id).map(|entry| snapshot(task_id, entry))
    }

    /// Cancel a task. An unfinished task is revoked at once; its cycle stops
    /// starting new pages and writes nothing. Finished tasks are left as is.
    pub fn cancel(&self, task_id: &str) -> Option<TaskStatus> {
        let mut tasks = lock(&self.tasks);
        let entry = tasks.get_mut(task_id)?;

        if !entry.state.borrow().is_ready() {
            entry.cancel.cancel();
            entry.state.send_replace(TaskState::Revoked);
            entry.finished_at = Some(Instant::now());
            log::warn!("🛑 Task {} revoked", task_id);
        }
        Some(snapshot(task_id, entry))
    }

    /// Wait until the task reaches a terminal state.
    pub async fn wait(&self, task_id: &str) -> Option<TaskStatus> {
        let mut rx = lock(&self.tasks).get(task_id)?.state.subscribe();
        // The sender lives in the registry until pruned, which only happens
        // to finished tasks.
        let _ = rx.wait_for(|state| state.is_ready()).await;
        self.status(task_id)
    }
}

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<String, TaskEntry>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn snapshot(task_id: &str, entry: &TaskEntry) -> TaskStatus {
    let state = *entry.state.borrow();
    TaskStatus {
        task_id: task_id.to_string(),
        state,
        ready: state.is_ready(),
        result: entry.result.clone(),
    }
}

fn mark_started(registry: &Registry, task_id: &str) {
    if let Some(entry) = lock(registry).get(task_id) {
        entry.state.send_if_modified(|state| {
            if *state == TaskState::Pending {
                *state = TaskState::Started;
                true
            } else {
                false
            }
        });
    }
}

fn finish(registry: &Registry, task_id: &str, state: TaskState, result: Option<Value>) {
    let mut tasks = lock(registry);
    let Some(entry) = tasks.get_mut(task_id) else {
        return;
    };

    // A revoked task stays revoked and carries no result, even if its cycle
    // got past the cancellation point and wrote its batch.
    if *entry.state.borrow() != TaskState::Revoked {
        entry.result = result;
        entry.state.send_replace(state);
        entry.finished_at = Some(Instant::now());
    }
    log::info!("🏁 Task {} finished: {:?}", task_id, *entry.state.borrow());
}

fn prune_finished(tasks: &mut HashMap<String, TaskEntry>) {
    let mut finished: Vec<(Instant, String)> = tasks
        .iter()
        .filter_map(|(id, entry)| entry.finished_at.map(|at| (at, id.clone())))
        .collect();
    if finished.len() < MAX_FINISHED_TASKS {
        return;
    }

    finished.sort();
    let excess = finished.len() + 1 - MAX_FINISHED_TASKS;
    for (_, id) in finished.into_iter().take(excess) {
        tasks.remove(&id);
    }
}

/// Run a cycle every `period` until `shutdown` fires. The first cycle
/// starts one period after launch.
///
/// Cycles overlapping a manual trigger are safe: the sink ignores tweets
/// that are already stored.
pub async fn run_scheduled(coordinator: Arc<Coordinator>, period: Duration, shutdown: CancellationToken) {
    log::info!("⏰ Starting fetch scheduler (interval: {}s)", period.as_secs());

    let mut timer = interval_at(tokio::time::Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = timer.tick() => {
                let cycle = shutdown.child_token();
                match coordinator.run_cycle(&cycle).await {
                    Ok(report) => log::info!("⏰ Scheduled cycle wrote {} tweets", report.written),
                    Err(e) => log::error!("❌ Scheduled cycle failed: {}", e),
                }
            }
        }
    }

    log::info!("⏰ Fetch scheduler stopped");
}
