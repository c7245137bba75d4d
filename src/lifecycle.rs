//! Task lifecycle: claim, complete, verify, expire.
//!
//! Every transition is a conditional update inside a transaction. A failed
//! precondition rolls the transaction back and is reported as `Conflict`
//! (wrong status) or `Forbidden` (wrong owner), never recovered locally.

use crate::db::Database;
use crate::db::players::{credit_player_internal, get_player_internal};
use crate::db::tasks::{claim_if_available, get_task_internal, update_status_if};
use crate::db::transitions::record_transition;
use crate::error::{LedgerError, LedgerResult};
use crate::generator::InstanceGenerator;
use crate::timestamp::{format_timestamp, local_now};
use crate::types::{Task, TaskStatus};
use chrono::NaiveDateTime;
use rusqlite::Connection;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Request to regenerate a template's next instance, posted after a
/// completion commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegenerationRequest {
    pub template_id: i64,
    pub completed_task_id: i64,
    /// Reference time of the completion; the successor is planned from it.
    pub completed_at: NaiveDateTime,
}

/// Drives task instances through the state machine.
#[derive(Clone)]
pub struct TaskLifecycle {
    db: Database,
    generator: InstanceGenerator,
    regeneration_tx: Option<mpsc::UnboundedSender<RegenerationRequest>>,
}

impl TaskLifecycle {
    pub fn new(db: Database) -> Self {
        let generator = InstanceGenerator::new(db.clone());
        Self {
            db,
            generator,
            regeneration_tx: None,
        }
    }

    /// Post regeneration requests to a background worker instead of running
    /// them inline after `complete`.
    pub fn with_regeneration_queue(
        mut self,
        tx: mpsc::UnboundedSender<RegenerationRequest>,
    ) -> Self {
        self.regeneration_tx = Some(tx);
        self
    }

    /// Claim an available task for a player.
    pub fn claim(&self, task_id: i64, player_id: i64) -> LedgerResult<Task> {
        self.claim_at(task_id, player_id, local_now())
    }

    pub fn claim_at(&self, task_id: i64, player_id: i64, now: NaiveDateTime) -> LedgerResult<Task> {
        let now = format_timestamp(now);
        let task = self.db.with_transaction(|tx| {
            let task = load_task(tx, task_id)?;
            if get_player_internal(tx, player_id)?.is_none() {
                return Err(LedgerError::player_not_found(player_id));
            }
            require_transition(&task, TaskStatus::Claimed)?;

            if !claim_if_available(tx, task_id, player_id, &now)? {
                return Err(claim_conflict(&task, &now));
            }
            record_transition(tx, task_id, TaskStatus::Claimed, Some(player_id), None, &now)?;
            load_task(tx, task_id)
        })?;

        info!(task_id, player_id, "Task claimed");
        Ok(task)
    }

    /// Mark a claimed task completed by its owner, then ask for the
    /// template's next instance.
    pub fn complete(&self, task_id: i64, player_id: i64) -> LedgerResult<Task> {
        self.complete_at(task_id, player_id, local_now())
    }

    pub fn complete_at(
        &self,
        task_id: i64,
        player_id: i64,
        now: NaiveDateTime,
    ) -> LedgerResult<Task> {
        let now_str = format_timestamp(now);
        let task = self.db.with_transaction(|tx| {
            let task = load_task(tx, task_id)?;

            // Ownership is checked before status: a non-owner is refused
            // whatever state the task is in.
            if task.player_id != Some(player_id) {
                return Err(LedgerError::not_owner(task_id, player_id));
            }
            require_transition(&task, TaskStatus::Completed)?;
            if !update_status_if(
                tx,
                task_id,
                TaskStatus::Claimed,
                TaskStatus::Completed,
                Some(player_id),
                &now_str,
            )? {
                return Err(LedgerError::wrong_status(
                    task_id,
                    task.status.as_str(),
                    TaskStatus::Claimed.as_str(),
                ));
            }
            record_transition(tx, task_id, TaskStatus::Completed, Some(player_id), None, &now_str)?;
            load_task(tx, task_id)
        })?;

        info!(task_id, player_id, "Task completed");

        if let Some(template_id) = task.template_id {
            self.regenerate(
                RegenerationRequest {
                    template_id,
                    completed_task_id: task_id,
                    completed_at: now,
                },
            );
        }

        Ok(task)
    }

    /// Verify a completed task: credit the reward to its owner and mark it
    /// verified, both in one transaction.
    pub fn verify(&self, task_id: i64) -> LedgerResult<Task> {
        self.verify_at(task_id, local_now())
    }

    pub fn verify_at(&self, task_id: i64, now: NaiveDateTime) -> LedgerResult<Task> {
        let now = format_timestamp(now);
        let task = self.db.with_transaction(|tx| {
            let task = load_task(tx, task_id)?;
            require_transition(&task, TaskStatus::Verified)?;
            let owner = task.player_id.ok_or_else(|| {
                LedgerError::Conflict(format!("Task {} has no owning player", task_id))
            })?;

            credit_player_internal(tx, owner, task.reward)?;
            if !update_status_if(
                tx,
                task_id,
                TaskStatus::Completed,
                TaskStatus::Verified,
                None,
                &now,
            )? {
                return Err(LedgerError::wrong_status(
                    task_id,
                    task.status.as_str(),
                    TaskStatus::Completed.as_str(),
                ));
            }
            record_transition(tx, task_id, TaskStatus::Verified, Some(owner), None, &now)?;
            load_task(tx, task_id)
        })?;

        info!(
            task_id,
            player_id = ?task.player_id,
            reward = task.reward,
            "Task verified and reward credited"
        );
        Ok(task)
    }

    /// Expire every overdue available or claimed task. Returns the ids moved.
    pub fn expire_overdue(&self) -> LedgerResult<Vec<i64>> {
        self.expire_overdue_at(local_now())
    }

    pub fn expire_overdue_at(&self, now: NaiveDateTime) -> LedgerResult<Vec<i64>> {
        let expired = self.db.expire_overdue(&format_timestamp(now))?;
        if !expired.is_empty() {
            info!(count = expired.len(), "Expired overdue tasks");
        }
        Ok(expired)
    }

    /// Best-effort successor generation. Failures are logged and dropped so
    /// the completion that triggered it stands.
    fn regenerate(&self, request: RegenerationRequest) {
        if let Some(ref tx) = self.regeneration_tx {
            match tx.send(request) {
                Ok(()) => {
                    debug!(template_id = request.template_id, "Queued instance regeneration");
                    return;
                }
                Err(_) => {
                    warn!(
                        template_id = request.template_id,
                        "Regeneration worker gone, regenerating inline"
                    );
                }
            }
        }

        if let Err(e) = self
            .generator
            .ensure_instance_at(request.template_id, None, None, request.completed_at)
        {
            warn!(
                template_id = request.template_id,
                task_id = request.completed_task_id,
                error = %e,
                "Failed to generate successor instance"
            );
        }
    }
}

fn load_task(conn: &Connection, task_id: i64) -> LedgerResult<Task> {
    get_task_internal(conn, task_id)?.ok_or_else(|| LedgerError::task_not_found(task_id))
}

/// Refuse a move the state machine has no edge for. The conditional update
/// that follows still arbitrates races against concurrent writers.
fn require_transition(task: &Task, next: TaskStatus) -> LedgerResult<()> {
    if task.status.can_transition_to(next) {
        return Ok(());
    }
    let expected = match next {
        TaskStatus::Claimed => "available",
        TaskStatus::Completed => "claimed",
        TaskStatus::Verified => "completed",
        TaskStatus::Available | TaskStatus::Expired => "a non-terminal status",
    };
    Err(LedgerError::wrong_status(task.id, task.status.as_str(), expected))
}

/// Explain why a claim's conditional update matched nothing.
fn claim_conflict(task: &Task, now: &str) -> LedgerError {
    if task.status != TaskStatus::Available {
        return LedgerError::wrong_status(task.id, task.status.as_str(), "available");
    }
    match task.start_time.as_deref() {
        Some(start) if start > now => {
            LedgerError::Conflict(format!("Task {} is not open until {}", task.id, start))
        }
        _ => LedgerError::Conflict(format!(
            "Task {} expired at {}",
            task.id, task.expiry_time
        )),
    }
}
