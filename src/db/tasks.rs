//! Task instance rows: creation, queries, conditional status updates and the
//! expiry sweep.

use super::players::get_player_internal;
use super::templates::bad_text;
use super::transitions::record_transition;
use super::{Database, optional};
use crate::error::{LedgerError, LedgerResult};
use crate::types::{Difficulty, NewTask, Task, TaskBoard, TaskFilter, TaskKind, TaskStatus};
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params, params_from_iter};

const TASK_COLUMNS: &str = "id, title, description, difficulty, kind, reward, expiry_time, \
     start_time, status, player_id, template_id, created_at, updated_at";

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let difficulty: String = row.get("difficulty")?;
    let kind: String = row.get("kind")?;
    let status: String = row.get("status")?;

    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        difficulty: Difficulty::from_str(&difficulty)
            .ok_or_else(|| bad_text("difficulty", &difficulty))?,
        kind: TaskKind::from_str(&kind).ok_or_else(|| bad_text("kind", &kind))?,
        reward: row.get("reward")?,
        expiry_time: row.get("expiry_time")?,
        start_time: row.get("start_time")?,
        status: TaskStatus::from_str(&status).ok_or_else(|| bad_text("status", &status))?,
        player_id: row.get("player_id")?,
        template_id: row.get("template_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Internal helper to get a task using an existing connection (avoids deadlock).
pub(crate) fn get_task_internal(conn: &Connection, task_id: i64) -> LedgerResult<Option<Task>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS))?;
    optional(stmt.query_row(params![task_id], parse_task_row))
}

/// Insert a new `available` task and record its initial transition.
pub(crate) fn insert_task_internal(conn: &Connection, task: &NewTask, now: &str) -> LedgerResult<i64> {
    conn.execute(
        "INSERT INTO tasks (
            title, description, difficulty, kind, reward, expiry_time, start_time,
            status, template_id, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'available', ?8, ?9, ?10)",
        params![
            task.title,
            task.description,
            task.difficulty.as_str(),
            task.kind.as_str(),
            task.reward,
            task.expiry_time,
            task.start_time,
            task.template_id,
            now,
            now,
        ],
    )?;
    let task_id = conn.last_insert_rowid();
    record_transition(conn, task_id, TaskStatus::Available, None, Some("generated"), now)?;
    Ok(task_id)
}

/// Number of available or claimed instances of a template.
pub(crate) fn count_active_for_template(conn: &Connection, template_id: i64) -> LedgerResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM tasks
         WHERE template_id = ?1 AND status IN ('available', 'claimed')",
        params![template_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Number of instances of a template regardless of status.
pub(crate) fn count_for_template(conn: &Connection, template_id: i64) -> LedgerResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM tasks WHERE template_id = ?1",
        params![template_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Latest expiry among a template's instances, in any status.
pub(crate) fn latest_expiry_for_template(
    conn: &Connection,
    template_id: i64,
) -> LedgerResult<Option<String>> {
    let latest = conn.query_row(
        "SELECT MAX(expiry_time) FROM tasks WHERE template_id = ?1",
        params![template_id],
        |row| row.get(0),
    )?;
    Ok(latest)
}

/// Move an available task to `claimed` if it is inside its window.
///
/// The status condition in the WHERE clause arbitrates racing claims: exactly
/// one writer sees a changed row. Returns whether the row changed.
pub(crate) fn claim_if_available(
    conn: &Connection,
    task_id: i64,
    player_id: i64,
    now: &str,
) -> LedgerResult<bool> {
    let updated = conn.execute(
        "UPDATE tasks SET status = 'claimed', player_id = ?1, updated_at = ?2
         WHERE id = ?3 AND status = 'available'
           AND (start_time IS NULL OR start_time <= ?2)
           AND expiry_time > ?2",
        params![player_id, now, task_id],
    )?;
    Ok(updated == 1)
}

/// Conditional status update: `expected -> next`, optionally also requiring
/// the task to be owned by `owner`. Returns whether the row changed.
pub(crate) fn update_status_if(
    conn: &Connection,
    task_id: i64,
    expected: TaskStatus,
    next: TaskStatus,
    owner: Option<i64>,
    now: &str,
) -> LedgerResult<bool> {
    let updated = conn.execute(
        "UPDATE tasks SET status = ?1, updated_at = ?2
         WHERE id = ?3 AND status = ?4 AND (?5 IS NULL OR player_id = ?5)",
        params![next.as_str(), now, task_id, expected.as_str(), owner],
    )?;
    Ok(updated == 1)
}

impl Database {
    /// Get a task by ID.
    pub fn get_task(&self, task_id: i64) -> LedgerResult<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, task_id))
    }

    /// List tasks matching a filter, newest first.
    pub fn list_tasks(&self, filter: &TaskFilter) -> LedgerResult<Vec<Task>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if !filter.statuses.is_empty() {
            let placeholders: Vec<String> = filter
                .statuses
                .iter()
                .map(|s| {
                    values.push(Value::Text(s.as_str().to_string()));
                    format!("?{}", values.len())
                })
                .collect();
            clauses.push(format!("status IN ({})", placeholders.join(", ")));
        }
        if let Some(player_id) = filter.player_id {
            values.push(Value::Integer(player_id));
            clauses.push(format!("player_id = ?{}", values.len()));
        }
        if let Some(template_id) = filter.template_id {
            values.push(Value::Integer(template_id));
            clauses.push(format!("template_id = ?{}", values.len()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks {} ORDER BY created_at DESC, id DESC",
                TASK_COLUMNS, where_clause
            ))?;
            let tasks = stmt
                .query_map(params_from_iter(values.iter()), parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
    }

    /// Available tasks that have started and not yet expired at `now`.
    pub fn claimable_tasks(&self, now: &str) -> LedgerResult<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks
                 WHERE status = 'available'
                   AND (start_time IS NULL OR start_time <= ?1)
                   AND expiry_time > ?1
                 ORDER BY created_at DESC, id DESC",
                TASK_COLUMNS
            ))?;
            let tasks = stmt
                .query_map(params![now], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
    }

    /// Available tasks whose start time is still ahead of `now`, soonest first.
    pub fn upcoming_tasks(&self, now: &str) -> LedgerResult<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks
                 WHERE status = 'available' AND start_time > ?1
                 ORDER BY start_time ASC, id ASC",
                TASK_COLUMNS
            ))?;
            let tasks = stmt
                .query_map(params![now], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
    }

    /// Tasks the player has claimed or completed, most recently touched first.
    pub fn player_tasks(&self, player_id: i64) -> LedgerResult<Vec<Task>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks
                 WHERE player_id = ?1 AND status IN ('claimed', 'completed')
                 ORDER BY updated_at DESC, id DESC",
                TASK_COLUMNS
            ))?;
            let tasks = stmt
                .query_map(params![player_id], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
    }

    /// Everything the player-facing board shows for `player_id` at `now`.
    pub fn task_board(&self, player_id: i64, now: &str) -> LedgerResult<TaskBoard> {
        let player = self
            .with_conn(|conn| get_player_internal(conn, player_id))?
            .ok_or_else(|| LedgerError::player_not_found(player_id))?;
        Ok(TaskBoard {
            player,
            claimable: self.claimable_tasks(now)?,
            upcoming: self.upcoming_tasks(now)?,
            in_progress: self.player_tasks(player_id)?,
        })
    }

    /// Active (available or claimed) instances of a template.
    pub fn count_active_instances(&self, template_id: i64) -> LedgerResult<i64> {
        self.with_conn(|conn| count_active_for_template(conn, template_id))
    }

    /// All instances of a template regardless of status.
    pub fn count_instances(&self, template_id: i64) -> LedgerResult<i64> {
        self.with_conn(|conn| count_for_template(conn, template_id))
    }

    /// Admin delete of a single task instance.
    pub fn delete_task(&self, task_id: i64) -> LedgerResult<()> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
            if removed == 0 {
                return Err(LedgerError::task_not_found(task_id));
            }
            Ok(())
        })
    }

    /// Batch expiry sweep: every available or claimed task whose expiry is
    /// before `now` becomes `expired`. Completed and verified tasks are left
    /// alone. Returns the ids that changed.
    pub fn expire_overdue(&self, now: &str) -> LedgerResult<Vec<i64>> {
        self.with_transaction(|tx| {
            let ids: Vec<i64> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM tasks
                     WHERE expiry_time < ?1 AND status IN ('available', 'claimed')
                     ORDER BY id",
                )?;
                stmt.query_map(params![now], |row| row.get(0))?
                    .collect::<Result<Vec<_>, _>>()?
            };

            if ids.is_empty() {
                return Ok(ids);
            }

            tx.execute(
                "UPDATE tasks SET status = 'expired', updated_at = ?1
                 WHERE expiry_time < ?1 AND status IN ('available', 'claimed')",
                params![now],
            )?;

            for id in &ids {
                record_transition(tx, *id, TaskStatus::Expired, None, Some("expiry sweep"), now)?;
            }

            Ok(ids)
        })
    }
}
