//! Status transition history.

use super::Database;
use super::templates::bad_text;
use crate::error::LedgerResult;
use crate::types::{TaskStatus, TaskTransition};
use rusqlite::{Connection, params};

/// Append a transition row. Callers pass the same transaction that performs
/// the status write so the history never disagrees with the task row.
pub(crate) fn record_transition(
    conn: &Connection,
    task_id: i64,
    status: TaskStatus,
    player_id: Option<i64>,
    reason: Option<&str>,
    timestamp: &str,
) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO task_transitions (task_id, status, player_id, reason, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![task_id, status.as_str(), player_id, reason, timestamp],
    )?;
    Ok(())
}

impl Database {
    /// Status history of a task, oldest first.
    pub fn task_history(&self, task_id: i64) -> LedgerResult<Vec<TaskTransition>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_id, status, player_id, reason, timestamp
                 FROM task_transitions
                 WHERE task_id = ?1
                 ORDER BY id ASC",
            )?;

            let events = stmt
                .query_map(params![task_id], |row| {
                    let status: String = row.get(2)?;
                    Ok(TaskTransition {
                        id: row.get(0)?,
                        task_id: row.get(1)?,
                        status: TaskStatus::from_str(&status)
                            .ok_or_else(|| bad_text("status", &status))?,
                        player_id: row.get(3)?,
                        reason: row.get(4)?,
                        timestamp: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(events)
        })
    }
}
