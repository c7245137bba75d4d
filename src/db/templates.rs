//! Template store: durable, reusable task definitions.

use super::{Database, now_str, optional};
use crate::error::{LedgerError, LedgerResult};
use crate::types::{Difficulty, NewTemplate, TaskKind, TaskTemplate, TemplateUpdate, WeekdaySet};
use rusqlite::{Connection, Row, params};

const TEMPLATE_COLUMNS: &str =
    "id, title, description, difficulty, kind, reward, repeat_days, created_at, updated_at";

pub(crate) fn parse_template_row(row: &Row) -> rusqlite::Result<TaskTemplate> {
    let difficulty: String = row.get("difficulty")?;
    let kind: String = row.get("kind")?;
    let repeat_days: String = row.get("repeat_days")?;

    Ok(TaskTemplate {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        difficulty: Difficulty::from_str(&difficulty).ok_or_else(|| bad_text("difficulty", &difficulty))?,
        kind: TaskKind::from_str(&kind).ok_or_else(|| bad_text("kind", &kind))?,
        reward: row.get("reward")?,
        repeat_days: repeat_days
            .parse::<WeekdaySet>()
            .map_err(|_| bad_text("repeat_days", &repeat_days))?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Conversion failure for a text column holding an unknown enum value.
pub(crate) fn bad_text(column: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        format!("unexpected {} value '{}'", column, value).into(),
    )
}

/// Load a template using an existing connection or transaction.
pub(crate) fn get_template_internal(
    conn: &Connection,
    template_id: i64,
) -> LedgerResult<Option<TaskTemplate>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM task_templates WHERE id = ?1",
        TEMPLATE_COLUMNS
    ))?;
    optional(stmt.query_row(params![template_id], parse_template_row))
}

/// Insert a template row using an existing connection or transaction.
pub(crate) fn insert_template_internal(
    conn: &Connection,
    template: &NewTemplate,
    now: &str,
) -> LedgerResult<i64> {
    conn.execute(
        "INSERT INTO task_templates (
            title, description, difficulty, kind, reward, repeat_days, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            template.title,
            template.description,
            template.difficulty.as_str(),
            template.kind.as_str(),
            template.reward,
            template.repeat_days.to_string(),
            now,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl Database {
    /// Persist a new template and return its identity.
    ///
    /// No validation happens here; see [`NewTemplate::validate`].
    pub fn create_template(&self, template: &NewTemplate) -> LedgerResult<i64> {
        let now = now_str();
        self.with_conn(|conn| insert_template_internal(conn, template, &now))
    }

    /// Get a template by ID.
    pub fn get_template(&self, template_id: i64) -> LedgerResult<Option<TaskTemplate>> {
        self.with_conn(|conn| get_template_internal(conn, template_id))
    }

    /// List templates, newest first, optionally restricted to one kind.
    pub fn list_templates(&self, kind: Option<TaskKind>) -> LedgerResult<Vec<TaskTemplate>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM task_templates
                 WHERE (?1 IS NULL OR kind = ?1)
                 ORDER BY created_at DESC, id DESC",
                TEMPLATE_COLUMNS
            ))?;
            let templates = stmt
                .query_map(params![kind.map(|k| k.as_str())], parse_template_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(templates)
        })
    }

    /// Apply an explicit update. Already generated instances keep their copies.
    pub fn update_template(
        &self,
        template_id: i64,
        update: &TemplateUpdate,
    ) -> LedgerResult<TaskTemplate> {
        let now = now_str();
        self.with_conn(|conn| {
            let current = get_template_internal(conn, template_id)?
                .ok_or_else(|| LedgerError::template_not_found(template_id))?;

            let title = update.title.clone().unwrap_or(current.title);
            let description = update.description.clone().unwrap_or(current.description);
            let difficulty = update.difficulty.unwrap_or(current.difficulty);
            let reward = update.reward.unwrap_or(current.reward);
            let repeat_days = update.repeat_days.unwrap_or(current.repeat_days);

            if reward <= 0 {
                return Err(LedgerError::invalid("reward", "must be a positive integer"));
            }
            if current.kind == TaskKind::Daily && repeat_days.is_empty() {
                return Err(LedgerError::invalid(
                    "repeat_days",
                    "daily templates need at least one weekday",
                ));
            }

            conn.execute(
                "UPDATE task_templates
                 SET title = ?1, description = ?2, difficulty = ?3, reward = ?4,
                     repeat_days = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    title,
                    description,
                    difficulty.as_str(),
                    reward,
                    repeat_days.to_string(),
                    now,
                    template_id,
                ],
            )?;

            get_template_internal(conn, template_id)?
                .ok_or_else(|| LedgerError::template_not_found(template_id))
        })
    }

    /// Delete the template row only. Instances keep their (now dangling) reference.
    pub fn delete_template(&self, template_id: i64) -> LedgerResult<()> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM task_templates WHERE id = ?1",
                params![template_id],
            )?;
            if removed == 0 {
                return Err(LedgerError::template_not_found(template_id));
            }
            Ok(())
        })
    }
}
