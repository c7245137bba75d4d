//! Instance generator: derives concrete tasks from templates.
//!
//! `ensure_instance` is idempotent. A daily template never has more than one
//! active (available or claimed) instance and never two instances for the
//! same day. A limited template never has more than one instance at all. "Nothing to do" is a success; only a
//! missing template, unparseable input or a store failure is an error.

use crate::db::Database;
use crate::db::tasks::{
    count_active_for_template, count_for_template, insert_task_internal,
    latest_expiry_for_template,
};
use crate::db::templates::{get_template_internal, insert_template_internal};
use crate::error::{LedgerError, LedgerResult};
use crate::timestamp::{day_bounds, format_timestamp, local_now, parse_input_time};
use crate::types::{NewTask, NewTemplate, TaskKind, TaskTemplate, WeekdaySet};
use chrono::{Days, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use tracing::{debug, info};

/// Days searched forward (inclusive of the reference date) for the next
/// recurrence.
pub const RECURRENCE_WINDOW_DAYS: u64 = 7;

/// First date in `[from, from + 6]` whose weekday is in `rule`.
///
/// Searching forward rather than assuming "today" means a refresh that missed
/// one or more midnights still lands on the next applicable day.
pub fn next_occurrence(rule: WeekdaySet, from: NaiveDate) -> Option<NaiveDate> {
    (0..RECURRENCE_WINDOW_DAYS)
        .filter_map(|offset| from.checked_add_days(Days::new(offset)))
        .find(|date| rule.contains_date(*date))
}

/// Outcome of a single `ensure_instance` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    /// A new task row was written.
    Created(i64),
    /// A daily template already has an active instance.
    ActiveInstanceExists,
    /// A limited template already produced its one instance.
    AlreadyInstantiated,
    /// The recurrence rule matched no day in the search window.
    NoOccurrence,
}

impl Generation {
    pub fn created(&self) -> Option<i64> {
        match self {
            Generation::Created(id) => Some(*id),
            _ => None,
        }
    }
}

/// Creates task instances from templates.
#[derive(Clone)]
pub struct InstanceGenerator {
    db: Database,
}

impl InstanceGenerator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Make sure the template has the instance it is due, using the local
    /// clock as the reference time.
    ///
    /// `expiry` and `start` only apply to limited templates.
    pub fn ensure_instance(
        &self,
        template_id: i64,
        expiry: Option<&str>,
        start: Option<&str>,
    ) -> LedgerResult<Generation> {
        self.ensure_instance_at(template_id, expiry, start, local_now())
    }

    /// [`ensure_instance`](Self::ensure_instance) with an explicit reference time.
    pub fn ensure_instance_at(
        &self,
        template_id: i64,
        expiry: Option<&str>,
        start: Option<&str>,
        now: NaiveDateTime,
    ) -> LedgerResult<Generation> {
        // The existence check and the insert share one immediate transaction,
        // so two concurrent callers cannot both see "no instance".
        self.db
            .with_transaction(|tx| ensure_in_transaction(tx, template_id, expiry, start, now))
    }

    /// Validate and store a template, then generate its first instance.
    ///
    /// Both writes share one transaction: a template whose first instance
    /// cannot be generated is never stored.
    pub fn create_and_instantiate(
        &self,
        template: &NewTemplate,
        expiry: Option<&str>,
        start: Option<&str>,
    ) -> LedgerResult<(i64, Generation)> {
        self.create_and_instantiate_at(template, expiry, start, local_now())
    }

    pub fn create_and_instantiate_at(
        &self,
        template: &NewTemplate,
        expiry: Option<&str>,
        start: Option<&str>,
        now: NaiveDateTime,
    ) -> LedgerResult<(i64, Generation)> {
        template.validate()?;
        let created_at = format_timestamp(now);
        let result = self.db.with_transaction(|tx| {
            let template_id = insert_template_internal(tx, template, &created_at)?;
            let outcome = ensure_in_transaction(tx, template_id, expiry, start, now)?;
            Ok((template_id, outcome))
        })?;
        info!(template_id = result.0, title = %template.title, "Template created");
        Ok(result)
    }
}

fn ensure_in_transaction(
    conn: &Connection,
    template_id: i64,
    expiry: Option<&str>,
    start: Option<&str>,
    now: NaiveDateTime,
) -> LedgerResult<Generation> {
    debug!(template_id, ?expiry, ?start, "Ensuring task instance");

    let template = get_template_internal(conn, template_id)?
        .ok_or_else(|| LedgerError::template_not_found(template_id))?;

    let created_at = format_timestamp(now);
    let new_task = match template.kind {
        TaskKind::Daily => {
            if count_active_for_template(conn, template_id)? > 0 {
                debug!(template_id, "Daily template already has an active instance");
                return Ok(Generation::ActiveInstanceExists);
            }
            let from = daily_search_start(conn, template_id, now.date())?;
            match plan_daily(&template, from) {
                Some(task) => task,
                None => {
                    debug!(
                        template_id,
                        repeat_days = %template.repeat_days,
                        "No recurrence day within the search window"
                    );
                    return Ok(Generation::NoOccurrence);
                }
            }
        }
        TaskKind::Limited => {
            if count_for_template(conn, template_id)? > 0 {
                debug!(template_id, "Limited template already instantiated");
                return Ok(Generation::AlreadyInstantiated);
            }
            plan_limited(&template, expiry, start, now)?
        }
    };

    let task_id = insert_task_internal(conn, &new_task, &created_at)?;
    info!(
        template_id,
        task_id,
        kind = template.kind.as_str(),
        title = %new_task.title,
        start_time = ?new_task.start_time,
        expiry_time = %new_task.expiry_time,
        "Created task instance"
    );
    Ok(Generation::Created(task_id))
}

/// First date the daily search may land on: today, or the day after the
/// newest instance the template already has, whichever is later. A day
/// never gets a second instance, whatever happened to the first.
fn daily_search_start(
    conn: &Connection,
    template_id: i64,
    today: NaiveDate,
) -> LedgerResult<NaiveDate> {
    let day_after_latest = match latest_expiry_for_template(conn, template_id)? {
        Some(latest) => parse_input_time("expiry_time", &latest)?
            .date()
            .checked_add_days(Days::new(1)),
        None => None,
    };
    Ok(day_after_latest.map_or(today, |next| next.max(today)))
}

/// Daily instance for the next recurrence day on or after `from`, spanning
/// that whole local day.
fn plan_daily(template: &TaskTemplate, from: NaiveDate) -> Option<NewTask> {
    let date = next_occurrence(template.repeat_days, from)?;
    let (start, end) = day_bounds(date);
    Some(NewTask::from_template(
        template,
        Some(format_timestamp(start)),
        format_timestamp(end),
    ))
}

/// Limited instance. A supplied start that does not parse is an error; it is
/// never replaced with "now". A missing start means "now".
fn plan_limited(
    template: &TaskTemplate,
    expiry: Option<&str>,
    start: Option<&str>,
    now: NaiveDateTime,
) -> LedgerResult<NewTask> {
    let start = match start.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => parse_input_time("start_time", raw)?,
        None => now,
    };

    let raw_expiry = expiry
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            LedgerError::invalid("expiry_time", "limited templates need an expiry time")
        })?;
    let expiry = parse_input_time("expiry_time", raw_expiry)?;

    if start > expiry {
        return Err(LedgerError::invalid(
            "start_time",
            format!(
                "{} is after expiry {}",
                format_timestamp(start),
                format_timestamp(expiry)
            ),
        ));
    }

    Ok(NewTask::from_template(
        template,
        Some(format_timestamp(start)),
        format_timestamp(expiry),
    ))
}
