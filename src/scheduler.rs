//! Daily refresh scheduler and the regeneration worker.
//!
//! The refresh loop sleeps until the next local midnight, runs a cycle, then
//! ticks every 24 hours. A cycle sweeps expired tasks and tops up every
//! daily template. Cycles run one at a time: the loop awaits each before it
//! waits for the next tick.

use crate::db::Database;
use crate::error::LedgerResult;
use crate::generator::{Generation, InstanceGenerator};
use crate::lifecycle::RegenerationRequest;
use crate::timestamp::{format_timestamp, local_now};
use crate::types::TaskKind;
use chrono::{Days, NaiveDateTime, NaiveTime};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub const REFRESH_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Time from `now` until the next local midnight. Exactly at midnight this is
/// a full day, never zero.
pub fn until_next_midnight(now: NaiveDateTime) -> Duration {
    let next = now
        .date()
        .checked_add_days(Days::new(1))
        .map(|d| d.and_time(NaiveTime::MIN));
    match next {
        Some(next) => (next - now).to_std().unwrap_or(REFRESH_PERIOD),
        None => REFRESH_PERIOD,
    }
}

/// Summary of one refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub templates_checked: usize,
    pub instances_created: Vec<i64>,
    /// Templates whose generation failed, with the error text.
    pub failures: Vec<(i64, String)>,
    pub expired: Vec<i64>,
}

/// Runs refresh cycles over every daily template.
#[derive(Clone)]
pub struct DailyRefresh {
    db: Database,
    generator: InstanceGenerator,
    reports: Option<mpsc::UnboundedSender<RefreshReport>>,
}

impl DailyRefresh {
    pub fn new(db: Database) -> Self {
        let generator = InstanceGenerator::new(db.clone());
        Self {
            db,
            generator,
            reports: None,
        }
    }

    /// Publish the report of every scheduled cycle on `tx`.
    pub fn with_reports(mut self, tx: mpsc::UnboundedSender<RefreshReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    /// One refresh cycle at the local clock.
    pub fn run_cycle(&self) -> LedgerResult<RefreshReport> {
        self.run_cycle_at(local_now())
    }

    /// One refresh cycle at `now`.
    ///
    /// Per-template generation errors are logged and collected; they never
    /// stop the other templates. Failing to run the sweep or to list
    /// templates is returned.
    pub fn run_cycle_at(&self, now: NaiveDateTime) -> LedgerResult<RefreshReport> {
        info!(at = %format_timestamp(now), "Starting daily refresh");
        let mut report = RefreshReport::default();

        // Sweep first: yesterday's instance must stop counting as active
        // before today's is generated.
        report.expired = self.db.expire_overdue(&format_timestamp(now))?;

        let templates = self.db.list_templates(Some(TaskKind::Daily))?;
        report.templates_checked = templates.len();

        for template in &templates {
            match self.generator.ensure_instance_at(template.id, None, None, now) {
                Ok(Generation::Created(task_id)) => report.instances_created.push(task_id),
                Ok(outcome) => debug!(template_id = template.id, ?outcome, "Nothing to generate"),
                Err(e) => {
                    warn!(template_id = template.id, error = %e, "Refreshing template failed");
                    report.failures.push((template.id, e.to_string()));
                }
            }
        }

        info!(
            templates = report.templates_checked,
            created = report.instances_created.len(),
            failed = report.failures.len(),
            expired = report.expired.len(),
            "Daily refresh finished"
        );
        Ok(report)
    }

    /// Spawn the midnight loop. Runs for the life of the process.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let first = until_next_midnight(local_now());
            info!(in_secs = first.as_secs(), "Daily refresh scheduled");

            let mut interval = tokio::time::interval_at(Instant::now() + first, REFRESH_PERIOD);
            // An overrunning cycle pushes the next tick back instead of
            // firing a burst of missed ones.
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let refresh = self.clone();
                match tokio::task::spawn_blocking(move || refresh.run_cycle()).await {
                    Ok(Ok(report)) => {
                        if let Some(ref tx) = self.reports {
                            if tx.send(report).is_err() {
                                debug!("Refresh report receiver dropped");
                            }
                        }
                    }
                    Ok(Err(e)) => error!(error = %e, "Daily refresh failed"),
                    Err(e) => error!(error = %e, "Daily refresh task panicked"),
                }
            }
        })
    }
}

/// Drain regeneration requests posted by completed tasks.
///
/// Ends when every sender is dropped.
pub fn spawn_regeneration_worker(
    generator: InstanceGenerator,
    mut rx: mpsc::UnboundedReceiver<RegenerationRequest>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let generator = generator.clone();
            let result = tokio::task::spawn_blocking(move || {
                generator.ensure_instance_at(request.template_id, None, None, request.completed_at)
            })
            .await;

            match result {
                Ok(Ok(Generation::Created(task_id))) => info!(
                    template_id = request.template_id,
                    task_id,
                    after_task = request.completed_task_id,
                    "Generated successor instance"
                ),
                Ok(Ok(outcome)) => {
                    debug!(template_id = request.template_id, ?outcome, "No successor needed")
                }
                Ok(Err(e)) => warn!(
                    template_id = request.template_id,
                    task_id = request.completed_task_id,
                    error = %e,
                    "Failed to generate successor instance"
                ),
                Err(e) => error!(error = %e, "Regeneration task panicked"),
            }
        }
        debug!("Regeneration queue closed");
    })
}
