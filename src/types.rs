//! Core types for the chore ledger.

use crate::error::{LedgerError, LedgerResult};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How hard a chore is. Purely descriptive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// Template type: recurring on weekdays, or a one-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Daily,
    Limited,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Daily => "daily",
            TaskKind::Limited => "limited",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(TaskKind::Daily),
            "limited" => Some(TaskKind::Limited),
            _ => None,
        }
    }
}

/// Status of a task instance.
///
/// `available -> claimed -> completed -> verified`, plus `expired`, which the
/// sweep reaches from `available` or `claimed`. `verified` and `expired` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Available,
    Claimed,
    Completed,
    Verified,
    Expired,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Available => "available",
            TaskStatus::Claimed => "claimed",
            TaskStatus::Completed => "completed",
            TaskStatus::Verified => "verified",
            TaskStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "available" => Some(TaskStatus::Available),
            "claimed" => Some(TaskStatus::Claimed),
            "completed" => Some(TaskStatus::Completed),
            "verified" => Some(TaskStatus::Verified),
            "expired" => Some(TaskStatus::Expired),
            _ => None,
        }
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Available, TaskStatus::Claimed)
                | (TaskStatus::Claimed, TaskStatus::Completed)
                | (TaskStatus::Completed, TaskStatus::Verified)
                | (TaskStatus::Available, TaskStatus::Expired)
                | (TaskStatus::Claimed, TaskStatus::Expired)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of weekdays a daily template recurs on.
///
/// Day indices follow the Sunday-first convention: 0 = Sunday .. 6 = Saturday.
/// Stored as a bitmask; persisted as comma-joined indices (`"1,3,5"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    const ALL_BITS: u8 = 0b0111_1111;

    pub fn empty() -> Self {
        WeekdaySet(0)
    }

    pub fn every_day() -> Self {
        WeekdaySet(Self::ALL_BITS)
    }

    /// Build a set from day indices, rejecting anything outside 0..=6.
    pub fn from_days<I: IntoIterator<Item = u8>>(days: I) -> LedgerResult<Self> {
        let mut set = WeekdaySet::empty();
        for day in days {
            if day > 6 {
                return Err(LedgerError::invalid(
                    "repeat_days",
                    format!("weekday index {} is outside 0-6", day),
                ));
            }
            set.0 |= 1 << day;
        }
        Ok(set)
    }

    pub fn contains(&self, day: u8) -> bool {
        day <= 6 && self.0 & (1 << day) != 0
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.contains(date.weekday().num_days_from_sunday() as u8)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn days(&self) -> impl Iterator<Item = u8> + '_ {
        (0u8..=6).filter(move |d| self.contains(*d))
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days: Vec<String> = self.days().map(|d| d.to_string()).collect();
        f.write_str(&days.join(","))
    }
}

impl FromStr for WeekdaySet {
    type Err = LedgerError;

    /// Accepts comma-separated indices (`"1,3,5"`) or English day names
    /// (`"mon,wed,fri"`, `"Sunday"`). The empty string is the empty set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut days = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let day = match part.parse::<u8>() {
                Ok(n) => n,
                Err(_) => day_from_name(part).ok_or_else(|| {
                    LedgerError::invalid("repeat_days", format!("unknown weekday '{}'", part))
                })?,
            };
            days.push(day);
        }
        WeekdaySet::from_days(days)
    }
}

fn day_from_name(name: &str) -> Option<u8> {
    let lower = name.to_lowercase();
    let idx = match lower.get(..3)? {
        "sun" => 0,
        "mon" => 1,
        "tue" => 2,
        "wed" => 3,
        "thu" => 4,
        "fri" => 5,
        "sat" => 6,
        _ => return None,
    };
    Some(idx)
}

impl Serialize for WeekdaySet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.days())
    }
}

impl<'de> Deserialize<'de> for WeekdaySet {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let days = Vec::<u8>::deserialize(deserializer)?;
        WeekdaySet::from_days(days).map_err(serde::de::Error::custom)
    }
}

/// A reusable task definition. Not itself claimable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub kind: TaskKind,
    pub reward: i64,
    /// Empty for limited templates.
    pub repeat_days: WeekdaySet,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for creating a template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTemplate {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub difficulty: Difficulty,
    pub kind: TaskKind,
    pub reward: i64,
    #[serde(default)]
    pub repeat_days: WeekdaySet,
}

impl NewTemplate {
    /// Admin-facing validation. The store itself accepts whatever it is given.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.title.trim().is_empty() {
            return Err(LedgerError::invalid("title", "must not be empty"));
        }
        if self.reward <= 0 {
            return Err(LedgerError::invalid("reward", "must be a positive integer"));
        }
        match self.kind {
            TaskKind::Daily if self.repeat_days.is_empty() => Err(LedgerError::invalid(
                "repeat_days",
                "daily templates need at least one weekday",
            )),
            TaskKind::Limited if !self.repeat_days.is_empty() => Err(LedgerError::invalid(
                "repeat_days",
                "limited templates do not recur",
            )),
            _ => Ok(()),
        }
    }
}

/// Partial update of a template. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub reward: Option<i64>,
    pub repeat_days: Option<WeekdaySet>,
}

/// A concrete task instance.
///
/// Descriptive fields and reward are copied from the template at creation and
/// are not kept in sync with later template edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub kind: TaskKind,
    pub reward: i64,
    pub expiry_time: String,
    /// `None` means immediately available.
    pub start_time: Option<String>,
    pub status: TaskStatus,
    pub player_id: Option<i64>,
    pub template_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Row-ready task data, written only by the instance generator.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub kind: TaskKind,
    pub reward: i64,
    pub expiry_time: String,
    pub start_time: Option<String>,
    pub template_id: Option<i64>,
}

impl NewTask {
    pub fn from_template(
        template: &TaskTemplate,
        start_time: Option<String>,
        expiry_time: String,
    ) -> Self {
        Self {
            title: template.title.clone(),
            description: template.description.clone(),
            difficulty: template.difficulty,
            kind: template.kind,
            reward: template.reward,
            expiry_time,
            start_time,
            template_id: Some(template.id),
        }
    }
}

/// The player who claims chores and holds the reward balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub balance: i64,
    pub created_at: String,
}

/// Filter for listing tasks. Every populated field narrows the result.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub statuses: Vec<TaskStatus>,
    pub player_id: Option<i64>,
    pub template_id: Option<i64>,
}

impl TaskFilter {
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn owned_by(mut self, player_id: i64) -> Self {
        self.player_id = Some(player_id);
        self
    }

    pub fn from_template(mut self, template_id: i64) -> Self {
        self.template_id = Some(template_id);
        self
    }
}

/// Everything the player-facing task page shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskBoard {
    pub player: Player,
    /// Available, started and not yet expired.
    pub claimable: Vec<Task>,
    /// Available with a start time still in the future.
    pub upcoming: Vec<Task>,
    /// Claimed or completed by the player, awaiting work or verification.
    pub in_progress: Vec<Task>,
}

/// One status change in a task's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTransition {
    pub id: i64,
    pub task_id: i64,
    pub status: TaskStatus,
    pub player_id: Option<i64>,
    pub reason: Option<String>,
    pub timestamp: String,
}
