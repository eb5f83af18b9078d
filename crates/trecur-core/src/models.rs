use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use serde_with::{serde_as, DeserializeAs, DisplayFromStr, SerializeAs};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::error::CoreError;
use crate::period::Period;

/// Taskwarrior's compact UTC timestamp, e.g. `20180808T085429Z`.
pub const TW_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Parses a date as Taskwarrior exports it, also accepting RFC 3339.
///
/// The compact form without a trailing `Z` is read as UTC.
pub fn parse_tw_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let basic = raw.strip_suffix('Z').unwrap_or(raw);
    NaiveDateTime::parse_from_str(basic, "%Y%m%dT%H%M%S")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_tw_date(date: &DateTime<Utc>) -> String {
    date.format(TW_DATE_FORMAT).to_string()
}

/// `serde_with` adapter for Taskwarrior dates.
pub struct TwDate;

impl SerializeAs<DateTime<Utc>> for TwDate {
    fn serialize_as<S>(source: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_tw_date(source))
    }
}

impl<'de> DeserializeAs<'de, DateTime<Utc>> for TwDate {
    fn deserialize_as<D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_tw_date(&raw).ok_or_else(|| de::Error::custom(format!("invalid date '{}'", raw)))
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Waiting,
    Completed,
    Deleted,
    Recurring,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Waiting => "waiting",
            TaskStatus::Completed => "completed",
            TaskStatus::Deleted => "deleted",
            TaskStatus::Recurring => "recurring",
        }
    }

    /// Completed and deleted tasks never come back to life.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Deleted)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task status: {0}")]
pub struct ParseTaskStatusError(String);

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "waiting" => Ok(TaskStatus::Waiting),
            "completed" => Ok(TaskStatus::Completed),
            "deleted" => Ok(TaskStatus::Deleted),
            "recurring" => Ok(TaskStatus::Recurring),
            _ => Err(ParseTaskStatusError(s.to_string())),
        }
    }
}

/// How the next instance of a series is scheduled (`rtype`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceType {
    /// Relative to when the previous instance was closed.
    Chained,
    /// Relative to the series' original due date.
    Periodic,
}

impl RecurrenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceType::Chained => "chained",
            RecurrenceType::Periodic => "periodic",
        }
    }
}

/// `rwait` / `rscheduled` on a parent.
///
/// Taskwarrior hands these over either as a concrete date or, when the UDA is
/// declared as a string, as an expression such as `due - 3d` that still has
/// to be evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateDate {
    At(DateTime<Utc>),
    Expr(String),
}

impl Serialize for TemplateDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            TemplateDate::At(date) => serializer.serialize_str(&format_tw_date(date)),
            TemplateDate::Expr(expr) => serializer.serialize_str(expr),
        }
    }
}

impl<'de> Deserialize<'de> for TemplateDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match parse_tw_date(&raw) {
            Some(date) => TemplateDate::At(date),
            None => TemplateDate::Expr(raw),
        })
    }
}

/// A task record as exchanged with Taskwarrior.
///
/// Recurrence attributes are typed. Everything else (description aside) rides
/// along untouched in `extra` so that UDAs, tags and annotations survive a
/// round trip through the hooks.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde_as(as = "Option<TwDate>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<DateTime<Utc>>,
    #[serde_as(as = "Option<TwDate>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    #[serde_as(as = "Option<TwDate>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<DateTime<Utc>>,
    #[serde_as(as = "Option<TwDate>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait: Option<DateTime<Utc>>,
    #[serde_as(as = "Option<TwDate>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled: Option<DateTime<Utc>>,
    #[serde_as(as = "Option<TwDate>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,

    /// Recurrence period.
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r: Option<Period>,
    /// Taskwarrior's native recurrence field; mirrors `r` on series roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recur: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtype: Option<RecurrenceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rparent: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rlastinstance: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rwait: Option<TemplateDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rscheduled: Option<TemplateDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<f64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    pub fn from_json(line: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The uuid of a record that has been saved at least once.
    pub fn require_uuid(&self) -> Result<Uuid, CoreError> {
        self.uuid.ok_or_else(|| {
            CoreError::InvalidInput(format!(
                "task '{}' has no uuid yet",
                self.description.as_deref().unwrap_or_default()
            ))
        })
    }

    pub fn is_child(&self) -> bool {
        self.rparent.is_some()
    }

    pub fn label(&self) -> String {
        format!(
            "{} - {}",
            self.uuid.map(|u| u.to_string()).unwrap_or_default(),
            self.description.as_deref().unwrap_or_default()
        )
    }
}

/// What a synthesis run did for a series.
#[derive(Debug)]
pub enum SynthesisResult {
    /// The referenced parent carries no `rtype`.
    NotRecurring { parent: Uuid },
    /// The parent is completed or deleted; the series has ended.
    ParentClosed { parent: Uuid },
    Chained { parent: Task, child: Task },
    Periodic {
        parent: Task,
        /// Instances written in this run, oldest first.
        created: Vec<Task>,
        /// The instance `rlastinstance` now points at.
        last: Task,
    },
}
