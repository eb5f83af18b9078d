//! Data access for task records.
//!
//! Recurrence synthesis only talks to a [`TaskStore`]; the backends decide
//! where the records actually live.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{Task, TaskStatus};

pub mod sqlite;
pub mod taskwarrior;

pub use sqlite::SqliteStore;
pub use taskwarrior::TaskwarriorStore;

/// One exact-match condition. A query is the conjunction of its filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskFilter {
    Uuid(Uuid),
    Status(TaskStatus),
    Parent(Uuid),
    HasParent,
    Due(DateTime<Utc>),
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            TaskFilter::Uuid(uuid) => task.uuid == Some(*uuid),
            TaskFilter::Status(status) => task.status == *status,
            TaskFilter::Parent(parent) => task.rparent == Some(*parent),
            TaskFilter::HasParent => task.rparent.is_some(),
            TaskFilter::Due(due) => task.due == Some(*due),
        }
    }
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn find(&self, filters: &[TaskFilter]) -> Result<Vec<Task>, CoreError>;

    /// Creates or updates `task`, filling in `uuid`, `entry`, `modified` and
    /// `id` as the store assigns them.
    async fn save(&self, task: &mut Task) -> Result<(), CoreError>;

    /// Reloads `task` from the store.
    async fn refresh(&self, task: &mut Task) -> Result<(), CoreError>;

    /// Marks `task` deleted and reloads it.
    async fn delete(&self, task: &mut Task) -> Result<(), CoreError>;

    /// Writes raw records as they are, returning how many were imported.
    async fn import(&self, tasks: Vec<Task>) -> Result<usize, CoreError>;

    async fn get(&self, uuid: Uuid) -> Result<Task, CoreError> {
        self.find(&[TaskFilter::Uuid(uuid)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::NotFound(uuid.to_string()))
    }

    /// The instance of series `rparent` that is due at `due`, if any.
    async fn find_instance(
        &self,
        rparent: Uuid,
        due: DateTime<Utc>,
    ) -> Result<Option<Task>, CoreError> {
        Ok(self
            .find(&[TaskFilter::Parent(rparent), TaskFilter::Due(due)])
            .await?
            .into_iter()
            .next())
    }
}
