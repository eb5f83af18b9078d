use async_trait::async_trait;
use chrono::Utc;
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

use super::{TaskFilter, TaskStore};
use crate::db::{self, DbPool};
use crate::error::CoreError;
use crate::models::{format_tw_date, Task, TaskStatus};

#[derive(Debug, FromRow)]
struct TaskRow {
    id: i64,
    data: String,
}

impl TaskRow {
    fn into_task(self) -> Result<Task, CoreError> {
        let mut task = Task::from_json(&self.data)?;
        task.id = u64::try_from(self.id).ok();
        Ok(task)
    }
}

/// Task records kept in a local SQLite database.
///
/// Live records get a working-set id; completed and deleted ones get 0, the
/// way Taskwarrior numbers them. At most one record may occupy a given
/// `(rparent, due)` slot.
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn open(path: &Path) -> Result<Self, CoreError> {
        Ok(Self::new(db::establish_connection(path).await?))
    }

    pub async fn in_memory() -> Result<Self, CoreError> {
        Ok(Self::new(db::establish_in_memory().await?))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    async fn write(&self, task: &mut Task, touch: bool) -> Result<(), CoreError> {
        let now = Utc::now();
        let uuid = *task.uuid.get_or_insert_with(Uuid::new_v4);
        let entry = *task.entry.get_or_insert(now);
        let modified = match task.modified {
            Some(modified) if !touch => modified,
            _ => now,
        };
        task.modified = Some(modified);

        let mut tx = self.pool.begin().await?;

        let id: i64 = if task.status.is_terminal() {
            0
        } else {
            let current: Option<i64> = sqlx::query_scalar("SELECT id FROM tasks WHERE uuid = $1")
                .bind(uuid.to_string())
                .fetch_optional(&mut *tx)
                .await?;
            match current {
                Some(id) if id > 0 => id,
                _ => {
                    sqlx::query_scalar("SELECT COALESCE(MAX(id), 0) + 1 FROM tasks")
                        .fetch_one(&mut *tx)
                        .await?
                }
            }
        };
        task.id = u64::try_from(id).ok();

        let mut record = task.clone();
        record.id = None;
        record.urgency = None;
        let data = record.to_json()?;

        sqlx::query(
            r#"INSERT INTO tasks (uuid, id, status, rparent, due, entry, modified, data)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT(uuid) DO UPDATE SET
                id = excluded.id,
                status = excluded.status,
                rparent = excluded.rparent,
                due = excluded.due,
                modified = excluded.modified,
                data = excluded.data
            "#,
        )
        .bind(uuid.to_string())
        .bind(id)
        .bind(task.status)
        .bind(task.rparent.map(|parent| parent.to_string()))
        .bind(task.due.as_ref().map(format_tw_date))
        .bind(format_tw_date(&entry))
        .bind(format_tw_date(&modified))
        .bind(data)
        .execute(&mut *tx)
        .await
        .map_err(|err| write_error(err, task))?;

        tx.commit().await?;
        debug!(uuid = %uuid, id, status = %task.status, "saved task");
        Ok(())
    }
}

fn write_error(err: sqlx::Error, task: &Task) -> CoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => CoreError::Conflict(format!(
            "{} already has an instance due {}",
            task.rparent.map(|parent| parent.to_string()).unwrap_or_default(),
            task.due.as_ref().map(format_tw_date).unwrap_or_default()
        )),
        _ => err.into(),
    }
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn find(&self, filters: &[TaskFilter]) -> Result<Vec<Task>, CoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id, data FROM tasks WHERE 1 = 1");
        for filter in filters {
            match filter {
                TaskFilter::Uuid(uuid) => {
                    qb.push(" AND uuid = ");
                    qb.push_bind(uuid.to_string());
                }
                TaskFilter::Status(status) => {
                    qb.push(" AND status = ");
                    qb.push_bind(*status);
                }
                TaskFilter::Parent(parent) => {
                    qb.push(" AND rparent = ");
                    qb.push_bind(parent.to_string());
                }
                TaskFilter::HasParent => {
                    qb.push(" AND rparent IS NOT NULL");
                }
                TaskFilter::Due(due) => {
                    qb.push(" AND due = ");
                    qb.push_bind(format_tw_date(due));
                }
            }
        }
        qb.push(" ORDER BY due IS NULL, due, entry");

        let rows: Vec<TaskRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(TaskRow::into_task).collect()
    }

    async fn save(&self, task: &mut Task) -> Result<(), CoreError> {
        self.write(task, true).await
    }

    async fn refresh(&self, task: &mut Task) -> Result<(), CoreError> {
        let uuid = task.require_uuid()?;
        *task = self.get(uuid).await?;
        Ok(())
    }

    async fn delete(&self, task: &mut Task) -> Result<(), CoreError> {
        task.status = TaskStatus::Deleted;
        task.end = Some(Utc::now());
        self.write(task, true).await
    }

    async fn import(&self, tasks: Vec<Task>) -> Result<usize, CoreError> {
        let mut count = 0;
        for mut task in tasks {
            self.write(&mut task, false).await?;
            count += 1;
        }
        Ok(count)
    }
}
