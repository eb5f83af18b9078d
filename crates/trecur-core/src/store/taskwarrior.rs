use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

use super::{TaskFilter, TaskStore};
use crate::error::CoreError;
use crate::models::Task;

/// Overrides applied to every invocation. Hooks are off so that writes made
/// from inside a hook do not trigger the hooks again.
const QUIET_OVERRIDES: &[&str] = &[
    "rc.hooks=off",
    "rc.confirmation=off",
    "rc.verbose=nothing",
    "rc.json.array=on",
];

/// A store that drives the Taskwarrior command line.
#[derive(Debug, Clone)]
pub struct TaskwarriorStore {
    binary: PathBuf,
    taskrc: Option<PathBuf>,
    data_location: Option<PathBuf>,
}

impl TaskwarriorStore {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            taskrc: None,
            data_location: None,
        }
    }

    /// Points the binary at an explicit `.taskrc`.
    pub fn with_taskrc(mut self, taskrc: Option<PathBuf>) -> Self {
        self.taskrc = taskrc;
        self
    }

    /// Overrides `data.location`.
    pub fn with_data_location(mut self, data: Option<PathBuf>) -> Self {
        self.data_location = data;
        self
    }

    /// Arguments common to every command, ahead of the filter.
    pub fn base_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(QUIET_OVERRIDES.len() + 2);
        if let Some(taskrc) = &self.taskrc {
            args.push(format!("rc:{}", taskrc.display()));
        }
        if let Some(data) = &self.data_location {
            args.push(format!("rc.data.location={}", data.display()));
        }
        args.extend(QUIET_OVERRIDES.iter().map(|s| s.to_string()));
        args
    }

    /// Filter arguments for `filters`.
    ///
    /// `due` is matched after export instead: Taskwarrior compares `due:` at
    /// day granularity, while instances are told apart by the exact instant.
    pub fn filter_args(filters: &[TaskFilter]) -> Vec<String> {
        filters
            .iter()
            .filter_map(|filter| match filter {
                TaskFilter::Uuid(uuid) => Some(format!("uuid:{}", uuid)),
                TaskFilter::Status(status) => Some(format!("status:{}", status)),
                TaskFilter::Parent(parent) => Some(format!("rparent:{}", parent)),
                TaskFilter::HasParent => Some("rparent.any:".to_string()),
                TaskFilter::Due(_) => None,
            })
            .collect()
    }

    async fn run(&self, args: Vec<String>, stdin: Option<String>) -> Result<String, CoreError> {
        let mut full_args = self.base_args();
        full_args.extend(args);
        debug!(binary = %self.binary.display(), args = ?full_args, "running task");

        let mut child = Command::new(&self.binary)
            .args(&full_args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| CoreError::Store(format!("cannot run {}: {}", self.binary.display(), err)))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes()).await?;
            pipe.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(CoreError::Store(format!(
                "{} {} exited with {}: {}",
                self.binary.display(),
                full_args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn export(&self, mut filter: Vec<String>) -> Result<Vec<Task>, CoreError> {
        filter.push("export".to_string());
        let stdout = self.run(filter, None).await?;
        parse_export(&stdout)
    }

    async fn import_records(&self, tasks: &[Task]) -> Result<(), CoreError> {
        let records = tasks.iter().map(import_record).collect::<Result<Vec<_>, _>>()?;
        let payload = serde_json::to_string(&records)?;
        self.run(vec!["import".to_string()], Some(payload)).await?;
        Ok(())
    }

    async fn reload_by_uuid(&self, task: &mut Task, uuid: Uuid) -> Result<(), CoreError> {
        *task = self
            .export(vec![format!("uuid:{}", uuid)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::NotFound(uuid.to_string()))?;
        Ok(())
    }
}

/// Parses `task export` output; an empty export may come back as blank output.
pub fn parse_export(stdout: &str) -> Result<Vec<Task>, CoreError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(trimmed)?)
}

/// The JSON handed to `task import`: computed attributes are left out.
fn import_record(task: &Task) -> Result<Value, CoreError> {
    let mut value = serde_json::to_value(task)?;
    if let Value::Object(map) = &mut value {
        map.remove("id");
        map.remove("urgency");
    }
    Ok(value)
}

#[async_trait]
impl TaskStore for TaskwarriorStore {
    async fn find(&self, filters: &[TaskFilter]) -> Result<Vec<Task>, CoreError> {
        let tasks = self.export(Self::filter_args(filters)).await?;
        Ok(tasks
            .into_iter()
            .filter(|task| filters.iter().all(|filter| filter.matches(task)))
            .collect())
    }

    /// Imports `task`, then reloads it through the working-set id Taskwarrior
    /// assigned. Other processes closing tasks in between renumber the working
    /// set, which surfaces as [`CoreError::StaleId`].
    async fn save(&self, task: &mut Task) -> Result<(), CoreError> {
        let now = Utc::now();
        let uuid = *task.uuid.get_or_insert_with(Uuid::new_v4);
        task.entry.get_or_insert(now);
        task.modified = Some(now);
        self.import_records(std::slice::from_ref(task)).await?;

        let mut imported = Task::default();
        self.reload_by_uuid(&mut imported, uuid).await?;
        task.id = imported.id;
        self.refresh(task).await
    }

    /// Reloads by working-set id when one is cached. Ids shift as tasks are
    /// completed, so a mismatched uuid is reported as [`CoreError::StaleId`].
    async fn refresh(&self, task: &mut Task) -> Result<(), CoreError> {
        let uuid = task.require_uuid()?;
        match task.id.filter(|id| *id > 0) {
            Some(id) => {
                let found = self.export(vec![id.to_string()]).await?.into_iter().next();
                match found {
                    Some(reloaded) if reloaded.uuid == Some(uuid) => {
                        *task = reloaded;
                        Ok(())
                    }
                    _ => Err(CoreError::StaleId(id)),
                }
            }
            None => self.reload_by_uuid(task, uuid).await,
        }
    }

    async fn delete(&self, task: &mut Task) -> Result<(), CoreError> {
        let uuid = task.require_uuid()?;
        self.run(vec![uuid.to_string(), "delete".to_string()], None).await?;
        self.reload_by_uuid(task, uuid).await
    }

    async fn import(&self, tasks: Vec<Task>) -> Result<usize, CoreError> {
        if tasks.is_empty() {
            return Ok(0);
        }
        self.import_records(&tasks).await?;
        Ok(tasks.len())
    }
}

#[cfg(all(test, unix))]
pub(crate) const FAKE_UUID: &str = "3f0a43d0-a713-4ebe-9e5c-b1facf49f078";

/// Writes a stand-in `task` executable into `dir`. It accepts any import.
/// Exporting by uuid reports working-set id 5, but id 5 now belongs to
/// another task and the record itself sits at id 4.
#[cfg(all(test, unix))]
pub(crate) fn fake_task_binary(dir: &std::path::Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = format!(
        r#"#!/bin/sh
for arg in "$@"; do
  case "$arg" in
    import) cat > /dev/null; exit 0 ;;
    uuid:*) echo '[{{"id":5,"uuid":"{uuid}","status":"pending","description":"x"}}]'; exit 0 ;;
    5) echo '[{{"id":5,"uuid":"0e8d7c2b-6a5f-4e3d-9c1b-a0f9e8d7c6b5","status":"pending","description":"y"}}]'; exit 0 ;;
    4) echo '[{{"id":4,"uuid":"{uuid}","status":"pending","description":"x"}}]'; exit 0 ;;
  esac
done
echo '[]'
"#,
        uuid = FAKE_UUID
    );
    let path = dir.join("task");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
