//! Maintenance passes over existing series.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{SynthesisResult, Task, TaskStatus};
use crate::recurrence::RecurrenceProcessor;
use crate::store::{TaskFilter, TaskStore};

/// A parent whose dead series was restarted.
#[derive(Debug)]
pub struct RegeneratedChild {
    pub parent: Task,
    pub result: SynthesisResult,
}

async fn get_or_skip(store: &dyn TaskStore, uuid: Uuid, role: &str) -> Result<Option<Task>, CoreError> {
    match store.get(uuid).await {
        Ok(task) => Ok(Some(task)),
        Err(CoreError::NotFound(_)) => {
            warn!(uuid = %uuid, role, "referenced task is missing, skipping");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Points each parent's `rlastinstance` at its live instance.
///
/// Returns the parents that were updated.
pub async fn regenerate_links(store: &dyn TaskStore) -> Result<Vec<Task>, CoreError> {
    let mut updated = Vec::new();
    for child in store.find(&[TaskFilter::HasParent]).await? {
        if matches!(
            child.status,
            TaskStatus::Completed | TaskStatus::Deleted | TaskStatus::Recurring
        ) {
            continue;
        }
        let (Some(child_uuid), Some(parent_uuid)) = (child.uuid, child.rparent) else {
            continue;
        };
        let Some(mut parent) = get_or_skip(store, parent_uuid, "parent").await? else {
            continue;
        };
        if parent.rlastinstance == Some(child_uuid) {
            continue;
        }

        debug!(parent = %parent_uuid, child = %child_uuid, "relinking parent");
        parent.rlastinstance = Some(child_uuid);
        store.save(&mut parent).await?;
        updated.push(parent);
    }
    Ok(updated)
}

/// Synthesizes the next instance of every live series whose tracked
/// instance is already completed or deleted.
pub async fn regenerate_children(
    processor: &RecurrenceProcessor<'_>,
) -> Result<Vec<RegeneratedChild>, CoreError> {
    let store = processor.store();
    let parents = store
        .find(&[])
        .await?
        .into_iter()
        .filter(|task| task.rtype.is_some() && task.rparent.is_none() && !task.status.is_terminal());

    let mut regenerated = Vec::new();
    for parent in parents {
        let Some(child_uuid) = parent.rlastinstance else {
            debug!(parent = ?parent.uuid, "series has no tracked instance");
            continue;
        };
        let Some(child) = get_or_skip(store, child_uuid, "instance").await? else {
            continue;
        };
        if !child.status.is_terminal() {
            continue;
        }

        let result = processor.synthesize_next_child(&child).await?;
        regenerated.push(RegeneratedChild { parent, result });
    }
    Ok(regenerated)
}
