use anyhow::Result;
use tracing::{debug, info};
use trecur_core::models::{SynthesisResult, Task};
use trecur_core::recurrence::RecurrenceProcessor;
use uuid::Uuid;

use crate::hooks::HookArgs;

/// Commands after which series may need attention.
const TRIGGERS: &[&str] = &["done", "delete"];

#[derive(Debug)]
pub enum Action {
    /// A deleted parent took its tracked instance with it.
    DeletedInstance { parent: Option<Uuid> },
    Synthesized(SynthesisResult),
}

/// Processes every record Taskwarrior reports as changed by the command.
pub async fn run(processor: &RecurrenceProcessor<'_>, hook: &HookArgs, input: &str) -> Result<Vec<Action>> {
    let Some(command) = hook.command().filter(|command| TRIGGERS.contains(command)) else {
        debug!(command = ?hook.command(), "nothing to do for this command");
        return Ok(Vec::new());
    };

    let mut actions = Vec::new();
    for line in input.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let task = Task::from_json(line)?;
        if task.r.is_none() {
            continue;
        }

        match task.rlastinstance {
            Some(_) if command == "delete" => {
                processor.delete_child_task(&task).await?;
                actions.push(Action::DeletedInstance { parent: task.uuid });
            }
            Some(_) => {}
            None if task.is_child() && task.status.is_terminal() => {
                let result = processor.synthesize_next_child(&task).await?;
                info!(instance = %task.label(), "handled closed instance");
                actions.push(Action::Synthesized(result));
            }
            None => debug!(task = %task.label(), "not a closed instance"),
        }
    }
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trecur_core::models::TaskStatus;
    use trecur_core::recurrence::RecurrenceConfig;
    use trecur_core::store::{SqliteStore, TaskFilter, TaskStore};
    use trecur_core::timezone::parse_timezone;

    const PARENT: &str = r#"{"uuid":"3f0a43d0-a713-4ebe-9e5c-b1facf49f078","description":"Water the plants","due":"20180708T010000Z","r":"3d","rtype":"chained","status":"recurring"}"#;

    async fn seeded() -> (SqliteStore, Task) {
        let store = SqliteStore::in_memory().await.unwrap();
        let processor = RecurrenceProcessor::new(&store, RecurrenceConfig::new(parse_timezone("UTC").unwrap()));
        let mut parent = processor
            .add_recurrent_task(Task::from_json(PARENT).unwrap())
            .await
            .unwrap();
        store.save(&mut parent).await.unwrap();
        (store, parent)
    }

    #[tokio::test]
    async fn test_other_commands_are_ignored() {
        let (store, parent) = seeded().await;
        let processor = RecurrenceProcessor::new(&store, RecurrenceConfig::new(parse_timezone("UTC").unwrap()));
        let hook = HookArgs::parse(["command:modify"]);

        let actions = run(&processor, &hook, &parent.to_json().unwrap()).await.unwrap();
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn test_done_instance_spawns_the_next() {
        let (store, parent) = seeded().await;
        let processor = RecurrenceProcessor::new(&store, RecurrenceConfig::new(parse_timezone("UTC").unwrap()));
        let mut child = store.get(parent.rlastinstance.unwrap()).await.unwrap();
        child.status = TaskStatus::Completed;
        child.end = Some(chrono::Utc::now());
        store.save(&mut child).await.unwrap();

        let input = format!("{}\n{}\n", child.to_json().unwrap(), r#"{"description":"unrelated","status":"completed"}"#);
        let actions = run(&processor, &HookArgs::parse(["command: done"]), &input)
            .await
            .unwrap();

        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], Action::Synthesized(SynthesisResult::Chained { .. })));
        assert_eq!(
            store.find(&[TaskFilter::Parent(parent.uuid.unwrap())]).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_deleting_a_parent_deletes_its_instance() {
        let (store, parent) = seeded().await;
        let processor = RecurrenceProcessor::new(&store, RecurrenceConfig::new(parse_timezone("UTC").unwrap()));

        let actions = run(&processor, &HookArgs::parse(["command:delete"]), &parent.to_json().unwrap())
            .await
            .unwrap();

        assert!(matches!(actions[..], [Action::DeletedInstance { .. }]));
        let child = store.get(parent.rlastinstance.unwrap()).await.unwrap();
        assert_eq!(child.status, TaskStatus::Deleted);
    }

    #[tokio::test]
    async fn test_done_on_a_parent_does_nothing() {
        let (store, parent) = seeded().await;
        let processor = RecurrenceProcessor::new(&store, RecurrenceConfig::new(parse_timezone("UTC").unwrap()));

        let actions = run(&processor, &HookArgs::parse(["command:done"]), &parent.to_json().unwrap())
            .await
            .unwrap();
        assert!(actions.is_empty());
    }
}
