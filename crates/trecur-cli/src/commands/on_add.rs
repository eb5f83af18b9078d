use anyhow::Result;
use serde_json::Value;
use tracing::debug;
use trecur_core::models::Task;
use trecur_core::recurrence::RecurrenceProcessor;

/// Whether the added record starts a new series: it has a period, is not an
/// instance itself, and names a known recurrence type.
///
/// Decided on the raw JSON so that records this hook does not care about
/// never go through typed validation.
pub fn starts_series(record: &Value) -> bool {
    let present = |key: &str| record.get(key).is_some_and(|value| !value.is_null());
    present("r")
        && !present("rparent")
        && matches!(
            record.get("rtype").and_then(Value::as_str),
            Some("chained" | "periodic")
        )
}

/// Returns the line to hand back to Taskwarrior.
pub async fn run(processor: &RecurrenceProcessor<'_>, input: &str) -> Result<String> {
    let line = input
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default();
    let record: Value = serde_json::from_str(line)?;

    if !starts_series(&record) {
        debug!("added task does not start a series");
        return Ok(line.to_string());
    }

    let task: Task = serde_json::from_value(record)?;
    let parent = processor.add_recurrent_task(task).await?;
    Ok(parent.to_json()?)
}
