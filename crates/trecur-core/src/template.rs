//! Cloning of task records into fresh, unsaved instances.

use serde_json::Value;

use crate::error::CoreError;
use crate::models::Task;

/// Attributes that identify a stored record or are computed by the store.
/// They never carry over to a copy.
pub const ALWAYS_EXCLUDED: &[&str] = &["entry", "modified", "mask", "id", "uuid", "urgency", "status"];

/// Builds a new record from `source` without the attributes in
/// [`ALWAYS_EXCLUDED`] and `exclude`.
///
/// Names in `exclude` that the source does not carry are ignored.
pub fn copy(source: &Task, exclude: &[&str]) -> Result<Task, CoreError> {
    let mut snapshot = match serde_json::to_value(source)? {
        Value::Object(map) => map,
        other => {
            return Err(CoreError::InvalidInput(format!(
                "task serialized to a non-object: {}",
                other
            )))
        }
    };

    for key in ALWAYS_EXCLUDED.iter().chain(exclude) {
        snapshot.remove(*key);
    }

    Ok(serde_json::from_value(Value::Object(snapshot))?)
}
