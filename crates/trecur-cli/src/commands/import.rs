use anyhow::{Context as _, Result};
use std::io::Read;
use std::path::Path;
use trecur_core::models::Task;

use super::Context;

/// Reads a Taskwarrior export: either one JSON array or one object per line.
pub fn parse_records(input: &str) -> Result<Vec<Task>> {
    let trimmed = input.trim();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| {
            Task::from_json(line).with_context(|| format!("line {} is not a task", index + 1))
        })
        .collect()
}

pub async fn run(ctx: &Context, file: Option<&Path>) -> Result<()> {
    let input = match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("cannot read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let imported = ctx.store().import(parse_records(&input)?).await?;
    println!("Imported {} tasks", imported);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_array_and_lines() {
        let array = parse_records(r#"[{"description":"a"},{"description":"b"}]"#).unwrap();
        assert_eq!(array.len(), 2);

        let lines = parse_records("{\"description\":\"a\"}\n\n{\"description\":\"b\"}\n").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].description.as_deref(), Some("b"));

        assert!(parse_records("").unwrap().is_empty());
    }

    #[test]
    fn test_bad_line_names_its_position() {
        let err = parse_records("{\"description\":\"a\"}\nnot json\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
