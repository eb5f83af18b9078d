use anyhow::Result;
use chrono::Utc;
use chrono_humanize::HumanTime;
use owo_colors::OwoColorize;
use trecur_core::models::SynthesisResult;
use trecur_core::repair;

use super::Context;

pub async fn links(ctx: &Context) -> Result<()> {
    for parent in repair::regenerate_links(ctx.store()).await? {
        println!("Regenerating rlastinstance of {}", parent.label());
    }
    Ok(())
}

pub async fn children(ctx: &Context) -> Result<()> {
    let processor = ctx.processor();
    for regenerated in repair::regenerate_children(&processor).await? {
        println!("Regenerating child of {}", regenerated.parent.label());
        let next_due = match &regenerated.result {
            SynthesisResult::Chained { child, .. } => child.due,
            SynthesisResult::Periodic { last, .. } => last.due,
            _ => None,
        };
        if let Some(due) = next_due {
            let relative = HumanTime::from(due - Utc::now());
            println!("  next due {}", relative.to_string().dimmed());
        }
    }
    Ok(())
}
