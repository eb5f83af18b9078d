use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{Backend, Overrides};

/// Chained and periodic recurring tasks for Taskwarrior
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Where task records live
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,
    /// SQLite database used by the sqlite backend
    #[arg(long)]
    pub database: Option<PathBuf>,
    /// Taskwarrior executable used by the taskwarrior backend
    #[arg(long)]
    pub task_binary: Option<PathBuf>,
    /// IANA timezone for date arithmetic
    #[arg(long)]
    pub timezone: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run as Taskwarrior's on-add hook
    OnAdd(HookCommand),
    /// Run as Taskwarrior's on-exit hook
    OnExit(HookCommand),
    /// Point every parent at its live instance
    RegenerateLinks,
    /// Restart series whose tracked instance is already closed
    RegenerateChildren,
    /// Import a JSON export into the configured store
    Import(ImportCommand),
}

#[derive(Args, Debug, Clone)]
pub struct HookCommand {
    /// `key:value` arguments as passed by Taskwarrior
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ImportCommand {
    /// File holding a JSON array or one task per line; stdin when omitted
    pub file: Option<PathBuf>,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            backend: self.backend,
            database: self.database.clone(),
            task_binary: self.task_binary.clone(),
            timezone: self.timezone.clone(),
        }
    }
}

/// Inserts the hook subcommand when the binary was started under a hook
/// name such as `on-add-recurrence` or `on-exit.trecur`.
pub fn hook_aware_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut args: Vec<String> = args.into_iter().collect();
    let invoked_as = args
        .first()
        .and_then(|arg0| Path::new(arg0).file_name())
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();

    if let Some(hook) = ["on-add", "on-exit"]
        .into_iter()
        .find(|hook| invoked_as.starts_with(hook))
    {
        args.insert(1, hook.to_string());
    }
    args
}
