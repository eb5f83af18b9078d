use clap::Parser;
use owo_colors::{OwoColorize, Style};
use std::io::Read;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;
use trecur_core::error::CoreError;

mod cli;
mod commands;
mod config;
mod hooks;

use cli::{Cli, Commands};
use commands::Context;
use config::Config;
use hooks::HookArgs;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse_from(cli::hook_aware_args(std::env::args()));
    let hook = match &cli.command {
        Commands::OnAdd(command) | Commands::OnExit(command) => Some(HookArgs::parse(&command.args)),
        _ => None,
    };

    let config = match Config::load(&cli.overrides(), hook.as_ref()) {
        Ok(config) => config,
        Err(err) => {
            handle_error(&err.into());
            return match cli.command {
                Commands::OnExit(_) => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };
    init_tracing(&config.log_level);

    match cli.command {
        Commands::OnAdd(_) => on_add(&config).await,
        Commands::OnExit(_) => {
            on_exit(&config, &hook.unwrap_or_default()).await;
            ExitCode::SUCCESS
        }
        Commands::RegenerateLinks => report(
            async {
                let ctx = Context::open(&config).await?;
                commands::regenerate::links(&ctx).await
            }
            .await,
        ),
        Commands::RegenerateChildren => report(
            async {
                let ctx = Context::open(&config).await?;
                commands::regenerate::children(&ctx).await
            }
            .await,
        ),
        Commands::Import(command) => report(
            async {
                let ctx = Context::open(&config).await?;
                commands::import::run(&ctx, command.file.as_deref()).await
            }
            .await,
        ),
    }
}

/// Logs go to stderr: stdout belongs to the hook protocol.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_env("TRECUR_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn on_add(config: &Config) -> ExitCode {
    let mut input = String::new();
    let result = async {
        std::io::stdin().read_to_string(&mut input)?;
        let ctx = Context::open(config).await?;
        commands::on_add::run(&ctx.processor(), &input).await
    }
    .await;

    match result {
        Ok(line) => {
            println!("{}", line);
            ExitCode::SUCCESS
        }
        Err(err) => {
            // Taskwarrior shows a failing hook's stdout as feedback.
            if let Some(CoreError::MissingParameter(_)) = find_core_error(&err) {
                println!("{}", err);
            } else {
                handle_error(&err);
            }
            ExitCode::FAILURE
        }
    }
}

async fn on_exit(config: &Config, hook: &HookArgs) {
    let mut input = String::new();
    let result = async {
        std::io::stdin().read_to_string(&mut input)?;
        let ctx = Context::open(config).await?;
        commands::on_exit::run(&ctx.processor(), hook, &input).await
    }
    .await;

    if let Err(err) = result {
        error!(error = %format!("{:#}", err), "on-exit hook failed");
    }
}

fn report(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            handle_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn find_core_error(err: &anyhow::Error) -> Option<&CoreError> {
    err.chain().find_map(|cause| cause.downcast_ref::<CoreError>())
}

fn handle_error(err: &anyhow::Error) {
    let error_style = Style::new().red().bold();

    match find_core_error(err) {
        Some(CoreError::NotFound(s)) => {
            eprintln!("{} Task not found: {}", "Error:".style(error_style), s.yellow());
        }
        Some(CoreError::InvalidInput(s)) => {
            eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
        }
        Some(CoreError::BackfillLimit(limit)) => {
            eprintln!(
                "{} Stopped after {} periodic instances, raise {} to catch up further",
                "Error:".style(error_style),
                limit,
                "recurrence.max_backfill".yellow()
            );
        }
        _ => eprintln!("{} {:#}", "Error:".style(error_style), err),
    }
}
