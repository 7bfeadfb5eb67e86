mod cli;
mod config;
mod control;
mod dispatcher;
mod error;
mod handler;
mod init;
mod job;
mod logging;
mod modes;
mod session;
mod source;
mod stats;
mod ui;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use cli::{Cli, Command};
use config::{TailpoolConfig, split_command};
use handler::AnyHandler;
use job::PatternClassifier;
use modes::{CycleSettings, SessionContext};
use session::RunState;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{e}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = TailpoolConfig::load(cli.config.as_deref())?;
    config.override_with(
        cli.pool_size,
        cli.timeout,
        cli.exec.as_deref().map(split_command),
    )?;

    let handler = AnyHandler::from_command(config.command.as_deref());
    if matches!(handler, AnyHandler::DryRun(_)) {
        warn!("no command configured; running in dry-run mode");
    }
    let classifier = PatternClassifier::new(&config.kind_a_patterns, &config.kind_b_patterns)?;
    let state = RunState::new();
    // Detached; lives until the process exits.
    drop(session::stop_on(tokio::signal::ctrl_c(), state.clone()));

    let ctx = SessionContext {
        handler: Arc::new(handler),
        classifier: Arc::new(classifier),
        options: config.dispatch_options(),
        show_progress: !cli.json,
    };

    let report = match cli.command {
        Command::Once { item } => modes::run_once(&ctx, state, &item).await?,
        Command::Mass { file } => {
            let targets = file.unwrap_or_else(|| config.targets_file.clone());
            modes::run_mass(&ctx, state, &targets).await?
        }
        Command::Continuous {
            file,
            batch_size,
            delay,
            max_cycles,
        } => {
            let targets = file.unwrap_or_else(|| config.targets_file.clone());
            let mut settings = CycleSettings::from_config(&config);
            if let Some(batch_size) = batch_size {
                settings.batch_size = batch_size;
            }
            if let Some(delay) = delay {
                settings.delay = std::time::Duration::from_secs(delay);
            }
            if let Some(max_cycles) = max_cycles {
                settings.max_cycles = max_cycles;
            }
            println!("Commands: stop, pause, resume, stats");
            let control = control::stdin_lines();
            modes::run_continuous(&ctx, state, &targets, settings, Some(control)).await?
        }
        Command::Watch {
            file,
            import_existing,
        } => {
            let path = file.unwrap_or_else(|| config.watch_file.clone());
            println!(
                "Watching {}. Commands: stop, pause, resume, stats",
                path.display()
            );
            let control = control::stdin_lines();
            modes::run_watch(
                &ctx,
                state,
                &path,
                import_existing || config.import_existing,
                config.import_poll(),
                Some(control),
            )
            .await?
        }
        Command::Init => {
            let created = init::create_default_files(&config.targets_file, &config.watch_file)?;
            if created.is_empty() {
                info!("nothing to do; input files already exist");
            }
            return Ok(());
        }
    };

    ui::print_report(&report, cli.json);
    Ok(())
}
