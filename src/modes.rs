//! Session drivers for each operating mode.
//!
//! Every mode gets a fresh [`RunState`] and [`StatsAggregator`], feeds jobs
//! through a [`Dispatcher`], and ends with a [`SessionReport`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::TailpoolConfig;
use crate::control::spawn_control;
use crate::dispatcher::{BatchResult, DispatchOptions, Dispatcher};
use crate::error::TailpoolError;
use crate::handler::JobHandler;
use crate::job::{Classifier, Job, JobKind, load_jobs, load_jobs_from_file};
use crate::session::RunState;
use crate::source::{FileTail, spawn_importer};
use crate::stats::{StatsAggregator, StatsSnapshot};
use crate::ui::{self, BatchProgress};

const STATS_INTERVAL: Duration = Duration::from_secs(30);
const STOP_CHECK: Duration = Duration::from_secs(1);
const IMPORT_QUEUE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Once,
    Mass,
    Continuous,
    Watch,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Once => write!(f, "once"),
            Mode::Mass => write!(f, "mass"),
            Mode::Continuous => write!(f, "continuous"),
            Mode::Watch => write!(f, "watch"),
        }
    }
}

/// Summary produced when a session ends.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub mode: Mode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub batches: u64,
    pub result: BatchResult,
    pub stats: StatsSnapshot,
    /// True when the session ended because a stop was requested.
    pub stopped: bool,
}

/// Settings for the continuous mode, resolved from config and CLI.
#[derive(Debug, Clone, Copy)]
pub struct CycleSettings {
    pub batch_size: usize,
    pub delay: Duration,
    /// 0 means unlimited.
    pub max_cycles: u64,
}

impl CycleSettings {
    pub fn from_config(config: &TailpoolConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            delay: config.batch_delay(),
            max_cycles: config.max_cycles,
        }
    }
}

/// Everything a session needs that outlives it.
pub struct SessionContext<H> {
    pub handler: Arc<H>,
    pub classifier: Arc<dyn Classifier>,
    pub options: DispatchOptions,
    pub show_progress: bool,
}

struct Session<H> {
    id: Uuid,
    mode: Mode,
    started_at: DateTime<Utc>,
    state: RunState,
    stats: Arc<StatsAggregator>,
    dispatcher: Dispatcher<H>,
}

impl<H: JobHandler> Session<H> {
    fn start(ctx: &SessionContext<H>, mode: Mode, state: RunState, options: DispatchOptions) -> Self {
        let stats = Arc::new(StatsAggregator::new());
        let dispatcher = Dispatcher::new(
            Arc::clone(&ctx.handler),
            state.clone(),
            Arc::clone(&stats),
            options,
        );
        let id = Uuid::new_v4();
        info!(session = %id, %mode, pool_size = dispatcher.pool_size(), "session started");
        Self {
            id,
            mode,
            started_at: Utc::now(),
            state,
            stats,
            dispatcher,
        }
    }

    async fn dispatch(&self, jobs: Vec<Job>, show_progress: bool) -> BatchResult {
        let progress = show_progress.then(|| BatchProgress::start(&self.mode.to_string(), jobs.len()));
        let result = self.dispatcher.run_batch(jobs).await;
        if let Some(progress) = progress {
            progress.finish();
        }
        result
    }

    fn finish(self, batches: u64, result: BatchResult) -> SessionReport {
        let stopped = self.state.is_stop_requested();
        self.state.finish();
        let report = SessionReport {
            session_id: self.id,
            mode: self.mode,
            started_at: self.started_at,
            finished_at: Utc::now(),
            batches,
            result,
            stats: self.stats.snapshot(),
            stopped,
        };
        info!(
            session = %report.session_id,
            succeeded = report.stats.success_count,
            failed = report.stats.fail_count,
            abandoned = report.result.abandoned,
            "session finished"
        );
        report
    }
}

/// Single-shot: one item, one worker.
pub async fn run_once<H: JobHandler>(
    ctx: &SessionContext<H>,
    state: RunState,
    item: &str,
) -> Result<SessionReport> {
    let jobs = load_jobs([item.trim()], ctx.classifier.as_ref());
    if jobs.is_empty() {
        return Err(TailpoolError::NoJobs(format!("item `{item}`")).into());
    }
    let options = DispatchOptions {
        pool_size: 1,
        ..ctx.options
    };
    let session = Session::start(ctx, Mode::Once, state, options);
    let result = session.dispatch(jobs, false).await;
    Ok(session.finish(1, result))
}

/// Mass: every job from the targets file, once.
pub async fn run_mass<H: JobHandler>(
    ctx: &SessionContext<H>,
    state: RunState,
    targets: &Path,
) -> Result<SessionReport> {
    let jobs = load_jobs_from_file(targets, ctx.classifier.as_ref())?;
    if jobs.is_empty() {
        return Err(TailpoolError::NoJobs(targets.display().to_string()).into());
    }
    log_loaded(&jobs, targets);
    let session = Session::start(ctx, Mode::Mass, state, ctx.options);
    let result = session.dispatch(jobs, ctx.show_progress).await;
    Ok(session.finish(1, result))
}

/// Continuous: walks the targets round-robin in batches of exactly
/// `batch_size`, wrapping to the start mid-batch, until stopped or
/// `max_cycles` batches have run.
pub async fn run_continuous<H: JobHandler>(
    ctx: &SessionContext<H>,
    state: RunState,
    targets: &Path,
    settings: CycleSettings,
    control: Option<mpsc::UnboundedReceiver<String>>,
) -> Result<SessionReport> {
    let jobs = load_jobs_from_file(targets, ctx.classifier.as_ref())?;
    if jobs.is_empty() {
        return Err(TailpoolError::NoJobs(targets.display().to_string()).into());
    }
    log_loaded(&jobs, targets);
    let session = Session::start(ctx, Mode::Continuous, state, ctx.options);
    if let Some(lines) = control {
        // Abandoned, never joined.
        drop(spawn_control(lines, session.state.clone(), Arc::clone(&session.stats)));
    }

    let batch_size = settings.batch_size.max(1);
    let mut index = 0;
    let mut cycles = 0u64;
    let mut total = BatchResult::default();

    loop {
        if !session.state.wait_while_paused(ctx.options.pause_poll).await {
            break;
        }
        let batch: Vec<Job> = (0..batch_size)
            .map(|i| jobs[(index + i) % jobs.len()].clone())
            .collect();
        index = (index + batch_size) % jobs.len();

        let result = session.dispatch(batch, ctx.show_progress).await;
        total.completed += result.completed;
        total.abandoned += result.abandoned;
        cycles += 1;
        info!(cycle = cycles, completed = result.completed, "batch complete");
        if ctx.show_progress {
            ui::print_stats(&session.stats.snapshot());
        }

        if settings.max_cycles > 0 && cycles >= settings.max_cycles {
            break;
        }
        if !session
            .state
            .sleep_unless_stopped(settings.delay, STOP_CHECK)
            .await
        {
            break;
        }
    }

    Ok(session.finish(cycles, total))
}

/// Watch: follows `path` and dispatches each new line as it is imported,
/// until a stop is requested.
pub async fn run_watch<H: JobHandler>(
    ctx: &SessionContext<H>,
    state: RunState,
    path: &Path,
    import_existing: bool,
    poll_interval: Duration,
    control: Option<mpsc::UnboundedReceiver<String>>,
) -> Result<SessionReport> {
    let session = Session::start(ctx, Mode::Watch, state, ctx.options);
    if let Some(lines) = control {
        drop(spawn_control(lines, session.state.clone(), Arc::clone(&session.stats)));
    }
    if !path.exists() {
        warn!(path = %path.display(), "watch file does not exist yet; waiting for it");
    }

    let tail = FileTail::new(path, import_existing)
        .with_context(|| format!("reading watch file {}", path.display()))?;
    let (tx, rx) = mpsc::channel(IMPORT_QUEUE);
    let importer = spawn_importer(
        tail,
        Arc::clone(&ctx.classifier),
        session.state.clone(),
        poll_interval,
        tx,
    );
    let ticker = ctx
        .show_progress
        .then(|| spawn_stats_ticker(session.state.clone(), Arc::clone(&session.stats)));

    let result = session.dispatcher.run_stream(rx).await;

    if let Some(ticker) = ticker {
        ticker.abort();
    }
    let report = session.finish(1, result);
    if let Err(e) = importer.await {
        warn!(error = %e, "importer task failed");
    }
    Ok(report)
}

fn log_loaded(jobs: &[Job], path: &Path) {
    let kind_b = jobs.iter().filter(|job| job.kind() == JobKind::B).count();
    info!(
        jobs = jobs.len(),
        kind_a = jobs.len() - kind_b,
        kind_b,
        path = %path.display(),
        "loaded targets"
    );
}

fn spawn_stats_ticker(
    state: RunState,
    stats: Arc<StatsAggregator>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_total = 0;
        while state.sleep_unless_stopped(STATS_INTERVAL, STOP_CHECK).await {
            let snapshot = stats.snapshot();
            if snapshot.total_processed != last_total {
                last_total = snapshot.total_processed;
                ui::print_stats(&snapshot);
            }
        }
    })
}
