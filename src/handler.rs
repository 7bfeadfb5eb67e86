//! Per-job handlers. The dispatcher only relies on the [`JobHandler`]
//! contract: eventually return `Ok(())` or a [`HandlerError`].

use std::future::Future;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::HandlerError;
use crate::job::Job;

pub trait JobHandler: Send + Sync + 'static {
    fn handle(&self, job: &Job) -> impl Future<Output = Result<(), HandlerError>> + Send;
}

/// Logs each job and reports success without doing any work.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunHandler;

impl JobHandler for DryRunHandler {
    async fn handle(&self, job: &Job) -> Result<(), HandlerError> {
        info!(job = %job, "dry run");
        Ok(())
    }
}

/// Runs an external program once per job, passing the job id as the last
/// argument and the kind in `TAILPOOL_JOB_KIND`. A zero exit status is a
/// success.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    program: String,
    args: Vec<String>,
}

impl CommandHandler {
    /// Builds a handler from `argv`; `None` if it is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl JobHandler for CommandHandler {
    async fn handle(&self, job: &Job) -> Result<(), HandlerError> {
        debug!(program = %self.program, job = %job, "spawning handler command");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(job.id())
            .env("TAILPOOL_JOB_KIND", job.kind().to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| HandlerError::Failed(format!("failed to spawn {}: {e}", self.program)))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.lines().next().unwrap_or("").trim();
        if detail.is_empty() {
            Err(HandlerError::Failed(output.status.to_string()))
        } else {
            Err(HandlerError::Failed(format!("{}: {detail}", output.status)))
        }
    }
}

/// Either handler, chosen from configuration at startup.
#[derive(Debug, Clone)]
pub enum AnyHandler {
    DryRun(DryRunHandler),
    Command(CommandHandler),
}

impl AnyHandler {
    pub fn from_command(argv: Option<&[String]>) -> Self {
        match argv.and_then(CommandHandler::from_argv) {
            Some(handler) => AnyHandler::Command(handler),
            None => AnyHandler::DryRun(DryRunHandler),
        }
    }
}

impl JobHandler for AnyHandler {
    async fn handle(&self, job: &Job) -> Result<(), HandlerError> {
        match self {
            AnyHandler::DryRun(h) => h.handle(job).await,
            AnyHandler::Command(h) => h.handle(job).await,
        }
    }
}
