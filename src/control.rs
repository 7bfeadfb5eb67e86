//! Out-of-band control commands read concurrently with a running session.

use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::session::RunState;
use crate::stats::StatsAggregator;
use crate::ui;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Stop,
    Pause,
    Resume,
    Stats,
    Unknown(String),
}

impl ControlCommand {
    pub fn parse(line: &str) -> Self {
        let word = line.trim().to_lowercase();
        match word.as_str() {
            "stop" => ControlCommand::Stop,
            "pause" => ControlCommand::Pause,
            "resume" => ControlCommand::Resume,
            "stats" => ControlCommand::Stats,
            _ => ControlCommand::Unknown(word),
        }
    }

    /// Applies the command to the session flags. Returns `false` once the
    /// command is terminal.
    pub fn apply(&self, state: &RunState) -> bool {
        match self {
            ControlCommand::Stop => {
                state.request_stop();
                false
            }
            ControlCommand::Pause => {
                state.pause();
                true
            }
            ControlCommand::Resume => {
                state.resume();
                true
            }
            ControlCommand::Stats | ControlCommand::Unknown(_) => true,
        }
    }
}

/// Forwards stdin lines from a detached OS thread.
///
/// The thread is never joined, so a pending read cannot hold up shutdown.
pub fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Spawns the control loop. The returned handle may be dropped: the task
/// ends on `stop`, when the input closes, or is simply abandoned with the
/// session.
pub fn spawn_control(
    mut lines: mpsc::UnboundedReceiver<String>,
    state: RunState,
    stats: Arc<StatsAggregator>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(line) = lines.recv().await {
            if !state.is_running() {
                break;
            }
            let command = ControlCommand::parse(&line);
            match &command {
                ControlCommand::Stop => info!("stop requested; finishing in-flight jobs"),
                ControlCommand::Pause => info!("paused; type `resume` to continue"),
                ControlCommand::Resume => info!("resumed"),
                ControlCommand::Stats => ui::print_stats(&stats.snapshot()),
                ControlCommand::Unknown(word) if word.is_empty() => continue,
                ControlCommand::Unknown(word) => {
                    warn!(command = %word, "unknown command; available: stop, pause, resume, stats")
                }
            }
            if !command.apply(&state) {
                break;
            }
        }
        debug!("control channel closed");
    })
}
