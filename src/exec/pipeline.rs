use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::exec::cleanup;
use crate::exec::process::{OutputSource, ShellProcess};

/// How long a terminated process gets to exit before the hard kill
const KILL_GRACE: Duration = Duration::from_millis(500);

/// One entry in an execution batch: a display name plus the final rendered
/// command string (and the environment/cwd it runs with).
#[derive(Debug, Clone, Default)]
pub struct ExecutionStep {
    pub name: String,
    pub command: String,
    pub env: HashMap<String, String>,
    pub cwd: PathBuf,
}

impl ExecutionStep {
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        ExecutionStep {
            name: name.into(),
            command: command.into(),
            ..Default::default()
        }
    }
}

/// Progress notifications delivered to the execution listener
#[derive(Debug, Clone)]
pub enum RunEvent {
    StepStarted {
        index: usize,
        name: String,
        command: String,
    },
    StepOutput {
        index: usize,
        source: OutputSource,
        line: String,
    },
    /// The step's process could not be started at all
    StepSpawnFailed { index: usize, message: String },
    StepFinished { index: usize, exit_code: i32 },
    RunFinished(RunOutcome),
}

/// Terminal state of a batch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// A step exited non-zero; `unexecuted` steps after it never ran
    StoppedOnError {
        index: usize,
        exit_code: i32,
        unexecuted: usize,
    },
    /// A stop request ended the run; the interrupted step counts as
    /// unexecuted
    StoppedByUser { unexecuted: usize },
}

impl RunOutcome {
    #[must_use]
    pub fn success(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

/// Drives batches of steps, one subprocess at a time.
///
/// `execute` starts a batch in the background; `request_stop` cancels it;
/// `wait` joins the in-flight batch. Starting a new batch while one is
/// running cancels and awaits the old one first, so at most one process is
/// ever alive.
pub struct Runner {
    stop_tx: watch::Sender<bool>,
    current: Option<JoinHandle<RunOutcome>>,
    cleanup_stale: bool,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    #[must_use]
    pub fn new() -> Self {
        Runner {
            stop_tx: watch::channel(false).0,
            current: None,
            cleanup_stale: true,
        }
    }

    /// Disable the pre-batch stale-process sweep (used by tests)
    #[must_use]
    pub fn without_stale_cleanup(mut self) -> Self {
        self.cleanup_stale = false;
        self
    }

    /// Begin executing a batch of steps. No-op for an empty batch.
    ///
    /// Any still-running previous batch is stopped and awaited first, then
    /// the stop flag is reset and execution starts at index 0.
    pub async fn execute(&mut self, steps: Vec<ExecutionStep>, events: mpsc::Sender<RunEvent>) {
        if steps.is_empty() {
            debug!("Empty batch, nothing to execute");
            return;
        }
        if let Some(handle) = self.current.take() {
            if !handle.is_finished() {
                info!("Cancelling previous run before starting a new one");
                let _ = self.stop_tx.send(true);
            }
            let _ = handle.await;
        }

        if self.cleanup_stale {
            cleanup::kill_stale_processes(&steps);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        self.stop_tx = stop_tx;
        self.current = Some(tokio::spawn(run_batch(steps, events, stop_rx)));
    }

    /// Request the current batch to stop. The active process group is
    /// terminated and remaining steps are not started.
    pub fn request_stop(&self) {
        info!("Stop requested");
        let _ = self.stop_tx.send(true);
    }

    /// Wait for the in-flight batch to finish, returning its outcome.
    /// Returns `None` when nothing is running.
    pub async fn wait(&mut self) -> Option<RunOutcome> {
        match self.current.take() {
            Some(handle) => handle.await.ok(),
            None => None,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|h| !h.is_finished())
    }
}

async fn finish(events: &mpsc::Sender<RunEvent>, outcome: RunOutcome) -> RunOutcome {
    if let RunOutcome::StoppedOnError {
        index,
        exit_code,
        unexecuted,
    } = &outcome
    {
        warn!("Step {index} failed with code {exit_code}; {unexecuted} steps not run");
    }
    let _ = events.send(RunEvent::RunFinished(outcome.clone())).await;
    outcome
}

async fn run_batch(
    steps: Vec<ExecutionStep>,
    events: mpsc::Sender<RunEvent>,
    mut stop_rx: watch::Receiver<bool>,
) -> RunOutcome {
    let total = steps.len();
    for (index, step) in steps.iter().enumerate() {
        // Stop requests are honored between steps...
        if *stop_rx.borrow_and_update() {
            return finish(
                &events,
                RunOutcome::StoppedByUser {
                    unexecuted: total - index,
                },
            )
            .await;
        }

        info!("Executing step {}/{}: {}", index + 1, total, step.name);
        let _ = events
            .send(RunEvent::StepStarted {
                index,
                name: step.name.clone(),
                command: step.command.clone(),
            })
            .await;

        let mut process = match ShellProcess::spawn(&step.command, &step.env, &step.cwd) {
            Ok(process) => process,
            Err(e) => {
                let _ = events
                    .send(RunEvent::StepSpawnFailed {
                        index,
                        message: e.to_string(),
                    })
                    .await;
                return finish(
                    &events,
                    RunOutcome::StoppedOnError {
                        index,
                        exit_code: -1,
                        unexecuted: total - index - 1,
                    },
                )
                .await;
            }
        };

        // ...and mid-step, where they kill the active process group.
        let mut stop_closed = false;
        let exit_code = loop {
            tokio::select! {
                maybe_line = process.next_line() => match maybe_line {
                    Some(line) => {
                        let _ = events.send(RunEvent::StepOutput {
                            index,
                            source: line.source,
                            line: line.text,
                        }).await;
                    }
                    // Both pipes closed: the step is done (or moments away)
                    None => match process.wait().await {
                        Ok(code) => break code,
                        Err(e) => {
                            warn!("Failed to collect exit status: {e:?}");
                            break -1;
                        }
                    },
                },
                changed = stop_rx.changed(), if !stop_closed => {
                    if changed.is_err() {
                        stop_closed = true;
                    } else if *stop_rx.borrow_and_update() {
                        process.terminate(KILL_GRACE).await;
                        return finish(&events, RunOutcome::StoppedByUser {
                            unexecuted: total - index,
                        }).await;
                    }
                }
            }
        };

        let _ = events
            .send(RunEvent::StepFinished { index, exit_code })
            .await;

        if exit_code != 0 {
            return finish(
                &events,
                RunOutcome::StoppedOnError {
                    index,
                    exit_code,
                    unexecuted: total - index - 1,
                },
            )
            .await;
        }
    }

    finish(&events, RunOutcome::Completed).await
}
