use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use log::{debug, error};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command as OsCommand};
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to wait for process: {0}")]
    Wait(#[from] std::io::Error),
}

/// Which stream a line arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    Stdout,
    Stderr,
}

/// One line of subprocess output
#[derive(Debug)]
pub struct OutputLine {
    pub source: OutputSource,
    pub text: String,
}

/// A shell command running as a child process in its own process group.
///
/// Output is read line-buffered off the pipes by background tasks, so the
/// caller never blocks the process on a full pipe while doing other work.
pub struct ShellProcess {
    child: Child,
    lines: mpsc::Receiver<OutputLine>,
    pid: Option<u32>,
}

fn spawn_line_reader<R>(reader: R, source: OutputSource, tx: mpsc::Sender<OutputLine>)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(text)) => {
                    if tx.send(OutputLine { source, text }).await.is_err() {
                        debug!("Output listener dropped, stopping reader");
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Output reader error: {e:?}");
                    break;
                }
            }
        }
    });
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    status.code().unwrap_or(-1)
}

impl ShellProcess {
    /// Spawn `command` via `sh -c` with piped output.
    ///
    /// The child gets its own process group so that it and anything it spawns
    /// can be terminated together.
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::Spawn` if the shell cannot be started.
    pub fn spawn(
        command: &str,
        env: &HashMap<String, String>,
        cwd: &Path,
    ) -> Result<Self, ProcessError> {
        debug!("Spawning: {command}");
        let mut cmd = OsCommand::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        for (key, value) in env {
            cmd.env(key, value);
        }
        if !cwd.as_os_str().is_empty() {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            command: command.to_string(),
            source,
        })?;
        let pid = child.id();

        let (tx, rx) = mpsc::channel(256);
        if let Some(stdout) = child.stdout.take() {
            spawn_line_reader(stdout, OutputSource::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_line_reader(stderr, OutputSource::Stderr, tx);
        }

        Ok(Self {
            child,
            lines: rx,
            pid,
        })
    }

    /// Next output line, or `None` once both pipes have closed.
    pub async fn next_line(&mut self) -> Option<OutputLine> {
        self.lines.recv().await
    }

    /// Wait for the process to exit and map its status to an exit code
    /// (`128 + signal` for signal deaths).
    ///
    /// # Errors
    ///
    /// Returns `ProcessError::Wait` if the status cannot be collected.
    pub async fn wait(&mut self) -> Result<i32, ProcessError> {
        let status = self.child.wait().await?;
        Ok(exit_code(status))
    }

    #[cfg(unix)]
    fn signal_group(&self, signal: nix::sys::signal::Signal) {
        let Some(pid) = self.pid else { return };
        let Ok(pid) = i32::try_from(pid) else { return };
        // Negative PID addresses the whole process group
        let pgid = nix::unistd::Pid::from_raw(-pid);
        if let Err(e) = nix::sys::signal::kill(pgid, signal) {
            debug!("Failed to signal process group {pid}: {e}");
        }
    }

    /// Forcibly terminate the process group: graceful signal first, then a
    /// hard kill once the grace period runs out. Consumes the process, so no
    /// further output can be delivered after this returns.
    pub async fn terminate(mut self, grace: Duration) {
        debug!("Terminating process {:?}", self.pid);
        #[cfg(unix)]
        self.signal_group(nix::sys::signal::Signal::SIGTERM);
        #[cfg(not(unix))]
        let _ = self.child.start_kill();

        if tokio::time::timeout(grace, self.child.wait()).await.is_ok() {
            return;
        }
        debug!("Process {:?} survived the grace period, killing", self.pid);
        #[cfg(unix)]
        self.signal_group(nix::sys::signal::Signal::SIGKILL);
        if let Err(e) = self.child.kill().await {
            error!("Failed to kill process: {e:?}");
        }
    }
}
