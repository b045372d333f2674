//! Worker process handle and spawning.
//!
//! The bridge only needs three byte streams and an exit notification from the
//! worker; [`ProcessHandle`] is that contract. [`ChildProcess`] implements it
//! over `tokio::process`, either with the protocol on stdin/stdout or on a Unix
//! socket the worker connects to.

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};

use crate::bridge::transport::{Carrier, SocketListener};

pub type WorkerInput = Box<dyn AsyncWrite + Send + Unpin>;
pub type WorkerOutput = Box<dyn AsyncRead + Send + Unpin>;

/// The three independent streams of a worker.
pub struct WorkerStreams {
    /// Requests go here.
    pub input: WorkerInput,
    /// Responses come from here.
    pub output: WorkerOutput,
    /// Any data here is treated as a fatal worker failure.
    pub diagnostics: Option<WorkerOutput>,
}

/// How the worker ended. `None` fields are rendered as `-`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn new(code: Option<i32>, signal: Option<i32>) -> Self {
        Self { code, signal }
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl std::fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn or_dash(v: Option<i32>) -> String {
            v.map_or_else(|| "-".to_string(), |v| v.to_string())
        }
        write!(f, "code: {}, signal: {}", or_dash(self.code), or_dash(self.signal))
    }
}

/// A running worker as seen by the bridge.
#[async_trait]
pub trait ProcessHandle: Send + 'static {
    /// Hand over the worker's streams. Called once, when the bridge attaches.
    fn take_streams(&mut self) -> io::Result<WorkerStreams>;

    /// Wait for the worker to exit.
    async fn wait(&mut self) -> io::Result<ExitInfo>;

    /// Ask the worker to stop. Must not block; completion is observed via `wait`.
    fn terminate(&mut self) -> io::Result<()>;
}

#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("failed to spawn process: {0}")]
    Spawn(#[from] io::Error),
    #[error("spawn failed: {0}")]
    Other(String),
}

/// Everything needed to start one worker.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Extension point for different worker spawn strategies.
pub trait WorkerSpawner: Send + Sync {
    /// Start the worker. `stdio` selects whether stdin/stdout are piped (the
    /// stdio carrier) or left unused (the socket carrier). Stderr is always piped.
    fn spawn(&self, command: &WorkerCommand, stdio: bool) -> Result<Child, SpawnError>;
}

/// Default spawner over `tokio::process::Command`.
pub struct CommandSpawner;

impl WorkerSpawner for CommandSpawner {
    fn spawn(&self, command: &WorkerCommand, stdio: bool) -> Result<Child, SpawnError> {
        let pipe = || if stdio { Stdio::piped() } else { Stdio::null() };
        let child = Command::new(&command.program)
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k, v)))
            .stdin(pipe())
            .stdout(pipe())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        Ok(child)
    }
}

/// A worker child process plus, in socket mode, its connection.
pub struct ChildProcess {
    child: Child,
    socket: Option<UnixStream>,
}

impl ChildProcess {
    /// Spawn a worker for the given carrier. In socket mode this waits for the
    /// worker to connect back before returning.
    pub async fn spawn(
        spawner: &dyn WorkerSpawner,
        command: &WorkerCommand,
        carrier: Carrier,
    ) -> Result<Self, SpawnError> {
        match carrier {
            Carrier::Stdio => {
                let child = spawner.spawn(command, true)?;
                tracing::info!(pid = ?child.id(), program = %command.program.display(), "Spawned mail worker");
                Ok(Self {
                    child,
                    socket: None,
                })
            }
            Carrier::UnixSocket => {
                let listener = SocketListener::bind()?;
                let mut command = command.clone();
                command
                    .args
                    .insert(0, listener.path().to_string_lossy().into_owned());

                let mut child = spawner.spawn(&command, false)?;
                tracing::info!(pid = ?child.id(), program = %command.program.display(), "Spawned mail worker (socket carrier)");

                // A worker that dies before connecting would leave accept() hanging.
                let socket = tokio::select! {
                    accepted = listener.accept() => accepted?,
                    status = child.wait() => {
                        let info = ExitInfo::from(status?);
                        return Err(SpawnError::Other(format!(
                            "worker exited before connecting ({info})"
                        )));
                    }
                };

                Ok(Self {
                    child,
                    socket: Some(socket),
                })
            }
        }
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }
}

fn not_captured(stream: &str) -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, format!("{stream} not captured"))
}

#[async_trait]
impl ProcessHandle for ChildProcess {
    fn take_streams(&mut self) -> io::Result<WorkerStreams> {
        let diagnostics = self
            .child
            .stderr
            .take()
            .map(|stderr| Box::new(stderr) as WorkerOutput);

        let (input, output): (WorkerInput, WorkerOutput) = match self.socket.take() {
            Some(socket) => {
                let (read_half, write_half) = socket.into_split();
                (Box::new(write_half), Box::new(read_half))
            }
            None => {
                let stdin = self.child.stdin.take().ok_or_else(|| not_captured("stdin"))?;
                let stdout = self.child.stdout.take().ok_or_else(|| not_captured("stdout"))?;
                (Box::new(stdin), Box::new(stdout))
            }
        };

        Ok(WorkerStreams {
            input,
            output,
            diagnostics,
        })
    }

    async fn wait(&mut self) -> io::Result<ExitInfo> {
        let status = self.child.wait().await?;
        Ok(ExitInfo::from(status))
    }

    fn terminate(&mut self) -> io::Result<()> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;

            if let Some(pid) = self.id() {
                let pid = Pid::from_raw(pid as i32);
                match kill(pid, Signal::SIGTERM) {
                    Ok(()) => return Ok(()),
                    Err(e) => tracing::warn!(%pid, error = %e, "SIGTERM failed, killing worker"),
                }
            }
        }

        match self.child.start_kill() {
            // Already reaped.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(()),
            other => other,
        }
    }
}
