//! Socket carrier for supervisor-worker IPC.
//!
//! The default carrier is the child's stdin/stdout. As an alternative the
//! supervisor binds a Unix domain socket, hands its path to the worker as the
//! first argument, and both directions of the protocol travel over the one
//! connection. The child's stderr remains the diagnostics stream either way.
//!
//! Socket path format: `{temp_dir}/mailbridge-{uuid}.sock`

use std::io;
use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};

/// How requests and responses travel between supervisor and worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Carrier {
    /// Requests on the child's stdin, responses on its stdout.
    #[default]
    Stdio,
    /// Both directions over a Unix domain socket the worker connects to.
    UnixSocket,
}

impl std::str::FromStr for Carrier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdio" => Ok(Self::Stdio),
            "socket" | "unix" => Ok(Self::UnixSocket),
            other => Err(format!("unknown carrier '{other}', expected 'stdio' or 'socket'")),
        }
    }
}

/// Supervisor side of the socket carrier: a listener awaiting one worker.
pub struct SocketListener {
    path: PathBuf,
    listener: UnixListener,
}

impl SocketListener {
    /// Bind a fresh socket in the temp directory.
    pub fn bind() -> io::Result<Self> {
        let path = std::env::temp_dir().join(format!("mailbridge-{}.sock", uuid::Uuid::new_v4()));
        Self::bind_at(path)
    }

    pub fn bind_at(path: PathBuf) -> io::Result<Self> {
        if path.exists() {
            std::fs::remove_file(&path)?;
        }

        let listener = UnixListener::bind(&path)?;
        tracing::debug!(path = %path.display(), "Bound worker socket");

        Ok(Self { path, listener })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept the worker's connection. The socket file is removed once the
    /// listener is dropped; the accepted stream stays usable.
    pub async fn accept(&self) -> io::Result<UnixStream> {
        tracing::trace!(path = %self.path.display(), "Waiting for worker connection");
        let (stream, _) = self.listener.accept().await?;
        tracing::trace!("Worker connected");
        Ok(stream)
    }

    pub fn cleanup(&self) -> io::Result<()> {
        if self.path.exists() {
            tracing::debug!(path = %self.path.display(), "Removing worker socket");
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            tracing::warn!(error = %e, "Failed to remove worker socket");
        }
    }
}

/// Worker side of the socket carrier.
pub async fn connect(path: impl AsRef<Path>) -> io::Result<UnixStream> {
    let path = path.as_ref();
    tracing::trace!(path = %path.display(), "Connecting to supervisor socket");
    UnixStream::connect(path).await
}
