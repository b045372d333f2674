//! Worker loop - runs inside the mail worker subprocess.
//!
//! This module provides the child side of the protocol. The parent side
//! (spawning, correlation, failure containment) is in mailer.rs.
//!
//! Requests are handled strictly one at a time. A failed request produces an
//! error response and the loop carries on; only an undecodable or structurally
//! invalid line ends it, after one final id-less error response.
//!
//! Nothing here writes to stderr: the supervisor treats any output there as a
//! fatal worker failure.

use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::bridge::codec::LineJsonCodec;
use crate::bridge::protocol::{Request, RequestKind, Response};
use crate::message::Email;

/// Failures raised by a [`MailTransport`]. Reported to the supervisor as the
/// `message` of an error response.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid DSN: {0}")]
    InvalidDsn(String),

    #[error("unsupported transport scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("failed to read attachment {path}: {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// The mail delivery capability the worker drives.
#[async_trait]
pub trait MailTransport: Send {
    /// (Re)initialize from a connection string. On failure the previous
    /// configuration, if any, must stay usable.
    async fn configure(&mut self, dsn: &str) -> Result<(), TransportError>;

    /// Deliver one validated message.
    async fn deliver(&mut self, email: Email) -> Result<(), TransportError>;
}

/// Why the worker loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The supervisor closed our input.
    InputClosed,
    /// A line could not be decoded or was not a request; a fatal response was sent.
    ProtocolViolation,
}

struct Worker<T> {
    transport: T,
    configured: bool,
}

impl<T: MailTransport> Worker<T> {
    async fn handle(&mut self, request: Request) -> Response {
        let Request { id, kind, payload } = request;
        tracing::debug!(request_id = %id, %kind, "Handling request");

        let result = match kind {
            RequestKind::Configure => self.configure(payload).await,
            RequestKind::Send => self.send(payload).await,
            RequestKind::Other(kind) => Err(format!("unknown message type: {kind}")),
        };

        match result {
            Ok(()) => Response::ok(id),
            Err(message) => {
                tracing::warn!(request_id = %id, error = %message, "Request failed");
                Response::error(id, message)
            }
        }
    }

    async fn configure(&mut self, payload: Value) -> Result<(), String> {
        let Value::String(dsn) = payload else {
            return Err("DSN payload must be a string".to_string());
        };
        self.transport
            .configure(&dsn)
            .await
            .map_err(|e| e.to_string())?;
        self.configured = true;
        tracing::info!("Mail transport configured");
        Ok(())
    }

    async fn send(&mut self, payload: Value) -> Result<(), String> {
        if !self.configured {
            return Err("transport not initialized".to_string());
        }
        let email = Email::from_payload(payload).map_err(|e| e.to_string())?;
        self.transport.deliver(email).await.map_err(|e| e.to_string())
    }
}

/// Run the worker event loop over any reader/writer pair (stdin/stdout or a
/// socket). Returns once input closes or after a protocol violation.
pub async fn run_worker<T, R, W>(transport: T, reader: R, writer: W) -> io::Result<WorkerExit>
where
    T: MailTransport,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = FramedRead::new(reader, LineJsonCodec::<Value>::new());
    let mut writer = FramedWrite::new(writer, LineJsonCodec::<Response>::new());
    let mut worker = Worker {
        transport,
        configured: false,
    };

    tracing::info!("Worker ready");

    while let Some(frame) = reader.next().await {
        let request = match frame {
            Ok(value) => match Request::decode(value) {
                Ok(request) => request,
                Err(e) => return abort(&mut writer, format!("malformed message: {e}")).await,
            },
            Err(e) => return abort(&mut writer, format!("input error: {e}")).await,
        };

        let response = worker.handle(request).await;
        // SinkExt::send flushes, so the supervisor sees each completion immediately.
        writer.send(response).await?;
    }

    tracing::info!("Input closed, worker exiting");
    Ok(WorkerExit::InputClosed)
}

async fn abort<W: AsyncWrite + Unpin>(
    writer: &mut FramedWrite<W, LineJsonCodec<Response>>,
    message: String,
) -> io::Result<WorkerExit> {
    tracing::error!(%message, "Protocol violation, worker stopping");
    writer.send(Response::fatal(message)).await?;
    if let Err(e) = writer.close().await {
        tracing::warn!(error = %e, "Failed to close output");
    }
    Ok(WorkerExit::ProtocolViolation)
}
