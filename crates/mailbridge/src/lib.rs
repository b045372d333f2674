//! mailbridge: out-of-process email dispatch.
//!
//! A [`Mailer`] supervises one worker process and talks to it over
//! newline-delimited JSON on stdin/stdout or a Unix socket. The worker side of
//! the same protocol is [`worker::run_worker`].

pub mod bridge;
pub mod config;
pub mod mailer;
pub mod message;
mod pending;
pub mod process;
pub mod worker;

pub use bridge::protocol::{Request, RequestId, RequestKind, Response, Status};
pub use bridge::transport::Carrier;
pub use config::{ConfigError, MailerConfig};
pub use mailer::{BridgeState, Delivery, Mailer, MailerError};
pub use message::{Attachment, Email, EmailAddress, EmailBuilder, MessageError};
pub use process::{ChildProcess, CommandSpawner, ExitInfo, ProcessHandle, WorkerCommand, WorkerSpawner};
pub use worker::{MailTransport, TransportError, WorkerExit, run_worker};
