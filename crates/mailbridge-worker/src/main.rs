//! mailbridge-worker: serves the mailbridge protocol with lettre.
//!
//! Usage: `mailbridge-worker [socket-path]`
//!
//! With a socket path the worker connects to the supervisor's Unix socket,
//! otherwise it speaks on stdin/stdout. Exit status is 0 when the supervisor
//! closes the channel and 1 after a protocol violation.

mod logging;
mod smtp;

use std::process::ExitCode;

use anyhow::Context;
use mailbridge::bridge::transport;
use mailbridge::{WorkerExit, run_worker};

use crate::smtp::SmtpTransport;

async fn serve(socket_path: Option<String>) -> anyhow::Result<WorkerExit> {
    let mail = SmtpTransport::default();

    let exit = match socket_path {
        Some(path) => {
            let stream = transport::connect(&path)
                .await
                .with_context(|| format!("failed to connect to supervisor socket {path}"))?;
            tracing::info!(%path, "Connected to supervisor");
            let (reader, writer) = stream.into_split();
            run_worker(mail, reader, writer).await?
        }
        None => run_worker(mail, tokio::io::stdin(), tokio::io::stdout()).await?,
    };
    Ok(exit)
}

fn main() -> anyhow::Result<ExitCode> {
    logging::init_tracing()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    let exit = runtime.block_on(serve(std::env::args().nth(1)))?;
    tracing::info!(?exit, "Worker stopped");

    Ok(match exit {
        WorkerExit::InputClosed => ExitCode::SUCCESS,
        WorkerExit::ProtocolViolation => ExitCode::from(1),
    })
}
