//! Worker tracing setup.
//!
//! The supervisor treats any stderr output as a fatal worker failure, so logs
//! only ever go to the file named by `MAILBRIDGE_WORKER_LOG`. Without it no
//! subscriber is installed.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FILE_ENV: &str = "MAILBRIDGE_WORKER_LOG";
pub const LOG_LEVEL_ENV: &str = "MAILBRIDGE_LOG";

fn filter() -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }

    let level = match std::env::var(LOG_LEVEL_ENV).as_deref() {
        Ok("trace") => "trace",
        Ok("debug") => "debug",
        Ok("warn") | Ok("warning") => "warn",
        Ok("error") => "error",
        _ => "info",
    };
    EnvFilter::new(format!(
        "mailbridge={level},mailbridge_worker={level},mailbridge::bridge::codec=off"
    ))
}

pub fn init_tracing() -> anyhow::Result<()> {
    let Some(path) = std::env::var_os(LOG_FILE_ENV).filter(|p| !p.is_empty()) else {
        return Ok(());
    };

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open worker log {}", path.to_string_lossy()))?;
    let writer = Mutex::new(file);

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");
    if use_json {
        let _ = tracing_subscriber::registry()
            .with(filter())
            .with(fmt::layer().json().with_writer(writer))
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter())
            .with(fmt::layer().with_ansi(false).with_writer(writer))
            .try_init();
    }

    tracing::debug!(pid = std::process::id(), "Worker logging initialized");
    Ok(())
}
