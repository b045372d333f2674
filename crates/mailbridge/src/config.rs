//! Supervisor configuration: which worker to start and how to talk to it.

use std::path::PathBuf;
use std::sync::Arc;

use crate::bridge::transport::Carrier;
use crate::process::{CommandSpawner, WorkerCommand, WorkerSpawner};

/// Overrides the worker binary location.
pub const WORKER_BIN_ENV: &str = "MAILBRIDGE_WORKER_BIN";
/// Selects the carrier: `stdio` (default) or `socket`.
pub const CARRIER_ENV: &str = "MAILBRIDGE_CARRIER";

pub const DEFAULT_WORKER_NAME: &str = "mailbridge-worker";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

pub struct MailerConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub carrier: Carrier,
    pub spawner: Arc<dyn WorkerSpawner>,
}

impl MailerConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            carrier: Carrier::Stdio,
            spawner: Arc::new(CommandSpawner),
        }
    }

    /// Build from `MAILBRIDGE_WORKER_BIN` and `MAILBRIDGE_CARRIER`, falling
    /// back to [`default_worker_program`] and the stdio carrier.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let program = lookup(WORKER_BIN_ENV)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_worker_program);

        let mut config = Self::new(program);
        if let Some(carrier) = lookup(CARRIER_ENV).filter(|c| !c.is_empty()) {
            config.carrier = carrier.parse().map_err(|reason| ConfigError::Invalid {
                var: CARRIER_ENV,
                reason,
            })?;
        }
        Ok(config)
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_carrier(mut self, carrier: Carrier) -> Self {
        self.carrier = carrier;
        self
    }

    pub fn with_spawner(mut self, spawner: Arc<dyn WorkerSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn command(&self) -> WorkerCommand {
        WorkerCommand {
            program: self.program.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
        }
    }
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self::new(default_worker_program())
    }
}

/// `mailbridge-worker` next to the running executable if present, otherwise
/// the bare name for a `PATH` lookup.
pub fn default_worker_program() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_WORKER_NAME)))
        .filter(|candidate| candidate.is_file())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKER_NAME))
}
