//! IPC bridge for mailbridge supervisor-worker communication.
//!
//! This module provides the wire protocol, codec and carriers shared by the
//! supervisor ([`crate::Mailer`]) and the worker loop ([`crate::worker`]).
//!
//! # Architecture
//!
//! - **protocol**: Message types (Request/Response) and their typed decode step
//! - **codec**: Newline-delimited JSON codec for AsyncRead/AsyncWrite
//! - **transport**: Unix socket carrier, the alternative to stdin/stdout

pub mod codec;
pub mod protocol;
pub mod transport;
