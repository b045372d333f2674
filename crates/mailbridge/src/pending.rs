//! Pending table: outstanding requests awaiting their worker response.
//!
//! Each entry is a oneshot sender, so a request resolves at most once: the
//! entry is removed on response, on write failure, or by a bulk rejection.

use std::collections::HashMap;

use tokio::sync::oneshot;

use crate::bridge::protocol::RequestId;
use crate::mailer::MailerError;

pub(crate) type Outcome = Result<(), MailerError>;

#[derive(Default)]
pub(crate) struct PendingTable {
    last_id: u64,
    entries: HashMap<RequestId, oneshot::Sender<Outcome>>,
}

impl PendingTable {
    /// Allocate the next id and register a completion handle for it.
    pub fn register(&mut self) -> (RequestId, oneshot::Receiver<Outcome>) {
        self.last_id += 1;
        let id = RequestId::from(self.last_id);
        let (tx, rx) = oneshot::channel();
        self.entries.insert(id.clone(), tx);
        (id, rx)
    }

    /// Drop a registration without resolving it (the request never left).
    pub fn forget(&mut self, id: &RequestId) {
        self.entries.remove(id);
    }

    /// Resolve one request. Returns false when the id is not tracked.
    pub fn resolve(&mut self, id: &RequestId, outcome: Outcome) -> bool {
        match self.entries.remove(id) {
            Some(tx) => {
                if tx.send(outcome).is_err() {
                    tracing::trace!(request_id = %id, "Caller stopped waiting for response");
                }
                true
            }
            None => false,
        }
    }

    /// Reject every outstanding request with the same error.
    pub fn reject_all(&mut self, error: &MailerError) -> usize {
        let count = self.entries.len();
        for (_, tx) in self.entries.drain() {
            let _ = tx.send(Err(error.clone()));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
