//! Request/response correlation
//!
//! Maps each outstanding request id to a one-shot continuation. Single
//! invocation is enforced structurally: the sender is removed from the map
//! before it is used, so a second resolution for the same id finds nothing
//! and is a no-op. Late or duplicate delivery must never throw.

use std::collections::HashMap;
use std::sync::Mutex;

use framelink_wire::ResponseBody;
use tokio::sync::oneshot;

use crate::error::ClientError;

/// A correlated inbound response: the decoded body plus the raw serialized
/// text, kept for independent re-verification by the caller.
#[derive(Debug)]
pub struct CorrelatedResponse {
    pub body: ResponseBody,
    pub raw: String,
}

/// Outcome delivered to a waiting caller.
pub type Outcome = Result<CorrelatedResponse, ClientError>;

/// Pending-listener registry keyed by request id.
#[derive(Default)]
pub struct Correlator {
    pending: Mutex<HashMap<String, oneshot::Sender<Outcome>>>,
}

impl Correlator {
    /// Create an empty correlator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for a request id and return the receiving half.
    ///
    /// Request ids are unique for the lifetime of a client instance; if an
    /// id is nonetheless re-registered, the displaced listener observes a
    /// closed channel.
    pub fn register(&self, request_id: &str) -> oneshot::Receiver<Outcome> {
        let (tx, rx) = oneshot::channel();
        let displaced = self
            .pending
            .lock()
            .expect("correlator lock poisoned")
            .insert(request_id.to_string(), tx);
        if displaced.is_some() {
            tracing::warn!(request_id = %request_id, "request id re-registered, displacing pending listener");
        }
        rx
    }

    /// Resolve the listener for a request id, invoking it exactly once.
    ///
    /// Returns false (a no-op) when the id is unknown or already resolved.
    pub fn resolve(&self, request_id: &str, outcome: Outcome) -> bool {
        let sender = self
            .pending
            .lock()
            .expect("correlator lock poisoned")
            .remove(request_id);
        match sender {
            Some(tx) => {
                // The waiter may have given up between removal and send
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Remove a registration without invoking its listener.
    pub fn cancel(&self, request_id: &str) {
        self.pending
            .lock()
            .expect("correlator lock poisoned")
            .remove(request_id);
    }

    /// Fail every pending registration, used at teardown.
    pub fn fail_all(&self, make: impl Fn() -> ClientError) {
        let drained: Vec<_> = self
            .pending
            .lock()
            .expect("correlator lock poisoned")
            .drain()
            .collect();
        for (request_id, tx) in drained {
            tracing::debug!(request_id = %request_id, "failing pending request at teardown");
            let _ = tx.send(Err(make()));
        }
    }

    /// Number of outstanding registrations.
    pub fn len(&self) -> usize {
        self.pending.lock().expect("correlator lock poisoned").len()
    }

    /// Whether no registrations are outstanding.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
