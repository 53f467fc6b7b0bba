//! Correlation table for requests awaiting a response.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{BridgeError, Result};

/// Completion handle for one outstanding request.
pub type Completion = oneshot::Sender<Result<Value>>;

#[derive(Default)]
struct Table {
    calls: HashMap<u64, Completion>,
    closed: Option<String>,
}

/// Outstanding requests keyed by JSON-RPC id.
///
/// Shared between the request path and the read loop. Every operation takes
/// the lock once and never across an await.
#[derive(Default)]
pub struct PendingCalls {
    table: Mutex<Table>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `id`. Fails if the id is already outstanding or the table was closed.
    pub fn insert(&self, id: u64, completion: Completion) -> Result<()> {
        let mut table = self.lock();
        if let Some(reason) = &table.closed {
            return Err(BridgeError::Transport(reason.clone()));
        }
        if table.calls.contains_key(&id) {
            return Err(BridgeError::InvalidState(format!(
                "request id {id} is already outstanding"
            )));
        }
        table.calls.insert(id, completion);
        Ok(())
    }

    /// Remove `id` without completing it.
    pub fn remove(&self, id: u64) -> Option<Completion> {
        self.lock().calls.remove(&id)
    }

    /// Remove `id` and hand it `outcome`. Returns `false` if nothing was waiting.
    pub fn complete(&self, id: u64, outcome: Result<Value>) -> bool {
        match self.remove(id) {
            // The waiter may have given up between removal and send; that is fine.
            Some(completion) => {
                let _ = completion.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Fail every outstanding call with a transport error and refuse new ones.
    ///
    /// Returns how many calls were failed. Only the first reason is kept.
    pub fn close(&self, reason: &str) -> usize {
        let drained: Vec<Completion> = {
            let mut table = self.lock();
            if table.closed.is_none() {
                table.closed = Some(reason.to_string());
            }
            table.calls.drain().map(|(_, completion)| completion).collect()
        };
        let count = drained.len();
        for completion in drained {
            let _ = completion.send(Err(BridgeError::Transport(reason.to_string())));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes its id from the table when dropped, so abandoned or timed-out
/// requests never leave a stale entry behind.
pub(crate) struct PendingGuard<'a> {
    pending: &'a PendingCalls,
    id: u64,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(pending: &'a PendingCalls, id: u64) -> Self {
        Self { pending, id }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(self.id);
    }
}
