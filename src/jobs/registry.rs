use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TryRecvError};

use crate::errors::{FanoutError, Result};
use crate::token::Token;

/// Lines buffered for a job before its readers stall.
pub const DEFAULT_OUTPUT_CAPACITY: usize = 10;

/// Largest per-job buffer accepted from configuration.
pub const MAX_OUTPUT_CAPACITY: usize = 65_536;

/// Create a bounded output queue and the single writer that feeds it.
///
/// The capacity is clamped to `1..=MAX_OUTPUT_CAPACITY`.
pub fn output_queue(capacity: usize) -> (OutputWriter, OutputQueue) {
    let (tx, rx) = mpsc::channel(capacity.clamp(1, MAX_OUTPUT_CAPACITY));
    (OutputWriter { tx }, OutputQueue { rx })
}

/// Producer side of a job's output queue.
///
/// Not `Clone`: there is exactly one writer per queue, and `close` consumes
/// it, so a queue can only be closed once.
#[derive(Debug)]
pub struct OutputWriter {
    tx: mpsc::Sender<String>,
}

impl OutputWriter {
    /// Append a line, waiting while the queue is full.
    ///
    /// Returns `false` if the consumer side is gone and the line was dropped.
    pub async fn push(&self, line: String) -> bool {
        self.tx.send(line).await.is_ok()
    }

    /// Mark the queue as finished. No more lines can follow.
    pub fn close(self) {
        drop(self.tx);
    }
}

/// Consumer side of a job's output queue.
#[derive(Debug)]
pub struct OutputQueue {
    rx: mpsc::Receiver<String>,
}

impl OutputQueue {
    /// Move every line buffered right now into `lines` without waiting.
    ///
    /// Returns `true` once the writer has closed and the queue is empty.
    pub fn drain_now(&mut self, lines: &mut Vec<String>) -> bool {
        loop {
            match self.rx.try_recv() {
                Ok(line) => lines.push(line),
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => return true,
            }
        }
    }
}

/// Result of one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputChunk {
    pub lines: Vec<String>,
    pub done: bool,
}

/// Live output queues keyed by token.
///
/// The key-space lock is only held to insert, look up or remove an entry.
/// Each queue has its own lock, so draining one job never waits on another.
#[derive(Debug, Default)]
pub struct OutputRegistry {
    queues: Mutex<HashMap<Token, Arc<Mutex<OutputQueue>>>>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Token, Arc<Mutex<OutputQueue>>>> {
        self.queues.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a queue. Returns `false`, leaving the existing entry alone, if
    /// the token is already live.
    pub fn register(&self, token: Token, queue: OutputQueue) -> bool {
        let mut entries = self.entries();
        if entries.contains_key(&token) {
            return false;
        }
        entries.insert(token, Arc::new(Mutex::new(queue)));
        true
    }

    /// Everything buffered for `token` right now.
    ///
    /// When the queue is closed and empty the entry is removed in the same
    /// call and `done` is set. Only one caller ever sees `done`; the token is
    /// unknown from then on.
    pub fn drain(&self, token: &Token) -> Result<OutputChunk> {
        let not_found = || FanoutError::NotFound {
            token: token.to_string(),
        };
        let queue = self.entries().get(token).cloned().ok_or_else(not_found)?;

        let mut queue = queue.lock().unwrap_or_else(|e| e.into_inner());
        let mut lines = Vec::new();
        if !queue.drain_now(&mut lines) {
            return Ok(OutputChunk { lines, done: false });
        }

        // Still holding the queue lock: a racing poller cannot have drained
        // anything we have not, so losing the removal means nothing is lost.
        if self.entries().remove(token).is_none() {
            return Err(not_found());
        }
        tracing::debug!(token = %token, "output stream completed and removed");
        Ok(OutputChunk { lines, done: true })
    }

    /// Forget a token without draining it.
    pub fn remove(&self, token: &Token) -> bool {
        self.entries().remove(token).is_some()
    }

    pub fn contains(&self, token: &Token) -> bool {
        self.entries().contains_key(token)
    }

    /// Number of jobs whose completion has not been observed yet.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
