//! In-memory payload queue backing a counter source.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;
use thiserror::Error;

use crate::core::{AppResult, EventHandler};

/// Errors raised by payload queues.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The queue already holds its maximum number of payloads.
    #[error("queue full: {depth} payloads buffered")]
    Full {
        /// Configured maximum depth.
        depth: usize,
    },
}

/// Bounded FIFO of payloads, drained into `consumer` each time the source fires.
///
/// Register it as a counter source, then `queue` payloads and `post` the handle.
/// Payloads queued before a drain are delivered by that drain, so several
/// posts that coalesce into one readiness event lose nothing.
pub struct PayloadQueue<F> {
    max_depth: usize,
    items: Mutex<VecDeque<Vec<u8>>>,
    consumer: F,
}

impl<F> PayloadQueue<F>
where
    F: Fn(Vec<u8>) + Send + Sync + 'static,
{
    /// Create a queue holding at most `max_depth` payloads.
    pub fn new(max_depth: usize, consumer: F) -> Self {
        Self {
            max_depth,
            items: Mutex::new(VecDeque::with_capacity(max_depth.min(1024))),
            consumer,
        }
    }

    /// Maximum number of buffered payloads.
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Payloads currently buffered.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<F> EventHandler for PayloadQueue<F>
where
    F: Fn(Vec<u8>) + Send + Sync + 'static,
{
    fn exec(&self) {
        // Take the batch first so the consumer runs without the lock held.
        let batch = std::mem::take(&mut *self.items.lock());
        for payload in batch {
            (self.consumer)(payload);
        }
    }

    fn accepts_payloads(&self) -> bool {
        true
    }

    fn enqueue(&self, payload: Vec<u8>) -> AppResult<()> {
        let mut items = self.items.lock();
        if items.len() >= self.max_depth {
            tracing::warn!(depth = self.max_depth, "payload queue full");
            return Err(QueueError::Full {
                depth: self.max_depth,
            }
            .into());
        }
        items.push_back(payload);
        Ok(())
    }
}

impl<F> fmt::Debug for PayloadQueue<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadQueue")
            .field("max_depth", &self.max_depth)
            .field("len", &self.items.lock().len())
            .finish_non_exhaustive()
    }
}
