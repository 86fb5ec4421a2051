//! Admission-controlled thread pool driving the dispatch loop.
//!
//! Two independent gates sit in front of every handler invocation:
//!
//! - **Turn gate** ([`AdmissionPool::wait`]): only one thread at a time holds the
//!   polling turn. The holder gives it up when it leaves to execute
//!   ([`AdmissionPool::try_acquire`]), which lets the next thread in.
//! - **Capacity ledger** ([`AdmissionPool::try_acquire`] /
//!   [`AdmissionPool::return_capacity`]): bounds how many handlers run at once.
//!   Every registered source raises the ceiling by one.
//!
//! Either gate can be disabled through [`AdmissionGates`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::error::DispatchError;

/// Which admission gates are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionGates {
    /// Only one thread may hold the polling turn.
    pub serialize_pollers: bool,
    /// `try_acquire` fails once the ceiling is reached.
    pub enforce_capacity: bool,
}

impl Default for AdmissionGates {
    fn default() -> Self {
        Self {
            serialize_pollers: true,
            enforce_capacity: true,
        }
    }
}

/// Snapshot of the capacity ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    /// Current ceiling.
    pub total: usize,
    /// Tickets held by running handlers.
    pub busy: usize,
}

#[derive(Debug)]
struct Ledger {
    turn_taken: bool,
    busy: usize,
    total: usize,
    last_left: Option<Instant>,
}

/// Admission state shared by all dispatch threads.
#[derive(Debug)]
pub struct AdmissionPool {
    gates: AdmissionGates,
    ledger: Mutex<Ledger>,
    /// Signaled when the polling turn is released.
    turn_free: Condvar,
    /// Signaled when a ticket is returned or the ceiling grows.
    capacity_free: Condvar,
    closed: AtomicBool,
}

impl AdmissionPool {
    /// Create a pool with `initial_capacity` execution tickets.
    #[must_use]
    pub fn new(initial_capacity: usize, gates: AdmissionGates) -> Self {
        Self {
            gates,
            ledger: Mutex::new(Ledger {
                turn_taken: false,
                busy: 0,
                total: initial_capacity,
                last_left: None,
            }),
            turn_free: Condvar::new(),
            capacity_free: Condvar::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Block until this thread holds the polling turn.
    ///
    /// Returns how long ago the previous holder left, if any thread has left yet.
    ///
    /// # Errors
    ///
    /// `DispatchError::ShutDown` once the pool is closed.
    pub fn wait(&self) -> Result<Option<Duration>, DispatchError> {
        let mut ledger = self.ledger.lock();
        if self.gates.serialize_pollers {
            while ledger.turn_taken && !self.is_closed() {
                self.turn_free.wait(&mut ledger);
            }
        }
        if self.is_closed() {
            return Err(DispatchError::ShutDown);
        }
        ledger.turn_taken = true;
        Ok(ledger.last_left.map(|at| at.elapsed()))
    }

    /// Take an execution ticket and give up the polling turn.
    ///
    /// Returns `false`, keeping the turn, if every ticket is in use.
    pub fn try_acquire(&self) -> bool {
        let mut ledger = self.ledger.lock();
        if self.gates.enforce_capacity && ledger.busy >= ledger.total {
            return false;
        }
        ledger.busy += 1;
        ledger.turn_taken = false;
        ledger.last_left = Some(Instant::now());
        drop(ledger);
        self.turn_free.notify_one();
        true
    }

    /// Block up to `timeout` for a ticket to become free. Does not take it.
    pub fn wait_for_capacity(&self, timeout: Duration) -> bool {
        let mut ledger = self.ledger.lock();
        if ledger.busy < ledger.total || self.is_closed() {
            return true;
        }
        let _ = self.capacity_free.wait_for(&mut ledger, timeout);
        ledger.busy < ledger.total
    }

    /// Return a ticket taken by [`Self::try_acquire`].
    pub fn return_capacity(&self) {
        let mut ledger = self.ledger.lock();
        ledger.busy = ledger.busy.saturating_sub(1);
        drop(ledger);
        self.capacity_free.notify_one();
    }

    /// Raise the ceiling by one ticket.
    pub fn increase_capacity(&self) {
        let mut ledger = self.ledger.lock();
        ledger.total += 1;
        drop(ledger);
        self.capacity_free.notify_one();
    }

    /// Give up the polling turn without taking a ticket.
    pub fn release_turn(&self) {
        let mut ledger = self.ledger.lock();
        ledger.turn_taken = false;
        drop(ledger);
        self.turn_free.notify_one();
    }

    /// Current ledger values.
    #[must_use]
    pub fn capacity(&self) -> CapacitySnapshot {
        let ledger = self.ledger.lock();
        CapacitySnapshot {
            total: ledger.total,
            busy: ledger.busy,
        }
    }

    /// Close the pool and wake every blocked thread.
    ///
    /// Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        // Taking the lock orders the flag before any waiter re-checks it.
        drop(self.ledger.lock());
        self.turn_free.notify_all();
        self.capacity_free.notify_all();
        true
    }

    /// Whether [`Self::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Spawn `count` named threads, each running `worker(&context, worker_id)`.
///
/// # Errors
///
/// Returns `DispatchError::Spawn` if a thread cannot be created; threads already
/// started keep running until the pool they serve is closed.
pub fn spawn_workers<C>(
    label: &str,
    count: usize,
    stack_size: usize,
    context: &Arc<C>,
    worker: fn(&C, usize),
) -> Result<Vec<JoinHandle<()>>, DispatchError>
where
    C: Send + Sync + 'static,
{
    let mut handles = Vec::with_capacity(count);
    for worker_id in 0..count {
        let context = Arc::clone(context);
        let handle = thread::Builder::new()
            .name(format!("{label}-{worker_id}"))
            .stack_size(stack_size)
            .spawn(move || {
                debug!(worker_id, "dispatch thread started");
                worker(&context, worker_id);
                debug!(worker_id, "dispatch thread exiting");
            })
            .map_err(DispatchError::Spawn)?;
        handles.push(handle);
    }
    Ok(handles)
}

/// Join threads, waiting at most `timeout` for each; stragglers are detached.
pub fn join_workers(handles: Vec<JoinHandle<()>>, timeout: Duration) {
    let count = handles.len();
    for (idx, handle) in handles.into_iter().enumerate() {
        let (tx, rx) = bounded(1);
        let joiner = thread::spawn(move || {
            let _ = tx.send(handle.join().is_ok());
        });

        match rx.recv_timeout(timeout) {
            Ok(true) => debug!(worker_id = idx, "worker joined"),
            Ok(false) => warn!(worker_id = idx, "worker panicked"),
            Err(_) => {
                warn!(worker_id = idx, "worker did not exit within timeout, detaching");
                continue;
            }
        }
        let _ = joiner.join();
    }
    info!(worker_count = count, "dispatch threads stopped");
}
