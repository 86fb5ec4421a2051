//! The loop every dispatch thread runs.
//!
//! Outer phase: take the polling turn from the admission pool. Inner phase:
//! wait for one ready descriptor, resolve it, disarm it if one-shot, drain its
//! notification, take an execution ticket (retrying until one is free), run
//! the handler, re-arm, return the ticket.

use std::os::fd::RawFd;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use nix::errno::Errno;
use tracing::{debug, error, trace, warn};

use crate::config::CapacityWait;
use crate::core::dispatcher::Shared;
use crate::core::error::DispatchFault;
use crate::core::multiplexer::Readiness;
use crate::core::stats::DispatchCounters;
use crate::core::table::EventSource;

/// How an inner dispatch phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// One event was fully handled.
    Handled,
    /// The pool was closed.
    Stopped,
}

/// Entry point for each dispatch thread.
pub(crate) fn run_worker(shared: &Shared, worker_id: usize) {
    loop {
        let Ok(since_last_left) = shared.pool.wait() else {
            break;
        };
        if let Some(idle) = since_last_left {
            if idle > shared.config.stall_warn() {
                warn!(
                    worker_id,
                    idle_ms = u64::try_from(idle.as_millis()).unwrap_or(u64::MAX),
                    "polling turn was idle"
                );
            }
        }
        let capacity = shared.pool.capacity();
        trace!(worker_id, total = capacity.total, busy = capacity.busy, "polling turn taken");

        match dispatch_one(shared, worker_id) {
            Ok(Outcome::Handled) => {}
            Ok(Outcome::Stopped) => break,
            Err(fault) => abort_on_fault(worker_id, &fault),
        }
    }
}

fn dispatch_one(shared: &Shared, worker_id: usize) -> Result<Outcome, DispatchFault> {
    loop {
        if shared.pool.is_closed() {
            shared.pool.release_turn();
            return Ok(Outcome::Stopped);
        }

        let descriptor = match shared.mux.wait_one(shared.config.poll_timeout())? {
            Readiness::Idle => continue,
            Readiness::Ready(descriptor) => descriptor,
        };
        let source = RawFd::try_from(descriptor)
            .ok()
            .and_then(|fd| shared.table.get(fd))
            .ok_or(DispatchFault::UnknownDescriptor(descriptor))?;

        if source.is_one_shot() {
            shared
                .mux
                .remove(&source.waitable)
                .map_err(|errno| DispatchFault::Disarm {
                    name: source.name.to_string(),
                    source: errno,
                })?;
        }

        match source.waitable.drain() {
            Ok(count) => trace!(worker_id, source = %source.name, count, "notification drained"),
            Err(Errno::EAGAIN) => {
                // Another thread drained it first.
                DispatchCounters::bump(&shared.counters.spurious_wakeups);
                debug!(worker_id, source = %source.name, "nothing to drain");
                if source.is_one_shot() {
                    rearm(shared, source)?;
                }
                continue;
            }
            Err(errno) => {
                return Err(DispatchFault::Drain {
                    name: source.name.to_string(),
                    source: errno,
                })
            }
        }

        if !acquire_capacity(shared, worker_id, source) {
            return Ok(Outcome::Stopped);
        }

        debug!(worker_id, source = %source.name, "running handler");
        invoke(shared, worker_id, source);

        if source.is_one_shot() {
            rearm(shared, source)?;
        }
        shared.pool.return_capacity();
        DispatchCounters::bump(&shared.counters.events_handled);
        return Ok(Outcome::Handled);
    }
}

/// Retry until a ticket is free, with no limit on attempts. Returns `false` if
/// the pool closes first.
fn acquire_capacity(shared: &Shared, worker_id: usize, source: &EventSource) -> bool {
    let interval = shared.config.capacity_retry();
    let mut retry: u64 = 0;
    while !shared.pool.try_acquire() {
        if shared.pool.is_closed() {
            shared.pool.release_turn();
            return false;
        }
        warn!(worker_id, source = %source.name, retry, "all threads busy, retrying");
        DispatchCounters::bump(&shared.counters.capacity_retries);
        match shared.config.capacity_wait {
            CapacityWait::Sleep => thread::sleep(interval),
            CapacityWait::Condvar => {
                let _ = shared.pool.wait_for_capacity(interval);
            }
        }
        retry += 1;
    }
    true
}

fn invoke(shared: &Shared, worker_id: usize, source: &EventSource) {
    let handler = &source.handler;
    if panic::catch_unwind(AssertUnwindSafe(|| handler.exec())).is_err() {
        DispatchCounters::bump(&shared.counters.handler_panics);
        error!(worker_id, source = %source.name, "event handler panicked");
    }
}

fn rearm(shared: &Shared, source: &EventSource) -> Result<(), DispatchFault> {
    shared
        .mux
        .add(&source.waitable, source.descriptor())
        .map_err(|errno| DispatchFault::Rearm {
            name: source.name.to_string(),
            source: errno,
        })
}

fn abort_on_fault(worker_id: usize, fault: &DispatchFault) -> ! {
    error!(worker_id, fault = %fault, "unrecoverable dispatch failure, aborting");
    std::process::abort()
}
