//! Dispatcher context: registration and signaling operations.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::DispatcherConfig;
use crate::core::admission::{join_workers, spawn_workers, AdmissionGates, AdmissionPool};
use crate::core::engine::run_worker;
use crate::core::error::DispatchError;
use crate::core::handler::EventHandler;
use crate::core::limits::{discover_limits, ResourceLimits};
use crate::core::multiplexer::Multiplexer;
use crate::core::stats::{DispatchCounters, DispatchStats};
use crate::core::table::{EventSource, EventTable, Handle, RearmPolicy, SourceKind, SourceName};
use crate::core::waitable::Waitable;

/// State shared between the dispatcher handle and its threads.
pub(crate) struct Shared {
    pub config: DispatcherConfig,
    pub table: EventTable,
    pub mux: Multiplexer,
    pub pool: AdmissionPool,
    pub counters: DispatchCounters,
}

/// Event dispatcher: a pool of threads multiplexing timer and counter sources.
///
/// Built once by [`Dispatcher::initialize`] and shared by reference (or `Arc`)
/// with every component that registers or signals sources. Sources live as
/// long as the dispatcher.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use prometheus_dispatch::config::DispatcherConfig;
/// use prometheus_dispatch::core::{Dispatcher, RearmPolicy, SourceKind};
///
/// let dispatcher = Dispatcher::initialize(DispatcherConfig::new().with_thread_count(4))?;
/// let flush = dispatcher.create(
///     "flush",
///     Arc::new(|| flush_pending()),
///     SourceKind::Counter,
///     RearmPolicy::OneShot,
/// )?;
/// dispatcher.post(&flush)?;
/// ```
pub struct Dispatcher {
    shared: Arc<Shared>,
    limits: ResourceLimits,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Discover resource limits, size the event table, create the multiplexer
    /// and start `config.thread_count` dispatch threads.
    ///
    /// # Errors
    ///
    /// - `DispatchError::InvalidConfig` if the configuration is invalid
    /// - `DispatchError::Os` if the multiplexer cannot be created
    /// - `DispatchError::Spawn` if a dispatch thread cannot be started
    pub fn initialize(config: DispatcherConfig) -> Result<Self, DispatchError> {
        config.validate().map_err(DispatchError::InvalidConfig)?;

        let limits = discover_limits();
        let slots = limits.table_slots(config.max_table_slots);
        let mux = Multiplexer::new().map_err(|e| DispatchError::os("epoll_create", e))?;
        let gates = AdmissionGates {
            serialize_pollers: config.serialize_pollers,
            enforce_capacity: config.enforce_capacity,
        };

        let shared = Arc::new(Shared {
            table: EventTable::with_capacity(slots),
            mux,
            pool: AdmissionPool::new(config.initial_capacity, gates),
            counters: DispatchCounters::default(),
            config,
        });

        let workers = spawn_workers(
            &shared.config.thread_name,
            shared.config.thread_count,
            shared.config.thread_stack_size,
            &shared,
            run_worker,
        )
        .inspect_err(|_| {
            shared.pool.close();
        })?;

        info!(
            nofile_current = limits.current_max_descriptors,
            nofile_max = limits.hard_max_descriptors,
            table_slots = slots,
            threads = shared.config.thread_count,
            initial_capacity = shared.config.initial_capacity,
            "dispatcher initialized"
        );

        Ok(Self {
            shared,
            limits,
            workers: Mutex::new(workers),
        })
    }

    /// Register a new source and start watching it.
    ///
    /// A fresh timer or counter descriptor is created, stored in the table slot
    /// for its value, added to the multiplexer (read, edge-triggered) and the
    /// execution ceiling grows by one.
    ///
    /// # Errors
    ///
    /// - `DispatchError::NameTooLong` if `name` exceeds the label bound
    /// - `DispatchError::TableExhausted` if the descriptor does not fit the table
    /// - `DispatchError::Os` if the descriptor or multiplexer registration fails
    /// - `DispatchError::ShutDown` after [`Dispatcher::shutdown`]
    ///
    /// Nothing is left registered when an error is returned.
    pub fn create<H: EventHandler>(
        &self,
        name: &str,
        handler: Arc<H>,
        kind: SourceKind,
        rearm: RearmPolicy,
    ) -> Result<Handle, DispatchError> {
        if self.shared.pool.is_closed() {
            return Err(DispatchError::ShutDown);
        }
        let name = SourceName::new(name)?;
        let waitable = Waitable::open(kind).map_err(|e| {
            let operation = match kind {
                SourceKind::Timer => "timerfd_create",
                SourceKind::Counter => "eventfd",
            };
            DispatchError::os(operation, e)
        })?;
        let descriptor = waitable.descriptor();
        self.shared.table.check_vacant(descriptor)?;

        let source = Arc::new(EventSource {
            name,
            rearm,
            waitable,
            handler,
        });
        self.shared
            .mux
            .add(&source.waitable, descriptor)
            .map_err(|e| DispatchError::os("epoll_ctl(add)", e))?;
        if let Err(e) = self.shared.table.publish(Arc::clone(&source)) {
            let _ = self.shared.mux.remove(&source.waitable);
            return Err(e);
        }

        self.shared.pool.increase_capacity();
        DispatchCounters::bump(&self.shared.counters.registered_sources);
        info!(name = %source.name, descriptor, %kind, ?rearm, "event source registered");

        Ok(Handle::new(descriptor, kind))
    }

    /// Hand a payload to a counter source's enqueue callback. Does not wake the
    /// source; follow with [`Dispatcher::post`].
    ///
    /// # Errors
    ///
    /// - `DispatchError::InvalidOperation` for timer handles
    /// - `DispatchError::EnqueueUnsupported` if the handler takes no payloads
    /// - `DispatchError::Enqueue` with the callback's own error
    pub fn queue(&self, handle: &Handle, payload: Vec<u8>) -> Result<(), DispatchError> {
        handle.expect_kind(SourceKind::Counter, "queue")?;
        let source = self.source(handle)?;
        if !source.handler.accepts_payloads() {
            return Err(DispatchError::EnqueueUnsupported(source.name.to_string()));
        }
        source
            .handler
            .enqueue(payload)
            .map_err(DispatchError::Enqueue)
    }

    /// Wake a counter source. Posts that arrive before the dispatcher drains the
    /// counter coalesce into a single readiness event.
    ///
    /// # Errors
    ///
    /// - `DispatchError::InvalidOperation` for timer handles
    /// - `DispatchError::Os` if the counter write fails
    pub fn post(&self, handle: &Handle) -> Result<(), DispatchError> {
        handle.expect_kind(SourceKind::Counter, "post")?;
        let source = self.source(handle)?;
        source
            .waitable
            .signal()
            .map_err(|e| DispatchError::os("eventfd_write", e))
    }

    /// Arm a timer source to fire once, `delay_ns` nanoseconds from now,
    /// replacing any expiration already armed.
    ///
    /// # Errors
    ///
    /// - `DispatchError::InvalidOperation` for counter handles
    /// - `DispatchError::Os` if the timer cannot be armed
    pub fn settime(&self, handle: &Handle, delay_ns: u64) -> Result<(), DispatchError> {
        handle.expect_kind(SourceKind::Timer, "settime")?;
        let source = self.source(handle)?;
        source
            .waitable
            .arm(Duration::from_nanos(delay_ns))
            .map_err(|e| DispatchError::os("timerfd_settime", e))
    }

    /// Limits discovered at initialization.
    #[must_use]
    pub const fn limits(&self) -> ResourceLimits {
        self.limits
    }

    /// Number of event table slots.
    #[must_use]
    pub fn table_capacity(&self) -> usize {
        self.shared.table.capacity()
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> DispatchStats {
        self.shared
            .counters
            .snapshot(self.shared.config.thread_count, self.shared.pool.capacity())
    }

    /// Whether [`Dispatcher::shutdown`] has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.pool.is_closed()
    }

    /// Stop the dispatch threads and wait for them.
    ///
    /// Threads blocked on the multiplexer notice at their next poll timeout;
    /// each is given the configured join timeout and detached if it overruns.
    /// Handlers already running are not interrupted.
    pub fn shutdown(&self) {
        if !self.shared.pool.close() {
            return;
        }
        info!("shutting down dispatcher");
        let workers = std::mem::take(&mut *self.workers.lock());
        join_workers(workers, self.shared.config.shutdown_join_timeout());
    }

    fn source(&self, handle: &Handle) -> Result<&Arc<EventSource>, DispatchError> {
        self.shared
            .table
            .get(handle.descriptor())
            .filter(|source| source.kind() == handle.kind())
            .ok_or(DispatchError::UnknownHandle(handle.descriptor()))
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Signal only; joining here could block on a handler or a full poll timeout.
        if self.shared.pool.close() {
            debug!("dispatcher dropped without explicit shutdown, threads will be detached");
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("limits", &self.limits)
            .field("table", &self.shared.table)
            .field("closed", &self.shared.pool.is_closed())
            .finish_non_exhaustive()
    }
}
