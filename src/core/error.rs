//! Error types for dispatcher operations.

use std::os::fd::RawFd;

use nix::errno::Errno;
use thiserror::Error;

use crate::core::table::SourceKind;

/// Recoverable errors returned to the caller of a registration or signaling operation.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// An argument could not be interpreted (for example an unknown source kind).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The operation does not apply to the handle's source kind.
    #[error("{operation} is not valid for {kind} sources")]
    InvalidOperation {
        /// Name of the rejected operation.
        operation: &'static str,
        /// Kind carried by the handle.
        kind: SourceKind,
    },
    /// The source label exceeds the maximum label length.
    #[error("source name is {len} bytes, maximum is {max}")]
    NameTooLong {
        /// Length of the rejected name in bytes.
        len: usize,
        /// Maximum accepted length in bytes.
        max: usize,
    },
    /// The new descriptor does not fit in the event table.
    #[error("event table exhausted: descriptor {descriptor} exceeds capacity {capacity}")]
    TableExhausted {
        /// Descriptor value handed out by the kernel.
        descriptor: RawFd,
        /// Number of slots in the table.
        capacity: usize,
    },
    /// The table slot for this descriptor is already occupied.
    #[error("descriptor {0} is already registered")]
    DescriptorInUse(RawFd),
    /// The handle does not refer to a source registered with this dispatcher.
    #[error("no source registered for descriptor {0}")]
    UnknownHandle(RawFd),
    /// The counter source was registered without an enqueue callback.
    #[error("source `{0}` does not accept payloads")]
    EnqueueUnsupported(String),
    /// The source's enqueue callback rejected the payload.
    #[error("enqueue failed: {0}")]
    Enqueue(#[source] anyhow::Error),
    /// A system call failed.
    #[error("{operation} failed: {source}")]
    Os {
        /// System call or descriptor operation that failed.
        operation: &'static str,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The dispatcher has been shut down.
    #[error("dispatcher has been shut down")]
    ShutDown,
}

impl DispatchError {
    pub(crate) const fn os(operation: &'static str, source: Errno) -> Self {
        Self::Os { operation, source }
    }
}

/// Unrecoverable failures inside the dispatch loop.
///
/// No caller is waiting on the loop, so these are never returned. The worker logs
/// the fault and aborts the process.
#[derive(Debug, Error)]
pub enum DispatchFault {
    /// Waiting on the readiness multiplexer failed.
    #[error("readiness wait failed: {0}")]
    Wait(#[source] Errno),
    /// The multiplexer reported more events than the single slot it was given.
    #[error("multiplexer reported {0} events for a single slot")]
    UnexpectedEventCount(usize),
    /// A ready descriptor has no entry in the event table.
    #[error("descriptor {0} is ready but not registered")]
    UnknownDescriptor(u64),
    /// Removing a one-shot source from the multiplexer failed.
    #[error("disarming `{name}` failed: {source}")]
    Disarm {
        /// Source label.
        name: String,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Reading the notification value failed.
    #[error("draining `{name}` failed: {source}")]
    Drain {
        /// Source label.
        name: String,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Re-adding a one-shot source to the multiplexer failed.
    #[error("re-arming `{name}` failed: {source}")]
    Rearm {
        /// Source label.
        name: String,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
}

/// Application-facing result using anyhow for callback contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
