//! Event sources, the dispatch engine and the admission pool behind it.

pub mod admission;
pub mod dispatcher;
mod engine;
pub mod error;
pub mod handler;
pub mod limits;
pub mod multiplexer;
pub mod stats;
pub mod table;
pub mod waitable;

pub use admission::{AdmissionGates, AdmissionPool, CapacitySnapshot};
pub use dispatcher::Dispatcher;
pub use error::{AppResult, DispatchError, DispatchFault};
pub use handler::EventHandler;
pub use limits::{discover_limits, ResourceLimits};
pub use stats::DispatchStats;
pub use table::{Handle, RearmPolicy, SourceKind, SourceName, MAX_NAME_LEN};
