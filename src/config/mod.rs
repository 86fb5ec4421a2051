//! Configuration models for the dispatcher and its admission gates.

pub mod dispatcher;

pub use dispatcher::{CapacityWait, DispatcherConfig};
