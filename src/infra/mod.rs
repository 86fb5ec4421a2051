//! Infrastructure adapters that plug into event sources.

pub mod queue;

pub use queue::{PayloadQueue, QueueError};
