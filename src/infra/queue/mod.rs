//! Payload queues usable as counter-source handlers.

pub mod memory;

pub use memory::{PayloadQueue, QueueError};
