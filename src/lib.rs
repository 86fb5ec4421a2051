//! # Prometheus Dispatch
//!
//! An in-process event dispatcher: a pool of worker threads multiplexing timer
//! and event-counter descriptors over one epoll instance, running registered
//! handlers under an admission-controlled concurrency budget.
//!
//! ## Model
//!
//! - **Sources** are kernel descriptors (`timerfd` or `eventfd`) registered with
//!   [`core::Dispatcher::create`]. Each carries a label, a handler and a re-arm
//!   policy. Sources live as long as the dispatcher.
//! - **Event table**: a descriptor-indexed table sized from the process
//!   descriptor limit; lookups are O(1) and lock-free once a slot is published.
//! - **Dispatch threads** take a polling turn, wait for one ready descriptor,
//!   drain it, take an execution ticket and run the handler. One-shot sources
//!   are out of the readiness set while their handler runs.
//! - **Admission**: every registered source raises the execution ceiling by
//!   one. When no ticket is free the thread retries at a fixed interval, with
//!   no limit on attempts.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_dispatch::config::DispatcherConfig;
//! use prometheus_dispatch::core::{Dispatcher, RearmPolicy, SourceKind};
//! use prometheus_dispatch::infra::PayloadQueue;
//!
//! prometheus_dispatch::util::init_tracing();
//! let dispatcher = Dispatcher::initialize(DispatcherConfig::from_env()?)?;
//!
//! // Counter source backed by a payload queue
//! let writes = dispatcher.create(
//!     "journal",
//!     Arc::new(PayloadQueue::new(1024, |record| append(record))),
//!     SourceKind::Counter,
//!     RearmPolicy::OneShot,
//! )?;
//! dispatcher.queue(&writes, b"entry".to_vec())?;
//! dispatcher.post(&writes)?;
//!
//! // Timer source firing once in 100ms
//! let tick = dispatcher.create("tick", Arc::new(|| expire()), SourceKind::Timer, RearmPolicy::Persistent)?;
//! dispatcher.settime(&tick, 100_000_000)?;
//! ```
//!
//! Linux only: built on `epoll`, `timerfd` and `eventfd` through `nix`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Event sources, dispatch engine and admission control.
pub mod core;
/// Dispatcher configuration.
pub mod config;
/// Handler adapters for payload-carrying sources.
pub mod infra;
/// Shared utilities.
pub mod util;
