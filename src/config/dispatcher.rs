//! Dispatcher configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a dispatch thread waits when no execution capacity is left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityWait {
    /// Block on the pool's capacity-freed condition, at most one retry interval per attempt.
    Condvar,
    /// Sleep a full retry interval between attempts.
    Sleep,
}

impl FromStr for CapacityWait {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "condvar" => Ok(Self::Condvar),
            "sleep" => Ok(Self::Sleep),
            other => Err(format!("unknown capacity wait mode `{other}`")),
        }
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Prefix for worker thread names.
    pub thread_name: String,
    /// Number of dispatch threads.
    pub thread_count: usize,
    /// Stack size for each dispatch thread, in bytes.
    pub thread_stack_size: usize,
    /// Execution tickets available before any source is registered.
    pub initial_capacity: usize,
    /// Optional cap on event table slots below the hard descriptor limit.
    pub max_table_slots: Option<usize>,
    /// Upper bound on a single multiplexer wait, in milliseconds.
    pub poll_timeout_ms: u64,
    /// Spacing between execution-capacity retries, in milliseconds.
    pub capacity_retry_ms: u64,
    /// How to wait between capacity retries.
    pub capacity_wait: CapacityWait,
    /// Admission waits longer than this are logged, in milliseconds.
    pub stall_warn_ms: u64,
    /// Allow only one thread at a time to wait on the multiplexer.
    pub serialize_pollers: bool,
    /// Refuse execution once the capacity ceiling is reached.
    pub enforce_capacity: bool,
    /// How long shutdown waits for each thread to exit, in milliseconds.
    pub shutdown_join_timeout_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            thread_name: "worker".into(),
            thread_count: num_cpus::get(),
            thread_stack_size: 2 * 1024 * 1024,
            initial_capacity: 128,
            max_table_slots: None,
            poll_timeout_ms: 30_000,
            capacity_retry_ms: 1_000,
            capacity_wait: CapacityWait::Condvar,
            stall_warn_ms: 2_000,
            serialize_pollers: true,
            enforce_capacity: true,
            shutdown_join_timeout_ms: 2_000,
        }
    }
}

impl DispatcherConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set the number of dispatch threads.
    #[must_use]
    pub const fn with_thread_count(mut self, count: usize) -> Self {
        self.thread_count = count;
        self
    }

    /// Set the initial execution capacity.
    #[must_use]
    pub const fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Cap the event table size.
    #[must_use]
    pub const fn with_max_table_slots(mut self, slots: usize) -> Self {
        self.max_table_slots = Some(slots);
        self
    }

    /// Set the multiplexer wait bound.
    #[must_use]
    pub const fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout_ms = duration_ms(timeout);
        self
    }

    /// Set the capacity retry spacing.
    #[must_use]
    pub const fn with_capacity_retry(mut self, interval: Duration) -> Self {
        self.capacity_retry_ms = duration_ms(interval);
        self
    }

    /// Choose how to wait between capacity retries.
    #[must_use]
    pub const fn with_capacity_wait(mut self, wait: CapacityWait) -> Self {
        self.capacity_wait = wait;
        self
    }

    /// Enable or disable the single-poller turn gate.
    #[must_use]
    pub const fn with_serialized_pollers(mut self, enabled: bool) -> Self {
        self.serialize_pollers = enabled;
        self
    }

    /// Enable or disable the execution capacity ceiling.
    #[must_use]
    pub const fn with_capacity_enforced(mut self, enabled: bool) -> Self {
        self.enforce_capacity = enabled;
        self
    }

    /// Set the per-thread join timeout used by shutdown.
    #[must_use]
    pub const fn with_shutdown_join_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_join_timeout_ms = duration_ms(timeout);
        self
    }

    /// Multiplexer wait bound.
    #[must_use]
    pub const fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Capacity retry spacing.
    #[must_use]
    pub const fn capacity_retry(&self) -> Duration {
        Duration::from_millis(self.capacity_retry_ms)
    }

    /// Admission staleness threshold.
    #[must_use]
    pub const fn stall_warn(&self) -> Duration {
        Duration::from_millis(self.stall_warn_ms)
    }

    /// Per-thread join timeout.
    #[must_use]
    pub const fn shutdown_join_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_join_timeout_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.thread_name.is_empty() {
            return Err("thread_name must not be empty".into());
        }
        if self.thread_count == 0 {
            return Err("thread_count must be greater than 0".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        if self.poll_timeout_ms == 0 || self.poll_timeout_ms > u64::from(u16::MAX) {
            return Err(format!(
                "poll_timeout_ms must be between 1 and {}",
                u16::MAX
            ));
        }
        if self.capacity_retry_ms == 0 {
            return Err("capacity_retry_ms must be greater than 0".into());
        }
        if self.max_table_slots == Some(0) {
            return Err("max_table_slots must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate. Missing fields take
    /// their defaults.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `DISPATCH_*` environment variables, loading a
    /// `.env` file first if one exists. Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns a message naming the variable that failed to parse, or a
    /// validation message.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();

        if let Ok(name) = env::var("DISPATCH_THREAD_NAME") {
            cfg.thread_name = name;
        }
        read_var("DISPATCH_THREAD_COUNT", &mut cfg.thread_count)?;
        read_var("DISPATCH_THREAD_STACK_SIZE", &mut cfg.thread_stack_size)?;
        read_var("DISPATCH_INITIAL_CAPACITY", &mut cfg.initial_capacity)?;
        read_var("DISPATCH_POLL_TIMEOUT_MS", &mut cfg.poll_timeout_ms)?;
        read_var("DISPATCH_CAPACITY_RETRY_MS", &mut cfg.capacity_retry_ms)?;
        read_var("DISPATCH_CAPACITY_WAIT", &mut cfg.capacity_wait)?;
        read_var("DISPATCH_STALL_WARN_MS", &mut cfg.stall_warn_ms)?;
        read_var("DISPATCH_SERIALIZE_POLLERS", &mut cfg.serialize_pollers)?;
        read_var("DISPATCH_ENFORCE_CAPACITY", &mut cfg.enforce_capacity)?;
        read_var("DISPATCH_SHUTDOWN_JOIN_TIMEOUT_MS", &mut cfg.shutdown_join_timeout_ms)?;
        if let Ok(raw) = env::var("DISPATCH_MAX_TABLE_SLOTS") {
            let slots = raw
                .parse()
                .map_err(|e| format!("DISPATCH_MAX_TABLE_SLOTS: {e}"))?;
            cfg.max_table_slots = Some(slots);
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn read_var<T>(key: &str, target: &mut T) -> Result<(), String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = env::var(key) {
        *target = raw.trim().parse().map_err(|e| format!("{key}: {e}"))?;
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation)]
const fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
