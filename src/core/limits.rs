//! Process resource limits that size the event table.

use nix::sys::resource::{getrlimit, setrlimit, Resource, RLIM_INFINITY};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Descriptor count assumed when the limit cannot be read.
pub const FALLBACK_DESCRIPTORS: u64 = 1024;

/// Upper bound on event table slots, regardless of the hard limit.
pub const MAX_TABLE_SLOTS: usize = 1 << 20;

/// Descriptor limits discovered once at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Soft descriptor limit.
    pub current_max_descriptors: u64,
    /// Hard descriptor limit.
    pub hard_max_descriptors: u64,
}

impl ResourceLimits {
    /// Number of event table slots for these limits, optionally capped further.
    #[must_use]
    pub fn table_slots(&self, cap: Option<usize>) -> usize {
        let hard = usize::try_from(self.hard_max_descriptors).unwrap_or(usize::MAX);
        let slots = hard.min(MAX_TABLE_SLOTS);
        cap.map_or(slots, |cap| slots.min(cap))
    }
}

/// Raise the core-dump limit (best effort) and read the descriptor limits.
///
/// The core-dump limit is set to unlimited, falling back to its hard maximum.
/// Neither that nor a failed descriptor-limit read is fatal; both are logged.
pub fn discover_limits() -> ResourceLimits {
    raise_core_limit();

    match getrlimit(Resource::RLIMIT_NOFILE) {
        Ok((current, hard)) => {
            debug!(current, hard, "descriptor limits discovered");
            ResourceLimits {
                current_max_descriptors: current,
                hard_max_descriptors: hard,
            }
        }
        Err(e) => {
            warn!(error = %e, fallback = FALLBACK_DESCRIPTORS, "unable to read descriptor limit");
            ResourceLimits {
                current_max_descriptors: FALLBACK_DESCRIPTORS,
                hard_max_descriptors: FALLBACK_DESCRIPTORS,
            }
        }
    }
}

fn raise_core_limit() {
    let Ok((_, hard)) = getrlimit(Resource::RLIMIT_CORE) else {
        warn!("unable to read core dump limit");
        return;
    };
    if setrlimit(Resource::RLIMIT_CORE, RLIM_INFINITY, RLIM_INFINITY).is_ok() {
        return;
    }
    if let Err(e) = setrlimit(Resource::RLIMIT_CORE, hard, hard) {
        warn!(error = %e, hard, "unable to raise core dump limit");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovered_limits_are_consistent() {
        let limits = discover_limits();
        assert!(limits.current_max_descriptors > 0);
        assert!(limits.current_max_descriptors <= limits.hard_max_descriptors);
    }

    #[test]
    fn test_table_slots_are_capped() {
        let limits = ResourceLimits {
            current_max_descriptors: 1024,
            hard_max_descriptors: u64::MAX,
        };
        assert_eq!(limits.table_slots(None), MAX_TABLE_SLOTS);
        assert_eq!(limits.table_slots(Some(64)), 64);

        let small = ResourceLimits {
            current_max_descriptors: 256,
            hard_max_descriptors: 512,
        };
        assert_eq!(small.table_slots(None), 512);
        assert_eq!(small.table_slots(Some(4096)), 512);
    }
}
