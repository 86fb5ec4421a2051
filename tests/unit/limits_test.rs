//! Tests for resource limit discovery

use prometheus_dispatch::core::limits::MAX_TABLE_SLOTS;
use prometheus_dispatch::core::{discover_limits, ResourceLimits};

#[test]
fn test_table_slots_follow_hard_limit() {
    let limits = ResourceLimits {
        current_max_descriptors: 1024,
        hard_max_descriptors: 4096,
    };
    assert_eq!(limits.table_slots(None), 4096);
    assert_eq!(limits.table_slots(Some(100)), 100);
    assert_eq!(limits.table_slots(Some(10_000)), 4096);
}

#[test]
fn test_unlimited_hard_limit_is_capped() {
    let limits = ResourceLimits {
        current_max_descriptors: 1024,
        hard_max_descriptors: u64::MAX,
    };
    assert_eq!(limits.table_slots(None), MAX_TABLE_SLOTS);
}

#[test]
fn test_discovery_reports_usable_limits() {
    let limits = discover_limits();
    assert!(limits.table_slots(None) > 0);
    assert!(limits.table_slots(None) <= MAX_TABLE_SLOTS);
}
