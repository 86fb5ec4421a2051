//! Tests for configuration validation and loading

use std::time::Duration;

use prometheus_dispatch::config::{CapacityWait, DispatcherConfig};

#[test]
fn test_default_config_validates() {
    let cfg = DispatcherConfig::default();
    assert!(cfg.validate().is_ok());
    assert!(cfg.thread_count > 0);
    assert_eq!(cfg.capacity_wait, CapacityWait::Condvar);
    assert_eq!(cfg.max_table_slots, None);
}

#[test]
fn test_empty_thread_name_rejected() {
    let cfg = DispatcherConfig::new().with_thread_name("");
    assert!(cfg.validate().is_err());
}

#[test]
fn test_zero_threads_rejected() {
    assert!(DispatcherConfig::new().with_thread_count(0).validate().is_err());
}

#[test]
fn test_poll_timeout_bounds() {
    assert!(DispatcherConfig::new()
        .with_poll_timeout(Duration::ZERO)
        .validate()
        .is_err());
    assert!(DispatcherConfig::new()
        .with_poll_timeout(Duration::from_millis(70_000))
        .validate()
        .is_err());
    assert!(DispatcherConfig::new()
        .with_poll_timeout(Duration::from_millis(65_535))
        .validate()
        .is_ok());
}

#[test]
fn test_zero_retry_interval_rejected() {
    assert!(DispatcherConfig::new()
        .with_capacity_retry(Duration::ZERO)
        .validate()
        .is_err());
}

#[test]
fn test_small_stack_rejected() {
    let cfg = DispatcherConfig {
        thread_stack_size: 4096,
        ..DispatcherConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_zero_table_slots_rejected() {
    assert!(DispatcherConfig::new()
        .with_max_table_slots(0)
        .validate()
        .is_err());
}

#[test]
fn test_json_config_fills_defaults() {
    let cfg = DispatcherConfig::from_json_str(
        r#"{"thread_count": 3, "capacity_wait": "sleep", "max_table_slots": 512}"#,
    )
    .unwrap();
    assert_eq!(cfg.thread_count, 3);
    assert_eq!(cfg.capacity_wait, CapacityWait::Sleep);
    assert_eq!(cfg.max_table_slots, Some(512));
    assert_eq!(cfg.initial_capacity, DispatcherConfig::default().initial_capacity);
}

#[test]
fn test_json_config_rejects_invalid_values() {
    assert!(DispatcherConfig::from_json_str(r#"{"thread_count": 0}"#).is_err());
    assert!(DispatcherConfig::from_json_str(r#"{"capacity_wait": "spin"}"#).is_err());
    assert!(DispatcherConfig::from_json_str("not json").is_err());
}

#[test]
fn test_json_round_trip_preserves_overrides() {
    let cfg = DispatcherConfig::new()
        .with_thread_name("io")
        .with_serialized_pollers(false)
        .with_capacity_enforced(false);
    let json = serde_json::to_string(&cfg).unwrap();
    assert_eq!(DispatcherConfig::from_json_str(&json).unwrap(), cfg);
}

#[test]
fn test_env_config_without_overrides_validates() {
    let cfg = DispatcherConfig::from_env().unwrap();
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_capacity_wait_parsing() {
    assert_eq!("condvar".parse::<CapacityWait>().unwrap(), CapacityWait::Condvar);
    assert_eq!("SLEEP".parse::<CapacityWait>().unwrap(), CapacityWait::Sleep);
    assert!("busy".parse::<CapacityWait>().is_err());
}
