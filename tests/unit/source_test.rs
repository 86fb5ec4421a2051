//! Tests for source descriptions: kinds, names and handler defaults

use prometheus_dispatch::core::{DispatchError, EventHandler, SourceKind, SourceName, MAX_NAME_LEN};

#[test]
fn test_source_kind_parsing() {
    assert_eq!("timer".parse::<SourceKind>().unwrap(), SourceKind::Timer);
    assert_eq!("Counter".parse::<SourceKind>().unwrap(), SourceKind::Counter);
    assert_eq!("sem".parse::<SourceKind>().unwrap(), SourceKind::Counter);
    assert_eq!("semaphore".parse::<SourceKind>().unwrap(), SourceKind::Counter);
    assert!(matches!(
        "socket".parse::<SourceKind>(),
        Err(DispatchError::InvalidArgument(_))
    ));
}

#[test]
fn test_source_kind_serde() {
    assert_eq!(serde_json::to_string(&SourceKind::Timer).unwrap(), "\"timer\"");
    let kind: SourceKind = serde_json::from_str("\"counter\"").unwrap();
    assert_eq!(kind, SourceKind::Counter);
}

#[test]
fn test_source_name_bound() {
    assert!(SourceName::new("").is_ok());
    assert_eq!(SourceName::new("flush").unwrap().as_str(), "flush");
    assert!(SourceName::new(&"n".repeat(MAX_NAME_LEN)).is_ok());
    assert!(matches!(
        SourceName::new(&"n".repeat(MAX_NAME_LEN + 1)),
        Err(DispatchError::NameTooLong { .. })
    ));
}

#[test]
fn test_closure_handler_rejects_payloads() {
    let handler = || {};
    assert!(!handler.accepts_payloads());
    assert!(handler.enqueue(vec![1]).is_err());
}
