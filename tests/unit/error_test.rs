//! Tests for error types

use nix::errno::Errno;
use prometheus_dispatch::core::{DispatchError, DispatchFault, SourceKind};

#[test]
fn test_invalid_operation_error() {
    let err = DispatchError::InvalidOperation {
        operation: "settime",
        kind: SourceKind::Counter,
    };
    assert_eq!(format!("{err}"), "settime is not valid for counter sources");
}

#[test]
fn test_name_too_long_error() {
    let err = DispatchError::NameTooLong { len: 200, max: 128 };
    assert_eq!(format!("{err}"), "source name is 200 bytes, maximum is 128");
}

#[test]
fn test_table_exhausted_error() {
    let err = DispatchError::TableExhausted {
        descriptor: 70,
        capacity: 64,
    };
    assert_eq!(
        format!("{err}"),
        "event table exhausted: descriptor 70 exceeds capacity 64"
    );
}

#[test]
fn test_enqueue_unsupported_error() {
    let err = DispatchError::EnqueueUnsupported("journal".to_string());
    assert_eq!(format!("{err}"), "source `journal` does not accept payloads");
}

#[test]
fn test_os_error_keeps_source() {
    let err = DispatchError::Os {
        operation: "eventfd",
        source: Errno::EMFILE,
    };
    assert!(format!("{err}").starts_with("eventfd failed: "));
    let source = std::error::Error::source(&err).unwrap();
    assert_eq!(source.downcast_ref::<Errno>(), Some(&Errno::EMFILE));
}

#[test]
fn test_shut_down_error() {
    assert_eq!(
        format!("{}", DispatchError::ShutDown),
        "dispatcher has been shut down"
    );
}

#[test]
fn test_fault_display() {
    let fault = DispatchFault::Rearm {
        name: "flush".to_string(),
        source: Errno::EBADF,
    };
    assert!(format!("{fault}").starts_with("re-arming `flush` failed: "));
    assert_eq!(
        format!("{}", DispatchFault::UnexpectedEventCount(2)),
        "multiplexer reported 2 events for a single slot"
    );
}
