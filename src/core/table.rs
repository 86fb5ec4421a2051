//! Event sources and the descriptor-indexed table that owns them.

use std::fmt;
use std::os::fd::RawFd;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::core::error::DispatchError;
use crate::core::handler::EventHandler;
use crate::core::waitable::Waitable;

/// Maximum length of a source label, in bytes.
pub const MAX_NAME_LEN: usize = 128;

/// Kind of descriptor behind a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Timer descriptor armed through `settime`.
    Timer,
    /// Event counter signaled through `post`.
    Counter,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timer => f.write_str("timer"),
            Self::Counter => f.write_str("counter"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "timer" => Ok(Self::Timer),
            "counter" | "sem" | "semaphore" => Ok(Self::Counter),
            other => Err(DispatchError::InvalidArgument(format!(
                "unknown source kind `{other}`"
            ))),
        }
    }
}

/// Whether a source stays in the readiness set while its handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RearmPolicy {
    /// Registered once and never removed.
    Persistent,
    /// Removed before the handler runs and re-added once it returns, so at most
    /// one handler invocation per source is in flight.
    OneShot,
}

/// Bounded, owned label used in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceName(String);

impl SourceName {
    /// Validate and take ownership of a label.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::NameTooLong` if `name` exceeds [`MAX_NAME_LEN`] bytes.
    pub fn new(name: &str) -> Result<Self, DispatchError> {
        if name.len() > MAX_NAME_LEN {
            return Err(DispatchError::NameTooLong {
                len: name.len(),
                max: MAX_NAME_LEN,
            });
        }
        Ok(Self(name.to_owned()))
    }

    /// Borrow the label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque token identifying a registered source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    descriptor: RawFd,
    kind: SourceKind,
}

impl Handle {
    pub(crate) const fn new(descriptor: RawFd, kind: SourceKind) -> Self {
        Self { descriptor, kind }
    }

    /// Descriptor the source was registered under.
    #[must_use]
    pub const fn descriptor(&self) -> RawFd {
        self.descriptor
    }

    /// Kind requested at registration.
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        self.kind
    }

    /// Fail with `InvalidOperation` unless the handle is of `required` kind.
    pub(crate) fn expect_kind(
        &self,
        required: SourceKind,
        operation: &'static str,
    ) -> Result<(), DispatchError> {
        if self.kind != required {
            return Err(DispatchError::InvalidOperation {
                operation,
                kind: self.kind,
            });
        }
        Ok(())
    }
}

/// One registered waitable descriptor and its callbacks.
pub struct EventSource {
    pub(crate) name: SourceName,
    pub(crate) rearm: RearmPolicy,
    pub(crate) waitable: Waitable,
    pub(crate) handler: Arc<dyn EventHandler>,
}

impl EventSource {
    /// Source label.
    #[must_use]
    pub const fn name(&self) -> &SourceName {
        &self.name
    }

    /// Descriptor value.
    #[must_use]
    pub fn descriptor(&self) -> RawFd {
        self.waitable.descriptor()
    }

    /// Descriptor kind.
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        self.waitable.kind()
    }

    /// Re-arm policy chosen at registration.
    #[must_use]
    pub const fn rearm(&self) -> RearmPolicy {
        self.rearm
    }

    pub(crate) fn is_one_shot(&self) -> bool {
        self.rearm == RearmPolicy::OneShot
    }
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("name", &self.name)
            .field("rearm", &self.rearm)
            .field("waitable", &self.waitable)
            .finish_non_exhaustive()
    }
}

/// Fixed-capacity table indexed directly by descriptor value.
///
/// Each slot is written at most once and is read without locking afterwards.
pub struct EventTable {
    slots: Box<[OnceLock<Arc<EventSource>>]>,
}

impl EventTable {
    /// Allocate `capacity` empty slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| OnceLock::new()).collect();
        Self { slots }
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Check that `descriptor` maps to an empty slot, without claiming it.
    ///
    /// # Errors
    ///
    /// `TableExhausted` when the descriptor is out of range, `DescriptorInUse` when
    /// the slot is taken.
    pub fn check_vacant(&self, descriptor: RawFd) -> Result<(), DispatchError> {
        let slot = self.slot(descriptor)?;
        if slot.get().is_some() {
            return Err(DispatchError::DescriptorInUse(descriptor));
        }
        Ok(())
    }

    /// Publish a source in the slot for its descriptor.
    ///
    /// # Errors
    ///
    /// Same as [`Self::check_vacant`]. The table keeps no reference on error.
    pub fn publish(&self, source: Arc<EventSource>) -> Result<Arc<EventSource>, DispatchError> {
        let descriptor = source.descriptor();
        let slot = self.slot(descriptor)?;
        slot.set(Arc::clone(&source))
            .map_err(|_| DispatchError::DescriptorInUse(descriptor))?;
        Ok(source)
    }

    /// Look up the source registered for `descriptor`.
    #[must_use]
    pub fn get(&self, descriptor: RawFd) -> Option<&Arc<EventSource>> {
        usize::try_from(descriptor)
            .ok()
            .and_then(|index| self.slots.get(index))
            .and_then(OnceLock::get)
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }

    fn slot(&self, descriptor: RawFd) -> Result<&OnceLock<Arc<EventSource>>, DispatchError> {
        usize::try_from(descriptor)
            .ok()
            .and_then(|index| self.slots.get(index))
            .ok_or(DispatchError::TableExhausted {
                descriptor,
                capacity: self.slots.len(),
            })
    }
}

impl fmt::Debug for EventTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTable")
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl EventHandler for Noop {
        fn exec(&self) {}
    }

    fn counter_source(name: &str) -> Arc<EventSource> {
        Arc::new(EventSource {
            name: SourceName::new(name).unwrap(),
            rearm: RearmPolicy::Persistent,
            waitable: Waitable::open(SourceKind::Counter).unwrap(),
            handler: Arc::new(Noop),
        })
    }

    #[test]
    fn test_name_bound_is_enforced() {
        assert!(SourceName::new(&"a".repeat(MAX_NAME_LEN)).is_ok());
        let err = SourceName::new(&"a".repeat(MAX_NAME_LEN + 1)).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::NameTooLong { len, max } if len == MAX_NAME_LEN + 1 && max == MAX_NAME_LEN
        ));
    }

    #[test]
    fn test_source_kind_parsing() {
        assert_eq!("timer".parse::<SourceKind>().unwrap(), SourceKind::Timer);
        assert_eq!("SEM".parse::<SourceKind>().unwrap(), SourceKind::Counter);
        assert!(matches!(
            "socket".parse::<SourceKind>(),
            Err(DispatchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_handle_kind_check() {
        let handle = Handle::new(7, SourceKind::Timer);
        assert!(handle.expect_kind(SourceKind::Timer, "settime").is_ok());
        assert!(matches!(
            handle.expect_kind(SourceKind::Counter, "post"),
            Err(DispatchError::InvalidOperation { operation: "post", kind: SourceKind::Timer })
        ));
    }

    #[test]
    fn test_publish_and_lookup() {
        let table = EventTable::with_capacity(4096);
        let source = counter_source("flush");
        let fd = source.descriptor();
        table.check_vacant(fd).unwrap();
        table.publish(source).unwrap();
        assert_eq!(table.get(fd).map(|s| s.name().as_str()), Some("flush"));
        assert!(matches!(table.check_vacant(fd), Err(DispatchError::DescriptorInUse(d)) if d == fd));
        assert_eq!(table.occupied(), 1);
        assert!(table.get(-1).is_none());
    }

    #[test]
    fn test_out_of_range_descriptor_is_rejected() {
        let table = EventTable::with_capacity(0);
        let source = counter_source("overflow");
        assert!(matches!(
            table.publish(source),
            Err(DispatchError::TableExhausted { capacity: 0, .. })
        ));
    }
}
