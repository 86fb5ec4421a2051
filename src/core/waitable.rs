//! Kernel descriptors backing event sources.

use std::fmt;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::eventfd::{EfdFlags, EventFd};
use nix::sys::time::TimeSpec;
use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};

use crate::core::table::SourceKind;

/// Value written to a counter descriptor by `post`.
pub const WAKE_VALUE: u64 = 1;

/// A non-blocking, close-on-exec descriptor that the multiplexer can watch.
pub enum Waitable {
    /// Kernel timer; ready once the armed expiration elapses.
    Timer(TimerFd),
    /// Kernel event counter; ready while its count is non-zero.
    Counter(EventFd),
}

impl Waitable {
    /// Allocate a fresh descriptor of the given kind.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the descriptor cannot be created.
    pub fn open(kind: SourceKind) -> Result<Self, Errno> {
        match kind {
            SourceKind::Timer => TimerFd::new(
                ClockId::CLOCK_MONOTONIC,
                TimerFlags::TFD_NONBLOCK | TimerFlags::TFD_CLOEXEC,
            )
            .map(Self::Timer),
            SourceKind::Counter => {
                EventFd::from_value_and_flags(0, EfdFlags::EFD_NONBLOCK | EfdFlags::EFD_CLOEXEC)
                    .map(Self::Counter)
            }
        }
    }

    /// Kind of source this descriptor serves.
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        match self {
            Self::Timer(_) => SourceKind::Timer,
            Self::Counter(_) => SourceKind::Counter,
        }
    }

    /// Numeric descriptor value; doubles as the event table index.
    #[must_use]
    pub fn descriptor(&self) -> RawFd {
        self.as_fd().as_raw_fd()
    }

    /// Consume the pending notification.
    ///
    /// Returns the accumulated count for counters and `1` for timers (the
    /// expiration count is not reported by the timer API).
    ///
    /// # Errors
    ///
    /// `EAGAIN` when nothing is pending, otherwise the OS read error.
    pub fn drain(&self) -> Result<u64, Errno> {
        match self {
            Self::Timer(timer) => timer.wait().map(|()| 1),
            Self::Counter(counter) => counter.read(),
        }
    }

    /// Add `WAKE_VALUE` to a counter.
    ///
    /// # Errors
    ///
    /// `EINVAL` for timers, otherwise the OS write error.
    pub fn signal(&self) -> Result<(), Errno> {
        match self {
            Self::Counter(counter) => counter.write(WAKE_VALUE).map(|_| ()),
            Self::Timer(_) => Err(Errno::EINVAL),
        }
    }

    /// Arm a timer to expire once, `delay` from now, replacing any pending expiration.
    ///
    /// A zero delay would disarm the timer, so it is raised to one nanosecond.
    ///
    /// # Errors
    ///
    /// `EINVAL` for counters, otherwise the OS error from `timerfd_settime`.
    pub fn arm(&self, delay: Duration) -> Result<(), Errno> {
        match self {
            Self::Timer(timer) => {
                let delay = delay.max(Duration::from_nanos(1));
                timer.set(
                    Expiration::OneShot(TimeSpec::from_duration(delay)),
                    TimerSetTimeFlags::empty(),
                )
            }
            Self::Counter(_) => Err(Errno::EINVAL),
        }
    }
}

impl fmt::Debug for Waitable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waitable")
            .field("kind", &self.kind())
            .field("descriptor", &self.descriptor())
            .finish()
    }
}

impl AsFd for Waitable {
    fn as_fd(&self) -> BorrowedFd<'_> {
        match self {
            Self::Timer(timer) => timer.as_fd(),
            Self::Counter(counter) => counter.as_fd(),
        }
    }
}
