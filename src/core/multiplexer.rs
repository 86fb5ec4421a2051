//! Shared epoll instance that all dispatch threads wait on.

use std::os::fd::{AsFd, RawFd};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags};

use crate::core::error::DispatchFault;

/// Outcome of one bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// A registered descriptor became ready.
    Ready(u64),
    /// The timeout elapsed (or the wait was interrupted) with nothing ready.
    Idle,
}

/// Readiness multiplexer. Every registration is read-readiness, edge-triggered,
/// with the descriptor value as the event payload.
#[derive(Debug)]
pub struct Multiplexer {
    epoll: Epoll,
}

impl Multiplexer {
    /// Create the kernel object.
    ///
    /// # Errors
    ///
    /// Returns the OS error from `epoll_create1`.
    pub fn new() -> Result<Self, Errno> {
        let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC)?;
        Ok(Self { epoll })
    }

    /// Watch `fd` for read readiness.
    ///
    /// # Errors
    ///
    /// Returns the OS error from `epoll_ctl(ADD)`.
    pub fn add<F: AsFd>(&self, fd: F, descriptor: RawFd) -> Result<(), Errno> {
        let data = u64::try_from(descriptor).map_err(|_| Errno::EBADF)?;
        let event = EpollEvent::new(EpollFlags::EPOLLIN | EpollFlags::EPOLLET, data);
        self.epoll.add(fd, event)
    }

    /// Stop watching `fd`.
    ///
    /// # Errors
    ///
    /// Returns the OS error from `epoll_ctl(DEL)`.
    pub fn remove<F: AsFd>(&self, fd: F) -> Result<(), Errno> {
        self.epoll.delete(fd)
    }

    /// Block for at most `timeout` waiting for a single ready descriptor.
    ///
    /// # Errors
    ///
    /// Any wait failure other than `EINTR` is a [`DispatchFault`].
    pub fn wait_one(&self, timeout: Duration) -> Result<Readiness, DispatchFault> {
        let mut events = [EpollEvent::empty()];
        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        match self.epoll.wait(&mut events, millis) {
            Ok(0) | Err(Errno::EINTR) => Ok(Readiness::Idle),
            Ok(1) => Ok(Readiness::Ready(events[0].data())),
            Ok(n) => Err(DispatchFault::UnexpectedEventCount(n)),
            Err(errno) => Err(DispatchFault::Wait(errno)),
        }
    }
}
