//! Deterministic lab port.
//!
//! An in-memory [`NotificationPort`] for testing the reactor without any
//! OS facility. Tests inject native readiness per fd; a wait delivers the
//! queued injections that pass the same filters the kernel would apply
//! (registered interest, one-shot auto-disarm) and never blocks; an
//! empty queue is an idle tick. Register/modify/unregister/wait failures
//! can be injected to exercise the reactor's rollback and error paths.

use super::{EventBatch, NotificationPort, PortEvent};
use crate::translate::NativeMask;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

#[derive(Debug)]
struct LabRegistration {
    native: NativeMask,
    tag: u64,
    /// Cleared by a one-shot delivery, restored by `modify`.
    armed: bool,
}

#[derive(Debug, Default)]
struct LabState {
    registrations: HashMap<RawFd, LabRegistration>,
    pending: VecDeque<(RawFd, NativeMask)>,
    register_errno: Option<i32>,
    wait_errno: Option<i32>,
    register_calls: usize,
    modify_calls: usize,
    unregister_calls: usize,
}

/// Deterministic in-memory notification port.
#[derive(Debug, Default)]
pub struct LabPort {
    state: RefCell<LabState>,
}

impl LabPort {
    /// Creates an empty lab port.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a readiness report for `fd`, delivered by the next wait if
    /// the fd is registered and armed at that point.
    pub fn inject_ready(&self, fd: RawFd, ready: NativeMask) {
        self.state.borrow_mut().pending.push_back((fd, ready));
    }

    /// Makes the next `register` call fail with `errno`.
    pub fn inject_register_error(&self, errno: i32) {
        self.state.borrow_mut().register_errno = Some(errno);
    }

    /// Makes the next `wait` call fail with `errno`.
    pub fn inject_wait_error(&self, errno: i32) {
        self.state.borrow_mut().wait_errno = Some(errno);
    }

    /// Number of fds currently registered.
    #[must_use]
    pub fn registered(&self) -> usize {
        self.state.borrow().registrations.len()
    }

    /// True if `fd` is currently registered.
    #[must_use]
    pub fn is_registered(&self, fd: RawFd) -> bool {
        self.state.borrow().registrations.contains_key(&fd)
    }

    /// The native mask currently registered for `fd`.
    #[must_use]
    pub fn native_for(&self, fd: RawFd) -> Option<NativeMask> {
        self.state.borrow().registrations.get(&fd).map(|r| r.native)
    }

    /// Total `register` calls observed.
    #[must_use]
    pub fn register_calls(&self) -> usize {
        self.state.borrow().register_calls
    }

    /// Total `modify` calls observed.
    #[must_use]
    pub fn modify_calls(&self) -> usize {
        self.state.borrow().modify_calls
    }

    /// Total `unregister` calls observed.
    #[must_use]
    pub fn unregister_calls(&self) -> usize {
        self.state.borrow().unregister_calls
    }
}

impl NotificationPort for LabPort {
    fn register(&self, fd: RawFd, native: NativeMask, tag: u64) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.register_calls += 1;
        if let Some(errno) = state.register_errno.take() {
            return Err(io::Error::from_raw_os_error(errno));
        }
        if state.registrations.contains_key(&fd) {
            return Err(io::Error::from_raw_os_error(libc::EEXIST));
        }
        state.registrations.insert(
            fd,
            LabRegistration {
                native,
                tag,
                armed: true,
            },
        );
        Ok(())
    }

    fn modify(&self, fd: RawFd, native: NativeMask, tag: u64) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.modify_calls += 1;
        match state.registrations.get_mut(&fd) {
            Some(registration) => {
                registration.native = native;
                registration.tag = tag;
                registration.armed = true;
                Ok(())
            }
            None => Err(io::Error::from_raw_os_error(libc::ENOENT)),
        }
    }

    fn unregister(&self, fd: RawFd) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.unregister_calls += 1;
        if state.registrations.remove(&fd).is_none() {
            return Err(io::Error::from_raw_os_error(libc::ENOENT));
        }
        Ok(())
    }

    fn wait(&self, batch: &mut EventBatch, _timeout: Option<Duration>) -> io::Result<usize> {
        batch.clear();
        let mut state = self.state.borrow_mut();
        if let Some(errno) = state.wait_errno.take() {
            return Err(io::Error::from_raw_os_error(errno));
        }

        // Deliver queued injections in order, applying the kernel-side
        // filters: only registered fds, only subscribed flags (error and
        // hangup always pass), one-shot registrations disarm on delivery.
        let mut kept = VecDeque::new();
        while let Some((fd, ready)) = state.pending.pop_front() {
            if batch.len() >= batch.capacity() {
                kept.push_back((fd, ready));
                continue;
            }
            let Some(registration) = state.registrations.get_mut(&fd) else {
                continue;
            };
            if !registration.armed {
                continue;
            }
            let always = NativeMask::from_bits(NativeMask::ERR.bits() | NativeMask::HUP.bits());
            let visible = NativeMask::from_bits(
                ready.bits() & (registration.native.bits() | always.bits()),
            );
            if visible.is_empty() {
                continue;
            }
            if registration.native.intersects(NativeMask::ONESHOT) {
                registration.armed = false;
            }
            batch.push(PortEvent {
                tag: registration.tag,
                ready: visible,
            });
        }
        state.pending = kept;
        Ok(batch.len())
    }
}
