//! Notification port: the boundary to the kernel readiness facility.
//!
//! A [`NotificationPort`] registers, modifies, and unregisters one fd at
//! a time and block-waits for a batch of ready descriptors. Each ready
//! entry carries the opaque `u64` tag supplied at registration, which the
//! dispatch loop unpacks into a [`SlotToken`](crate::SlotToken) to reach
//! the record in O(1).
//!
//! Two implementations ship with the crate: [`EpollPort`] over the Linux
//! epoll facility, and [`LabPort`], a deterministic in-memory port for
//! tests.

#[cfg(target_os = "linux")]
mod epoll;
mod lab;

#[cfg(target_os = "linux")]
pub use epoll::EpollPort;
pub use lab::LabPort;

use crate::translate::NativeMask;
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

/// One ready descriptor reported by a wait call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortEvent {
    /// The opaque tag supplied at registration.
    pub tag: u64,
    /// The native readiness flags that fired.
    pub ready: NativeMask,
}

/// Fixed-capacity buffer receiving one batch of ready events.
#[derive(Debug)]
pub struct EventBatch {
    events: Vec<PortEvent>,
    capacity: usize,
}

impl EventBatch {
    /// Creates a batch buffer holding up to `capacity` events per wait.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum events a single wait may deliver.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if the last wait produced nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drops all stored events. Ports call this at the top of every wait.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Iterates over the stored events.
    pub fn iter(&self) -> std::slice::Iter<'_, PortEvent> {
        self.events.iter()
    }

    pub(crate) fn push(&mut self, event: PortEvent) {
        if self.events.len() < self.capacity {
            self.events.push(event);
        }
    }
}

impl<'a> IntoIterator for &'a EventBatch {
    type Item = &'a PortEvent;
    type IntoIter = std::slice::Iter<'a, PortEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Thin adapter over a kernel readiness-notification facility.
///
/// Methods take `&self`; implementations use interior mutability where
/// they need state. The reactor is single-threaded, so no `Send`/`Sync`
/// bound is asked of implementations.
///
/// # Errors
///
/// `register`/`modify`/`unregister` surface kernel rejections as
/// `io::Error` (fd closed, already present at kernel level, resource
/// limits). A signal interrupting [`wait`](Self::wait) is *not* an
/// error: implementations report it as an empty batch so the dispatch
/// loop never treats `EINTR` as fatal.
pub trait NotificationPort {
    /// Registers interest in `fd` with the translated native flags,
    /// carrying `tag` back on every firing.
    fn register(&self, fd: RawFd, native: NativeMask, tag: u64) -> io::Result<()>;

    /// Replaces the native flags (and tag) of an existing registration.
    fn modify(&self, fd: RawFd, native: NativeMask, tag: u64) -> io::Result<()>;

    /// Removes `fd` from the facility. During teardown callers treat
    /// "fd already gone from the kernel" as a soft condition.
    fn unregister(&self, fd: RawFd) -> io::Result<()>;

    /// Blocks until at least one fd is ready, the timeout elapses, or a
    /// signal interrupts the wait; the latter two produce `Ok(0)` with
    /// an empty batch. `None` blocks indefinitely.
    fn wait(&self, batch: &mut EventBatch, timeout: Option<Duration>) -> io::Result<usize>;
}

/// A shared port is still a port. Tests hand the reactor an
/// `Rc<LabPort>` and keep the other handle for injection and assertions.
impl<P: NotificationPort + ?Sized> NotificationPort for std::rc::Rc<P> {
    fn register(&self, fd: RawFd, native: NativeMask, tag: u64) -> io::Result<()> {
        (**self).register(fd, native, tag)
    }

    fn modify(&self, fd: RawFd, native: NativeMask, tag: u64) -> io::Result<()> {
        (**self).modify(fd, native, tag)
    }

    fn unregister(&self, fd: RawFd) -> io::Result<()> {
        (**self).unregister(fd)
    }

    fn wait(&self, batch: &mut EventBatch, timeout: Option<Duration>) -> io::Result<usize> {
        (**self).wait(batch, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_respects_capacity() {
        let mut batch = EventBatch::with_capacity(2);
        for tag in 0..4 {
            batch.push(PortEvent {
                tag,
                ready: NativeMask::IN,
            });
        }
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.capacity(), 2);

        batch.clear();
        assert!(batch.is_empty());
    }

    #[test]
    fn batch_iterates_in_arrival_order() {
        let mut batch = EventBatch::with_capacity(4);
        batch.push(PortEvent {
            tag: 1,
            ready: NativeMask::IN,
        });
        batch.push(PortEvent {
            tag: 2,
            ready: NativeMask::OUT,
        });

        let tags: Vec<u64> = batch.iter().map(|e| e.tag).collect();
        assert_eq!(tags, vec![1, 2]);
    }
}
