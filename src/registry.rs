//! Event records and the fd-keyed registry.
//!
//! The registry is the single owner of every [`EventRecord`]. Records sit
//! in a generational [`Arena`](crate::arena::Arena) so the kernel-facing
//! tag is the record's own slot token; an fd index on the side enforces
//! the one-record-per-fd invariant and serves fd-keyed operations.

use crate::arena::Arena;
use crate::error::{Error, Result};
use crate::mask::EventMask;
use crate::token::SlotToken;
use std::collections::HashMap;
use std::fmt;
use std::os::unix::io::RawFd;
use std::rc::Rc;

use crate::reactor::Reactor;

/// Callback invoked when a registered descriptor fires.
///
/// The reactor passes itself as the first argument so a callback can
/// re-arm, re-register, or cancel watches from inside a dispatch pass.
/// `Rc<dyn Fn>` keeps a running callback alive across an in-place
/// replacement of its own registration, and re-entrant reactor calls
/// need no interior mutability at the callback itself.
pub type Callback = Rc<dyn Fn(&Reactor, RawFd, EventMask)>;

/// A registered interest for one file descriptor.
///
/// The fd is the record's immutable identity; mask and callback are
/// replaced in place when the same fd is registered again.
pub(crate) struct EventRecord {
    pub(crate) fd: RawFd,
    pub(crate) mask: EventMask,
    pub(crate) callback: Callback,
}

impl fmt::Debug for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRecord")
            .field("fd", &self.fd)
            .field("mask", &format_args!("{}", self.mask))
            .finish_non_exhaustive()
    }
}

/// Mapping from file descriptor to event record, one record per fd.
#[derive(Debug)]
pub(crate) struct Registry {
    records: Arena<EventRecord>,
    by_fd: HashMap<RawFd, SlotToken>,
}

impl Registry {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Arena::with_capacity(capacity),
            by_fd: HashMap::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Inserts a new record. Fails without mutation if the fd already has one.
    pub(crate) fn insert(&mut self, record: EventRecord) -> Result<SlotToken> {
        let fd = record.fd;
        if self.by_fd.contains_key(&fd) {
            return Err(Error::new(crate::error::ErrorKind::AlreadyRegistered)
                .with_errno(libc::EEXIST)
                .with_message(format!("fd {fd} already registered")));
        }
        let token = self.records.insert(record);
        self.by_fd.insert(fd, token);
        Ok(token)
    }

    /// Resolves an fd to its record's token.
    pub(crate) fn token_for_fd(&self, fd: RawFd) -> Option<SlotToken> {
        self.by_fd.get(&fd).copied()
    }

    pub(crate) fn get(&self, token: SlotToken) -> Option<&EventRecord> {
        self.records.get(token)
    }

    pub(crate) fn get_mut(&mut self, token: SlotToken) -> Option<&mut EventRecord> {
        self.records.get_mut(token)
    }

    /// Removes a record, returning ownership to the caller. The fd index
    /// entry is dropped only when it still points at this token.
    pub(crate) fn remove(&mut self, token: SlotToken) -> Option<EventRecord> {
        let record = self.records.remove(token)?;
        if self.by_fd.get(&record.fd) == Some(&token) {
            self.by_fd.remove(&record.fd);
        }
        Some(record)
    }

    /// Snapshot of every registered fd. The sole consumer is teardown,
    /// which runs before further mutation is possible.
    pub(crate) fn fds(&self) -> Vec<RawFd> {
        self.by_fd.keys().copied().collect()
    }

    /// Trace-level diagnostic dump of the current contents.
    pub(crate) fn dump(&self) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }
        log::trace!("registry: {} record(s)", self.len());
        for (token, record) in self.records.iter() {
            log::trace!("  [{token}] fd {} mask {}", record.fd, record.mask);
        }
    }
}
