//! The reactor: registration surface and dispatch loop.
//!
//! A [`Reactor`] owns one [`NotificationPort`] and one registry, mirrors
//! every registration into both, and turns batches of ready descriptors
//! into ordered callback invocations. It is strictly single-threaded:
//! nothing here locks, dispatch owns its calling thread for as long as it
//! runs, and a slow callback stalls the whole loop by design.
//!
//! All operations take `&self`; the registry lives behind a `RefCell`
//! that is never borrowed across a callback invocation, so callbacks may
//! re-enter [`add_or_update`](Reactor::add_or_update),
//! [`remove`](Reactor::remove), and the rest of the surface freely from
//! inside a dispatch pass.

use crate::error::{Error, Result};
use crate::mask::EventMask;
use crate::port::{EventBatch, NotificationPort};
use crate::registry::{Callback, EventRecord, Registry};
use crate::token::SlotToken;
use crate::translate::{from_native, to_native};
use std::cell::{Cell, RefCell};
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::time::Duration;

/// Bound on a single port wait. Not a semantic timeout: it only caps how
/// long a cooperative exit request can go unnoticed while the loop is
/// idle.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Single-threaded readiness-event reactor.
///
/// ```no_run
/// use evmux::{EventMask, Reactor};
///
/// let reactor = Reactor::new(16)?;
/// reactor.add_or_update(0, EventMask::READ | EventMask::PERSIST, |r, fd, fired| {
///     println!("fd {fd} fired {fired}");
///     r.loop_exit();
/// })?;
/// reactor.dispatch()?;
/// # Ok::<(), evmux::Error>(())
/// ```
pub struct Reactor {
    port: Box<dyn NotificationPort>,
    registry: RefCell<Registry>,
    batch_capacity: usize,
    should_exit: Cell<bool>,
    port_errno: Cell<Option<i32>>,
}

impl Reactor {
    /// Creates a reactor over a fresh epoll instance.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `batch_capacity` is zero; a port error if the
    /// epoll instance cannot be created.
    #[cfg(target_os = "linux")]
    pub fn new(batch_capacity: usize) -> Result<Self> {
        let port = crate::port::EpollPort::new().map_err(Error::from)?;
        Self::with_port(Box::new(port), batch_capacity)
    }

    /// Creates a reactor over a caller-supplied port. This is how tests
    /// substitute the deterministic [`LabPort`](crate::port::LabPort).
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `batch_capacity` is zero.
    pub fn with_port(port: Box<dyn NotificationPort>, batch_capacity: usize) -> Result<Self> {
        if batch_capacity == 0 {
            return Err(Error::invalid_argument("batch capacity must be > 0"));
        }
        Ok(Self {
            port,
            registry: RefCell::new(Registry::with_capacity(batch_capacity)),
            batch_capacity,
            should_exit: Cell::new(false),
            port_errno: Cell::new(None),
        })
    }

    /// Number of currently registered descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.borrow().len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.borrow().is_empty()
    }

    /// Registers interest for `fd`, or updates the existing registration
    /// in place.
    ///
    /// The mask is intersected with the legal bit set and must retain
    /// READ and/or WRITE; the other bits are modifiers, not primary
    /// interests. An update replaces callback and mask but re-issues the
    /// kernel `modify` only when the translated native mask actually
    /// changed. Returns the handle of the (possibly pre-existing) record.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` before any mutation for a negative fd or a mask
    /// without a primary interest; a port error if the kernel rejects the
    /// registration, in which case the registry insert is rolled back.
    pub fn add_or_update(
        &self,
        fd: RawFd,
        mask: EventMask,
        callback: impl Fn(&Reactor, RawFd, EventMask) + 'static,
    ) -> Result<SlotToken> {
        self.add_or_update_callback(fd, mask, Rc::new(callback))
    }

    /// Non-generic form of [`add_or_update`](Self::add_or_update) taking
    /// an already-shared callback.
    pub fn add_or_update_callback(
        &self,
        fd: RawFd,
        mask: EventMask,
        callback: Callback,
    ) -> Result<SlotToken> {
        if fd < 0 {
            return Err(Error::invalid_argument(format!(
                "negative file descriptor {fd}"
            )));
        }
        let mask = mask.legalized();
        if !mask.intersects(EventMask::PRIMARY) {
            return Err(Error::invalid_argument(format!(
                "mask {mask} carries neither READ nor WRITE"
            )));
        }

        let mut registry = self.registry.borrow_mut();
        if let Some(token) = registry.token_for_fd(fd) {
            let record = registry
                .get_mut(token)
                .expect("fd index maps to a live record");
            let old_native = to_native(record.mask);
            record.callback = callback;
            record.mask = mask;

            let new_native = to_native(mask);
            if new_native != old_native {
                log::debug!("fd {fd}: re-arming with mask {mask}");
                self.port
                    .modify(fd, new_native, token.to_u64())
                    .map_err(Error::from)?;
            }
            return Ok(token);
        }

        let token = registry.insert(EventRecord { fd, mask, callback })?;
        if let Err(err) = self.port.register(fd, to_native(mask), token.to_u64()) {
            registry.remove(token);
            log::error!("fd {fd}: port registration failed, rolled back: {err}");
            return Err(err.into());
        }
        log::debug!("fd {fd}: registered with mask {mask} as [{token}]");
        registry.dump();
        Ok(token)
    }

    /// Removes the registration behind `handle` and releases its record.
    ///
    /// The record leaves the registry first, so FREE can fire at most
    /// once even under re-entrant or repeated remove attempts; a kernel
    /// unregistration failure is logged and absorbed, so the record
    /// cannot leak even if the fd was already closed out-of-band.
    ///
    /// # Errors
    ///
    /// `NotFound` if the handle is stale.
    pub fn remove(&self, handle: SlotToken) -> Result<()> {
        let record = self
            .registry
            .borrow_mut()
            .remove(handle)
            .ok_or_else(|| Error::not_found(format!("no record for handle {handle}")))?;

        if let Err(err) = self.port.unregister(record.fd) {
            // Soft condition: the fd may already be gone from the kernel.
            log::warn!("fd {}: port unregistration failed: {err}", record.fd);
        }
        log::debug!("fd {}: removed [{handle}]", record.fd);
        self.registry.borrow().dump();

        if record.mask.is_free() {
            (record.callback)(self, record.fd, EventMask::FREE);
        }
        Ok(())
    }

    /// Removes the registration for `fd`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a negative fd, `NotFound` if the fd has no
    /// registration.
    pub fn remove_by_fd(&self, fd: RawFd) -> Result<()> {
        if fd < 0 {
            return Err(Error::invalid_argument(format!(
                "negative file descriptor {fd}"
            )));
        }
        let token = self
            .registry
            .borrow()
            .token_for_fd(fd)
            .ok_or_else(|| Error::not_found(format!("fd {fd} is not registered")))?;
        self.remove(token)
    }

    /// Returns the fd behind a handle.
    ///
    /// # Errors
    ///
    /// `NotFound` if the handle is stale.
    pub fn fd_of(&self, handle: SlotToken) -> Result<RawFd> {
        self.registry
            .borrow()
            .get(handle)
            .map(|record| record.fd)
            .ok_or_else(|| Error::not_found(format!("no record for handle {handle}")))
    }

    /// Returns the effective (legalized) mask behind a handle.
    ///
    /// # Errors
    ///
    /// `NotFound` if the handle is stale.
    pub fn mask_of(&self, handle: SlotToken) -> Result<EventMask> {
        self.registry
            .borrow()
            .get(handle)
            .map(|record| record.mask)
            .ok_or_else(|| Error::not_found(format!("no record for handle {handle}")))
    }

    /// Runs the dispatch loop until an exit is requested or the port
    /// fails hard.
    ///
    /// Returns immediately on an empty registry. Otherwise each pass
    /// waits on the port (bounded by the poll interval), resolves every
    /// ready tag to its record, fires the callback with exactly the
    /// abstract bits that both fired and were asked for, and enforces
    /// one-shot auto-disarm for records without PERSIST. After every pass,
    /// ready batch or idle tick alike, a pending [`loop_exit`](Self::loop_exit)
    /// request clears the flag and returns success. A registry that drains
    /// to empty also ends the loop, so one-shot workloads terminate without
    /// an explicit exit request. Dispatch may be called again afterwards.
    ///
    /// # Errors
    ///
    /// A hard wait failure stops the loop and surfaces the port error;
    /// the caller decides whether to dispatch again.
    pub fn dispatch(&self) -> Result<()> {
        if self.registry.borrow().is_empty() {
            return Ok(());
        }
        self.port_errno.set(None);

        let mut batch = EventBatch::with_capacity(self.batch_capacity);
        loop {
            match self.port.wait(&mut batch, Some(POLL_INTERVAL)) {
                Ok(0) => {
                    log::trace!("idle tick");
                }
                Ok(count) => {
                    log::debug!("{count} event(s) active");
                    for event in &batch {
                        self.deliver(SlotToken::from_u64(event.tag), event.ready);
                    }
                }
                Err(err) => {
                    let errno = err.raw_os_error().unwrap_or(0);
                    self.port_errno.set(Some(errno));
                    log::error!("port wait failed: {err}");
                    self.should_exit.set(false);
                    return Err(err.into());
                }
            }

            if self.should_exit.replace(false) {
                log::debug!("loop exit requested, leaving dispatch");
                return Ok(());
            }
            if self.registry.borrow().is_empty() {
                log::debug!("registry drained, leaving dispatch");
                return Ok(());
            }
        }
    }

    /// Requests a cooperative dispatch exit.
    ///
    /// Observed at the end of the current batch-processing pass: a
    /// running callback is never interrupted, and an idle wait notices
    /// the request within the poll interval.
    pub fn loop_exit(&self) {
        self.should_exit.set(true);
    }

    /// The errno recorded by the last hard port failure inside
    /// [`dispatch`](Self::dispatch), if any.
    #[must_use]
    pub fn last_port_errno(&self) -> Option<i32> {
        self.port_errno.get()
    }

    /// Delivers one ready event: resolve, translate, fire, re-arm or
    /// release.
    fn deliver(&self, token: SlotToken, ready: crate::translate::NativeMask) {
        // Resolved through the tag, not a second fd lookup. A stale tag
        // means the record was removed earlier in this same batch.
        let (fd, mask, callback) = {
            let registry = self.registry.borrow();
            match registry.get(token) {
                Some(record) => (record.fd, record.mask, Rc::clone(&record.callback)),
                None => {
                    log::trace!("stale tag [{token}], skipping");
                    return;
                }
            }
        };

        // Fire only the bits present in both the fired set and the
        // interest mask.
        let fired = from_native(ready) & mask & EventMask::FIREABLE;
        if fired.is_empty() {
            log::debug!("fd {fd}: no observed events in {ready:?}");
        } else {
            log::debug!("fd {fd}: firing {fired}");
            callback(self, fd, fired);
        }

        // One-shot disarm is enforced here, not left to the kernel's own
        // one-shot flag: re-registration must go through the registry.
        // The callback may have removed or re-registered the record, so
        // resolve the token again before deciding.
        let non_persist = self
            .registry
            .borrow()
            .get(token)
            .map(|record| !record.mask.is_persist());
        if non_persist == Some(true) {
            if let Err(err) = self.remove(token) {
                log::debug!("fd {fd}: one-shot release raced a removal: {err}");
            }
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        // Force-remove every remaining record, firing FREE where it was
        // requested, before the port itself closes.
        let fds = self.registry.borrow().fds();
        for fd in fds {
            if let Err(err) = self.remove_by_fd(fd) {
                log::warn!("teardown of fd {fd} failed: {err}");
            }
        }
    }
}

impl std::fmt::Debug for Reactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reactor")
            .field("registered", &self.len())
            .field("batch_capacity", &self.batch_capacity)
            .field("should_exit", &self.should_exit.get())
            .field("port_errno", &self.port_errno.get())
            .finish_non_exhaustive()
    }
}
