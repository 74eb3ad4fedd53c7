//! Single-threaded readiness-event reactor over epoll.
//!
//! `evmux` multiplexes many file descriptors on one thread: callers
//! register a descriptor, an abstract [`EventMask`], and a callback, and
//! [`Reactor::dispatch`] delivers readiness as ordered callback
//! invocations until an exit is requested from inside a callback.
//!
//! The crate is organized as a small stack of layers:
//!
//! - [`EventMask`]: the abstract event bit set and its legality rules.
//! - [`to_native`] / [`from_native`]: pure conversion between abstract
//!   and native epoll masks, in both directions.
//! - a generation-checked registry with an fd index, so stale handles
//!   are detected instead of hitting a recycled slot.
//! - [`port`]: the [`NotificationPort`] seam between the reactor and the
//!   kernel, with the real epoll port and a deterministic
//!   [`LabPort`] for tests.
//! - [`Reactor`]: registration surface, dispatch loop, one-shot
//!   auto-disarm, and teardown.
//! - [`fd`]: descriptor preparation (`O_NONBLOCK`, `FD_CLOEXEC`) and a
//!   short-read-tolerant drain loop.
//!
//! Everything is `!Send` by construction; callbacks may freely re-enter
//! the reactor that invoked them.
//!
//! # Example
//!
//! ```no_run
//! use evmux::{fd, EventMask, Reactor};
//! use std::os::unix::io::RawFd;
//!
//! fn watch(reactor: &Reactor, sock: RawFd) -> evmux::Result<()> {
//!     fd::make_non_blocking(sock)?;
//!     reactor.add_or_update(
//!         sock,
//!         EventMask::READ | EventMask::PERSIST | EventMask::ERROR,
//!         |reactor, sock, fired| {
//!             if fired.is_error() {
//!                 let _ = reactor.remove_by_fd(sock);
//!                 return;
//!             }
//!             let mut buf = [0u8; 4096];
//!             if let Ok(n) = fd::robust_read(sock, &mut buf) {
//!                 println!("{n} bytes from {sock}");
//!             }
//!         },
//!     )?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod arena;
mod error;
pub mod fd;
mod mask;
pub mod port;
mod reactor;
mod registry;
mod token;
mod translate;

pub use error::{Error, ErrorKind, Result};
pub use mask::EventMask;
pub use port::{EventBatch, NotificationPort, PortEvent};
pub use reactor::Reactor;
pub use registry::Callback;
pub use token::SlotToken;
pub use translate::{from_native, to_native, NativeMask};

#[cfg(target_os = "linux")]
pub use port::EpollPort;
pub use port::LabPort;
