//! Translation between the abstract [`EventMask`] and the native epoll
//! flag set.
//!
//! Both directions are pure, total, and side-effect free. Unknown abstract
//! bits are masked off before translation; unmapped native bits are
//! ignored on the way back.
//!
//! # Mapping
//!
//! | Abstract | Native |
//! |----------|--------|
//! | READ | `EPOLLIN \| EPOLLPRI` |
//! | WRITE | `EPOLLOUT` |
//! | ERROR | `EPOLLERR \| EPOLLHUP` |
//! | no PERSIST | `EPOLLONESHOT` |
//! | EDGE | `EPOLLET` |
//! | FREE, TIMEOUT | none (reactor-internal signaling only) |

use crate::mask::EventMask;

/// Native epoll readiness flag set.
///
/// The constants mirror the Linux epoll ABI so a value can be handed
/// straight to `epoll_ctl`/`epoll_wait`; they are spelled out here rather
/// than taken from `libc` so the pure translation layer (and the lab
/// port built on it) compiles on every platform. A conformance test
/// checks them against `libc` on Linux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct NativeMask(u32);

impl NativeMask {
    /// Empty flag set.
    pub const NONE: Self = Self(0);
    /// `EPOLLIN`: input ready.
    pub const IN: Self = Self(0x001);
    /// `EPOLLPRI`: priority/OOB input ready.
    pub const PRI: Self = Self(0x002);
    /// `EPOLLOUT`: output ready.
    pub const OUT: Self = Self(0x004);
    /// `EPOLLERR`: error condition.
    pub const ERR: Self = Self(0x008);
    /// `EPOLLHUP`: hangup.
    pub const HUP: Self = Self(0x010);
    /// `EPOLLONESHOT`: kernel disarms after the first firing.
    pub const ONESHOT: Self = Self(1 << 30);
    /// `EPOLLET`: edge-triggered.
    pub const ET: Self = Self(1 << 31);

    /// Creates a flag set from raw bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits, as expected by the kernel.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True if no flag is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if any flag of `other` is present.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    const fn or(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Translates an abstract interest mask to the native flag set used for
/// registration. The input is legalized first, so stray bits never leak
/// into the kernel call.
#[must_use]
pub fn to_native(mask: EventMask) -> NativeMask {
    let mask = mask.legalized();
    let mut out = NativeMask::NONE;

    if !mask.is_persist() {
        out = out.or(NativeMask::ONESHOT);
    }
    if mask.is_edge() {
        out = out.or(NativeMask::ET);
    }
    if mask.is_read() {
        out = out.or(NativeMask::IN).or(NativeMask::PRI);
    }
    if mask.is_write() {
        out = out.or(NativeMask::OUT);
    }
    if mask.is_error() {
        out = out.or(NativeMask::ERR).or(NativeMask::HUP);
    }
    out
}

/// Translates a native readiness result back to the abstract event types
/// that fired. Error and hangup collapse to ERROR; input and priority
/// input collapse to READ; other native bits carry no abstract meaning.
#[must_use]
pub fn from_native(ready: NativeMask) -> EventMask {
    let mut fired = EventMask::NONE;

    if ready.intersects(NativeMask::ERR.or(NativeMask::HUP)) {
        fired |= EventMask::ERROR;
    }
    if ready.intersects(NativeMask::IN.or(NativeMask::PRI)) {
        fired |= EventMask::READ;
    }
    if ready.intersects(NativeMask::OUT) {
        fired |= EventMask::WRITE;
    }
    fired
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn native_constants_match_libc() {
        assert_eq!(NativeMask::IN.bits(), libc::EPOLLIN as u32);
        assert_eq!(NativeMask::PRI.bits(), libc::EPOLLPRI as u32);
        assert_eq!(NativeMask::OUT.bits(), libc::EPOLLOUT as u32);
        assert_eq!(NativeMask::ERR.bits(), libc::EPOLLERR as u32);
        assert_eq!(NativeMask::HUP.bits(), libc::EPOLLHUP as u32);
        assert_eq!(NativeMask::ONESHOT.bits(), libc::EPOLLONESHOT as u32);
        assert_eq!(NativeMask::ET.bits(), libc::EPOLLET as u32);
    }

    #[test]
    fn read_maps_to_in_and_pri() {
        let native = to_native(EventMask::READ | EventMask::PERSIST);
        assert!(native.intersects(NativeMask::IN));
        assert!(native.intersects(NativeMask::PRI));
        assert!(!native.intersects(NativeMask::OUT));
        assert!(!native.intersects(NativeMask::ONESHOT));
    }

    #[test]
    fn missing_persist_requests_oneshot() {
        let native = to_native(EventMask::WRITE);
        assert!(native.intersects(NativeMask::ONESHOT));
        assert!(native.intersects(NativeMask::OUT));

        let native = to_native(EventMask::WRITE | EventMask::PERSIST);
        assert!(!native.intersects(NativeMask::ONESHOT));
    }

    #[test]
    fn edge_maps_to_et() {
        let native = to_native(EventMask::READ | EventMask::EDGE | EventMask::PERSIST);
        assert!(native.intersects(NativeMask::ET));
    }

    #[test]
    fn error_maps_to_err_and_hup() {
        let native = to_native(EventMask::READ | EventMask::ERROR | EventMask::PERSIST);
        assert!(native.intersects(NativeMask::ERR));
        assert!(native.intersects(NativeMask::HUP));
    }

    #[test]
    fn free_and_timeout_have_no_native_representation() {
        let base = to_native(EventMask::READ | EventMask::PERSIST);
        let with_internal = to_native(
            EventMask::READ | EventMask::PERSIST | EventMask::FREE | EventMask::TIMEOUT,
        );
        assert_eq!(base, with_internal);
    }

    #[test]
    fn unknown_abstract_bits_are_dropped() {
        let dirty = EventMask::from_bits(EventMask::READ.bits() | (1 << 14));
        assert_eq!(to_native(dirty), to_native(EventMask::READ));
    }

    #[test]
    fn from_native_collapses_err_hup() {
        assert_eq!(from_native(NativeMask::ERR), EventMask::ERROR);
        assert_eq!(from_native(NativeMask::HUP), EventMask::ERROR);
        assert_eq!(
            from_native(NativeMask::ERR.or(NativeMask::HUP)),
            EventMask::ERROR
        );
    }

    #[test]
    fn from_native_collapses_in_pri() {
        assert_eq!(from_native(NativeMask::IN), EventMask::READ);
        assert_eq!(from_native(NativeMask::PRI), EventMask::READ);
        assert_eq!(from_native(NativeMask::OUT), EventMask::WRITE);
    }

    #[test]
    fn from_native_ignores_unmapped_bits() {
        // EPOLLRDBAND-style bits carry no abstract meaning.
        let ready = NativeMask::from_bits(0x080);
        assert_eq!(from_native(ready), EventMask::NONE);
        assert_eq!(from_native(NativeMask::NONE), EventMask::NONE);
    }

    #[test]
    fn roundtrip_fires_what_was_registered() {
        let native = to_native(EventMask::READ | EventMask::WRITE | EventMask::PERSIST);
        let fired = from_native(NativeMask::from_bits(native.bits() & 0x1F));
        assert!(fired.is_read());
        assert!(fired.is_write());
    }
}
