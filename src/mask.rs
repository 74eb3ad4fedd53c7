//! Abstract event mask for reactor registrations.
//!
//! [`EventMask`] names the readiness conditions a caller can subscribe to,
//! plus the modifier bits controlling re-arming policy. The bit layout is
//! part of the public ABI and maps onto the native epoll flag set in
//! [`crate::translate`].
//!
//! # Bit classes
//!
//! - *Primary interests*: [`READ`](EventMask::READ), [`WRITE`](EventMask::WRITE).
//!   Every registration must carry at least one of them.
//! - *Secondary interests*: [`ERROR`](EventMask::ERROR) (error or hangup),
//!   [`FREE`](EventMask::FREE) (fired once when the record is released),
//!   [`TIMEOUT`](EventMask::TIMEOUT) (reserved; no timer wheel backs it).
//! - *Modifiers*: [`PERSIST`](EventMask::PERSIST) (survive firings instead of
//!   one-shot auto-disarm), [`EDGE`](EventMask::EDGE) (edge-triggered).

use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// Bitset of abstract event types and registration modifiers.
///
/// Combine bits with the `|` operator:
///
/// ```
/// use evmux::EventMask;
///
/// let mask = EventMask::READ | EventMask::PERSIST;
/// assert!(mask.is_read());
/// assert!(mask.is_persist());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct EventMask(u16);

impl EventMask {
    /// Empty mask.
    pub const NONE: Self = Self(0);

    /// Input readiness (includes priority/OOB data).
    pub const READ: Self = Self(1 << 0);

    /// Output readiness.
    pub const WRITE: Self = Self(1 << 1);

    /// Error or hangup on the descriptor.
    pub const ERROR: Self = Self(1 << 2);

    /// Deliver one callback with this bit when the record is released.
    pub const FREE: Self = Self(1 << 3);

    /// Reserved timeout bit. Carried in the mask but never fired: timer
    /// delivery is out of scope for this reactor.
    pub const TIMEOUT: Self = Self(1 << 4);

    /// Keep the registration armed across firings. Without it the record
    /// is removed after its first delivery.
    pub const PERSIST: Self = Self(1 << 8);

    /// Edge-triggered notification.
    pub const EDGE: Self = Self(1 << 9);

    /// Every legal bit. Masks supplied by callers are intersected with
    /// this before storage or translation; unknown bits are dropped,
    /// never rejected.
    pub const ALL: Self = Self(
        Self::READ.0
            | Self::WRITE.0
            | Self::ERROR.0
            | Self::FREE.0
            | Self::TIMEOUT.0
            | Self::PERSIST.0
            | Self::EDGE.0,
    );

    /// The bits that can actually be reported to a callback by dispatch.
    pub(crate) const FIREABLE: Self = Self(Self::READ.0 | Self::WRITE.0 | Self::ERROR.0);

    /// The bits a registration must intersect to be accepted.
    pub(crate) const PRIMARY: Self = Self(Self::READ.0 | Self::WRITE.0);

    /// Creates a mask from raw bits. Bits outside [`ALL`](Self::ALL) are kept
    /// here and dropped by [`legalized`](Self::legalized).
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Returns the mask intersected with the legal bit set.
    #[must_use]
    pub const fn legalized(self) -> Self {
        Self(self.0 & Self::ALL.0)
    }

    /// True if every bit of `other` is present.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// True if any bit of `other` is present.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// True if no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if the READ bit is set.
    #[must_use]
    pub const fn is_read(self) -> bool {
        self.intersects(Self::READ)
    }

    /// True if the WRITE bit is set.
    #[must_use]
    pub const fn is_write(self) -> bool {
        self.intersects(Self::WRITE)
    }

    /// True if the ERROR bit is set.
    #[must_use]
    pub const fn is_error(self) -> bool {
        self.intersects(Self::ERROR)
    }

    /// True if the FREE bit is set.
    #[must_use]
    pub const fn is_free(self) -> bool {
        self.intersects(Self::FREE)
    }

    /// True if the PERSIST modifier is set.
    #[must_use]
    pub const fn is_persist(self) -> bool {
        self.intersects(Self::PERSIST)
    }

    /// True if the EDGE modifier is set.
    #[must_use]
    pub const fn is_edge(self) -> bool {
        self.intersects(Self::EDGE)
    }

    /// Union of two masks.
    #[must_use]
    pub const fn add(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Removes the bits of `other`.
    #[must_use]
    pub const fn remove(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for EventMask {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for EventMask {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for EventMask {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for EventMask {
    #[inline]
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for EventMask {
    type Output = Self;

    #[inline]
    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl std::fmt::Display for EventMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMES: [(EventMask, &str); 7] = [
            (EventMask::READ, "READ"),
            (EventMask::WRITE, "WRITE"),
            (EventMask::ERROR, "ERROR"),
            (EventMask::FREE, "FREE"),
            (EventMask::TIMEOUT, "TIMEOUT"),
            (EventMask::PERSIST, "PERSIST"),
            (EventMask::EDGE, "EDGE"),
        ];

        let mut first = true;
        for (bit, name) in NAMES {
            if self.intersects(bit) {
                if !first {
                    write!(f, " | ")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        if first {
            write!(f, "NONE")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_layout_is_stable() {
        assert_eq!(EventMask::READ.bits(), 1 << 0);
        assert_eq!(EventMask::WRITE.bits(), 1 << 1);
        assert_eq!(EventMask::ERROR.bits(), 1 << 2);
        assert_eq!(EventMask::FREE.bits(), 1 << 3);
        assert_eq!(EventMask::TIMEOUT.bits(), 1 << 4);
        assert_eq!(EventMask::PERSIST.bits(), 1 << 8);
        assert_eq!(EventMask::EDGE.bits(), 1 << 9);
    }

    #[test]
    fn legalized_drops_unknown_bits() {
        let mask = EventMask::from_bits(0xFFFF);
        assert_eq!(mask.legalized(), EventMask::ALL);

        let mask = EventMask::from_bits(EventMask::READ.bits() | (1 << 15));
        assert_eq!(mask.legalized(), EventMask::READ);
    }

    #[test]
    fn combining_and_predicates() {
        let mask = EventMask::READ | EventMask::WRITE | EventMask::PERSIST;
        assert!(mask.is_read());
        assert!(mask.is_write());
        assert!(mask.is_persist());
        assert!(!mask.is_error());
        assert!(mask.contains(EventMask::READ | EventMask::WRITE));
        assert!(!mask.contains(EventMask::READ | EventMask::ERROR));
        assert!(mask.intersects(EventMask::ERROR | EventMask::WRITE));
    }

    #[test]
    fn add_remove() {
        let mut mask = EventMask::READ;
        mask = mask.add(EventMask::FREE);
        assert!(mask.is_free());
        mask = mask.remove(EventMask::READ);
        assert!(!mask.is_read());
        assert!(mask.is_free());
    }

    #[test]
    fn display_names() {
        assert_eq!(EventMask::NONE.to_string(), "NONE");
        assert_eq!(EventMask::READ.to_string(), "READ");
        assert_eq!(
            (EventMask::READ | EventMask::PERSIST).to_string(),
            "READ | PERSIST"
        );
    }

    #[test]
    fn fireable_is_subset_of_all() {
        assert_eq!(EventMask::FIREABLE.legalized(), EventMask::FIREABLE);
        assert!(EventMask::ALL.contains(EventMask::FIREABLE));
        assert!(EventMask::FIREABLE.contains(EventMask::PRIMARY));
    }
}
