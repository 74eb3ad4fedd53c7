//! Generation-checked slot tokens used as kernel dispatch tags.
//!
//! When a record is registered with the notification port, its arena slot
//! index and generation are packed into a `u64` and carried by the kernel
//! as the opaque tag. A ready event is resolved back to its record in
//! O(1) by unpacking the tag, with no secondary fd-keyed lookup, and the
//! generation counter rejects tags that outlived their record (the ABA
//! problem: slot freed, then reused for a different fd).

/// Compact identifier for a registered event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotToken {
    index: u32,
    generation: u32,
}

impl SlotToken {
    /// Creates a token from its slot index and generation.
    #[must_use]
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the generation counter.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Packs the token into a `u64` suitable for `epoll_event.u64`.
    /// Generation in the upper 32 bits, index in the lower.
    #[must_use]
    pub const fn to_u64(self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    /// Unpacks a tag produced by [`to_u64`](Self::to_u64).
    #[must_use]
    pub const fn from_u64(tag: u64) -> Self {
        Self {
            index: tag as u32,
            generation: (tag >> 32) as u32,
        }
    }
}

impl std::fmt::Display for SlotToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.index, self.generation)
    }
}
