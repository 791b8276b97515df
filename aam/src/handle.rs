//! Array handles.
//!
//! The original machine works with raw `nialptr` offsets into a region
//! that moves on every `expand()`, so C-level aliases have to be refreshed
//! after growth ("stack-in-heap coupling"). A `Handle` here is a stable
//! logical index into [`crate::heap::Heap`]'s block table: resolving it to
//! header/payload data always goes through the heap, never through a
//! cached pointer, so growth — which only appends new words — never
//! invalidates a `Handle`. This is a "handles all the way down" design,
//! trading one indirection per access for never needing a fixup pass
//! after the heap grows.
//!
//! Uninitialised nested-array slots are `INVALID` in the original. Here
//! that sentinel is simply the absence of a handle: a slot has type
//! `Option<Handle>`, and `Handle` is niche-optimised (backed by a
//! `NonZeroU32`) so `Option<Handle>` is the same size as `Handle` itself.

use core::num::NonZeroU32;

/// A stable reference to an array stored in a [`crate::heap::Heap`].
///
/// Equality is by identity (the underlying block index), matching the
/// machine's pointer-equality semantics for interned atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(NonZeroU32);

impl Handle {
    /// Wrap a block's base word index as a handle.
    #[inline]
    pub(crate) fn from_block_index(index: usize) -> Handle {
        let index: u32 = index
            .try_into()
            .expect("heap block index exceeds u32::MAX words");
        Handle(NonZeroU32::new(index + 1).expect("index + 1 cannot be zero"))
    }

    /// The block's base word index in its owning heap.
    #[inline]
    pub(crate) fn block_index(self) -> usize {
        (self.0.get() - 1) as usize
    }

    /// Raw `NonZeroU32` value, used to pack a handle into a single heap word
    /// (nested-array slots store one word per element). `0` is reserved for
    /// `INVALID`/absent, so this never collides with [`Handle::from_raw`].
    #[inline]
    pub(crate) fn to_raw(self) -> u32 {
        self.0.get()
    }

    #[inline]
    pub(crate) fn from_raw(v: u32) -> Option<Handle> {
        NonZeroU32::new(v).map(Handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::size_of;

    #[test]
    fn option_handle_is_niche_optimized() {
        assert_eq!(size_of::<Handle>(), size_of::<Option<Handle>>());
    }

    #[test]
    fn round_trips_through_block_index() {
        for i in [0usize, 1, 42, 1_000_000] {
            assert_eq!(Handle::from_block_index(i).block_index(), i);
        }
    }
}
