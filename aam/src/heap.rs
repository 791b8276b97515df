//! [C1] The heap: a contiguous, word-addressed region of boundary-tagged
//! blocks with first-fit free-list allocation and in-place growth.
//!
//! Adapted from `wee_alloc`'s free-list allocator (`wee_alloc::lib`,
//! `neighbors.rs`): same boundary-tag trick (a block's trailer word
//! encodes, by its sign, whether the block is free, letting `release`
//! detect a free left neighbor in O(1) without walking), same first-fit
//! scan, same "split from the tail, keep the residue where it was"
//! allocation shape. The difference is the memory model: `wee_alloc`
//! manages raw OS/WASM pages behind `*const T` pointers that must be
//! re-derived after every `imp::alloc_pages` call; this heap is a single
//! growable `Vec<Word>` addressed by word offset, so a [`crate::handle::Handle`]
//! (itself just a validated word offset) survives `expand()` without any
//! pointer-rebinding step — growth only ever appends words, it never
//! moves existing ones.
//!
//! Block layout (word offsets relative to a block's base):
//!
//! ```text
//! [0] size         total block size in words, including header+trailer
//! [1] state        refcount (>= 0) if allocated, FREE_TAG (-1) if free
//! [2] word2        flags|kind|valence   (allocated)  /  fwd_link  (free)
//! [3] word3        tally                (allocated)  /  bck_link  (free)
//! [4 .. 4+valence) shape[valence]       (allocated only)
//! [.. size-1)      payload
//! [size-1]         trailer: 0 if allocated, -(base) if free
//! ```
//!
//! This drops one micro-optimisation from the original C machine: there,
//! the trailer word doubles as the array's final shape dimension to save a
//! word per array. Block tiling and coalescing behavior doesn't depend on
//! that overlay, so it is skipped here in favour of a trailer that always
//! means exactly one thing.

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::extra_assert::{extra_assert, extra_assert_eq};
use crate::handle::Handle;
use crate::kind::Kind;
use crate::units::Words;

pub(crate) const HEADER_WORDS: usize = 4;
pub(crate) const TRAILER_WORDS: usize = 1;
pub(crate) const MIN_BLOCK: usize = 6;

const FREE_TAG: i64 = -1;

bitflags::bitflags! {
    /// Per-array advisory flags. Only `SORTED` exists today; the bitset
    /// leaves room to grow without another header-layout change.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ArrayFlags: u8 {
        const SORTED = 0b0000_0001;
    }
}

#[inline]
fn round_up_even(n: usize) -> usize {
    (n + 1) & !1
}

#[inline]
fn pack_word2(kind: Kind, flags: ArrayFlags, valence: u32) -> i64 {
    (kind as i64) | ((flags.bits() as i64) << 8) | ((valence as i64) << 16)
}

#[inline]
fn unpack_kind(word2: i64) -> Kind {
    Kind::from_u8((word2 & 0xff) as u8)
}

#[inline]
fn unpack_flags(word2: i64) -> ArrayFlags {
    ArrayFlags::from_bits_truncate(((word2 >> 8) & 0xff) as u8)
}

#[inline]
fn unpack_valence(word2: i64) -> u32 {
    ((word2 >> 16) & 0xffff_ffff) as u32
}

/// The contiguous word-addressed heap.
pub struct Heap {
    words: Vec<i64>,
    free_head: Option<usize>,
    initial_size: usize,
    emergency_grow_used: bool,
}

impl Heap {
    pub fn new(config: &RuntimeConfig) -> Heap {
        let size = round_up_even(config.initial_heap_words.0.max(MIN_BLOCK));
        let words = vec![0i64; size];
        let mut heap = Heap {
            words,
            free_head: None,
            initial_size: size,
            emergency_grow_used: false,
        };
        // The whole region starts out as a single free block.
        heap.write_free_block(0, size);
        heap.insert_free_head(0);
        heap
    }

    /// Total addressable words, i.e. `memsize - membase` with `membase == 0`.
    pub fn len_words(&self) -> usize {
        self.words.len()
    }

    // ---- raw word access -------------------------------------------------

    #[inline]
    fn word(&self, idx: usize) -> i64 {
        self.words[idx]
    }

    #[inline]
    fn set_word(&mut self, idx: usize, value: i64) {
        self.words[idx] = value;
    }

    #[inline]
    fn block_size(&self, base: usize) -> usize {
        self.word(base) as usize
    }

    #[inline]
    fn is_free(&self, base: usize) -> bool {
        self.word(base + 1) == FREE_TAG
    }

    // ---- free list plumbing ----------------------------------------------

    fn get_fwd(&self, base: usize) -> Option<usize> {
        let v = self.word(base + 2);
        if v < 0 {
            None
        } else {
            Some(v as usize)
        }
    }

    fn set_fwd(&mut self, base: usize, link: Option<usize>) {
        self.set_word(base + 2, link.map_or(-1, |i| i as i64));
    }

    fn get_bck(&self, base: usize) -> Option<usize> {
        let v = self.word(base + 3);
        if v < 0 {
            None
        } else {
            Some(v as usize)
        }
    }

    fn set_bck(&mut self, base: usize, link: Option<usize>) {
        self.set_word(base + 3, link.map_or(-1, |i| i as i64));
    }

    fn unlink_free(&mut self, base: usize) {
        extra_assert!(self.is_free(base));
        let fwd = self.get_fwd(base);
        let bck = self.get_bck(base);
        match bck {
            Some(b) => self.set_fwd(b, fwd),
            None => self.free_head = fwd,
        }
        if let Some(f) = fwd {
            self.set_bck(f, bck);
        }
    }

    fn insert_free_head(&mut self, base: usize) {
        let old_head = self.free_head;
        self.set_fwd(base, old_head);
        self.set_bck(base, None);
        if let Some(h) = old_head {
            self.set_bck(h, Some(base));
        }
        self.free_head = Some(base);
    }

    fn write_free_block(&mut self, base: usize, size: usize) {
        self.set_word(base, size as i64);
        self.set_word(base + 1, FREE_TAG);
        // Encoded as -(base + 1), never -0, so a block based at offset 0
        // still produces a strictly negative trailer and isn't confused
        // with an allocated block's all-zero trailer.
        self.set_word(base + size - 1, -((base as i64) + 1));
    }

    fn write_allocated_header(&mut self, base: usize, size: usize) {
        self.set_word(base, size as i64);
        self.set_word(base + 1, 0); // refcount starts at 0
        self.set_word(base + size - 1, 0); // trailer: allocated
    }

    /// Does the block immediately preceding `base` exist and is it free?
    /// Returns its base if so. O(1) via the boundary tag, no walking.
    fn free_predecessor(&self, base: usize) -> Option<usize> {
        if base == 0 {
            return None;
        }
        let trailer = self.word(base - 1);
        if trailer < 0 {
            let pred = (-trailer - 1) as usize;
            extra_assert!(self.is_free(pred));
            extra_assert_eq!(pred + self.block_size(pred), base);
            Some(pred)
        } else {
            None
        }
    }

    // ---- allocation --------------------------------------------------

    /// First-fit scan of the free list for a block of at least `size_words`.
    fn find_first_fit(&self, size_words: usize) -> Option<usize> {
        let mut cur = self.free_head;
        while let Some(idx) = cur {
            if self.block_size(idx) >= size_words {
                return Some(idx);
            }
            cur = self.get_fwd(idx);
        }
        None
    }

    /// Reserve a block able to hold `valence` shape words plus
    /// `payload_words` of element data. Returns the handle to the new
    /// (allocated, header-initialised-to-zero-refcount) block; callers are
    /// responsible for writing kind/valence/tally/shape/payload.
    pub fn reserve(
        &mut self,
        config: &RuntimeConfig,
        payload_words: usize,
        valence: usize,
    ) -> Result<Handle> {
        if (config.interrupt)() {
            return Err(Error::Interrupt);
        }

        let size_words =
            round_up_even((HEADER_WORDS + valence + payload_words + TRAILER_WORDS).max(MIN_BLOCK));

        if let Some(base) = self.find_first_fit(size_words) {
            return Ok(self.take_from_free_block(base, size_words));
        }

        self.expand(config, size_words)?;

        let base = self
            .find_first_fit(size_words)
            .expect("expand() succeeded but no block fits; heap growth policy is broken");
        Ok(self.take_from_free_block(base, size_words))
    }

    fn take_from_free_block(&mut self, base: usize, size_words: usize) -> Handle {
        let block_size = self.block_size(base);
        let residue = block_size - size_words;

        let alloc_base = if residue >= MIN_BLOCK {
            // Shrink the free block in place (it keeps its list position)
            // and carve the allocated block from its tail.
            self.write_free_block(base, residue);
            let alloc_base = base + residue;
            self.write_allocated_header(alloc_base, size_words);
            alloc_base
        } else {
            self.unlink_free(base);
            self.write_allocated_header(base, block_size);
            base
        };

        Handle::from_block_index(alloc_base)
    }

    /// Grow the backing store by at least `need_words`, following the
    /// policy `current + max(need + slack, min(20%·current, 50%·initial))`.
    fn expand(&mut self, config: &RuntimeConfig, need_words: usize) -> Result<()> {
        if config.expansion_disabled {
            if self.emergency_grow_used {
                log::warn!("workspace full: emergency grow already used, denying {need_words} more words");
                return Err(Error::WorkspaceFull { requested: Words(need_words) });
            }
            log::warn!("expansion disabled: using one-time emergency grow for {need_words} words");
            self.emergency_grow_used = true;
            return self.grow_by(need_words);
        }

        let current = self.words.len();
        let by_current = (current as f64 * config.expand_fraction_of_current) as usize;
        let by_initial = (self.initial_size as f64 * config.expand_fraction_of_initial) as usize;
        let bonus = by_current.min(by_initial);
        let grow = (need_words + config.expand_slack.0).max(bonus);
        log::debug!(
            "heap expand: current={current} need={need_words} grow={grow} (initial={})",
            self.initial_size
        );
        self.grow_by(grow)
    }

    fn grow_by(&mut self, words: usize) -> Result<()> {
        let words = round_up_even(words.max(MIN_BLOCK));
        let old_len = self.words.len();

        // The boundary tag at the very last word tells us, in O(1),
        // whether the region's last block is free and if so where it
        // starts — the same trick `release` uses for its left neighbour.
        let last_free_base = if old_len > 0 {
            self.free_predecessor(old_len)
        } else {
            None
        };

        self.words.resize(old_len + words, 0);

        if let Some(last_base) = last_free_base {
            self.unlink_free(last_base);
            let merged_size = (old_len - last_base) + words;
            self.write_free_block(last_base, merged_size);
            self.insert_free_head(last_base);
        } else {
            self.write_free_block(old_len, words);
            self.insert_free_head(old_len);
        }

        Ok(())
    }

    // ---- release -----------------------------------------------------

    /// Return a block to the free list, coalescing with free neighbours.
    pub fn release(&mut self, config: &RuntimeConfig, handle: Handle) {
        let base = handle.block_index();
        extra_assert!(!self.is_free(base), "double free of block {base}");

        let mut start = base;
        let mut size = self.block_size(base);

        let next = start + size;
        if next < self.words.len() && self.is_free(next) {
            let next_size = self.block_size(next);
            self.unlink_free(next);
            size += next_size;
        }

        if let Some(pred) = self.free_predecessor(start) {
            let pred_size = self.block_size(pred);
            self.unlink_free(pred);
            start = pred;
            size += pred_size;
        }

        self.write_free_block(start, size);
        self.insert_free_head(start);

        if config.debug_invariants {
            self.validate_invariants();
        }
    }

    // ---- header accessors used by the array model ---------------------

    pub(crate) fn data_start(&self, handle: Handle) -> usize {
        handle.block_index() + HEADER_WORDS
    }

    pub(crate) fn payload_start(&self, handle: Handle) -> usize {
        self.data_start(handle) + self.valence(handle) as usize
    }

    pub(crate) fn block_capacity_words(&self, handle: Handle) -> usize {
        self.block_size(handle.block_index())
    }

    pub(crate) fn refcount(&self, handle: Handle) -> u32 {
        self.word(handle.block_index() + 1) as u32
    }

    pub(crate) fn set_refcount(&mut self, handle: Handle, n: u32) {
        self.set_word(handle.block_index() + 1, n as i64);
    }

    pub(crate) fn kind(&self, handle: Handle) -> Kind {
        unpack_kind(self.word(handle.block_index() + 2))
    }

    pub(crate) fn flags(&self, handle: Handle) -> ArrayFlags {
        unpack_flags(self.word(handle.block_index() + 2))
    }

    pub(crate) fn valence(&self, handle: Handle) -> u32 {
        unpack_valence(self.word(handle.block_index() + 2))
    }

    pub(crate) fn set_kind_flags_valence(
        &mut self,
        handle: Handle,
        kind: Kind,
        flags: ArrayFlags,
        valence: u32,
    ) {
        let w = pack_word2(kind, flags, valence);
        self.set_word(handle.block_index() + 2, w);
    }

    pub(crate) fn set_sorted(&mut self, handle: Handle, sorted: bool) {
        let kind = self.kind(handle);
        let valence = self.valence(handle);
        let mut flags = self.flags(handle);
        flags.set(ArrayFlags::SORTED, sorted);
        self.set_kind_flags_valence(handle, kind, flags, valence);
    }

    pub(crate) fn tally(&self, handle: Handle) -> usize {
        self.word(handle.block_index() + 3) as usize
    }

    pub(crate) fn set_tally(&mut self, handle: Handle, tally: usize) {
        self.set_word(handle.block_index() + 3, tally as i64);
    }

    pub(crate) fn shape(&self, handle: Handle) -> Vec<usize> {
        let start = self.data_start(handle);
        let v = self.valence(handle) as usize;
        (0..v).map(|i| self.word(start + i) as usize).collect()
    }

    pub(crate) fn set_shape(&mut self, handle: Handle, shape: &[usize]) {
        let start = self.data_start(handle);
        for (i, &dim) in shape.iter().enumerate() {
            self.set_word(start + i, dim as i64);
        }
    }

    pub(crate) fn word_at(&self, handle: Handle, offset: usize) -> i64 {
        self.word(self.payload_start(handle) + offset)
    }

    pub(crate) fn set_word_at(&mut self, handle: Handle, offset: usize, value: i64) {
        let idx = self.payload_start(handle) + offset;
        self.set_word(idx, value);
    }

    pub(crate) fn payload_words(&self, handle: Handle) -> &[i64] {
        let start = self.payload_start(handle);
        let end = handle.block_index() + self.block_size(handle.block_index()) - TRAILER_WORDS;
        &self.words[start..end]
    }

    pub(crate) fn payload_words_mut(&mut self, handle: Handle) -> &mut [i64] {
        let start = self.payload_start(handle);
        let end = handle.block_index() + self.block_size(handle.block_index()) - TRAILER_WORDS;
        &mut self.words[start..end]
    }

    // ---- debug invariant validation -------------------------------------

    /// Validate heap-wide invariants: blocks tile the region, no two
    /// adjacent free blocks, free list is acyclic and doubly consistent.
    /// O(n); only ever called when `RuntimeConfig::debug_invariants` is set.
    pub fn validate_invariants(&self) {
        fn fail(msg: String) -> ! {
            log::error!("heap invariant violated: {msg}");
            panic!("{msg}");
        }

        let mut offset = 0usize;
        let mut prev_free = false;
        let mut free_count_by_scan = 0usize;
        while offset < self.words.len() {
            let size = self.block_size(offset);
            if size < MIN_BLOCK {
                fail(format!("block at {offset} smaller than MIN_BLOCK"));
            }
            if offset + size > self.words.len() {
                fail(format!("block at {offset} runs past heap end"));
            }
            let free = self.is_free(offset);
            if free {
                free_count_by_scan += 1;
                if prev_free {
                    fail(format!("two adjacent free blocks at/near {offset}"));
                }
            }
            prev_free = free;
            offset += size;
        }
        if offset != self.words.len() {
            fail("blocks do not exactly tile the heap".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        let mut cur = self.free_head;
        while let Some(idx) = cur {
            if !seen.insert(idx) {
                fail(format!("cycle in free list at {idx}"));
            }
            if !self.is_free(idx) {
                fail(format!("free list references allocated block {idx}"));
            }
            cur = self.get_fwd(idx);
        }
        if seen.len() != free_count_by_scan {
            fail("free list and block scan disagree on free block count".to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap() -> (Heap, RuntimeConfig) {
        let config = RuntimeConfig::small_for_testing();
        (Heap::new(&config), config)
    }

    #[test]
    fn reserve_then_release_round_trips_free_space() {
        let (mut h, c) = heap();
        let before = h.len_words();
        let a = h.reserve(&c, 4, 0).unwrap();
        h.release(&c, a);
        assert_eq!(h.len_words(), before);
        h.validate_invariants();
    }

    #[test]
    fn allocating_whole_residual_block_leaves_no_fragment() {
        let (mut h, c) = heap();
        // Force a reservation whose residue would be < MIN_BLOCK by
        // shrinking the initial free block down to exactly fit twice.
        let total = h.len_words();
        let first_size = total - MIN_BLOCK + 1; // leaves a too-small residue
        let payload = first_size - HEADER_WORDS - TRAILER_WORDS;
        let _a = h.reserve(&c, payload, 0).unwrap();
        // The whole block must have been taken; no free fragment remains
        // smaller than MIN_BLOCK anywhere.
        h.validate_invariants();
    }

    #[test]
    fn free_list_coalesces_three_consecutive_blocks() {
        let (mut h, c) = heap();
        let a = h.reserve(&c, 10, 0).unwrap();
        let b = h.reserve(&c, 10, 0).unwrap();
        let cc = h.reserve(&c, 10, 0).unwrap();
        let b_size = h.block_capacity_words(b);
        let a_size = h.block_capacity_words(a);
        let c_size = h.block_capacity_words(cc);

        h.release(&c, b);
        h.release(&c, a);
        h.release(&c, cc);

        h.validate_invariants();
        // After freeing all three (in B, A, C order) they must have
        // coalesced into one contiguous free block spanning all of them.
        let head = h.free_head.expect("heap has free space");
        assert!(h.block_size(head) >= a_size + b_size + c_size);
    }

    #[test]
    fn growth_appends_without_moving_existing_handles() {
        let config = RuntimeConfig {
            initial_heap_words: Words(MIN_BLOCK),
            expand_slack: Words(8),
            ..RuntimeConfig::small_for_testing()
        };
        let mut h = Heap::new(&config);
        let a = h.reserve(&config, 1, 0).unwrap();
        h.set_word_at(a, 0, 1234);
        // This allocation cannot fit without growth.
        let b = h.reserve(&config, 64, 0).unwrap();
        h.set_word_at(b, 0, 5678);
        assert_eq!(h.word_at(a, 0), 1234, "growth must not disturb existing data");
        assert_eq!(h.word_at(b, 0), 5678);
        h.validate_invariants();
    }
}
