//! [C2] The array object model: typed element access, construction, the
//! reference-count discipline, and the packed-boolean copy algorithm.
//!
//! An array here is just a [`Handle`] into a [`Heap`]; this module never
//! holds a payload directly, only ever resolves one through the heap for
//! the duration of a call, per the handle-arena separation in the design
//! notes. `Option<Handle>` is the `INVALID` sentinel for nested slots and
//! is stored packed into a single heap word via [`Handle::to_raw`].

use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::handle::Handle;
use crate::heap::Heap;
use crate::kind::Kind;

const WORD_BITS: u32 = 64;
const BYTES_PER_WORD: usize = 8;

/// Number of small integers preallocated as singletons, `[0, SMALL_INT_COUNT)`.
pub const SMALL_INT_COUNT: usize = 256;

/// The handful of process-wide preallocated atoms. Built once during
/// [`crate::runtime::Runtime`] bootstrap via [`alloc_container`] directly
/// (bypassing [`create`]'s own singleton check, since the singletons don't
/// exist yet to check against) and then handed to every other constructor.
pub struct Singletons {
    /// The canonical empty list: nested, valence 1, tally 0.
    pub null: Handle,
    pub small_ints: Vec<Handle>,
    pub bool_false: Handle,
    pub bool_true: Handle,
    pub zero_real: Handle,
    pub blank_char: Handle,
}

impl Singletons {
    pub fn small_int(&self, value: i64) -> Option<Handle> {
        if value >= 0 && (value as usize) < self.small_ints.len() {
            Some(self.small_ints[value as usize])
        } else {
            None
        }
    }
}

/// Callback invoked by [`free_array`] when a phrase/fault atom's last
/// reference is released, so the atom table can drop its own entry.
/// Defined here rather than imported from the atom table to keep C2 from
/// depending on C3 — atoms.rs depends on array.rs, not the reverse.
pub trait AtomTableHooks {
    fn on_free_atom(&mut self, handle: Handle, kind: Kind, bytes: &[u8]);
}

/// A no-op hooks implementation for contexts with no atom table attached
/// (benches, isolated heap tests).
pub struct NoAtomHooks;

impl AtomTableHooks for NoAtomHooks {
    fn on_free_atom(&mut self, _handle: Handle, _kind: Kind, _bytes: &[u8]) {}
}

fn payload_words_for(kind: Kind, tally: usize) -> usize {
    match kind {
        Kind::Boolean => (tally + WORD_BITS as usize - 1) / WORD_BITS as usize,
        Kind::Integer | Kind::Real | Kind::Nested => tally,
        Kind::Character | Kind::Phrase | Kind::Fault => {
            // + 1 for the trailing NUL the design reserves (not counted in
            // tally) past the last element.
            (tally + 1 + BYTES_PER_WORD - 1) / BYTES_PER_WORD
        }
    }
}

/// Allocate and initialise a container of the given kind and shape, with no
/// singleton lookup. Used both by [`create`] for the general case and, for
/// the one array that cannot go through `create` (`Null` itself, and the
/// other singletons), directly by runtime bootstrap.
pub(crate) fn alloc_container(
    heap: &mut Heap,
    config: &RuntimeConfig,
    kind: Kind,
    shape: &[usize],
) -> Result<Handle> {
    let valence = shape.len();
    let tally: usize = shape.iter().product();
    let payload_words = payload_words_for(kind, tally);

    let handle = heap.reserve(config, payload_words, valence)?;
    heap.set_kind_flags_valence(handle, kind, crate::heap::ArrayFlags::empty(), valence as u32);
    heap.set_shape(handle, shape);
    heap.set_tally(handle, tally);
    heap.set_refcount(handle, 0);

    match kind {
        Kind::Nested => {
            for w in heap.payload_words_mut(handle) {
                *w = 0; // 0 == INVALID, never a valid Handle::to_raw() value
            }
        }
        Kind::Boolean | Kind::Character | Kind::Phrase | Kind::Fault => {
            for w in heap.payload_words_mut(handle) {
                *w = 0;
            }
        }
        Kind::Integer | Kind::Real => {
            // Left uninitialised (may hold a freed block's stale data);
            // the caller is expected to fill every element before use.
        }
    }

    Ok(handle)
}

/// Allocate a valence-0 atom container (phrase/fault) sized for
/// `byte_len` bytes directly, rather than going through [`alloc_container`]
/// with an empty shape (which would size the payload for `tally = 1`, not
/// `tally = byte_len`, since a phrase/fault's element count on the wire
/// isn't the product of its shape the way every other kind's is). `tally`
/// is set to `byte_len` after allocation, matching the kind's on-heap
/// convention of "valence 0, tally = string length in bytes".
pub(crate) fn alloc_atom_container(heap: &mut Heap, config: &RuntimeConfig, kind: Kind, byte_len: usize) -> Result<Handle> {
    let payload_words = payload_words_for(kind, byte_len);
    let handle = heap.reserve(config, payload_words, 0)?;
    heap.set_kind_flags_valence(handle, kind, crate::heap::ArrayFlags::empty(), 0);
    heap.set_shape(handle, &[]);
    heap.set_tally(handle, byte_len);
    heap.set_refcount(handle, 0);
    for w in heap.payload_words_mut(handle) {
        *w = 0;
    }
    Ok(handle)
}

/// `create(kind, valence, shape)`. Any 1-dimensional empty shape collapses
/// to the canonical `Null`, regardless of the requested kind.
pub fn create(
    heap: &mut Heap,
    config: &RuntimeConfig,
    singletons: &Singletons,
    kind: Kind,
    shape: &[usize],
) -> Result<Handle> {
    if shape.len() == 1 && shape[0] == 0 {
        return Ok(singletons.null);
    }
    alloc_container(heap, config, kind, shape)
}

pub fn create_int(
    heap: &mut Heap,
    config: &RuntimeConfig,
    singletons: &Singletons,
    value: i64,
) -> Result<Handle> {
    if let Some(h) = singletons.small_int(value) {
        return Ok(h);
    }
    let h = alloc_container(heap, config, Kind::Integer, &[])?;
    store_int(heap, h, 0, value);
    Ok(h)
}

pub fn create_bool(singletons: &Singletons, value: bool) -> Handle {
    if value {
        singletons.bool_true
    } else {
        singletons.bool_false
    }
}

pub fn create_real(
    heap: &mut Heap,
    config: &RuntimeConfig,
    singletons: &Singletons,
    value: f64,
) -> Result<Handle> {
    if value == 0.0 && value.is_sign_positive() {
        return Ok(singletons.zero_real);
    }
    let h = alloc_container(heap, config, Kind::Real, &[])?;
    store_real(heap, h, 0, value);
    Ok(h)
}

pub fn create_char(
    heap: &mut Heap,
    config: &RuntimeConfig,
    singletons: &Singletons,
    value: u8,
) -> Result<Handle> {
    if value == b' ' {
        return Ok(singletons.blank_char);
    }
    let h = alloc_container(heap, config, Kind::Character, &[])?;
    store_char(heap, h, 0, value);
    Ok(h)
}

// ---- typed element access --------------------------------------------

#[inline]
pub fn fetch_int(heap: &Heap, h: Handle, i: usize) -> i64 {
    heap.word_at(h, i)
}

#[inline]
pub fn store_int(heap: &mut Heap, h: Handle, i: usize, value: i64) {
    heap.set_word_at(h, i, value);
}

#[inline]
pub fn fetch_real(heap: &Heap, h: Handle, i: usize) -> f64 {
    f64::from_bits(heap.word_at(h, i) as u64)
}

#[inline]
pub fn store_real(heap: &mut Heap, h: Handle, i: usize, value: f64) {
    heap.set_word_at(h, i, value.to_bits() as i64);
}

pub fn fetch_bool(heap: &Heap, h: Handle, i: usize) -> bool {
    let word = heap.payload_words(h)[i / WORD_BITS as usize] as u64;
    let bit = WORD_BITS - 1 - (i as u32 % WORD_BITS);
    (word >> bit) & 1 == 1
}

pub fn store_bool(heap: &mut Heap, h: Handle, i: usize, value: bool) {
    let bit = WORD_BITS - 1 - (i as u32 % WORD_BITS);
    let word_idx = i / WORD_BITS as usize;
    let words = heap.payload_words_mut(h);
    let mut word = words[word_idx] as u64;
    if value {
        word |= 1 << bit;
    } else {
        word &= !(1 << bit);
    }
    words[word_idx] = word as i64;
}

/// Bytes are packed little-endian within their word (byte 0 in the low
/// byte), shared by character, phrase, and fault payloads.
pub fn fetch_byte(heap: &Heap, h: Handle, i: usize) -> u8 {
    let word = heap.payload_words(h)[i / 8] as u64;
    ((word >> (8 * (i % 8))) & 0xff) as u8
}

pub fn store_byte(heap: &mut Heap, h: Handle, i: usize, value: u8) {
    let shift = 8 * (i % 8);
    let word_idx = i / 8;
    let words = heap.payload_words_mut(h);
    let mut word = words[word_idx] as u64;
    word &= !(0xffu64 << shift);
    word |= (value as u64) << shift;
    words[word_idx] = word as i64;
}

#[inline]
pub fn fetch_char(heap: &Heap, h: Handle, i: usize) -> u8 {
    fetch_byte(heap, h, i)
}

#[inline]
pub fn store_char(heap: &mut Heap, h: Handle, i: usize, value: u8) {
    store_byte(heap, h, i, value);
}

/// Read an atom's (phrase/fault/character-array) byte string, `tally` bytes
/// long — the NUL past the last element is never part of `tally`.
pub fn atom_bytes(heap: &Heap, h: Handle) -> Vec<u8> {
    let tally = heap.tally(h);
    (0..tally).map(|i| fetch_byte(heap, h, i)).collect()
}

pub fn fetch_nested(heap: &Heap, h: Handle, i: usize) -> Option<Handle> {
    Handle::from_raw(heap.word_at(h, i) as u32)
}

fn set_nested_raw(heap: &mut Heap, h: Handle, i: usize, slot: Option<Handle>) {
    heap.set_word_at(h, i, slot.map_or(0, Handle::to_raw) as i64);
}

/// Store into a slot known to hold `INVALID` (fresh construction). Use
/// [`replace_into_slot`] when the slot may already hold a live reference.
pub fn store_into_slot(heap: &mut Heap, h: Handle, i: usize, value: Handle) {
    incref(heap, value);
    set_nested_raw(heap, h, i, Some(value));
}

/// Store into a slot that may already be occupied: the old occupant (if
/// any) is decremented and freed after the new one is safely in place.
pub fn replace_into_slot(
    heap: &mut Heap,
    config: &RuntimeConfig,
    hooks: &mut dyn AtomTableHooks,
    h: Handle,
    i: usize,
    value: Handle,
) {
    let old = fetch_nested(heap, h, i);
    incref(heap, value);
    set_nested_raw(heap, h, i, Some(value));
    if let Some(old) = old {
        freeup(heap, config, hooks, old);
    }
}

/// `fetch_as_array(x, i)`: an atomic `x` is returned as-is (incref'd); a
/// nested `x` yields its slot (incref'd); otherwise a temporary scalar atom
/// of the homogeneous element at `i` is built. Callers must balance the
/// temporary — `freeup` it, or let a store/push absorb the refcount.
pub fn fetch_as_array(
    heap: &mut Heap,
    config: &RuntimeConfig,
    singletons: &Singletons,
    x: Handle,
    i: usize,
) -> Result<Handle> {
    if heap.kind(x) == Kind::Nested {
        let slot = fetch_nested(heap, x, i).expect("fetch_as_array on an INVALID nested slot");
        incref(heap, slot);
        return Ok(slot);
    }
    if heap.valence(x) == 0 {
        incref(heap, x);
        return Ok(x);
    }
    match heap.kind(x) {
        Kind::Integer => create_int(heap, config, singletons, fetch_int(heap, x, i)),
        Kind::Real => create_real(heap, config, singletons, fetch_real(heap, x, i)),
        Kind::Boolean => Ok(create_bool(singletons, fetch_bool(heap, x, i))),
        Kind::Character => create_char(heap, config, singletons, fetch_char(heap, x, i)),
        Kind::Phrase | Kind::Fault | Kind::Nested => unreachable!("valence-0-only kinds handled above"),
    }
}

// ---- bulk copy ---------------------------------------------------------

/// `copy(dst, sz, src, sx, n)`: element-typed bulk copy into a slot range
/// that the caller guarantees is either fresh (`INVALID`/zeroed) or about
/// to be fully overwritten — old nested occupants are not freed here.
pub fn copy(heap: &mut Heap, dst: Handle, dst_off: usize, src: Handle, src_off: usize, n: usize) {
    if n == 0 {
        return;
    }
    match heap.kind(dst) {
        Kind::Boolean => copy_bool(heap, dst, dst_off, src, src_off, n),
        Kind::Character | Kind::Phrase | Kind::Fault => copy_bytes(heap, dst, dst_off, src, src_off, n),
        Kind::Nested => copy_nested(heap, dst, dst_off, src, src_off, n),
        Kind::Integer | Kind::Real => copy_words(heap, dst, dst_off, src, src_off, n),
    }
}

fn copy_words(heap: &mut Heap, dst: Handle, dst_off: usize, src: Handle, src_off: usize, n: usize) {
    let buf: Vec<i64> = heap.payload_words(src)[src_off..src_off + n].to_vec();
    heap.payload_words_mut(dst)[dst_off..dst_off + n].copy_from_slice(&buf);
}

/// Bit-sliced copy, msb-first within each 64-bit word, element index
/// increasing within the stream (the ordering the design fixes as
/// observable). Always goes element-by-element: a word-aligned fast path
/// is a pure optimisation the testable properties don't require.
fn copy_bool(heap: &mut Heap, dst: Handle, dst_off: usize, src: Handle, src_off: usize, n: usize) {
    let bits: Vec<bool> = (0..n).map(|k| fetch_bool(heap, src, src_off + k)).collect();
    for (k, b) in bits.into_iter().enumerate() {
        store_bool(heap, dst, dst_off + k, b);
    }
}

fn copy_bytes(heap: &mut Heap, dst: Handle, dst_off: usize, src: Handle, src_off: usize, n: usize) {
    let bytes: Vec<u8> = (0..n).map(|k| fetch_byte(heap, src, src_off + k)).collect();
    for (k, b) in bytes.into_iter().enumerate() {
        store_byte(heap, dst, dst_off + k, b);
    }
}

fn copy_nested(heap: &mut Heap, dst: Handle, dst_off: usize, src: Handle, src_off: usize, n: usize) {
    let slots: Vec<Option<Handle>> = (0..n).map(|k| fetch_nested(heap, src, src_off + k)).collect();
    for (k, slot) in slots.into_iter().enumerate() {
        if let Some(child) = slot {
            incref(heap, child);
        }
        set_nested_raw(heap, dst, dst_off + k, slot);
    }
}

// ---- implode / explode / homo_test -------------------------------------

/// Can `x` (a nested array) be imploded into a homogeneous array? True iff
/// every slot is filled with a same-kind atom.
pub fn homo_test(heap: &Heap, x: Handle) -> bool {
    if heap.kind(x) != Kind::Nested {
        return false;
    }
    let tally = heap.tally(x);
    if tally == 0 {
        return false;
    }
    let mut common_kind = None;
    for i in 0..tally {
        let Some(slot) = fetch_nested(heap, x, i) else {
            return false;
        };
        if heap.valence(slot) != 0 {
            return false;
        }
        let k = heap.kind(slot);
        if !k.is_homogeneous() {
            return false;
        }
        match common_kind {
            None => common_kind = Some(k),
            Some(k0) if k0 == k => {}
            Some(_) => return false,
        }
    }
    true
}

/// Outcome of [`implode`]: mirrors `absmach.c`'s `b_implode`, which fails
/// back to a language-level fault rather than a host error when the items
/// aren't a single common atomic kind. Building that fault means calling
/// into the atom table (C3), which sits above this module in the
/// dependency order, so the caller (normally `Runtime`) is left to turn
/// `NotHomogeneous` into a `make_fault("?conform")` atom.
pub enum ImplodeResult {
    Value(Handle),
    NotHomogeneous,
}

/// Convert a nested array of same-kind atoms into a homogeneous array of
/// `x`'s own shape.
pub fn implode(
    heap: &mut Heap,
    config: &RuntimeConfig,
    singletons: &Singletons,
    x: Handle,
) -> Result<ImplodeResult> {
    if !homo_test(heap, x) {
        return Ok(ImplodeResult::NotHomogeneous);
    }
    let tally = heap.tally(x);
    if tally == 0 {
        return Ok(ImplodeResult::Value(singletons.null));
    }
    let shape = heap.shape(x);
    let kind = heap.kind(fetch_nested(heap, x, 0).expect("homo_test guarantees filled slots"));
    let out = alloc_container(heap, config, kind, &shape)?;
    for i in 0..tally {
        let elem = fetch_nested(heap, x, i).expect("homo_test guarantees filled slots");
        match kind {
            Kind::Integer => store_int(heap, out, i, fetch_int(heap, elem, 0)),
            Kind::Real => store_real(heap, out, i, fetch_real(heap, elem, 0)),
            Kind::Boolean => store_bool(heap, out, i, fetch_bool(heap, elem, 0)),
            Kind::Character => store_char(heap, out, i, fetch_char(heap, elem, 0)),
            Kind::Phrase | Kind::Fault | Kind::Nested => {
                unreachable!("homo_test excludes non-homogeneous atom kinds")
            }
        }
    }
    Ok(ImplodeResult::Value(out))
}

/// Convert a homogeneous array into a nested array of atoms, one per
/// element, same shape.
pub fn explode(
    heap: &mut Heap,
    config: &RuntimeConfig,
    singletons: &Singletons,
    x: Handle,
) -> Result<Handle> {
    let kind = heap.kind(x);
    debug_assert!(kind.is_homogeneous(), "explode requires a homogeneous array");
    let shape = heap.shape(x);
    let tally = heap.tally(x);
    let out = alloc_container(heap, config, Kind::Nested, &shape)?;
    for i in 0..tally {
        let atom = match kind {
            Kind::Integer => create_int(heap, config, singletons, fetch_int(heap, x, i))?,
            Kind::Real => create_real(heap, config, singletons, fetch_real(heap, x, i))?,
            Kind::Boolean => create_bool(singletons, fetch_bool(heap, x, i)),
            Kind::Character => create_char(heap, config, singletons, fetch_char(heap, x, i))?,
            Kind::Phrase | Kind::Fault | Kind::Nested => unreachable!(),
        };
        store_into_slot(heap, out, i, atom);
    }
    Ok(out)
}

pub fn equal_shape(heap: &Heap, a: Handle, b: Handle) -> bool {
    heap.valence(a) == heap.valence(b) && heap.shape(a) == heap.shape(b)
}

// ---- reference counting -------------------------------------------------

pub fn incref(heap: &mut Heap, h: Handle) {
    let rc = heap.refcount(h);
    heap.set_refcount(h, rc + 1);
}

/// Decrement and return the new count. Underflow is checked only in debug
/// builds, matching the original's `DEBUG`-gated aborts — a release build
/// trusts the machine's own bookkeeping rather than paying for the check.
pub fn decref(heap: &mut Heap, h: Handle) -> u32 {
    let rc = heap.refcount(h);
    debug_assert!(rc > 0, "refcount underflow on block {:?}", h);
    let new = rc.saturating_sub(1);
    heap.set_refcount(h, new);
    new
}

/// Decrement, freeing `h` (recursively) if the count reaches zero.
pub fn freeup(heap: &mut Heap, config: &RuntimeConfig, hooks: &mut dyn AtomTableHooks, h: Handle) {
    if decref(heap, h) == 0 {
        free_array(heap, config, hooks, h);
    }
}

/// Free `h` if its refcount is zero; a no-op otherwise. Mirrors the
/// original's `freeit`, which re-checks `refcnt(x) > 0` before doing any
/// work, so it is always safe to call on a handle that might still be
/// referenced elsewhere. When it does free, nested children are decref'd
/// (and recursively freed in turn), the atom table is told to drop
/// phrase/fault entries, and the block returns to the heap. `INVALID`
/// slots are skipped, so a partially constructed array (aborted
/// mid-`create`) is always safe to free.
pub fn free_array(heap: &mut Heap, config: &RuntimeConfig, hooks: &mut dyn AtomTableHooks, h: Handle) {
    if heap.refcount(h) > 0 {
        return;
    }
    match heap.kind(h) {
        Kind::Nested => {
            let tally = heap.tally(h);
            for i in 0..tally {
                if let Some(child) = fetch_nested(heap, h, i) {
                    freeup(heap, config, hooks, child);
                }
            }
        }
        Kind::Phrase | Kind::Fault => {
            let bytes = atom_bytes(heap, h);
            hooks.on_free_atom(h, heap.kind(h), &bytes);
        }
        Kind::Boolean | Kind::Integer | Kind::Real | Kind::Character => {}
    }
    heap.release(config, h);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;

    fn bootstrap() -> (Heap, RuntimeConfig, Singletons) {
        let config = RuntimeConfig::small_for_testing();
        let mut heap = Heap::new(&config);

        let null = alloc_container(&mut heap, &config, Kind::Nested, &[0]).unwrap();
        let small_ints = (0..SMALL_INT_COUNT as i64)
            .map(|v| {
                let h = alloc_container(&mut heap, &config, Kind::Integer, &[]).unwrap();
                store_int(&mut heap, h, 0, v);
                h
            })
            .collect();
        let bool_false = alloc_container(&mut heap, &config, Kind::Boolean, &[]).unwrap();
        let bool_true = alloc_container(&mut heap, &config, Kind::Boolean, &[]).unwrap();
        store_bool(&mut heap, bool_true, 0, true);
        let zero_real = alloc_container(&mut heap, &config, Kind::Real, &[]).unwrap();
        let blank_char = alloc_container(&mut heap, &config, Kind::Character, &[]).unwrap();
        store_char(&mut heap, blank_char, 0, b' ');

        let singletons = Singletons {
            null,
            small_ints,
            bool_false,
            bool_true,
            zero_real,
            blank_char,
        };
        (heap, config, singletons)
    }

    #[test]
    fn small_int_constructor_returns_singleton() {
        let (mut heap, config, singletons) = bootstrap();
        let a = create_int(&mut heap, &config, &singletons, 5).unwrap();
        let b = create_int(&mut heap, &config, &singletons, 5).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, singletons.small_ints[5]);
    }

    #[test]
    fn valence_one_empty_collapses_to_null() {
        let (mut heap, config, singletons) = bootstrap();
        let x = create(&mut heap, &config, &singletons, Kind::Integer, &[0]).unwrap();
        assert_eq!(x, singletons.null);
    }

    #[test]
    fn nested_store_and_replace_maintain_refcounts() {
        let (mut heap, config, singletons) = bootstrap();
        let mut hooks = NoAtomHooks;
        let list = alloc_container(&mut heap, &config, Kind::Nested, &[1]).unwrap();
        let a = create_int(&mut heap, &config, &singletons, 1000).unwrap();
        let before = heap.refcount(a);
        store_into_slot(&mut heap, list, 0, a);
        assert_eq!(heap.refcount(a), before + 1);

        let b = create_int(&mut heap, &config, &singletons, 2000).unwrap();
        replace_into_slot(&mut heap, &config, &mut hooks, list, 0, b);
        assert_eq!(heap.refcount(a), before, "old occupant decremented back down");
        assert_eq!(fetch_nested(&heap, list, 0), Some(b));
    }

    #[test]
    fn boolean_bit_sliced_copy_matches_reference_pattern() {
        // 13-bit source 1011011010110 copied into an offset-3 destination
        // initially all zero; expect the 16-bit window to read
        // 0001011011010110 (msb-first within each word).
        let (mut heap, config, _singletons) = bootstrap();
        let src = alloc_container(&mut heap, &config, Kind::Boolean, &[13]).unwrap();
        let bits = "1011011010110";
        for (i, c) in bits.chars().enumerate() {
            store_bool(&mut heap, src, i, c == '1');
        }
        let dst = alloc_container(&mut heap, &config, Kind::Boolean, &[16]).unwrap();
        copy(&mut heap, dst, 3, src, 0, 13);

        let expected = "0001011011010110";
        for (i, c) in expected.chars().enumerate() {
            assert_eq!(fetch_bool(&heap, dst, i), c == '1', "bit {i} mismatch");
        }
    }

    #[test]
    fn implode_explode_round_trip_through_homo_test() {
        let (mut heap, config, singletons) = bootstrap();
        let mut hooks = NoAtomHooks;

        let ints = alloc_container(&mut heap, &config, Kind::Integer, &[3]).unwrap();
        store_int(&mut heap, ints, 0, 10);
        store_int(&mut heap, ints, 1, 20);
        store_int(&mut heap, ints, 2, 30);

        let exploded = explode(&mut heap, &config, &singletons, ints).unwrap();
        assert!(homo_test(&heap, exploded));

        let imploded = match implode(&mut heap, &config, &singletons, exploded).unwrap() {
            ImplodeResult::Value(h) => h,
            ImplodeResult::NotHomogeneous => panic!("exploded ints must re-implode cleanly"),
        };
        assert_eq!(heap.kind(imploded), Kind::Integer);
        assert_eq!(heap.tally(imploded), 3);
        for i in 0..3 {
            assert_eq!(fetch_int(&heap, imploded, i), fetch_int(&heap, ints, i));
        }

        freeup(&mut heap, &config, &mut hooks, exploded);
        freeup(&mut heap, &config, &mut hooks, imploded);
        heap.validate_invariants();
    }

    #[test]
    fn free_array_recurses_into_nested_children() {
        let (mut heap, config, singletons) = bootstrap();
        let mut hooks = NoAtomHooks;

        let child = create_int(&mut heap, &config, &singletons, 777).unwrap();
        let child_rc_before = heap.refcount(child);
        let parent = alloc_container(&mut heap, &config, Kind::Nested, &[1]).unwrap();
        store_into_slot(&mut heap, parent, 0, child);

        freeup(&mut heap, &config, &mut hooks, parent);
        assert_eq!(heap.refcount(child), child_rc_before, "child decremented back to its pre-store count");
        heap.validate_invariants();
    }
}
