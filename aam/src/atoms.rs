//! [C3] The atom table: interned phrases and faults, open-addressed with
//! linear-adjustment probing.
//!
//! Grounded directly on `absmach.c`'s `createatom`/`remove_atom`/`rehash`:
//! same Aho/Sethi/Ullman shift-xor hash, same `linadj` probe step, same
//! held/vacant (here `Tombstone`/`Vacant`) bookkeeping on delete. The only
//! structural change is storage — the original table is itself a nested
//! array living inside the heap (so growth re-caches its C pointer); here
//! it is a plain `Vec<AtomSlot>` outside the heap, per the handle-arena
//! separation in the design notes. Interned *values* still live in the
//! heap as ordinary phrase/fault arrays; the table only holds handles to
//! them.

use crate::array::{self, AtomTableHooks};
use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::handle::Handle;
use crate::heap::Heap;
use crate::kind::Kind;

/// Probe step, `absmach.c`'s `linadj`. Prime, so "coprime with the table
/// size" reduces to "size is not a multiple of it".
pub const LINEAR_ADJ: u64 = 239;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AtomSlot {
    Vacant,
    Tombstone,
    Present(Handle),
}

/// The interning table for phrases and faults.
pub struct AtomTable {
    slots: Vec<AtomSlot>,
    used: usize, // occupied + tombstoned, absmach.c's atomcnt
    in_rehash: bool,
}

/// Aho/Sethi/Ullman shift-xor hash over a byte string, folded to the table
/// size. Ported bit-for-bit from `absmach.c`'s `hash`.
fn hash_bytes(bytes: &[u8], table_size: usize) -> usize {
    let mut z: u32 = 0;
    for &b in bytes {
        z = (z << 4).wrapping_add(b as u32);
        let g = z & 0xf000_0000;
        if g != 0 {
            z ^= g >> 24;
            z ^= g;
        }
    }
    (z as usize) % table_size
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Smallest size `>= minimum` coprime with [`LINEAR_ADJ`].
fn coprime_size_at_least(minimum: usize) -> usize {
    let mut candidate = minimum.max(1) as u64;
    while gcd(candidate, LINEAR_ADJ) != 1 {
        candidate += 1;
    }
    candidate as usize
}

impl AtomTable {
    pub fn new(config: &RuntimeConfig) -> AtomTable {
        let size = coprime_size_at_least(config.initial_atom_table_size);
        AtomTable {
            slots: vec![AtomSlot::Vacant; size],
            used: 0,
            in_rehash: false,
        }
    }

    fn probe_sequence(&self, start: usize) -> impl Iterator<Item = usize> + '_ {
        let size = self.slots.len() as u64;
        let adj = LINEAR_ADJ % size;
        let mut posn = start as u64;
        let mut first = true;
        std::iter::from_fn(move || {
            if !first && posn as usize == start {
                return None; // full cycle back to the start
            }
            first = false;
            let cur = posn as usize;
            posn = (posn + adj) % size;
            Some(cur)
        })
    }

    fn bytes_of(heap: &Heap, handle: Handle) -> Vec<u8> {
        array::atom_bytes(heap, handle)
    }

    /// Find an existing `(kind, bytes)` entry, or the first
    /// vacant/tombstone slot that a fresh insert should use. Returns
    /// `(found, insertion_point)`.
    fn find(&self, heap: &Heap, kind: Kind, bytes: &[u8]) -> (Option<Handle>, Option<usize>) {
        let start = hash_bytes(bytes, self.slots.len());
        let mut insertion_point = None;
        for posn in self.probe_sequence(start) {
            match self.slots[posn] {
                AtomSlot::Vacant => {
                    return (None, Some(insertion_point.unwrap_or(posn)));
                }
                AtomSlot::Tombstone => {
                    if insertion_point.is_none() {
                        insertion_point = Some(posn);
                    }
                }
                AtomSlot::Present(h) => {
                    if heap.kind(h) == kind && Self::bytes_of(heap, h) == bytes {
                        return (Some(h), None);
                    }
                }
            }
        }
        (None, insertion_point)
    }

    /// Intern a phrase or fault with the given byte string, allocating a
    /// fresh atom only if no equal one already exists.
    fn intern(
        &mut self,
        heap: &mut Heap,
        config: &RuntimeConfig,
        kind: Kind,
        bytes: &[u8],
    ) -> Result<Handle> {
        let (found, insertion_point) = self.find(heap, kind, bytes);
        if let Some(h) = found {
            array::incref(heap, h);
            return Ok(h);
        }

        let posn = insertion_point.expect(
            "system limitation: atom table is full (no vacant or tombstone slot on full probe)",
        );

        let atom = array::alloc_atom_container(heap, config, kind, bytes.len())?;
        for (i, &b) in bytes.iter().enumerate() {
            array::store_byte(heap, atom, i, b);
        }
        array::incref(heap, atom); // the table's own reference

        let was_vacant = matches!(self.slots[posn], AtomSlot::Vacant);
        self.slots[posn] = AtomSlot::Present(atom);
        if was_vacant {
            self.used += 1;
        }

        if self.used > self.slots.len() / 2 && !self.in_rehash {
            self.rehash(heap, self.slots.len() * 2);
        }

        Ok(atom)
    }

    pub fn make_phrase(&mut self, heap: &mut Heap, config: &RuntimeConfig, s: &str) -> Result<Handle> {
        self.intern(heap, config, Kind::Phrase, s.as_bytes())
    }

    pub fn make_fault(&mut self, heap: &mut Heap, config: &RuntimeConfig, s: &str) -> Result<Handle> {
        self.intern(heap, config, Kind::Fault, s.as_bytes())
    }

    /// `build_fault(msg)`: a fault whose text is `msg` prefixed with `?`.
    pub fn build_fault(&mut self, heap: &mut Heap, config: &RuntimeConfig, msg: &str) -> Result<Handle> {
        let mut text = String::with_capacity(msg.len() + 1);
        text.push('?');
        text.push_str(msg);
        self.make_fault(heap, config, &text)
    }

    fn rehash(&mut self, heap: &mut Heap, minimum_new_size: usize) {
        self.in_rehash = true;
        let new_size = coprime_size_at_least(minimum_new_size);
        log::debug!("atom table rehash: {} -> {} slots", self.slots.len(), new_size);
        let old_slots = std::mem::replace(&mut self.slots, vec![AtomSlot::Vacant; new_size]);

        for slot in old_slots {
            if let AtomSlot::Present(h) = slot {
                let start = hash_bytes(&Self::bytes_of(heap, h), new_size);
                let adj = (LINEAR_ADJ % new_size as u64) as usize;
                let mut posn = start;
                while !matches!(self.slots[posn], AtomSlot::Vacant) {
                    posn = (posn + adj) % new_size;
                }
                self.slots[posn] = AtomSlot::Present(h);
            }
        }
        // used == occupied-only now; tombstones don't survive a rehash.
        self.used = self
            .slots
            .iter()
            .filter(|s| matches!(s, AtomSlot::Present(_)))
            .count();
        self.in_rehash = false;
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Wires [`array::free_array`]'s atom-removal callback back into an
/// [`AtomTable`]. `Runtime` constructs one of these (borrowing both halves)
/// for the duration of a `freeup`/`decref` call.
pub struct AtomTableRemover<'a> {
    pub table: &'a mut AtomTable,
}

impl AtomTableHooks for AtomTableRemover<'_> {
    fn on_free_atom(&mut self, handle: Handle, _kind: Kind, bytes: &[u8]) {
        self.table.remove(bytes, handle);
    }
}

impl AtomTable {
    /// Remove `handle`'s entry, tagging the slot `Vacant` or `Tombstone`
    /// per `absmach.c`'s rule, then reclaiming any now-dead run of
    /// tombstones behind it. Called when a phrase/fault's refcount reaches
    /// zero, via [`AtomTableHooks::on_free_atom`].
    fn remove(&mut self, bytes: &[u8], handle: Handle) {
        let size = self.slots.len();
        let start = hash_bytes(bytes, size);
        let adj = (LINEAR_ADJ % size as u64) as usize;
        let posn = self
            .probe_sequence(start)
            .find(|&p| matches!(self.slots[p], AtomSlot::Present(h) if h == handle));
        let Some(posn) = posn else {
            debug_assert!(false, "atom table corruption: entry for {handle:?} not found");
            return;
        };

        let next = (posn + adj) % size;
        let new_entry = if matches!(self.slots[next], AtomSlot::Vacant) {
            AtomSlot::Vacant
        } else {
            AtomSlot::Tombstone
        };
        self.slots[posn] = new_entry;

        if new_entry == AtomSlot::Vacant {
            self.used -= 1;
            let mut back = (posn + size - adj) % size;
            while self.slots[back] == AtomSlot::Tombstone {
                self.slots[back] = AtomSlot::Vacant;
                self.used -= 1;
                back = (back + size - adj) % size;
            }
        }
    }
}
