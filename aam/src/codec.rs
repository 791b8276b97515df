//! [C5] The array codec: a depth-first, little-endian binary record format
//! used by direct-access record files (see [`crate::recordfile`]).
//!
//! Wire format, word = 8 little-endian bytes, no padding:
//!
//! ```text
//! record := word KIND ; word VALENCE ; word TALLY
//!         ; word * VALENCE                 -- shape
//!         ; if KIND != nested then
//!             word BYTES ; byte * BYTES    -- payload
//!           else
//!             record * TALLY               -- recursive children
//! ```
//!
//! For phrases/faults, `TALLY` is the byte length of the string (not 1),
//! and `BYTES` covers that same string. The original keeps payload bytes
//! as a raw copy of in-heap words; this codec instead goes through the
//! same typed `fetch_*`/`store_*` accessors [`crate::array`] exposes
//! everywhere else, so it never depends on how many slack words a block
//! happens to have beyond what `tally` needs.

use std::io::{ErrorKind, Read, Write};

use crate::array::{self, Singletons};
use crate::atoms::{AtomTable, AtomTableRemover};
use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::heap::Heap;
use crate::kind::Kind;

fn read_word<R: Read>(r: &mut R) -> Result<i64> {
    let mut buf = [0u8; 8];
    match r.read_exact(&mut buf) {
        Ok(()) => Ok(i64::from_le_bytes(buf)),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(Error::Eof),
        Err(e) => Err(Error::Io(e)),
    }
}

fn write_word<W: Write>(w: &mut W, v: i64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn read_exact_or_eof<R: Read>(r: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    match r.read_exact(&mut buf) {
        Ok(()) => Ok(buf),
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(Error::Eof),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Serialise `h` (and, if nested, everything it transitively holds) depth-first.
pub fn encode<W: Write>(heap: &Heap, h: Handle, w: &mut W) -> Result<()> {
    let kind = heap.kind(h);
    let valence = heap.valence(h);
    let tally = heap.tally(h);

    write_word(w, kind as i64)?;
    write_word(w, valence as i64)?;
    write_word(w, tally as i64)?;
    for dim in heap.shape(h) {
        write_word(w, dim as i64)?;
    }

    if kind == Kind::Nested {
        for i in 0..tally {
            let child =
                array::fetch_nested(heap, h, i).expect("nested array has an INVALID slot mid-encode");
            encode(heap, child, w)?;
        }
        return Ok(());
    }

    let bytes = encode_payload(heap, kind, h, tally);
    write_word(w, bytes.len() as i64)?;
    w.write_all(&bytes)?;
    Ok(())
}

fn encode_payload(heap: &Heap, kind: Kind, h: Handle, tally: usize) -> Vec<u8> {
    match kind {
        Kind::Integer => (0..tally).flat_map(|i| array::fetch_int(heap, h, i).to_le_bytes()).collect(),
        Kind::Real => (0..tally).flat_map(|i| array::fetch_real(heap, h, i).to_le_bytes()).collect(),
        Kind::Boolean => {
            let mut bytes = vec![0u8; (tally + 7) / 8];
            for i in 0..tally {
                if array::fetch_bool(heap, h, i) {
                    bytes[i / 8] |= 1 << (i % 8);
                }
            }
            bytes
        }
        Kind::Character | Kind::Phrase | Kind::Fault => {
            let mut bytes: Vec<u8> = (0..tally).map(|i| array::fetch_byte(heap, h, i)).collect();
            bytes.push(0); // NUL-terminated byte string on the wire
            bytes
        }
        Kind::Nested => unreachable!("nested payload is recursive, not a byte blob"),
    }
}

/// Deserialise one record, building fresh containers with [`array::create`]
/// (not the singleton-aware `create_int`/`create_bool`/... family — the
/// reader always goes through the generic constructor). Phrases and faults
/// are the one exception: they bypass `create` entirely and re-intern
/// through the atom table, so save/restore preserves pointer equality. A
/// short read at any point yields [`Error::Eof`]; nothing partially built
/// is ever returned to the caller.
pub fn decode<R: Read>(
    heap: &mut Heap,
    config: &RuntimeConfig,
    singletons: &Singletons,
    atoms: &mut AtomTable,
    r: &mut R,
) -> Result<Handle> {
    let kind = Kind::from_u8(read_word(r)? as u8);
    let valence = read_word(r)? as usize;
    let tally = read_word(r)? as usize;
    let mut shape = Vec::with_capacity(valence);
    for _ in 0..valence {
        shape.push(read_word(r)? as usize);
    }

    if kind == Kind::Nested {
        let out = array::create(heap, config, singletons, kind, &shape)?;
        for i in 0..tally {
            let child = match decode(heap, config, singletons, atoms, r) {
                Ok(child) => child,
                Err(e) => {
                    // A short read mid-record must not strand `out` (and
                    // whatever children it already holds) as a leaked,
                    // unreachable block — free it before propagating.
                    let mut remover = AtomTableRemover { table: atoms };
                    array::free_array(heap, config, &mut remover, out);
                    return Err(e);
                }
            };
            array::store_into_slot(heap, out, i, child);
            // The freshly decoded child starts at refcount 0 (or, for an
            // interned phrase/fault, already counts the table's own
            // reference); `store_into_slot` gives the parent its count.
            // Either way nothing here needs an extra `freeup`.
        }
        return Ok(out);
    }

    let byte_len = read_word(r)? as usize;
    let bytes = read_exact_or_eof(r, byte_len)?;

    match kind {
        Kind::Phrase => atoms.make_phrase(heap, config, &decode_string(&bytes, tally)),
        Kind::Fault => atoms.make_fault(heap, config, &decode_string(&bytes, tally)),
        Kind::Integer => {
            let out = array::create(heap, config, singletons, kind, &shape)?;
            for i in 0..tally {
                let w: [u8; 8] = bytes[i * 8..i * 8 + 8].try_into().expect("short integer payload");
                array::store_int(heap, out, i, i64::from_le_bytes(w));
            }
            Ok(out)
        }
        Kind::Real => {
            let out = array::create(heap, config, singletons, kind, &shape)?;
            for i in 0..tally {
                let w: [u8; 8] = bytes[i * 8..i * 8 + 8].try_into().expect("short real payload");
                array::store_real(heap, out, i, f64::from_le_bytes(w));
            }
            Ok(out)
        }
        Kind::Boolean => {
            let out = array::create(heap, config, singletons, kind, &shape)?;
            for i in 0..tally {
                array::store_bool(heap, out, i, (bytes[i / 8] >> (i % 8)) & 1 == 1);
            }
            Ok(out)
        }
        Kind::Character => {
            let out = array::create(heap, config, singletons, kind, &shape)?;
            for i in 0..tally {
                array::store_char(heap, out, i, bytes[i]);
            }
            Ok(out)
        }
        Kind::Nested => unreachable!("handled above"),
    }
}

fn decode_string(bytes: &[u8], tally: usize) -> String {
    String::from_utf8_lossy(&bytes[..tally]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use std::io::Cursor;

    #[test]
    fn round_trips_a_nested_array_of_mixed_kinds() {
        let mut rt = Runtime::new(RuntimeConfig::small_for_testing()).unwrap();

        let phrase = rt.make_phrase("p").unwrap();
        let forty_two = rt.create_int(42).unwrap();
        let hi = rt.create(Kind::Character, &[2]).unwrap();
        rt.store_char(hi, 0, b'h');
        rt.store_char(hi, 1, b'i');

        let x = rt.create(Kind::Nested, &[3]).unwrap();
        rt.store_into_slot(x, 0, forty_two);
        rt.store_into_slot(x, 1, hi);
        rt.store_into_slot(x, 2, phrase);

        let mut buf = Vec::new();
        encode(&rt.heap, x, &mut buf).unwrap();

        let mut cursor = Cursor::new(buf);
        let y = decode(&mut rt.heap, &rt.config, &rt.singletons, &mut rt.atoms, &mut cursor).unwrap();

        assert_eq!(rt.heap.kind(y), Kind::Nested);
        assert_eq!(rt.heap.tally(y), 3);
        let item0 = array::fetch_nested(&rt.heap, y, 0).unwrap();
        assert_eq!(rt.heap.kind(item0), Kind::Integer);
        assert_eq!(rt.fetch_int(item0, 0), 42);

        let item1 = array::fetch_nested(&rt.heap, y, 1).unwrap();
        assert_eq!(rt.fetch_char(item1, 0), b'h');
        assert_eq!(rt.fetch_char(item1, 1), b'i');

        let item2 = array::fetch_nested(&rt.heap, y, 2).unwrap();
        assert_eq!(item2, phrase, "re-interned phrase is the same reference as the original");
    }

    #[test]
    fn short_read_surfaces_as_eof() {
        let mut rt = Runtime::new(RuntimeConfig::small_for_testing()).unwrap();
        let mut cursor = Cursor::new(vec![1, 2, 3]); // far short of even one word
        let err = decode(&mut rt.heap, &rt.config, &rt.singletons, &mut rt.atoms, &mut cursor)
            .unwrap_err();
        assert!(matches!(err, Error::Eof));
    }

    #[test]
    fn truncated_nested_record_frees_its_partially_built_container() {
        let mut rt = Runtime::new(RuntimeConfig::small_for_testing()).unwrap();

        let a = rt.create_int(1).unwrap();
        let b = rt.create_int(2).unwrap();
        let nested = rt.create(Kind::Nested, &[2]).unwrap();
        rt.store_into_slot(nested, 0, a);
        rt.store_into_slot(nested, 1, b);

        let mut buf = Vec::new();
        encode(&rt.heap, nested, &mut buf).unwrap();

        // Cut off the tail of the second child's payload, so the first
        // child decodes and is stored into `out` before the second
        // child's read fails.
        let truncated = &buf[..buf.len() - 4];
        let before = rt.heap.len_words();
        let mut cursor = Cursor::new(truncated);
        let err = decode(&mut rt.heap, &rt.config, &rt.singletons, &mut rt.atoms, &mut cursor);
        assert!(matches!(err, Err(Error::Eof)));

        // The half-built container and its one stored child must be back
        // on the free list: allocating the same shape again (with
        // non-singleton values, so each slot needs a real block) must not
        // need to grow the heap.
        let reclaimed = rt.create(Kind::Nested, &[2]).unwrap();
        let c = rt.create_int(1000).unwrap();
        let d = rt.create_int(2000).unwrap();
        rt.store_into_slot(reclaimed, 0, c);
        rt.store_into_slot(reclaimed, 1, d);
        assert_eq!(rt.heap.len_words(), before, "freed blocks should be reused without growing the heap");
    }

    #[test]
    fn boolean_payload_round_trips_bit_for_bit() {
        let mut rt = Runtime::new(RuntimeConfig::small_for_testing()).unwrap();
        let bits = rt.create(Kind::Boolean, &[5]).unwrap();
        for (i, b) in [true, false, true, true, false].into_iter().enumerate() {
            rt.store_bool(bits, i, b);
        }
        let mut buf = Vec::new();
        encode(&rt.heap, bits, &mut buf).unwrap();
        let mut cursor = Cursor::new(buf);
        let back = decode(&mut rt.heap, &rt.config, &rt.singletons, &mut rt.atoms, &mut cursor).unwrap();
        for (i, expected) in [true, false, true, true, false].into_iter().enumerate() {
            assert_eq!(rt.fetch_bool(back, i), expected);
        }
    }
}
