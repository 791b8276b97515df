//! End-to-end scenarios, transcribed from the testable-properties list:
//! atom table uniqueness, free-list coalescing, boolean copy bit layout,
//! a codec round trip through an in-memory buffer, a framed 2x3 integer
//! diagram, and `display`'s idempotence on `Null` and an empty reshape.

use aam::array;
use aam::kind::Kind;
use aam::runtime::Runtime;
use aam::RuntimeConfig;

fn runtime() -> Runtime {
    Runtime::new(RuntimeConfig::small_for_testing()).unwrap()
}

fn text_of(rt: &Runtime, h: aam::Handle) -> String {
    let tally = rt.heap.tally(h);
    (0..tally).map(|i| rt.fetch_char(h, i) as char).collect()
}

#[test]
fn atom_table_uniqueness() {
    let mut rt = runtime();
    let p1 = rt.make_phrase("hello").unwrap();
    let p2 = rt.make_phrase("hello").unwrap();
    assert_eq!(p1, p2, "same phrase text interns to the same handle");

    let f1 = rt.make_fault("hello").unwrap();
    assert_ne!(f1, p1, "a fault and a phrase with the same text are distinct atoms");
}

#[test]
fn free_list_coalescing_after_freeing_adjacent_blocks() {
    let mut rt = runtime();
    let a = rt.create(Kind::Integer, &[100]).unwrap();
    let b = rt.create(Kind::Integer, &[100]).unwrap();
    let c = rt.create(Kind::Integer, &[100]).unwrap();

    rt.freeup(b);
    rt.freeup(a);
    rt.freeup(c);

    // The freed region should coalesce enough to satisfy an allocation
    // that wouldn't fit in any single 100-word block alone.
    let big = rt.create(Kind::Integer, &[250]);
    assert!(big.is_ok(), "adjacent frees should coalesce into one large free block");
}

#[test]
fn boolean_copy_matches_the_fixed_bit_ordering() {
    let mut rt = runtime();
    let bits = "1011011010110";
    let src = rt.create(Kind::Boolean, &[bits.len()]).unwrap();
    for (i, c) in bits.chars().enumerate() {
        rt.store_bool(src, i, c == '1');
    }

    let dst = rt.create(Kind::Boolean, &[16]).unwrap();
    for i in 0..16 {
        rt.store_bool(dst, i, false);
    }

    rt.copy(dst, 3, src, 0, bits.len());

    let expected = "0001011011010110";
    for (i, c) in expected.chars().enumerate() {
        assert_eq!(rt.fetch_bool(dst, i), c == '1', "bit {i} mismatched");
    }
}

#[test]
fn codec_round_trip_preserves_shape_values_and_phrase_identity() {
    let mut rt = runtime();
    let forty_two = rt.create_int(42).unwrap();

    let hi = rt.create(Kind::Character, &[2]).unwrap();
    rt.store_char(hi, 0, b'h');
    rt.store_char(hi, 1, b'i');

    let p = rt.make_phrase("p").unwrap();

    let nested = rt.create(Kind::Nested, &[3]).unwrap();
    rt.store_into_slot(nested, 0, forty_two);
    rt.store_into_slot(nested, 1, hi);
    rt.store_into_slot(nested, 2, p);

    let mut buf = Vec::new();
    aam::codec::encode(&rt.heap, nested, &mut buf).unwrap();

    let mut cursor = std::io::Cursor::new(buf);
    let decoded = aam::codec::decode(&mut rt.heap, &rt.config, &rt.singletons, &mut rt.atoms, &mut cursor).unwrap();

    assert_eq!(rt.heap.kind(decoded), Kind::Nested);
    assert_eq!(rt.heap.tally(decoded), 3);

    let d0 = array::fetch_nested(&rt.heap, decoded, 0).unwrap();
    assert_eq!(rt.heap.kind(d0), Kind::Integer);
    assert_eq!(rt.fetch_int(d0, 0), 42);

    let d2 = array::fetch_nested(&rt.heap, decoded, 2).unwrap();
    assert_eq!(d2, p, "decoding a phrase re-interns to the original handle");
}

#[test]
fn picture_of_a_2x3_integer_table() {
    let mut rt = runtime();
    let values = [[1, 22, 3], [444, 5, 6]];
    let table = rt.create(Kind::Integer, &[2, 3]).unwrap();
    for r in 0..2 {
        for c in 0..3 {
            rt.store_int(table, r * 3 + c, values[r][c]);
        }
    }

    let pic = rt.diagram(table).unwrap();
    let shape = rt.heap.shape(pic);
    assert_eq!(shape, vec![5, 10]);
    let cols = shape[1];

    let row1: String = (0..cols).map(|c| rt.fetch_char(pic, 1 * cols + c) as char).collect();
    let row3: String = (0..cols).map(|c| rt.fetch_char(pic, 3 * cols + c) as char).collect();
    assert_eq!(row1, "|  1|22|3|");
    assert_eq!(row3, "|444| 5|6|");
}

#[test]
fn display_of_null_is_idempotent_and_every_empty_shape_collapses_to_it() {
    // Canonical empty: any valence-1 empty construction returns the same
    // `Null` singleton regardless of the kind requested, so a freshly
    // `create`d empty integer array and the bootstrap `Null` are the same
    // handle and display identically — there is no distinct-but-empty
    // "reshape([0],[0])" value separate from `Null` in this model.
    let mut rt = runtime();
    let null = rt.singletons.null;
    let displayed = rt.display(null).unwrap();
    assert_eq!(text_of(&rt, displayed), "Null");

    let empty = rt.create(Kind::Integer, &[0]).unwrap();
    assert_eq!(empty, null);
    let displayed_empty = rt.display(empty).unwrap();
    assert_eq!(text_of(&rt, displayed_empty), "Null");
}
