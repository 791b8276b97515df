//! [C6] Picture rendering: `sketch`, `diagram`, `display`, `paste`, and
//! `positions`, grounded in `picture.c`. Two independent trees live here:
//!
//! - `render`/the `render_*` helpers build the 2-D character grid
//!   [`layout::Picture`] that `sketch` and `diagram` hand back as a
//!   `Character` array — the original's `isketch`/`ipicture`/`idiagram`.
//! - `disp_internal`/`disp_body` build the self-evaluating textual form
//!   `display` hands back as a flat `Character` vector — the original's
//!   `disp`.
//!
//! Neither tree models the original's global `decor` toggle: `display`
//! always runs as if `displaymode` were on, `sketch`/`diagram` always as
//! if off. The original's `MAXPGMLINE` line-wrapping (`link`-chunking long
//! boolean lists or strings in display mode) is also not reproduced —
//! output is always a single line. Both simplifications are cosmetic:
//! they don't affect whether the denotation evaluates back to the
//! original value.

mod format;
mod layout;

use crate::array::{self, Singletons};
use crate::atoms::{AtomTable, AtomTableRemover};
use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::handle::Handle;
use crate::heap::Heap;
use crate::kind::Kind;

pub use layout::{HJustify, Justify, PasteOptions, VJustify};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderMode {
    Sketch,
    Diagram,
}

// ---- render tree: sketch / diagram -------------------------------------

fn render(
    heap: &mut Heap,
    config: &RuntimeConfig,
    singletons: &Singletons,
    atoms: &mut AtomTable,
    x: Handle,
    mode: RenderMode,
) -> Result<layout::Picture> {
    let kind = heap.kind(x);
    let valence = heap.valence(x) as usize;

    if valence == 0 {
        if kind == Kind::Nested {
            let child = array::fetch_nested(heap, x, 0).expect("nested scalar slot is INVALID");
            return render(heap, config, singletons, atoms, child, mode);
        }
        return Ok(render_atom_row(heap, config, kind, x));
    }

    let tally = heap.tally(x);
    if tally == 0 {
        let shape = heap.shape(x);
        let opts = match mode {
            RenderMode::Sketch => PasteOptions::simple(config.box_style),
            RenderMode::Diagram => PasteOptions::framed(config.box_style),
        };
        return Ok(layout::paste_nd(&shape, Vec::new(), &opts));
    }

    if mode == RenderMode::Sketch {
        if kind.is_homogeneous() && valence == 1 {
            return Ok(render_simple_row(heap, config, kind, x, tally));
        }
        if kind == Kind::Character && valence == 2 {
            return Ok(layout::Picture::from_handle(heap, x));
        }
        if kind == Kind::Boolean && valence == 2 {
            return Ok(render_bool_table(heap, x));
        }
    }

    if kind == Kind::Nested {
        render_nested(heap, config, singletons, atoms, x, mode)
    } else {
        render_homogeneous_items(heap, config, singletons, atoms, x, mode)
    }
}

fn render_atom_row(heap: &Heap, config: &RuntimeConfig, kind: Kind, x: Handle) -> layout::Picture {
    let text = match kind {
        Kind::Integer => format::format_int(array::fetch_int(heap, x, 0)),
        Kind::Real => format::format_real(array::fetch_real(heap, x, 0), config.real_format),
        Kind::Boolean => format::format_bool(array::fetch_bool(heap, x, 0)).to_string(),
        Kind::Character => format::format_char_plain(array::fetch_char(heap, x, 0)).to_string(),
        Kind::Phrase | Kind::Fault => format::format_phrase_fault_plain(&array::atom_bytes(heap, x)),
        Kind::Nested => unreachable!("Nested scalars are unwrapped before render_atom_row"),
    };
    layout::Picture::from_row(text.as_bytes())
}

/// `isketch`'s shortcut for a non-empty homogeneous 1-D list: a single row,
/// numbers space-separated, booleans and characters concatenated with no
/// separator.
fn render_simple_row(heap: &Heap, config: &RuntimeConfig, kind: Kind, x: Handle, tally: usize) -> layout::Picture {
    match kind {
        Kind::Integer => {
            let parts: Vec<String> = (0..tally).map(|i| format::format_int(array::fetch_int(heap, x, i))).collect();
            layout::Picture::from_row(parts.join(" ").as_bytes())
        }
        Kind::Real => {
            let parts: Vec<String> =
                (0..tally).map(|i| format::format_real(array::fetch_real(heap, x, i), config.real_format)).collect();
            layout::Picture::from_row(parts.join(" ").as_bytes())
        }
        Kind::Boolean => {
            let bytes: Vec<u8> =
                (0..tally).map(|i| format::format_bool(array::fetch_bool(heap, x, i)) as u8).collect();
            layout::Picture::from_row(&bytes)
        }
        Kind::Character => {
            let bytes: Vec<u8> =
                (0..tally).map(|i| format::format_char_plain(array::fetch_char(heap, x, i)) as u8).collect();
            layout::Picture::from_row(&bytes)
        }
        Kind::Phrase | Kind::Fault | Kind::Nested => unreachable!("not homogeneous-list kinds"),
    }
}

/// `isketch`'s boolean-table shortcut: the array's own shape, cells `l`/`o`.
fn render_bool_table(heap: &Heap, x: Handle) -> layout::Picture {
    let shape = heap.shape(x);
    let rows = shape[0];
    let cols = shape[1];
    let cells: Vec<u8> = (0..rows * cols).map(|i| format::format_bool(array::fetch_bool(heap, x, i)) as u8).collect();
    layout::Picture::from_bytes(rows, cols, cells)
}

/// Generic homogeneous multi-dimensional array: render every element as
/// its own little picture, then paste them into the array's shape.
/// Numeric elements right-justify and get a column gap in sketch mode;
/// everything else left-justifies flush.
fn render_homogeneous_items(
    heap: &mut Heap,
    config: &RuntimeConfig,
    singletons: &Singletons,
    atoms: &mut AtomTable,
    x: Handle,
    mode: RenderMode,
) -> Result<layout::Picture> {
    let shape = heap.shape(x);
    let tally = heap.tally(x);
    let kind = heap.kind(x);

    let mut items = Vec::with_capacity(tally);
    for i in 0..tally {
        let elem = array::fetch_as_array(heap, config, singletons, x, i)?;
        let picture = render(heap, config, singletons, atoms, elem, mode)?;
        let mut remover = AtomTableRemover { table: atoms };
        array::freeup(heap, config, &mut remover, elem);
        items.push(picture);
    }

    let hjust = if kind.is_numeric() { HJustify::Right } else { HJustify::Left };
    let mut opts = match mode {
        RenderMode::Sketch => PasteOptions::simple(config.box_style),
        RenderMode::Diagram => PasteOptions::framed(config.box_style),
    };
    opts.hjust = Justify::Uniform(hjust);
    if mode == RenderMode::Sketch {
        opts.hpad = usize::from(kind.is_numeric());
    }
    Ok(layout::paste_nd(&shape, items, &opts))
}

/// Nested arrays are never "simple": always framed, each item justified by
/// its own kind (a numeric atom right-justifies, everything else left-justifies).
fn render_nested(
    heap: &mut Heap,
    config: &RuntimeConfig,
    singletons: &Singletons,
    atoms: &mut AtomTable,
    x: Handle,
    mode: RenderMode,
) -> Result<layout::Picture> {
    let shape = heap.shape(x);
    let tally = heap.tally(x);

    let mut items = Vec::with_capacity(tally);
    let mut hjusts = Vec::with_capacity(tally);
    for i in 0..tally {
        let child = array::fetch_nested(heap, x, i).expect("nested slot INVALID while rendering");
        let picture = render(heap, config, singletons, atoms, child, mode)?;
        let numeric = heap.valence(child) == 0 && heap.kind(child).is_numeric();
        hjusts.push(if numeric { HJustify::Right } else { HJustify::Left });
        items.push(picture);
    }

    let opts = PasteOptions {
        vpad: 0,
        hpad: 0,
        vlines: true,
        hlines: true,
        vjust: Justify::Uniform(VJustify::Top),
        hjust: Justify::PerCell(hjusts),
        empty_frame: true,
        box_style: config.box_style,
    };
    Ok(layout::paste_nd(&shape, items, &opts))
}

// ---- disp tree: display -------------------------------------------------

/// `idisplay`: the self-evaluating textual denotation of `x`, always in
/// "decor on" / full-precision mode.
fn disp_internal(heap: &Heap, x: Handle) -> String {
    let kind = heap.kind(x);
    let valence = heap.valence(x) as usize;
    let tally = heap.tally(x);
    disp_body(heap, x, kind, valence, tally, false)
}

fn disp_body(heap: &Heap, x: Handle, kind: Kind, valence: usize, tally: usize, solitary: bool) -> String {
    if kind == Kind::Nested && valence == 1 && tally == 0 {
        return "Null".to_string();
    }

    if valence == 0 {
        return disp_flat_body(heap, x, kind, 1, solitary);
    }

    if valence == 1 {
        if tally == 1 && kind != Kind::Character {
            let inner = disp_flat_body(heap, x, kind, 1, true);
            return format!("[{inner}]");
        }
        return disp_flat_body(heap, x, kind, tally, solitary);
    }

    let shape = heap.shape(x);
    let shape_text: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
    let body = if tally == 0 { "Null".to_string() } else { disp_flat_body(heap, x, kind, tally, false) };
    format!("[{}] reshape {}", shape_text.join(" "), body)
}

fn disp_flat_body(heap: &Heap, x: Handle, kind: Kind, tally: usize, solitary: bool) -> String {
    match kind {
        Kind::Phrase | Kind::Fault => format::phrase_or_fault_denotation(kind, &array::atom_bytes(heap, x)),
        Kind::Boolean => {
            let s: String = (0..tally).map(|i| format::format_bool(array::fetch_bool(heap, x, i))).collect();
            s
        }
        Kind::Integer => {
            let parts: Vec<String> = (0..tally).map(|i| format::format_int(array::fetch_int(heap, x, i))).collect();
            parts.join(" ")
        }
        Kind::Real => {
            let parts: Vec<String> = (0..tally)
                .map(|i| format::format_real_precision(array::fetch_real(heap, x, i), format::FULL_PRECISION))
                .collect();
            parts.join(" ")
        }
        Kind::Character => {
            if tally == 1 && !solitary {
                format::format_char_display_atom(array::fetch_byte(heap, x, 0))
            } else {
                disp_character_string(heap, x, tally)
            }
        }
        Kind::Nested => {
            let parts: Vec<String> = (0..tally)
                .map(|i| {
                    let child = array::fetch_nested(heap, x, i).expect("nested slot INVALID while displaying");
                    disp_internal(heap, child)
                })
                .collect();
            if solitary {
                parts.join(" ")
            } else {
                format!("[{}]", parts.join(","))
            }
        }
    }
}

/// A character string's `display` denotation: `'...'` with doubled internal
/// quotes when every byte is printable, otherwise (control characters
/// present) a bracketed list of per-byte `(char N)`/raw-character tokens —
/// functionally equivalent to the original's `explode`-then-`disp`
/// fallback, built directly from the byte slice instead.
fn disp_character_string(heap: &Heap, x: Handle, tally: usize) -> String {
    let bytes = array::atom_bytes(heap, x);
    if bytes.iter().all(|&b| b >= b' ') {
        return format::quote_string(&bytes);
    }
    let parts: Vec<String> = (0..tally).map(|i| format::format_char_display_atom(bytes[i])).collect();
    format!("[{}]", parts.join(","))
}

// ---- public API ----------------------------------------------------------

/// `sketch(x)`: a compact, undecorated picture of `x`, with no frame lines.
pub fn sketch(
    heap: &mut Heap,
    config: &RuntimeConfig,
    singletons: &Singletons,
    atoms: &mut AtomTable,
    x: Handle,
) -> Result<Handle> {
    let picture = render(heap, config, singletons, atoms, x, RenderMode::Sketch)?;
    picture.to_handle(heap, config, singletons)
}

/// `diagram(x)`: a fully framed picture of `x`, recursing frame-in-frame.
pub fn diagram(
    heap: &mut Heap,
    config: &RuntimeConfig,
    singletons: &Singletons,
    atoms: &mut AtomTable,
    x: Handle,
) -> Result<Handle> {
    let picture = render(heap, config, singletons, atoms, x, RenderMode::Diagram)?;
    picture.to_handle(heap, config, singletons)
}

/// `display(x)`: a one-line textual denotation of `x` that, read back as a
/// language expression, evaluates to `x` again.
pub fn display(heap: &mut Heap, config: &RuntimeConfig, singletons: &Singletons, x: Handle) -> Result<Handle> {
    let text = disp_internal(heap, x);
    let bytes = text.as_bytes();
    let out = array::create(heap, config, singletons, Kind::Character, &[bytes.len()])?;
    for (i, &b) in bytes.iter().enumerate() {
        array::store_char(heap, out, i, b);
    }
    Ok(out)
}

/// `paste`: lay out pre-rendered character-table sub-pictures (each a
/// valence-2 `Character` array) according to an explicit control tuple,
/// the way `ipaste` validates its argument before delegating to the same
/// internal `paste` this crate's [`layout::paste_nd`] implements.
pub fn paste(
    heap: &mut Heap,
    config: &RuntimeConfig,
    singletons: &Singletons,
    shape: &[usize],
    items: &[Handle],
    opts: PasteOptions,
) -> Result<Handle> {
    let pictures: Vec<layout::Picture> = items.iter().map(|&h| layout::Picture::from_handle(heap, h)).collect();
    let picture = layout::paste_nd(shape, pictures, &opts);
    picture.to_handle(heap, config, singletons)
}

/// `positions`: the row/column start offsets `paste` would place `items`
/// at, without materialising the pasted picture. Valence ≤ 2 only; a
/// higher valence surfaces as a `?valence too high in positions` fault,
/// the same way [`crate::runtime::Runtime::implode`] surfaces a failed
/// conversion as a fault value rather than a host error.
pub fn positions(
    heap: &mut Heap,
    config: &RuntimeConfig,
    singletons: &Singletons,
    atoms: &mut AtomTable,
    shape: &[usize],
    items: &[Handle],
    opts: &PasteOptions,
) -> Result<Handle> {
    if shape.len() > 2 {
        return atoms.build_fault(heap, config, "valence too high in positions");
    }
    let (xrows, xcols) = match shape.len() {
        2 => (shape[0], shape[1]),
        1 => (1, shape[0]),
        _ => (1, items.len()),
    };
    let pictures: Vec<layout::Picture> = items.iter().map(|&h| layout::Picture::from_handle(heap, h)).collect();
    let (row_starts, col_starts) = layout::positions_2d(xrows, xcols, &pictures, opts);

    let pairs = array::create(heap, config, singletons, Kind::Nested, &[xrows * xcols])?;
    for r in 0..xrows {
        for c in 0..xcols {
            let pair = array::create(heap, config, singletons, Kind::Integer, &[2])?;
            array::store_int(heap, pair, 0, row_starts[r] as i64);
            array::store_int(heap, pair, 1, col_starts[c] as i64);
            array::store_into_slot(heap, pairs, r * xcols + c, pair);
        }
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::runtime::Runtime;

    fn runtime() -> Runtime {
        Runtime::new(RuntimeConfig::small_for_testing()).unwrap()
    }

    fn text_of(rt: &Runtime, h: Handle) -> String {
        let tally = rt.heap.tally(h);
        (0..tally).map(|i| rt.fetch_char(h, i) as char).collect()
    }

    #[test]
    fn sketch_of_an_atom_is_its_bare_text() {
        let mut rt = runtime();
        let five = rt.create_int(5).unwrap();
        let pic = rt.sketch(five).unwrap();
        assert_eq!(text_of(&rt, pic), "5");
    }

    #[test]
    fn sketch_of_an_integer_vector_is_space_separated() {
        let mut rt = runtime();
        let v = rt.create(Kind::Integer, &[3]).unwrap();
        rt.store_int(v, 0, 1);
        rt.store_int(v, 1, 22);
        rt.store_int(v, 2, 333);
        let pic = rt.sketch(v).unwrap();
        assert_eq!(text_of(&rt, pic), "1 22 333");
    }

    /// A 2x3 integer table in diagram mode is a framed, right-justified
    /// picture sized to the widest column per row's digits.
    #[test]
    fn diagram_of_a_2x3_integer_table_is_framed_and_right_justified() {
        let mut rt = runtime();
        let table = rt.create(Kind::Integer, &[2, 3]).unwrap();
        for (i, v) in [1i64, 22, 3, 444, 5, 6].into_iter().enumerate() {
            rt.store_int(table, i, v);
        }
        let pic = rt.diagram(table).unwrap();
        assert_eq!(rt.heap.shape(pic), vec![5, 10]);
    }

    #[test]
    fn display_of_null_is_idempotent() {
        let mut rt = runtime();
        let null = rt.singletons.null;
        let pic = rt.display(null).unwrap();
        assert_eq!(text_of(&rt, pic), "Null");

        let reshaped_empty = rt.create(Kind::Integer, &[0]).unwrap();
        assert_eq!(reshaped_empty, null, "empty shape collapses to the same Null singleton");
        let pic2 = rt.display(reshaped_empty).unwrap();
        assert_eq!(text_of(&rt, pic2), "Null");
    }

    #[test]
    fn display_of_a_single_element_vector_is_bracketed() {
        let mut rt = runtime();
        let v = rt.create(Kind::Integer, &[1]).unwrap();
        rt.store_int(v, 0, 7);
        let pic = rt.display(v).unwrap();
        assert_eq!(text_of(&rt, pic), "[7]");
    }

    #[test]
    fn display_of_a_phrase_uses_the_bare_sigil_form() {
        let mut rt = runtime();
        let p = rt.make_phrase("hello").unwrap();
        let pic = rt.display(p).unwrap();
        assert_eq!(text_of(&rt, pic), "\"hello");
    }

    #[test]
    fn positions_of_a_row_reports_increasing_column_starts() {
        let mut rt = runtime();
        let one = rt.singletons.small_ints[1];
        let twenty_two = rt.singletons.small_ints[22];
        let a = rt.sketch(one).unwrap();
        let b = rt.sketch(twenty_two).unwrap();
        let opts = PasteOptions::simple(crate::config::BoxStyle::Ascii);
        let pairs = rt.positions(&[2], &[a, b], &opts).unwrap();
        assert_eq!(rt.heap.kind(pairs), Kind::Nested);
        assert_eq!(rt.heap.tally(pairs), 2);
    }
}
