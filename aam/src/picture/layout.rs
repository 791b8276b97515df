//! The 2-D character-grid type and the `paste`/`positions` layout kernel,
//! grounded in `picture.c`'s `paste` (lines 1002-1307) and `pospaste`
//! (lines 1310-1443): given an array of already-rendered sub-pictures and a
//! padding/frame/justification policy, lay them out into one grid.
//!
//! This port keeps the original's row/column max-extent and cumulative
//! boundary-offset structure but computes offsets with plain running
//! sums over `usize` rather than replaying the C's flat pointer/index
//! arithmetic, which depended on details of `paste`'s in-place buffer
//! layout that don't carry over to a `Vec<u8>` grid.

use crate::array;
use crate::config::BoxStyle;

/// A rectangular grid of character bytes: the in-memory form of a rendered
/// sketch/diagram/paste result, before it is written back into a heap
/// array by [`Picture::to_handle`].
#[derive(Debug, Clone)]
pub struct Picture {
    pub rows: usize,
    pub cols: usize,
    cells: Vec<u8>,
}

impl Picture {
    pub fn blank(rows: usize, cols: usize) -> Picture {
        Picture { rows, cols, cells: vec![b' '; rows * cols] }
    }

    pub fn from_row(bytes: &[u8]) -> Picture {
        Picture { rows: 1, cols: bytes.len(), cells: bytes.to_vec() }
    }

    pub fn from_bytes(rows: usize, cols: usize, cells: Vec<u8>) -> Picture {
        debug_assert_eq!(cells.len(), rows * cols);
        Picture { rows, cols, cells }
    }

    pub fn get(&self, r: usize, c: usize) -> u8 {
        self.cells[r * self.cols + c]
    }

    fn set(&mut self, r: usize, c: usize, v: u8) {
        debug_assert!(r < self.rows && c < self.cols, "paste stamp out of bounds ({r}, {c})");
        if r < self.rows && c < self.cols {
            self.cells[r * self.cols + c] = v;
        }
    }

    fn stamp(&mut self, top: usize, left: usize, src: &Picture) {
        for r in 0..src.rows {
            for c in 0..src.cols {
                self.set(top + r, left + c, src.get(r, c));
            }
        }
    }

    pub fn from_handle(heap: &crate::heap::Heap, h: crate::handle::Handle) -> Picture {
        let shape = heap.shape(h);
        let (rows, cols) = match shape.len() {
            2 => (shape[0], shape[1]),
            1 => (1, shape[0]),
            _ => (1, heap.tally(h)),
        };
        let cells = (0..rows * cols).map(|i| array::fetch_char(heap, h, i)).collect();
        Picture { rows, cols, cells }
    }

    pub fn to_handle(
        &self,
        heap: &mut crate::heap::Heap,
        config: &crate::config::RuntimeConfig,
        singletons: &array::Singletons,
    ) -> crate::error::Result<crate::handle::Handle> {
        let h = array::create(heap, config, singletons, crate::kind::Kind::Character, &[self.rows, self.cols])?;
        for (i, &b) in self.cells.iter().enumerate() {
            array::store_char(heap, h, i, b);
        }
        Ok(h)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VJustify {
    Top,
    Center,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HJustify {
    Left,
    Center,
    Right,
}

/// Either one justification for every cell, or one per cell (row-major),
/// matching the original's scalar-vs-per-item justification arguments.
#[derive(Debug, Clone)]
pub enum Justify<T> {
    Uniform(T),
    PerCell(Vec<T>),
}

impl<T: Copy> Justify<T> {
    fn at(&self, i: usize) -> T {
        match self {
            Justify::Uniform(v) => *v,
            Justify::PerCell(v) => v[i],
        }
    }
}

struct BoxChars {
    luc: u8,
    ruc: u8,
    llc: u8,
    rlc: u8,
    ut: u8,
    lt: u8,
    rt: u8,
    gt: u8,
    cro: u8,
    hor: u8,
    ver: u8,
}

/// `Character`-kind arrays are one byte per element (see [`crate::array`]'s
/// `fetch_char`/`store_char`), so a [`Picture`] cell cannot hold a
/// multi-byte Unicode box-drawing glyph. `BoxStyle::Unicode` is accepted
/// by [`crate::config::RuntimeConfig`] but this layout kernel always draws
/// the plain ASCII set; picking the CP437-derived glyphs would need a
/// wide-character picture representation this crate doesn't have.
fn box_chars(_style: BoxStyle) -> BoxChars {
    BoxChars {
        luc: b'+', ruc: b'+', llc: b'+', rlc: b'+', ut: b'+', lt: b'+', rt: b'+', gt: b'+', cro: b'+',
        hor: b'-', ver: b'|',
    }
}

/// The control tuple `ipaste` validates before calling into the layout
/// kernel: padding, frame lines, and justification policy.
#[derive(Clone)]
pub struct PasteOptions {
    pub vpad: usize,
    pub hpad: usize,
    pub vlines: bool,
    pub hlines: bool,
    pub vjust: Justify<VJustify>,
    pub hjust: Justify<HJustify>,
    /// `emptysw`: when true, an empty collection of items still renders a
    /// frame-shaped blank picture instead of a `[1, 0]` empty one.
    pub empty_frame: bool,
    pub box_style: BoxStyle,
}

impl PasteOptions {
    pub fn simple(box_style: BoxStyle) -> PasteOptions {
        PasteOptions {
            vpad: 0,
            hpad: 1,
            vlines: false,
            hlines: false,
            vjust: Justify::Uniform(VJustify::Top),
            hjust: Justify::Uniform(HJustify::Left),
            empty_frame: false,
            box_style,
        }
    }

    pub fn framed(box_style: BoxStyle) -> PasteOptions {
        PasteOptions {
            vpad: 0,
            hpad: 0,
            vlines: true,
            hlines: true,
            vjust: Justify::Uniform(VJustify::Top),
            hjust: Justify::Uniform(HJustify::Left),
            empty_frame: true,
            box_style,
        }
    }
}

struct Extents {
    row_height: Vec<usize>,
    col_width: Vec<usize>,
    /// Physical row where row-group `r` (`0..xrows`) starts; length `xrows + 1`,
    /// the last entry is the picture's total row count.
    row_offset: Vec<usize>,
    /// Physical column where column `c` starts; length `xcols + 1`.
    col_offset: Vec<usize>,
}

fn compute_extents(
    xrows: usize,
    xcols: usize,
    items: &[Picture],
    opts: &PasteOptions,
) -> Extents {
    let mut row_height = vec![0usize; xrows];
    let mut col_width = vec![0usize; xcols];
    for r in 0..xrows {
        for c in 0..xcols {
            let item = &items[r * xcols + c];
            row_height[r] = row_height[r].max(item.rows);
            col_width[c] = col_width[c].max(item.cols);
        }
    }
    if xcols == 0 {
        for h in row_height.iter_mut() {
            *h = usize::from(opts.empty_frame);
        }
    }
    if xrows == 0 {
        for w in col_width.iter_mut() {
            *w = usize::from(opts.empty_frame);
        }
    }

    let border = usize::from(opts.vlines || opts.hlines);

    let mut row_offset = vec![0usize; xrows + 1];
    row_offset[0] = border;
    for r in 0..xrows {
        let is_last = r + 1 == xrows;
        let sep = usize::from(opts.hlines || (opts.vlines && is_last));
        row_offset[r + 1] = row_offset[r] + row_height[r] + opts.vpad + sep;
    }

    let mut col_offset = vec![0usize; xcols + 1];
    col_offset[0] = border;
    for c in 0..xcols {
        let is_last = c + 1 == xcols;
        let sep = usize::from(opts.vlines || (opts.hlines && is_last));
        col_offset[c + 1] = col_offset[c] + col_width[c] + opts.hpad + sep;
    }

    Extents { row_height, col_width, row_offset, col_offset }
}

/// The 2-D base case of `paste`: `shape` is `(xrows, xcols)`, `items` is
/// the flattened row-major array of sub-pictures.
pub(super) fn paste_2d(xrows: usize, xcols: usize, items: &[Picture], opts: &PasteOptions) -> Picture {
    if (xrows == 0 || xcols == 0) && !opts.empty_frame {
        return Picture { rows: 1, cols: 0, cells: Vec::new() };
    }

    let extents = compute_extents(xrows, xcols, items, opts);
    let vesize = *extents.row_offset.last().unwrap();
    let hesize = *extents.col_offset.last().unwrap();
    let mut out = Picture::blank(vesize.max(1), hesize.max(1));

    if opts.vlines || opts.hlines {
        draw_frame(&mut out, &extents, xrows, xcols, opts);
    }

    for r in 0..xrows {
        for c in 0..xcols {
            let item = &items[r * xcols + c];
            let row_off = match opts.vjust.at(r * xcols + c) {
                VJustify::Top => 0,
                VJustify::Center => (extents.row_height[r] - item.rows) / 2,
                VJustify::Bottom => extents.row_height[r] - item.rows,
            };
            let col_off = match opts.hjust.at(r * xcols + c) {
                HJustify::Left => 0,
                HJustify::Center => (extents.col_width[c] - item.cols) / 2,
                HJustify::Right => extents.col_width[c] - item.cols,
            };
            out.stamp(extents.row_offset[r] + row_off, extents.col_offset[c] + col_off, item);
        }
    }

    out
}

/// A column boundary `b` (`0..=xcols`) sits one cell *before* where that
/// column's content starts (`col_offset[b] - 1`), not at `col_offset[b]`
/// itself — `col_offset[0] == border` (1 when framed) already accounts for
/// the left border occupying column 0, and the trailing boundary
/// `col_offset[xcols] - 1` is the rightmost column of the picture.
fn column_boundary(col_offset: &[usize], col: usize) -> Option<usize> {
    col_offset.iter().position(|&s| s == col + 1)
}

fn draw_frame(out: &mut Picture, extents: &Extents, xrows: usize, xcols: usize, opts: &PasteOptions) {
    let bc = box_chars(opts.box_style);
    let hesize = out.cols;

    // Top border.
    for col in 0..hesize {
        let ch = match column_boundary(&extents.col_offset, col) {
            Some(0) => bc.luc,
            Some(j) if j == xcols => bc.ruc,
            Some(_) => bc.ut,
            None => bc.hor,
        };
        out.set(0, col, ch);
    }

    for r in 0..xrows {
        let content_top = extents.row_offset[r];
        let content_bottom = content_top + extents.row_height[r]; // exclusive
        if opts.vlines {
            for row in content_top..content_bottom {
                for col in 0..hesize {
                    if column_boundary(&extents.col_offset, col).is_some() {
                        out.set(row, col, bc.ver);
                    }
                }
            }
        }
        let is_last = r + 1 == xrows;
        if opts.hlines || (is_last && opts.vlines) {
            let sep_row = extents.row_offset[r + 1] - 1;
            for col in 0..hesize {
                let boundary = column_boundary(&extents.col_offset, col);
                let ch = match boundary {
                    Some(0) if is_last => bc.llc,
                    Some(0) => bc.gt,
                    Some(j) if j == xcols && is_last => bc.rlc,
                    Some(j) if j == xcols => bc.rt,
                    Some(_) if is_last => bc.lt,
                    Some(_) => bc.cro,
                    None => bc.hor,
                };
                out.set(sep_row, col, ch);
            }
        }
    }
}

/// Reduce a valence>2 array one trailing axis-pair at a time: fold the
/// last two dimensions into pasted 2-D sub-pictures, then repeat on the
/// shorter shape. Row-major flattening keeps the trailing two axes
/// contiguous, so this reaches the same result as raising one axis at a
/// time without reimplementing the original's general axis-raise.
pub fn paste_nd(shape: &[usize], items: Vec<Picture>, opts: &PasteOptions) -> Picture {
    if items.is_empty() && shape.len() > 2 {
        return Picture { rows: 1, cols: 0, cells: Vec::new() };
    }
    let mut shape = shape.to_vec();
    let mut items = items;
    let mut opts = opts.clone();

    while shape.len() > 2 {
        let cols = shape.pop().unwrap();
        let rows = shape.pop().unwrap();
        let block = rows * cols;
        let outer_count = if block == 0 { 0 } else { items.len() / block };
        let mut folded = Vec::with_capacity(outer_count);
        for g in 0..outer_count {
            let slice = &items[g * block..(g + 1) * block];
            folded.push(paste_2d(rows, cols, slice, &opts));
        }
        items = folded;
        opts.vlines = false;
        opts.hlines = false;
        opts.vpad += 1;
        opts.hpad += 2;
        opts.vjust = Justify::Uniform(VJustify::Top);
        opts.hjust = Justify::Uniform(HJustify::Left);
    }

    let (xrows, xcols) = match shape.len() {
        2 => (shape[0], shape[1]),
        1 => (1, shape[0]),
        _ => (1, items.len()),
    };
    paste_2d(xrows, xcols, &items, &opts)
}

/// `pospaste`: start offsets only, valence ≤ 2. Returns
/// `(row_starts, col_starts)`.
pub fn positions_2d(
    xrows: usize,
    xcols: usize,
    items: &[Picture],
    opts: &PasteOptions,
) -> (Vec<usize>, Vec<usize>) {
    let extents = compute_extents(xrows, xcols, items, opts);
    let row_starts = extents.row_offset[..xrows].to_vec();
    let col_starts = extents.col_offset[..xcols].to_vec();
    (row_starts, col_starts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(s: &str) -> Picture {
        Picture::from_row(s.as_bytes())
    }

    #[test]
    fn paste_two_rows_one_column_no_frame() {
        let items = vec![row("ab"), row("cde")];
        let opts = PasteOptions::simple(BoxStyle::Ascii);
        let out = paste_2d(2, 1, &items, &opts);
        assert_eq!(out.rows, 2);
        assert_eq!(out.get(0, 0), b'a');
        assert_eq!(out.get(1, 0), b'c');
    }

    #[test]
    fn framed_paste_draws_box_corners() {
        let items = vec![row("1"), row("22"), row("3"), row("444"), row("5"), row("6")];
        let opts = PasteOptions::framed(BoxStyle::Ascii);
        let out = paste_2d(2, 3, &items, &opts);
        assert_eq!(out.get(0, 0), b'+', "top-left corner");
        assert_eq!(out.get(0, out.cols - 1), b'+', "top-right corner");
        assert_eq!(out.get(out.rows - 1, 0), b'+', "bottom-left corner");
    }

    #[test]
    fn right_justified_integer_table_matches_scenario() {
        // [[1,22,3],[444,5,6]], right-justified, framed: column widths
        // 3/2/1 plus a border-or-separator column at every boundary (4
        // boundaries for 3 columns) gives 5 rows x 10 cols.
        let items = vec![row("1"), row("22"), row("3"), row("444"), row("5"), row("6")];
        let opts = PasteOptions {
            hjust: Justify::Uniform(HJustify::Right),
            ..PasteOptions::framed(BoxStyle::Ascii)
        };
        let out = paste_2d(2, 3, &items, &opts);
        assert_eq!(out.rows, 5);
        assert_eq!(out.cols, 10);
        let row1: String = (0..out.cols).map(|c| out.get(1, c) as char).collect();
        let row3: String = (0..out.cols).map(|c| out.get(3, c) as char).collect();
        assert_eq!(row1, "|  1|22|3|");
        assert_eq!(row3, "|444| 5|6|");
    }
}
