//! Runtime configuration: the sizing and policy knobs the original kept as
//! compile-time constants or process globals, now fields of a value the
//! embedding evaluator constructs once at startup.

use crate::units::Words;

/// Which box-drawing glyphs [`crate::picture`] strokes frame lines with.
/// Grounded on `picture.c`'s `initboxchars`: the default set is plain ASCII
/// (`+`/`-`/`|`), the alternate set is the CP437 line-drawing codes, which
/// this crate renders as their Unicode box-drawing equivalents rather than
/// CP437 byte values, since output here is UTF-8 text, not a legacy
/// console codepage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxStyle {
    Ascii,
    Unicode,
}

/// A cooperative interrupt/cancellation hook, polled at the loop boundaries
/// named in the design (`reserve`, `release`, `expand`, codec read/write,
/// picture paste). Returning `true` aborts the in-progress operation with
/// [`crate::error::Error::Interrupt`].
pub type InterruptHook = fn() -> bool;

fn no_interrupt() -> bool {
    false
}

/// Tunable policy for [`crate::runtime::Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Initial heap size, in words.
    pub initial_heap_words: Words,
    /// Extra headroom requested on top of the immediate need when
    /// [`Heap::expand`](crate::heap::Heap::expand) runs.
    pub expand_slack: Words,
    /// Upper bound on growth expressed as a fraction of the *current* heap
    /// size (e.g. `0.20` for 20%).
    pub expand_fraction_of_current: f64,
    /// Upper bound on growth expressed as a fraction of the *initial* heap
    /// size (e.g. `0.50` for 50%).
    pub expand_fraction_of_initial: f64,
    /// If `true`, [`crate::heap::Heap::expand`] always fails except for a
    /// one-shot emergency grow, matching "allocation failure when
    /// expansion is disabled raises a recoverable error".
    pub expansion_disabled: bool,
    /// Initial number of slots in the atom table.
    pub initial_atom_table_size: usize,
    /// Initial capacity of the value stack, in slots.
    pub initial_stack_limit: usize,
    /// Number of slots the value stack grows by when it must grow linearly.
    pub stack_growth_increment: usize,
    /// Default `printf`-style format string used to render `real` scalars
    /// in pictures (`display`/`sketch`/`diagram`). Only `%g` is fully
    /// interpreted; any other format string falls back to Rust's default
    /// float rendering rather than a full printf-format parser.
    pub real_format: &'static str,
    /// Box-drawing glyph set for framed pictures.
    pub box_style: BoxStyle,
    /// When set, heap and atom-table invariants are validated after every
    /// mutating operation. Expensive; intended for debugging suspected
    /// corruption, never for production use. The opt-in analogue of the
    /// `extra_assertions` Cargo feature, but toggleable at runtime.
    pub debug_invariants: bool,
    /// Polled at long-running loop boundaries; see [`InterruptHook`].
    pub interrupt: InterruptHook,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            initial_heap_words: Words(1 << 16),
            expand_slack: Words(1024),
            expand_fraction_of_current: 0.20,
            expand_fraction_of_initial: 0.50,
            expansion_disabled: false,
            initial_atom_table_size: 211,
            initial_stack_limit: 4096,
            stack_growth_increment: 4096,
            real_format: "%g",
            box_style: BoxStyle::Ascii,
            debug_invariants: false,
            interrupt: no_interrupt,
        }
    }
}

impl RuntimeConfig {
    /// A config tuned for unit/property tests: small heap and table sizes
    /// so growth/rehash paths are exercised quickly.
    pub fn small_for_testing() -> Self {
        RuntimeConfig {
            initial_heap_words: Words(256),
            expand_slack: Words(32),
            initial_atom_table_size: 11,
            initial_stack_limit: 8,
            stack_growth_increment: 8,
            ..RuntimeConfig::default()
        }
    }
}
