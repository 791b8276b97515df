//! Error kinds for the abstract array machine.
//!
//! The five kinds named in the design (fatal, warning, fault, abort, eof)
//! map onto host-language constructs as follows: *fatal* and *abort* are
//! Rust panics (the former always, the latter only under
//! `debug_assertions`, matching "debug builds only"), since both mean
//! "continuing would corrupt memory" and no caller can meaningfully
//! recover from that. *Warning* and *eof* are the variants below, returned
//! through `Result`. *Fault* is not a Rust error at all — it is a language
//! value (an interned [`crate::handle::Handle`]) pushed onto the value
//! stack, exactly as the design specifies.

use crate::units::Words;

/// Recoverable conditions the evaluator can resume from after cleaning the
/// stack and heap.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Allocation failed and expansion is disabled (or expansion itself
    /// failed to find new space within policy limits).
    #[error("workspace full: could not satisfy a request for {requested:?}")]
    WorkspaceFull { requested: Words },

    /// `pop`/`top` on an empty value stack.
    #[error("value stack underflow")]
    StackUnderflow,

    /// `push` could not grow the value stack (growth disabled or capped).
    #[error("value stack overflow")]
    StackOverflow,

    /// A primitive received an argument of the wrong shape or kind.
    #[error("bad primitive argument: {0}")]
    BadArgument(String),

    /// I/O failure while reading or writing a direct-access record file.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A cooperative interrupt was observed at a loop boundary.
    #[error("interrupted")]
    Interrupt,

    /// End of file or end of record reached while decoding.
    #[error("end of file")]
    Eof,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
