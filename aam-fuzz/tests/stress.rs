//! Smoke-level integration entry point, separate from the quickcheck run
//! in `src/lib.rs`'s own test module, the way `wee_alloc/test` keeps a
//! `tests/global.rs` alongside its library-level quickchecks.

use aam_fuzz::Operations;
use quickcheck::QuickCheck;

#[test]
fn a_handful_of_quickcheck_rounds() {
    QuickCheck::new().tests(50).quickcheck(Operations::run as fn(Operations));
}
