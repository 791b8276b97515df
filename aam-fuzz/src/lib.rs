//! Randomized operation-sequence replay against a live [`aam::runtime::Runtime`],
//! the array-machine analogue of `wee_alloc`'s own sibling `test` crate: a
//! quickcheck `Arbitrary` sequence of allocate/nest/free/push/pop
//! operations, replayed single-threaded. Every operation is generated
//! against an index into "handles the harness currently owns", the same
//! `active_allocs`-style bookkeeping `wee_alloc_test`'s own `Operations`
//! player uses for its `Alloc`/`Free` sequence, so the harness can never
//! itself submit a use-after-free or a double-free — any panic this
//! surfaces is a genuine bookkeeping bug inside `aam`, not an artifact of
//! the fuzzer.
//!
//! `Pair` consumes its two operands (`aam`'s nested-array slots take
//! ownership of what's stored into them) rather than `incref`-ing them,
//! so the harness never needs to reason about more than one owner per
//! handle at a time.

use aam::{Handle, Kind, Runtime, RuntimeConfig};
use quickcheck::{Arbitrary, Gen};

#[derive(Debug, Clone)]
enum Operation {
    CreateInt(i64),
    CreateBool(bool),
    CreateChar(u8),
    /// Build a 2-slot nested array consuming handles at these two indices
    /// (taken modulo the live count at replay time).
    Pair(usize, usize),
    Freeup(usize),
    Push(usize),
    Pop,
}

impl Arbitrary for Operation {
    fn arbitrary(g: &mut Gen) -> Self {
        match u8::arbitrary(g) % 6 {
            0 => Operation::CreateInt(i64::arbitrary(g) % 10_000),
            1 => Operation::CreateBool(bool::arbitrary(g)),
            2 => Operation::CreateChar(u8::arbitrary(g)),
            3 => Operation::Pair(usize::arbitrary(g), usize::arbitrary(g)),
            4 => Operation::Freeup(usize::arbitrary(g)),
            _ if bool::arbitrary(g) => Operation::Push(usize::arbitrary(g)),
            _ => Operation::Pop,
        }
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        match *self {
            Operation::CreateInt(v) if v != 0 => Box::new(std::iter::once(Operation::CreateInt(0))),
            Operation::Pair(a, b) if a != 0 || b != 0 => Box::new(std::iter::once(Operation::Pair(0, 0))),
            _ => Box::new(std::iter::empty()),
        }
    }
}

/// A full sequence of operations, the unit quickcheck drives.
#[derive(Debug, Clone)]
pub struct Operations(Vec<Operation>);

#[cfg(not(feature = "long_runs"))]
const NUM_OPERATIONS: usize = 200;

#[cfg(feature = "long_runs")]
const NUM_OPERATIONS: usize = 20_000;

impl Arbitrary for Operations {
    fn arbitrary(g: &mut Gen) -> Self {
        let n = (usize::arbitrary(g) % NUM_OPERATIONS).max(1);
        Operations((0..n).map(|_| Operation::arbitrary(g)).collect())
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        let ops = self.0.clone();
        Box::new((0..ops.len()).rev().map(move |n| Operations(ops[..n].to_vec())))
    }
}

impl Operations {
    /// Replay the sequence against a fresh runtime, then release whatever
    /// the harness still owns (live handles and anything left on the
    /// stack) and drop the runtime. Never panics on a well-formed
    /// sequence unless `aam` itself mismanages a refcount.
    pub fn run(self) {
        let mut rt = Runtime::new(RuntimeConfig::small_for_testing()).unwrap();
        let mut owned: Vec<Handle> = Vec::new();
        let mut stack_depth = 0usize;

        for op in self.0 {
            match op {
                Operation::CreateInt(v) => owned.push(rt.create_int(v).unwrap()),
                Operation::CreateBool(v) => owned.push(rt.create_bool(v)),
                Operation::CreateChar(v) => owned.push(rt.create_char(v).unwrap()),
                Operation::Pair(a, b) => {
                    if owned.len() < 2 {
                        continue;
                    }
                    let ia = a % owned.len();
                    let ib = b % owned.len();
                    if ia == ib {
                        continue;
                    }
                    let (lo, hi) = if ia < ib { (ia, ib) } else { (ib, ia) };
                    let second = owned.swap_remove(hi);
                    let first = owned.swap_remove(lo);
                    let nested = rt.create(Kind::Nested, &[2]).unwrap();
                    rt.store_into_slot(nested, 0, first);
                    rt.store_into_slot(nested, 1, second);
                    owned.push(nested);
                }
                Operation::Freeup(i) => {
                    if !owned.is_empty() {
                        let h = owned.swap_remove(i % owned.len());
                        rt.freeup(h);
                    }
                }
                Operation::Push(i) => {
                    if !owned.is_empty() {
                        let h = owned[i % owned.len()];
                        if rt.push(h).is_ok() {
                            stack_depth += 1;
                        }
                    }
                }
                Operation::Pop => {
                    if stack_depth > 0 && rt.pop().is_ok() {
                        stack_depth -= 1;
                    }
                }
            }
        }

        while stack_depth > 0 {
            rt.pop().unwrap();
            stack_depth -= 1;
        }
        for h in owned {
            rt.freeup(h);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::QuickCheck;

    #[test]
    fn quickcheck_operations() {
        QuickCheck::new().tests(200).quickcheck(Operations::run as fn(Operations));
    }

    #[test]
    fn regression_pair_consumes_both_operands() {
        Operations(vec![Operation::CreateInt(1), Operation::CreateInt(2), Operation::Pair(0, 1)]).run();
    }

    #[test]
    fn regression_push_pop_empty_stack_is_a_no_op() {
        Operations(vec![Operation::Pop, Operation::Pop]).run();
    }

    #[test]
    fn regression_freeup_then_push_on_empty_owned_set_is_a_no_op() {
        Operations(vec![Operation::Freeup(0), Operation::Push(0)]).run();
    }

    #[test]
    fn regression_many_small_ints_created_and_freed() {
        let mut ops: Vec<Operation> = (0..100).map(Operation::CreateInt).collect();
        ops.extend((0..100).map(|_| Operation::Freeup(0)));
        Operations(ops).run();
    }
}
