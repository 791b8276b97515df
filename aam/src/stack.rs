//! [C4] The value stack: a growable stack of array references used by the
//! evaluator, with refcount-maintaining push/pop.
//!
//! The original keeps this stack itself as a nested array inside the heap,
//! so its C pointer needs re-caching on every growth. Here it's a plain
//! `Vec<Option<Handle>>` outside the heap, consistent with the same
//! handle-arena separation [`crate::atoms::AtomTable`] uses — `Handle` is
//! immune to the heap's own growth, so nothing needs re-derivation.

use crate::array::{self, AtomTableHooks};
use crate::config::RuntimeConfig;
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::heap::Heap;
use crate::kind::Kind;

pub struct ValueStack {
    slots: Vec<Option<Handle>>,
    top: usize,
    growth_increment: usize,
}

impl ValueStack {
    pub fn new(config: &RuntimeConfig) -> ValueStack {
        ValueStack {
            slots: vec![None; config.initial_stack_limit],
            top: 0,
            growth_increment: config.stack_growth_increment,
        }
    }

    pub fn len(&self) -> usize {
        self.top
    }

    pub fn is_empty(&self) -> bool {
        self.top == 0
    }

    fn grow(&mut self) {
        let new_len = self.slots.len() + self.growth_increment.max(1);
        self.slots.resize(new_len, None);
    }

    /// Push `value`, incrementing its refcount — the stack now owns one
    /// count. Grows the backing store linearly if full.
    pub fn push(&mut self, heap: &mut Heap, value: Handle) -> Result<()> {
        if self.top == self.slots.len() {
            self.grow();
        }
        if self.top >= self.slots.len() {
            return Err(Error::StackOverflow);
        }
        array::incref(heap, value);
        self.slots[self.top] = Some(value);
        self.top += 1;
        Ok(())
    }

    /// Pop the top value, releasing the stack's own count on it (mirroring
    /// the original's `apop`, which calls `decrrefcnt` before returning).
    /// The caller receives the handle but no count of their own — if they
    /// want to keep it alive past their next allocation, they must
    /// `incref` it themselves. The slot is cleared back to `INVALID`.
    pub fn pop(&mut self, heap: &mut Heap) -> Result<Handle> {
        if self.top == 0 {
            return Err(Error::StackUnderflow);
        }
        self.top -= 1;
        let h = self.slots[self.top].take().ok_or(Error::StackUnderflow)?;
        array::decref(heap, h);
        Ok(h)
    }

    /// Peek the top value without popping.
    pub fn top(&self) -> Result<Handle> {
        if self.top == 0 {
            return Err(Error::StackUnderflow);
        }
        self.slots[self.top - 1].ok_or(Error::StackUnderflow)
    }

    /// Swap the top two values in place.
    pub fn swap(&mut self) -> Result<()> {
        if self.top < 2 {
            return Err(Error::StackUnderflow);
        }
        self.slots.swap(self.top - 1, self.top - 2);
        Ok(())
    }

    /// Pop `n` values and build a 1-D array from them: homogeneous if
    /// every popped value shares a kind and is an atom, else nested.
    /// Pushes the result.
    pub fn make_list(
        &mut self,
        heap: &mut Heap,
        config: &RuntimeConfig,
        singletons: &array::Singletons,
        n: usize,
    ) -> Result<()> {
        let mut popped = Vec::with_capacity(n);
        for _ in 0..n {
            popped.push(self.pop(heap)?);
        }
        popped.reverse(); // restore original push order

        let homogeneous_kind = popped.first().and_then(|&first| {
            let kind = heap.kind(first);
            let uniform = kind.is_homogeneous()
                && popped.iter().all(|&h| heap.valence(h) == 0 && heap.kind(h) == kind);
            uniform.then_some(kind)
        });

        let result = if let Some(kind) = homogeneous_kind {
            let out = array::alloc_container(heap, config, kind, &[n])?;
            for (i, h) in popped.iter().enumerate() {
                match kind {
                    Kind::Integer => array::store_int(heap, out, i, array::fetch_int(heap, *h, 0)),
                    Kind::Real => array::store_real(heap, out, i, array::fetch_real(heap, *h, 0)),
                    Kind::Boolean => array::store_bool(heap, out, i, array::fetch_bool(heap, *h, 0)),
                    Kind::Character => array::store_char(heap, out, i, array::fetch_char(heap, *h, 0)),
                    Kind::Phrase | Kind::Fault | Kind::Nested => unreachable!(),
                }
            }
            // Values were copied element-by-element, not adopted by
            // reference: `pop` already released the stack's own count, so
            // each temporary is freed now if nothing else still holds it.
            let mut hooks = array::NoAtomHooks;
            for h in popped {
                array::free_array(heap, config, &mut hooks, h);
            }
            out
        } else if n == 0 {
            singletons.null
        } else {
            // `store_into_slot` takes its own fresh increment per child, so
            // the nested array is now the sole new owner of the count
            // `pop` released — nothing further to free here.
            let out = array::alloc_container(heap, config, Kind::Nested, &[n])?;
            for (i, h) in popped.iter().enumerate() {
                array::store_into_slot(heap, out, i, *h);
            }
            out
        };

        self.push(heap, result)
    }

    /// Pop and free every value until the stack is empty.
    pub fn clear_stack(&mut self, heap: &mut Heap, config: &RuntimeConfig, hooks: &mut dyn AtomTableHooks) {
        while self.top > 0 {
            self.top -= 1;
            if let Some(h) = self.slots[self.top].take() {
                array::freeup(heap, config, hooks, h);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::NoAtomHooks;

    fn bootstrap() -> (Heap, RuntimeConfig, array::Singletons, ValueStack) {
        let config = RuntimeConfig::small_for_testing();
        let mut heap = Heap::new(&config);
        let null = array::alloc_container(&mut heap, &config, Kind::Nested, &[0]).unwrap();
        let singletons = array::Singletons {
            null,
            small_ints: vec![],
            bool_false: array::alloc_container(&mut heap, &config, Kind::Boolean, &[]).unwrap(),
            bool_true: array::alloc_container(&mut heap, &config, Kind::Boolean, &[]).unwrap(),
            zero_real: array::alloc_container(&mut heap, &config, Kind::Real, &[]).unwrap(),
            blank_char: array::alloc_container(&mut heap, &config, Kind::Character, &[]).unwrap(),
        };
        let stack = ValueStack::new(&config);
        (heap, config, singletons, stack)
    }

    #[test]
    fn push_pop_round_trips_and_balances_refcount() {
        let (mut heap, config, singletons, mut stack) = bootstrap();
        let a = array::create_int(&mut heap, &config, &singletons, 999).unwrap();
        let before = heap.refcount(a);
        stack.push(&mut heap, a).unwrap();
        assert_eq!(heap.refcount(a), before + 1);
        let popped = stack.pop(&mut heap).unwrap();
        assert_eq!(popped, a);
        assert_eq!(heap.refcount(a), before, "push+pop nets to no refcount change");
    }

    #[test]
    fn pop_from_empty_stack_underflows() {
        let (mut heap, _config, _singletons, mut stack) = bootstrap();
        assert!(matches!(stack.pop(&mut heap), Err(Error::StackUnderflow)));
    }

    #[test]
    fn growth_preserves_existing_entries() {
        let (mut heap, config, singletons, mut stack) = bootstrap();
        let limit = config.initial_stack_limit;
        let mut pushed = Vec::new();
        for i in 0..(limit + 3) {
            let h = array::create_int(&mut heap, &config, &singletons, 10_000 + i as i64).unwrap();
            stack.push(&mut heap, h).unwrap();
            pushed.push(h);
        }
        for expected in pushed.into_iter().rev() {
            assert_eq!(stack.pop(&mut heap).unwrap(), expected);
        }
    }

    #[test]
    fn make_list_builds_homogeneous_array_when_possible() {
        let (mut heap, config, singletons, mut stack) = bootstrap();
        for v in [1i64, 2, 3] {
            let h = array::create_int(&mut heap, &config, &singletons, v).unwrap();
            stack.push(&mut heap, h).unwrap();
        }
        stack.make_list(&mut heap, &config, &singletons, 3).unwrap();
        let list = stack.pop(&mut heap).unwrap();
        assert_eq!(heap.kind(list), Kind::Integer);
        assert_eq!(heap.tally(list), 3);
        for i in 0..3 {
            assert_eq!(array::fetch_int(&heap, list, i), i as i64 + 1);
        }
        // `pop` already released the stack's count, bringing it to zero.
        let mut hooks = NoAtomHooks;
        array::free_array(&mut heap, &config, &mut hooks, list);
        heap.validate_invariants();
    }
}
