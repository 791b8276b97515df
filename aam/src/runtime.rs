//! The top-level [`Runtime`]: the single process-wide value the design
//! notes ask for, owning the heap, atom table, value stack, and
//! singletons, and exposing the consumer-facing array-machine API.
//!
//! Every other module in this crate is happy to work with a bare `&mut
//! Heap`/`&mut AtomTable` pair plus loose `Singletons`/`RuntimeConfig`
//! references — that's what makes each of them independently testable.
//! `Runtime` just owns one of each and forwards.

use crate::array::{self, ImplodeResult, Singletons};
use crate::atoms::{AtomTable, AtomTableRemover};
use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::handle::Handle;
use crate::heap::Heap;
use crate::kind::Kind;
use crate::stack::ValueStack;

pub struct Runtime {
    pub heap: Heap,
    pub config: RuntimeConfig,
    pub atoms: AtomTable,
    pub stack: ValueStack,
    pub singletons: Singletons,
}

impl Runtime {
    /// Bootstrap a fresh runtime: build the heap, then the singletons
    /// `create`/`create_*` will return from then on, by calling
    /// [`array::alloc_container`] directly (the only callers ever allowed
    /// to bypass the singleton check, since the singletons don't exist
    /// yet). Each singleton's refcount is set to 1, a permanent baseline
    /// the runtime itself holds — ordinary balanced incref/decref traffic
    /// (stack push/pop, slot store/replace) never drives a singleton back
    /// to zero, so it is never mistakenly freed.
    pub fn new(config: RuntimeConfig) -> Result<Runtime> {
        let mut heap = Heap::new(&config);

        let null = array::alloc_container(&mut heap, &config, Kind::Nested, &[0])?;
        heap.set_refcount(null, 1);

        let mut small_ints = Vec::with_capacity(array::SMALL_INT_COUNT);
        for value in 0..array::SMALL_INT_COUNT as i64 {
            let h = array::alloc_container(&mut heap, &config, Kind::Integer, &[])?;
            array::store_int(&mut heap, h, 0, value);
            heap.set_refcount(h, 1);
            small_ints.push(h);
        }

        let bool_false = array::alloc_container(&mut heap, &config, Kind::Boolean, &[])?;
        array::store_bool(&mut heap, bool_false, 0, false);
        heap.set_refcount(bool_false, 1);

        let bool_true = array::alloc_container(&mut heap, &config, Kind::Boolean, &[])?;
        array::store_bool(&mut heap, bool_true, 0, true);
        heap.set_refcount(bool_true, 1);

        let zero_real = array::alloc_container(&mut heap, &config, Kind::Real, &[])?;
        array::store_real(&mut heap, zero_real, 0, 0.0);
        heap.set_refcount(zero_real, 1);

        let blank_char = array::alloc_container(&mut heap, &config, Kind::Character, &[])?;
        array::store_char(&mut heap, blank_char, 0, b' ');
        heap.set_refcount(blank_char, 1);

        let singletons = Singletons { null, small_ints, bool_false, bool_true, zero_real, blank_char };
        let stack = ValueStack::new(&config);
        let atoms = AtomTable::new(&config);

        Ok(Runtime { heap, config, atoms, stack, singletons })
    }

    // ---- allocation ----------------------------------------------------

    pub fn create(&mut self, kind: Kind, shape: &[usize]) -> Result<Handle> {
        array::create(&mut self.heap, &self.config, &self.singletons, kind, shape)
    }

    pub fn create_int(&mut self, value: i64) -> Result<Handle> {
        array::create_int(&mut self.heap, &self.config, &self.singletons, value)
    }

    pub fn create_bool(&mut self, value: bool) -> Handle {
        array::create_bool(&self.singletons, value)
    }

    pub fn create_real(&mut self, value: f64) -> Result<Handle> {
        array::create_real(&mut self.heap, &self.config, &self.singletons, value)
    }

    pub fn create_char(&mut self, value: u8) -> Result<Handle> {
        array::create_char(&mut self.heap, &self.config, &self.singletons, value)
    }

    // ---- element access --------------------------------------------------

    pub fn fetch_int(&self, h: Handle, i: usize) -> i64 {
        array::fetch_int(&self.heap, h, i)
    }

    pub fn store_int(&mut self, h: Handle, i: usize, value: i64) {
        array::store_int(&mut self.heap, h, i, value)
    }

    pub fn fetch_real(&self, h: Handle, i: usize) -> f64 {
        array::fetch_real(&self.heap, h, i)
    }

    pub fn store_real(&mut self, h: Handle, i: usize, value: f64) {
        array::store_real(&mut self.heap, h, i, value)
    }

    pub fn fetch_bool(&self, h: Handle, i: usize) -> bool {
        array::fetch_bool(&self.heap, h, i)
    }

    pub fn store_bool(&mut self, h: Handle, i: usize, value: bool) {
        array::store_bool(&mut self.heap, h, i, value)
    }

    pub fn fetch_char(&self, h: Handle, i: usize) -> u8 {
        array::fetch_char(&self.heap, h, i)
    }

    pub fn store_char(&mut self, h: Handle, i: usize, value: u8) {
        array::store_char(&mut self.heap, h, i, value)
    }

    pub fn fetch_as_array(&mut self, x: Handle, i: usize) -> Result<Handle> {
        array::fetch_as_array(&mut self.heap, &self.config, &self.singletons, x, i)
    }

    /// Store into a known-`INVALID` nested slot. Named
    /// [`array::store_into_slot`] here since it writes, it doesn't fetch.
    pub fn store_into_slot(&mut self, h: Handle, i: usize, value: Handle) {
        array::store_into_slot(&mut self.heap, h, i, value)
    }

    pub fn replace_into_slot(&mut self, h: Handle, i: usize, value: Handle) {
        let mut remover = AtomTableRemover { table: &mut self.atoms };
        array::replace_into_slot(&mut self.heap, &self.config, &mut remover, h, i, value)
    }

    pub fn copy(&mut self, dst: Handle, dst_off: usize, src: Handle, src_off: usize, n: usize) {
        array::copy(&mut self.heap, dst, dst_off, src, src_off, n)
    }

    // ---- reference counting ----------------------------------------------

    pub fn incref(&mut self, h: Handle) {
        array::incref(&mut self.heap, h)
    }

    pub fn decref(&mut self, h: Handle) -> u32 {
        array::decref(&mut self.heap, h)
    }

    pub fn freeup(&mut self, h: Handle) {
        let mut remover = AtomTableRemover { table: &mut self.atoms };
        array::freeup(&mut self.heap, &self.config, &mut remover, h)
    }

    // ---- stack -------------------------------------------------------

    pub fn push(&mut self, value: Handle) -> Result<()> {
        self.stack.push(&mut self.heap, value)
    }

    pub fn pop(&mut self) -> Result<Handle> {
        self.stack.pop(&mut self.heap)
    }

    pub fn top(&self) -> Result<Handle> {
        self.stack.top()
    }

    pub fn swap(&mut self) -> Result<()> {
        self.stack.swap()
    }

    pub fn make_list(&mut self, n: usize) -> Result<()> {
        self.stack.make_list(&mut self.heap, &self.config, &self.singletons, n)
    }

    pub fn clear_stack(&mut self) {
        let mut remover = AtomTableRemover { table: &mut self.atoms };
        self.stack.clear_stack(&mut self.heap, &self.config, &mut remover)
    }

    // ---- atom table ----------------------------------------------------

    pub fn make_phrase(&mut self, s: &str) -> Result<Handle> {
        self.atoms.make_phrase(&mut self.heap, &self.config, s)
    }

    pub fn make_fault(&mut self, s: &str) -> Result<Handle> {
        self.atoms.make_fault(&mut self.heap, &self.config, s)
    }

    pub fn build_fault(&mut self, msg: &str) -> Result<Handle> {
        self.atoms.build_fault(&mut self.heap, &self.config, msg)
    }

    // ---- utility -----------------------------------------------------

    pub fn equal_shape(&self, a: Handle, b: Handle) -> bool {
        array::equal_shape(&self.heap, a, b)
    }

    pub fn homo_test(&self, x: Handle) -> bool {
        array::homo_test(&self.heap, x)
    }

    /// `implode(x)`: on success, a fresh homogeneous array of `x`'s shape.
    /// When `x` isn't homogeneous-able (mixed kinds can't implode), the
    /// language-level surfacing is a `?conform` fault pushed through the
    /// same interning path `make_fault` uses, not a Rust `Err`.
    pub fn implode(&mut self, x: Handle) -> Result<Handle> {
        match array::implode(&mut self.heap, &self.config, &self.singletons, x)? {
            ImplodeResult::Value(h) => Ok(h),
            ImplodeResult::NotHomogeneous => self.build_fault("conform"),
        }
    }

    pub fn explode(&mut self, x: Handle) -> Result<Handle> {
        array::explode(&mut self.heap, &self.config, &self.singletons, x)
    }

    // ---- pictures ------------------------------------------------------

    pub fn sketch(&mut self, x: Handle) -> Result<Handle> {
        crate::picture::sketch(&mut self.heap, &self.config, &self.singletons, &mut self.atoms, x)
    }

    pub fn diagram(&mut self, x: Handle) -> Result<Handle> {
        crate::picture::diagram(&mut self.heap, &self.config, &self.singletons, &mut self.atoms, x)
    }

    pub fn display(&mut self, x: Handle) -> Result<Handle> {
        crate::picture::display(&mut self.heap, &self.config, &self.singletons, x)
    }

    pub fn paste(
        &mut self,
        shape: &[usize],
        items: &[Handle],
        opts: crate::picture::PasteOptions,
    ) -> Result<Handle> {
        crate::picture::paste(&mut self.heap, &self.config, &self.singletons, shape, items, opts)
    }

    pub fn positions(
        &mut self,
        shape: &[usize],
        items: &[Handle],
        opts: &crate::picture::PasteOptions,
    ) -> Result<Handle> {
        crate::picture::positions(&mut self.heap, &self.config, &self.singletons, &mut self.atoms, shape, items, opts)
    }
}
