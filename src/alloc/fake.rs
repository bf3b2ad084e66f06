//! A deterministic heap for tests. It hands out synthetic addresses and never
//! touches memory, so it can be made to fail, to return null for zero-sized
//! requests, or to reuse released addresses, on demand.

use std::cell::{Cell, RefCell};

use libc::c_void;

use super::Heap;
use crate::event::CallSite;

const BASE: usize = 0x1000;
const STRIDE: usize = 0x100;

#[derive(Debug)]
pub(crate) struct FakeHeap {
    next: Cell<usize>,
    calls: Cell<usize>,
    freed: RefCell<Vec<usize>>,
    failing: Vec<usize>,
    zero_returns_null: bool,
    reuse: bool,
}

impl FakeHeap {
    pub(crate) fn new() -> Self {
        Self {
            next: Cell::new(BASE),
            calls: Cell::new(0),
            freed: RefCell::new(Vec::new()),
            failing: Vec::new(),
            zero_returns_null: false,
            reuse: false,
        }
    }

    /// Requests for exactly `size` bytes return null
    pub(crate) fn failing(mut self, size: usize) -> Self {
        self.failing.push(size);
        self
    }

    /// Zero-sized allocations return null, and zero-sized resizes release
    /// their block and return null
    pub(crate) fn zero_returns_null(mut self) -> Self {
        self.zero_returns_null = true;
        self
    }

    /// Released addresses are handed out again, most recent first
    pub(crate) fn reusing(mut self) -> Self {
        self.reuse = true;
        self
    }

    /// Total calls made to any primitive
    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }

    fn fresh(&self, size: usize) -> *mut c_void {
        if self.failing.contains(&size) || (size == 0 && self.zero_returns_null) {
            return std::ptr::null_mut();
        }
        let reused = if self.reuse {
            self.freed.borrow_mut().pop()
        } else {
            None
        };
        let address = reused.unwrap_or_else(|| {
            let address = self.next.get();
            self.next.set(address + STRIDE);
            address
        });
        address as *mut c_void
    }

    fn forget(&self, ptr: *mut c_void) {
        if !ptr.is_null() {
            self.freed.borrow_mut().push(ptr as usize);
        }
    }
}

impl Heap for FakeHeap {
    fn allocate(&self, size: usize, _: &CallSite) -> *mut c_void {
        self.calls.set(self.calls.get() + 1);
        self.fresh(size)
    }

    fn zero_allocate(&self, count: usize, size: usize, _: &CallSite) -> *mut c_void {
        self.calls.set(self.calls.get() + 1);
        match count.checked_mul(size) {
            Some(total) => self.fresh(total),
            None => std::ptr::null_mut(),
        }
    }

    unsafe fn resize(&self, ptr: *mut c_void, size: usize, _: &CallSite) -> *mut c_void {
        self.calls.set(self.calls.get() + 1);
        if ptr.is_null() {
            return self.fresh(size);
        }
        if self.failing.contains(&size) {
            return std::ptr::null_mut();
        }
        if size == 0 && self.zero_returns_null {
            self.forget(ptr);
            return std::ptr::null_mut();
        }
        // Always move, so that every successful resize changes address
        let moved = self.fresh(size);
        self.forget(ptr);
        moved
    }

    unsafe fn release(&self, ptr: *mut c_void, _: &CallSite) {
        self.calls.set(self.calls.get() + 1);
        self.forget(ptr);
    }
}
