//! The allocator interface and its implementations.
//!
//! [`Heap`] mirrors the four C heap primitives. [`Libc`] passes straight
//! through to the platform allocator; [`Tracked`] wraps any other [`Heap`]
//! and records every call into a ledger, returning exactly what the wrapped
//! heap returned. Opting into tracking is a matter of picking the decorator.

use libc::c_void;

use crate::event::CallSite;

#[cfg(test)]
pub(crate) mod fake;
pub mod libc_heap;
pub mod tracked;

pub use libc_heap::Libc;
pub use tracked::Tracked;

/// The four canonical heap primitives, each told where it was called from.
/// Implementations that don't care about call sites are free to ignore them.
pub trait Heap {
    /// `malloc()`. Returns null on failure; a zero-sized request may return
    /// either null or a unique address.
    fn allocate(&self, size: usize, site: &CallSite) -> *mut c_void;

    /// `calloc()`: `count * size` zeroed bytes, null on failure (including
    /// when the product overflows)
    fn zero_allocate(&self, count: usize, size: usize, site: &CallSite) -> *mut c_void;

    /// `realloc()`. A null `ptr` behaves like [`Heap::allocate()`]. On
    /// failure null is returned and `ptr` is left untouched.
    ///
    /// # Safety
    ///
    /// - `ptr` must be null or a live address returned by this heap
    unsafe fn resize(&self, ptr: *mut c_void, size: usize, site: &CallSite) -> *mut c_void;

    /// `free()`. Releasing null does nothing.
    ///
    /// # Safety
    ///
    /// - `ptr` must be null or a live address returned by this heap, and must
    ///   not be used again afterwards
    unsafe fn release(&self, ptr: *mut c_void, site: &CallSite);
}

/// A nullable pointer as a ledger address
pub(crate) fn address_of(ptr: *mut c_void) -> Option<usize> {
    (!ptr.is_null()).then_some(ptr as usize)
}
