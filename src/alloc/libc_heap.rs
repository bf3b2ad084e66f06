use libc::c_void;

use super::Heap;
use crate::event::CallSite;

/// A pass-through to the platform `malloc()` family. Call sites are ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct Libc;

impl Heap for Libc {
    fn allocate(&self, size: usize, _: &CallSite) -> *mut c_void {
        // SAFETY: `malloc()` accepts any size, including zero
        unsafe { libc::malloc(size) }
    }

    fn zero_allocate(&self, count: usize, size: usize, _: &CallSite) -> *mut c_void {
        // SAFETY: `calloc()` accepts any arguments and reports overflow by
        // returning null
        unsafe { libc::calloc(count, size) }
    }

    unsafe fn resize(&self, ptr: *mut c_void, size: usize, _: &CallSite) -> *mut c_void {
        // SAFETY: Identical contract to caller
        unsafe { libc::realloc(ptr, size) }
    }

    unsafe fn release(&self, ptr: *mut c_void, _: &CallSite) {
        // SAFETY: Identical contract to caller
        unsafe { libc::free(ptr) }
    }
}
