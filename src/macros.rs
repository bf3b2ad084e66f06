//! Drop-in replacements for `malloc()`, `calloc()`, `realloc()` and `free()`
//! that capture the call site automatically.
//!
//! Each macro goes through the thread's default tracker, or through any
//! [`Heap`](crate::alloc::Heap) given before a `=>`:
//!
//! ```
//! use allocheck::{
//!     alloc::{Libc, Tracked},
//!     chkd_free, chkd_malloc,
//! };
//!
//! let heap = Tracked::new(Libc);
//! let ptr = chkd_malloc!(heap => 16);
//! unsafe { chkd_free!(heap => ptr) };
//! ```

/// The [`CallSite`](crate::CallSite) of the macro invocation
#[macro_export]
macro_rules! call_site {
    () => {
        $crate::CallSite::new(::core::file!(), ::core::line!())
    };
}

#[macro_export]
macro_rules! chkd_malloc {
    ($heap:expr => $size:expr) => {
        $crate::alloc::Heap::allocate(&$heap, $size, &$crate::call_site!())
    };
    ($size:expr) => {
        $crate::global::allocate($size, $crate::call_site!())
    };
}

#[macro_export]
macro_rules! chkd_calloc {
    ($heap:expr => $count:expr, $size:expr) => {
        $crate::alloc::Heap::zero_allocate(&$heap, $count, $size, &$crate::call_site!())
    };
    ($count:expr, $size:expr) => {
        $crate::global::zero_allocate($count, $size, $crate::call_site!())
    };
}

/// Must be used inside an `unsafe` block, with the same contract as
/// [`Heap::resize()`](crate::alloc::Heap::resize)
#[macro_export]
macro_rules! chkd_realloc {
    ($heap:expr => $ptr:expr, $size:expr) => {
        $crate::alloc::Heap::resize(&$heap, $ptr, $size, &$crate::call_site!())
    };
    ($ptr:expr, $size:expr) => {
        $crate::global::resize($ptr, $size, $crate::call_site!())
    };
}

/// Must be used inside an `unsafe` block, with the same contract as
/// [`Heap::release()`](crate::alloc::Heap::release)
#[macro_export]
macro_rules! chkd_free {
    ($heap:expr => $ptr:expr) => {
        $crate::alloc::Heap::release(&$heap, $ptr, &$crate::call_site!())
    };
    ($ptr:expr) => {
        $crate::global::release($ptr, $crate::call_site!())
    };
}
