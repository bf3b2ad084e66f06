use std::ffi::CStr;

use libc::{c_void, STDERR_FILENO};

/// `eputs()`... but safe (doesn't use the allocator). Writes `s` and a
/// trailing newline to stderr, ignoring short writes.
pub fn eputstr(s: &CStr) {
    let bytes = s.to_bytes();
    // SAFETY: both buffers are valid for reads of the lengths passed
    unsafe {
        libc::write(STDERR_FILENO, bytes.as_ptr() as *const c_void, bytes.len());
        libc::write(STDERR_FILENO, b"\n".as_ptr() as *const c_void, 1);
    }
}
