//! C entry points over the thread's default tracker, for C code built
//! against `include/allocheck.h`.

use std::ffi::{c_char, c_int, CStr};

use libc::{c_void, size_t};

use crate::{event::CallSite, fatal::copy_or_die, global};

const UNKNOWN_FILE: &str = "<unknown>";

/// Copy a C call site. The file name is copied, so the caller's string only
/// has to live for the duration of the call.
///
/// # Safety
///
/// - `file_name` must be null or point to a nul-terminated string
unsafe fn call_site(file_name: *const c_char, line: c_int) -> CallSite {
    let line = u32::try_from(line).unwrap_or(0);
    if file_name.is_null() {
        return CallSite::new(UNKNOWN_FILE, line);
    }
    // SAFETY: requirement passed to caller
    let file_name = unsafe { CStr::from_ptr(file_name) };
    let file_name = match file_name.to_str() {
        Ok(file_name) => copy_or_die(file_name),
        Err(_) => file_name.to_string_lossy().into_owned(),
    };
    CallSite::owned(file_name, line)
}

/// # Safety
///
/// - `file_name` must be null or a nul-terminated string
#[no_mangle]
pub unsafe extern "C" fn checked_malloc(
    size: size_t,
    file_name: *const c_char,
    line: c_int,
) -> *mut c_void {
    global::allocate(size, unsafe { call_site(file_name, line) })
}

/// # Safety
///
/// - `file_name` must be null or a nul-terminated string
#[no_mangle]
pub unsafe extern "C" fn checked_calloc(
    nitems: size_t,
    size: size_t,
    file_name: *const c_char,
    line: c_int,
) -> *mut c_void {
    global::zero_allocate(nitems, size, unsafe { call_site(file_name, line) })
}

/// # Safety
///
/// - `ptr` must be null or a live pointer from the platform allocator
/// - `file_name` must be null or a nul-terminated string
#[no_mangle]
pub unsafe extern "C" fn checked_realloc(
    ptr: *mut c_void,
    size: size_t,
    file_name: *const c_char,
    line: c_int,
) -> *mut c_void {
    unsafe { global::resize(ptr, size, call_site(file_name, line)) }
}

/// # Safety
///
/// - `ptr` must be null or a live pointer from the platform allocator
/// - `file_name` must be null or a nul-terminated string
#[no_mangle]
pub unsafe extern "C" fn checked_free(ptr: *mut c_void, file_name: *const c_char, line: c_int) {
    unsafe { global::release(ptr, call_site(file_name, line)) }
}

#[no_mangle]
pub extern "C" fn report_alloc_checks() {
    global::generate_report()
}

#[no_mangle]
pub extern "C" fn list_alloc_checks() {
    global::list_all_events()
}

#[no_mangle]
pub extern "C" fn cleanup_alloc_checks() {
    global::reset()
}
