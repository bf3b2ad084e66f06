//! The one unrecoverable failure: the ledger's own bookkeeping cannot grow.
//!
//! By the time that happens the heap is exhausted, so nothing on this path
//! may allocate. The message goes straight to stderr and the process exits
//! with [`FATAL_EXIT_STATUS`].

use std::{ffi::CStr, process};

use crate::util::print::eputstr;

/// Exit status used when the tracker itself cannot continue
pub const FATAL_EXIT_STATUS: i32 = 72;

/// Report `reason` and terminate the process
#[cold]
pub fn die(reason: &CStr) -> ! {
    eputstr(c"allocheck encountered a fatal error:");
    eputstr(reason);
    process::exit(FATAL_EXIT_STATUS)
}

/// Copy `text` into a fresh `String`, dying instead of aborting if the heap
/// is exhausted
pub(crate) fn copy_or_die(text: &str) -> String {
    let mut copy = String::new();
    if copy.try_reserve_exact(text.len()).is_err() {
        die(c"could not copy a call site");
    }
    copy.push_str(text);
    copy
}
