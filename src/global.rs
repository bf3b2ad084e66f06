//! The default tracker: one [`Tracked<Libc>`] per thread, configured from
//! the environment the first time any thread touches it.
//!
//! The free functions here are what the `chkd_*!` macros and the C exports
//! call into. Programs that want an isolated tracker (tests, most notably)
//! should construct their own [`Tracked`] instead.

use libc::c_void;
use log::warn;
use once_cell::sync::Lazy;

use crate::{
    alloc::{Heap, Libc, Tracked},
    config::Config,
    event::CallSite,
    lifecycle::LedgerState,
};

static ENV_CONFIG: Lazy<Config> = Lazy::new(|| {
    Config::from_env().unwrap_or_else(|err| {
        warn!("{err}, using the default allocheck configuration");
        Config::DEFAULT
    })
});

thread_local! {
    static TRACKER: Tracked<Libc> = Tracked::with_config(Libc, *ENV_CONFIG);
}

/// Site handed to [`Libc`] when a call can no longer be recorded
const UNTRACKED: CallSite = CallSite::new("<untracked>", 0);

/// Run `f` against this thread's default tracker.
///
/// # Panics
///
/// - If this thread's tracker has already been destroyed, see
///   [`try_with_tracker()`]
pub fn with_tracker<R, F>(f: F) -> R
where
    F: FnOnce(&Tracked<Libc>) -> R,
{
    TRACKER.with(f)
}

/// Run `f` against this thread's default tracker, or return `None` once
/// thread-local storage is being torn down (in other thread-locals'
/// destructors, or `atexit` handlers on the main thread).
pub fn try_with_tracker<R, F>(f: F) -> Option<R>
where
    F: FnOnce(&Tracked<Libc>) -> R,
{
    TRACKER.try_with(f).ok()
}

// Past teardown the primitives still go through, they are just not recorded.

pub fn allocate(size: usize, site: CallSite) -> *mut c_void {
    try_with_tracker(|tracker| tracker.allocate_at(size, site))
        .unwrap_or_else(|| Libc.allocate(size, &UNTRACKED))
}

pub fn zero_allocate(count: usize, size: usize, site: CallSite) -> *mut c_void {
    try_with_tracker(|tracker| tracker.zero_allocate_at(count, size, site))
        .unwrap_or_else(|| Libc.zero_allocate(count, size, &UNTRACKED))
}

/// # Safety
///
/// - `ptr` must be null or a live address returned by the platform allocator
pub unsafe fn resize(ptr: *mut c_void, size: usize, site: CallSite) -> *mut c_void {
    // SAFETY: Identical contract to caller. The closure only runs if the
    // tracker is reachable, so `ptr` is handed to exactly one of the two.
    try_with_tracker(|tracker| unsafe { tracker.resize_at(ptr, size, site) })
        .unwrap_or_else(|| unsafe { Libc.resize(ptr, size, &UNTRACKED) })
}

/// # Safety
///
/// - `ptr` must be null or a live address returned by the platform allocator,
///   and must not be used again afterwards
pub unsafe fn release(ptr: *mut c_void, site: CallSite) {
    // SAFETY: As for `resize()`
    if try_with_tracker(|tracker| unsafe { tracker.release_at(ptr, site) }).is_none() {
        unsafe { Libc.release(ptr, &UNTRACKED) }
    }
}

/// Print this thread's report. Does nothing once the tracker is gone.
pub fn generate_report() {
    try_with_tracker(Tracked::generate_report);
}

pub fn list_all_events() {
    try_with_tracker(Tracked::list_all_events);
}

/// Tear down this thread's ledger. Live memory is left alone.
pub fn reset() {
    try_with_tracker(Tracked::reset);
}

/// [`LedgerState::Absent`] once the tracker itself is gone
pub fn ledger_state() -> LedgerState {
    try_with_tracker(Tracked::ledger_state).unwrap_or(LedgerState::Absent)
}
