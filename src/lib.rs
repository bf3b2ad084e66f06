//! A call-site-attributing allocation tracker.
//!
//! Every call through a [`Tracked`](alloc::Tracked) heap (or the `chkd_*!`
//! macros, or the C exports) is recorded as an [`Event`] in a
//! [`Ledger`](ledger::Ledger), which follows each logical block across
//! reallocations. A [`Report`](report::Report) then picks out leaks,
//! zero-sized requests, failed allocations, null arguments, unknown
//! addresses and repeated frees.
//!
//! Single-threaded by design: every tracker, including the default one in
//! [`global`], belongs to exactly one thread.

#[macro_use]
mod macros;

pub mod alloc;
pub mod config;
pub mod event;
pub mod externc;
pub mod fatal;
pub mod global;
pub mod ledger;
pub mod lifecycle;
pub mod report;
pub mod util;

pub use alloc::{Heap, Libc, Tracked};
pub use config::{ColorChoice, Config, ConfigError};
pub use event::{CallSite, Event, EventKind};
pub use ledger::{BlockId, Ledger};
pub use report::Report;
