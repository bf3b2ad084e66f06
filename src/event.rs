//! A single recorded call into one of the four heap primitives.

use std::{borrow::Cow, fmt, panic::Location};

use crate::{
    fatal::copy_or_die,
    ledger::BlockId,
    util::format::{format_address, format_site, format_size},
};

/// Where a call was made from. Always supplied by the calling code, either
/// through [`call_site!()`](crate::call_site) or [`CallSite::caller()`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallSite {
    file: Cow<'static, str>,
    line: u32,
}

impl CallSite {
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self {
            file: Cow::Borrowed(file),
            line,
        }
    }

    /// A call site whose file name does not live for `'static`, e.g. one
    /// handed to us over the C ABI
    pub fn owned(file: String, line: u32) -> Self {
        Self {
            file: Cow::Owned(file),
            line,
        }
    }

    /// The location of whoever called the (`#[track_caller]`) function this
    /// is invoked from
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self::new(location.file(), location.line())
    }

    /// Like `clone()`, but an owned file name is copied through
    /// [`copy_or_die`](crate::fatal::copy_or_die)
    pub(crate) fn duplicate(&self) -> Self {
        match &self.file {
            Cow::Borrowed(file) => Self::new(*file, self.line),
            Cow::Owned(file) => Self::owned(copy_or_die(file), self.line),
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub const fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_site(&self.file, self.line))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Allocate,
    ZeroAllocate,
    Resize,
    Release,
}

impl EventKind {
    /// The name of the C primitive this kind stands in for
    pub const fn label(self) -> &'static str {
        match self {
            Self::Allocate => "MALLOC",
            Self::ZeroAllocate => "CALLOC",
            Self::Resize => "REALLOC",
            Self::Release => "FREE",
        }
    }

    /// `true` for the two kinds that can introduce a new block
    pub const fn is_allocation(self) -> bool {
        matches!(self, Self::Allocate | Self::ZeroAllocate)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// An immutable record of one call. Only the [`Ledger`](crate::ledger::Ledger)
/// constructs these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub(crate) seq: u64,
    pub(crate) kind: EventKind,
    pub(crate) block: BlockId,
    pub(crate) previous: Option<usize>,
    pub(crate) address: Option<usize>,
    pub(crate) size: usize,
    pub(crate) site: CallSite,
}

impl Event {
    /// Position of this event among every event the ledger has seen
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    /// The block this event was filed under, [`BlockId::NONE`] for bucket 0
    pub const fn block(&self) -> BlockId {
        self.block
    }

    /// The address passed in to a resize or release. Always `None` for
    /// allocations.
    pub const fn previous_address(&self) -> Option<usize> {
        self.previous
    }

    /// The address handed back by an allocation or resize. Always `None` for
    /// releases.
    pub const fn new_address(&self) -> Option<usize> {
        self.address
    }

    /// Requested size in bytes. For zero-initialized allocations this is
    /// `count * size`, saturated at `usize::MAX`.
    pub const fn requested_size(&self) -> usize {
        self.size
    }

    pub const fn site(&self) -> &CallSite {
        &self.site
    }

    /// An allocation or resize asking for zero bytes, whatever it returned
    pub fn is_zero_sized(&self) -> bool {
        self.kind != EventKind::Release && self.size == 0
    }

    /// A non-zero allocation or resize that handed back null
    pub fn is_failed(&self) -> bool {
        self.kind != EventKind::Release && self.size > 0 && self.address.is_none()
    }

    /// An allocation or resize that handed back a usable address, and so
    /// moves the block's current size to `requested_size()`
    pub fn is_sized(&self) -> bool {
        self.kind != EventKind::Release && self.address.is_some()
    }

    /// Whether this event ends its block's life. Besides a release, a
    /// zero-sized resize of a live address that returns null counts: the
    /// platform allocator is allowed to free the block in that case.
    pub fn ends_block(&self) -> bool {
        match self.kind {
            EventKind::Release => true,
            EventKind::Resize => {
                self.size == 0 && self.previous.is_some() && self.address.is_none()
            }
            _ => false,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>6} {:<7} {} {} -> {} {:>6} {}",
            self.seq,
            self.kind,
            self.block,
            format_address(self.previous),
            format_address(self.address),
            format_size(self.size as u64),
            self.site
        )
    }
}
