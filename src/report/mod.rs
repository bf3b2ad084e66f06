//! The report engine: every analysis pass run over a [`Ledger`], and the
//! fixed-width table they are rendered into.

mod passes;
mod render;

use std::io;

pub use passes::{
    failed, lost_blocks, null_arguments, repeated_releases, unresolved, zero_sized, Findings,
    Leaks,
};
pub use render::{write_event_list, REPORT_WIDTH};

use crate::ledger::{Counts, History, Ledger};

/// The result of every pass over one ledger. Borrows the ledger, so it has
/// to be rendered before the ledger records anything else.
#[derive(Debug)]
pub struct Report<'a> {
    pub counts: Counts,
    pub leaks: Leaks<'a>,
    pub zero_sized: Findings<'a>,
    pub failed: Findings<'a>,
    pub null_arguments: Findings<'a>,
    pub unresolved: Findings<'a>,
    pub repeated_releases: Vec<History<'a>>,
}

impl<'a> Report<'a> {
    pub fn analyze(ledger: &'a Ledger) -> Self {
        Self {
            counts: ledger.counts(),
            leaks: lost_blocks(ledger),
            zero_sized: zero_sized(ledger),
            failed: failed(ledger),
            null_arguments: null_arguments(ledger),
            unresolved: unresolved(ledger),
            repeated_releases: repeated_releases(ledger),
        }
    }

    /// Nothing worth a developer's attention. Null-argument calls are only
    /// informational and don't count.
    pub fn is_clean(&self) -> bool {
        self.leaks.is_empty()
            && self.zero_sized.is_empty()
            && self.failed.is_empty()
            && self.unresolved.is_empty()
            && self.repeated_releases.is_empty()
    }

    /// Render the report table.
    ///
    /// - `color`: whether to emit ANSI colors
    /// - `show_history`: whether each lost block lists its full history
    pub fn write_to<W>(&self, out: &mut W, color: bool, show_history: bool) -> io::Result<()>
    where
        W: io::Write + ?Sized,
    {
        render::Renderer::new(out, color).report(self, show_history)
    }
}
