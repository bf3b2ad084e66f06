//! The analysis passes. Each one is a pure, linear scan over the ledger's
//! per-block histories, which the ledger keeps grouped as it records, so no
//! pass has to regroup events itself.

use crate::{
    event::{Event, EventKind},
    ledger::{BlockId, History, Ledger},
};

/// Events picked out by a pass, split by the kind of call
#[derive(Debug, Default)]
pub struct Findings<'a> {
    /// Allocations and zero-initialized allocations
    pub allocations: Vec<&'a Event>,
    pub resizes: Vec<&'a Event>,
    pub releases: Vec<&'a Event>,
}

impl<'a> Findings<'a> {
    fn push(&mut self, event: &'a Event) {
        match event.kind() {
            EventKind::Allocate | EventKind::ZeroAllocate => self.allocations.push(event),
            EventKind::Resize => self.resizes.push(event),
            EventKind::Release => self.releases.push(event),
        }
    }

    fn from_events<I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let mut findings = Self::default();
        for event in events {
            findings.push(event);
        }
        findings
    }

    pub fn len(&self) -> usize {
        self.allocations.len() + self.resizes.len() + self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every finding, allocations then resizes then releases
    pub fn iter(&self) -> impl Iterator<Item = &'a Event> + '_ {
        self.allocations
            .iter()
            .chain(&self.resizes)
            .chain(&self.releases)
            .copied()
    }
}

/// Blocks that were never released
#[derive(Debug, Default)]
pub struct Leaks<'a> {
    pub blocks: Vec<History<'a>>,
    /// Sum of every lost block's final size, saturating
    pub bytes: u64,
}

impl Leaks<'_> {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

fn bucket_zero(ledger: &Ledger) -> impl Iterator<Item = &Event> + '_ {
    ledger.history(BlockId::NONE).iter()
}

fn every_event(ledger: &Ledger) -> impl Iterator<Item = &Event> + '_ {
    ledger.blocks().flat_map(|history| history.iter())
}

/// A minted block with no release in its history is lost. Each one counts at
/// its final size, so a block shrunk before it was abandoned counts small.
pub fn lost_blocks(ledger: &Ledger) -> Leaks<'_> {
    let mut leaks = Leaks::default();
    for history in ledger.minted_blocks() {
        if history.is_empty() || history.is_freed() {
            continue;
        }
        let size = history.current_size().unwrap_or(0) as u64;
        leaks.bytes = leaks.bytes.saturating_add(size);
        leaks.blocks.push(history);
    }
    leaks
}

/// Allocations and resizes asking for zero bytes, whether they got null or
/// an address back
pub fn zero_sized(ledger: &Ledger) -> Findings<'_> {
    Findings::from_events(every_event(ledger).filter(|event| event.is_zero_sized()))
}

/// Non-zero allocations and resizes that returned null. A failed allocation
/// can only ever sit in bucket 0; a failed resize stays with its block.
pub fn failed(ledger: &Ledger) -> Findings<'_> {
    Findings::from_events(every_event(ledger).filter(|event| event.is_failed()))
}

/// `release(null)` and `resize(null, n)`. Both are legal, but usually not
/// what was meant.
pub fn null_arguments(ledger: &Ledger) -> Findings<'_> {
    Findings::from_events(bucket_zero(ledger).filter(|event| {
        matches!(event.kind(), EventKind::Resize | EventKind::Release)
            && event.previous_address().is_none()
    }))
}

/// Resizes and releases of non-null addresses that no tracked allocation
/// ever returned
pub fn unresolved(ledger: &Ledger) -> Findings<'_> {
    Findings::from_events(bucket_zero(ledger).filter(|event| {
        matches!(event.kind(), EventKind::Resize | EventKind::Release)
            && event.previous_address().is_some()
    }))
}

/// Blocks released more than once. Either a double free, or an address the
/// allocator reused for a block that was never tracked; the ledger cannot
/// tell which.
pub fn repeated_releases(ledger: &Ledger) -> Vec<History<'_>> {
    ledger
        .minted_blocks()
        .filter(|history| history.release_count() > 1)
        .collect()
}
