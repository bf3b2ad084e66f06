//! The block ledger: every recorded [`Event`], the address → block map, and
//! each block's ordered history.
//!
//! A block is a logical allocation. It keeps the same [`BlockId`] for its
//! whole life, however many times it is resized and moved; only the address
//! it is filed under changes. Ids are minted by successful allocations and
//! nothing else. Anything the ledger cannot attribute to a block (null
//! pointers, failed allocations, addresses it never handed out) lands in
//! bucket 0, [`BlockId::NONE`].
//!
//! Releasing a block does not forget its address. A later resize or release
//! of the same address still resolves to the (now freed) block, until some
//! new allocation happens to be handed the same address, at which point the
//! mapping moves over to the new block. The ledger has no way of telling a
//! reused address from a dangling one.

use std::fmt;

use hashbrown::HashMap;
use log::trace;

use crate::{
    event::{CallSite, Event, EventKind},
    fatal::die,
};

/// Identity of a logical block. `0` is reserved for "no block".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(usize);

impl BlockId {
    /// Bucket 0: null pointers, failed allocations and unknown addresses
    pub const NONE: Self = Self(0);

    pub const fn get(self) -> usize {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:05}", self.0)
    }
}

/// Derived lifecycle of a block
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockState {
    /// No id this high has been minted yet
    Unborn,
    Live,
    Freed,
    /// Bucket 0 is not a real block and has no lifecycle
    Unresolved,
}

/// Aggregate call counts, one per entry point family
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    /// Allocations and zero-initialized allocations
    pub allocations: usize,
    pub resizes: usize,
    pub releases: usize,
}

type AddressMap = HashMap<usize, BlockId, ahash::RandomState>;

pub struct Ledger {
    /// Every event, in sequence order. The lists below index into this.
    events: Vec<Event>,
    allocations: Vec<usize>,
    resizes: Vec<usize>,
    releases: Vec<usize>,
    addresses: AddressMap,
    /// `histories[id]` is block `id`'s history; dense, `histories[0]` always
    /// exists
    histories: Vec<Vec<usize>>,
}

/// Append to one of the ledger's own lists. Running out of memory for
/// bookkeeping leaves the ledger in no state to report anything, so that is
/// fatal.
fn push_or_die<T>(list: &mut Vec<T>, value: T) {
    if list.try_reserve(1).is_err() {
        die(c"ledger storage could not grow");
    }
    list.push(value);
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            allocations: Vec::new(),
            resizes: Vec::new(),
            releases: Vec::new(),
            addresses: AddressMap::default(),
            histories: vec![Vec::new()],
        }
    }

    /// Resolve an address to the block currently filed under it. Null and
    /// unknown addresses both resolve to [`BlockId::NONE`].
    pub fn lookup(&self, address: Option<usize>) -> BlockId {
        address
            .and_then(|address| self.addresses.get(&address).copied())
            .unwrap_or(BlockId::NONE)
    }

    /// Record an allocation (`kind` must be [`EventKind::Allocate`] or
    /// [`EventKind::ZeroAllocate`]). A non-null `address` mints a new block;
    /// a null one is filed in bucket 0.
    pub fn on_allocate(
        &mut self,
        kind: EventKind,
        address: Option<usize>,
        size: usize,
        site: CallSite,
    ) -> BlockId {
        debug_assert!(kind.is_allocation());
        let block = match address {
            Some(address) => {
                let block = self.mint();
                self.map(address, block);
                block
            }
            None => BlockId::NONE,
        };
        let index = self.record(kind, block, None, address, size, site);
        push_or_die(&mut self.allocations, index);
        block
    }

    /// Record a resize of `previous` that returned `address`. The block keeps
    /// its id; on success it is refiled under the new address, on failure it
    /// stays where it was.
    pub fn on_resize(
        &mut self,
        previous: Option<usize>,
        address: Option<usize>,
        size: usize,
        site: CallSite,
    ) -> BlockId {
        let block = self.lookup(previous);
        if let (false, Some(previous), Some(address)) = (block.is_none(), previous, address) {
            self.addresses.remove(&previous);
            self.map(address, block);
        }
        let index = self.record(EventKind::Resize, block, previous, address, size, site);
        push_or_die(&mut self.resizes, index);
        block
    }

    /// Record a release of `address`. The address stays mapped to its block.
    pub fn on_release(&mut self, address: Option<usize>, site: CallSite) -> BlockId {
        let block = self.lookup(address);
        let index = self.record(EventKind::Release, block, address, None, 0, site);
        push_or_die(&mut self.releases, index);
        block
    }

    fn mint(&mut self) -> BlockId {
        let block = BlockId(self.histories.len());
        push_or_die(&mut self.histories, Vec::new());
        block
    }

    fn map(&mut self, address: usize, block: BlockId) {
        if self.addresses.try_reserve(1).is_err() {
            die(c"ledger address map could not grow");
        }
        self.addresses.insert(address, block);
    }

    fn record(
        &mut self,
        kind: EventKind,
        block: BlockId,
        previous: Option<usize>,
        address: Option<usize>,
        size: usize,
        site: CallSite,
    ) -> usize {
        let index = self.events.len();
        let event = Event {
            seq: index as u64,
            kind,
            block,
            previous,
            address,
            size,
            site,
        };
        trace!("recorded {event}");
        push_or_die(&mut self.events, event);
        push_or_die(&mut self.histories[block.get()], index);
        index
    }

    pub fn counts(&self) -> Counts {
        Counts {
            allocations: self.allocations.len(),
            resizes: self.resizes.len(),
            releases: self.releases.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of blocks minted so far (bucket 0 not included)
    pub fn block_count(&self) -> usize {
        self.histories.len() - 1
    }

    /// Every event, oldest first
    pub fn events(&self) -> impl ExactSizeIterator<Item = &Event> + '_ {
        self.events.iter()
    }

    /// Allocations and zero-initialized allocations, oldest first
    pub fn allocation_events(&self) -> impl ExactSizeIterator<Item = &Event> + '_ {
        self.allocations.iter().map(|&index| &self.events[index])
    }

    pub fn resize_events(&self) -> impl ExactSizeIterator<Item = &Event> + '_ {
        self.resizes.iter().map(|&index| &self.events[index])
    }

    pub fn release_events(&self) -> impl ExactSizeIterator<Item = &Event> + '_ {
        self.releases.iter().map(|&index| &self.events[index])
    }

    /// The history of `block`. Unminted ids have an empty history.
    pub fn history(&self, block: BlockId) -> History<'_> {
        History {
            ledger: self,
            block,
            indices: self
                .histories
                .get(block.get())
                .map(Vec::as_slice)
                .unwrap_or_default(),
        }
    }

    /// Bucket 0 followed by every minted block, in id order
    pub fn blocks(&self) -> impl Iterator<Item = History<'_>> + '_ {
        (0..self.histories.len()).map(|id| self.history(BlockId(id)))
    }

    /// Every minted block, in id order, skipping bucket 0
    pub fn minted_blocks(&self) -> impl Iterator<Item = History<'_>> + '_ {
        self.blocks().skip(1)
    }

    pub fn state(&self, block: BlockId) -> BlockState {
        if block.is_none() {
            BlockState::Unresolved
        } else if block.get() >= self.histories.len() {
            BlockState::Unborn
        } else if self.history(block).is_freed() {
            BlockState::Freed
        } else {
            BlockState::Live
        }
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("events", &self.events.len())
            .field("blocks", &self.block_count())
            .field("addresses", &self.addresses.len())
            .finish()
    }
}

/// One block's events, oldest first, with the block attributes that are
/// derived from them
#[derive(Clone, Copy)]
pub struct History<'a> {
    ledger: &'a Ledger,
    block: BlockId,
    indices: &'a [usize],
}

impl<'a> History<'a> {
    pub const fn block(&self) -> BlockId {
        self.block
    }

    pub const fn len(&self) -> usize {
        self.indices.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &'a Event> + ExactSizeIterator + 'a {
        let (events, indices) = (&self.ledger.events, self.indices);
        indices.iter().map(move |&index| &events[index])
    }

    /// The event that introduced this block
    pub fn origin(&self) -> Option<&'a Event> {
        self.iter().next()
    }

    /// Address of the last event that handed one back
    pub fn current_address(&self) -> Option<usize> {
        self.iter().rev().find_map(Event::new_address)
    }

    /// Size set by the last successful allocation or resize. A block shrunk
    /// and then abandoned reports its final size, not its peak.
    pub fn current_size(&self) -> Option<usize> {
        self.iter()
            .rev()
            .find(|event| event.is_sized())
            .map(Event::requested_size)
    }

    pub fn is_freed(&self) -> bool {
        self.iter().any(Event::ends_block)
    }

    /// How many times this block was explicitly released
    pub fn release_count(&self) -> usize {
        self.iter()
            .filter(|event| event.kind() == EventKind::Release)
            .count()
    }
}

impl fmt::Debug for History<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("History")
            .field("block", &self.block)
            .field("events", &self.indices.len())
            .finish()
    }
}
