use std::cell::RefCell;

use log::debug;

use crate::{ledger::Ledger, util::hint::cold};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum LedgerState {
    /// Nothing has been recorded since construction or the last teardown
    Absent,
    /// The ledger exists and is accepting events
    Live,
}

/// A [`Ledger`] that springs into existence on first use and can be torn
/// down again, after which the next use starts from empty.
///
/// Not `Sync`: one tracker belongs to one thread.
#[derive(Debug, Default)]
pub struct LazyLedger {
    cell: RefCell<Option<Ledger>>,
}

impl LazyLedger {
    pub const fn new() -> Self {
        Self {
            cell: RefCell::new(None),
        }
    }

    pub fn state(&self) -> LedgerState {
        match *self.cell.borrow() {
            Some(_) => LedgerState::Live,
            None => LedgerState::Absent,
        }
    }

    /// Run `f` against the ledger, initializing it first if it is absent.
    ///
    /// # Panics
    ///
    /// - If `f` re-enters this same `LazyLedger`
    pub fn with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut Ledger) -> R,
    {
        let mut cell = self.cell.borrow_mut();
        let ledger = cell.get_or_insert_with(|| {
            cold(|| {
                debug!("initializing ledger");
                Ledger::new()
            })
        });
        f(ledger)
    }

    /// Drop every event and history list. Memory the tracked program still
    /// holds is not touched.
    pub fn teardown(&self) -> Option<Ledger> {
        let ledger = self.cell.borrow_mut().take();
        if let Some(ledger) = &ledger {
            debug!("tearing down {ledger:?}");
        }
        ledger
    }
}
