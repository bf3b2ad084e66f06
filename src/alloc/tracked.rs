use std::io::{self, IsTerminal, Write};

use libc::c_void;
use log::warn;

use super::{address_of, Heap, Libc};
use crate::{
    config::Config,
    event::{CallSite, EventKind},
    ledger::{BlockId, Ledger},
    lifecycle::{LazyLedger, LedgerState},
    report::{write_event_list, Report},
};

/// A [`Heap`] decorator that records every call into a ledger before handing
/// back exactly what the wrapped heap returned.
///
/// The ledger is created on the first call (tracked or reporting) and lives
/// until [`Tracked::reset()`]. Each `Tracked` is an independent tracker; the
/// crate-wide default lives in [`crate::global`].
#[derive(Debug)]
pub struct Tracked<H = Libc> {
    heap: H,
    ledger: LazyLedger,
    config: Config,
}

impl<H> Tracked<H>
where
    H: Heap,
{
    pub const fn new(heap: H) -> Self {
        Self::with_config(heap, Config::DEFAULT)
    }

    pub const fn with_config(heap: H, config: Config) -> Self {
        Self {
            heap,
            ledger: LazyLedger::new(),
            config,
        }
    }

    /// The wrapped heap
    pub const fn heap(&self) -> &H {
        &self.heap
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    pub fn ledger_state(&self) -> LedgerState {
        self.ledger.state()
    }

    /// Read-only access to the ledger, creating it if needed
    pub fn with_ledger<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&Ledger) -> R,
    {
        self.ledger.with(|ledger| f(ledger))
    }

    /// Run every pass and write the report table to `out`. Colors are only
    /// used if the config asks for them unconditionally.
    pub fn write_report<W>(&self, out: &mut W) -> io::Result<()>
    where
        W: Write + ?Sized,
    {
        let color = self.config.color.enabled(false);
        self.write_report_with_color(out, color)
    }

    fn write_report_with_color<W>(&self, out: &mut W, color: bool) -> io::Result<()>
    where
        W: Write + ?Sized,
    {
        self.with_ledger(|ledger| {
            Report::analyze(ledger).write_to(out, color, self.config.show_history)
        })
    }

    /// Write the report table to stdout
    pub fn generate_report(&self) {
        let stdout = io::stdout();
        let color = self.config.color.enabled(stdout.is_terminal());
        let mut stdout = stdout.lock();
        if let Err(err) = self
            .write_report_with_color(&mut stdout, color)
            .and_then(|()| stdout.flush())
        {
            warn!("could not write allocation report: {err}");
        }
    }

    /// Write every recorded event to `out`, oldest first
    pub fn write_event_list<W>(&self, out: &mut W) -> io::Result<()>
    where
        W: Write + ?Sized,
    {
        self.with_ledger(|ledger| write_event_list(out, ledger))
    }

    /// Dump every recorded event to stdout
    pub fn list_all_events(&self) {
        let mut stdout = io::stdout().lock();
        if let Err(err) = self
            .write_event_list(&mut stdout)
            .and_then(|()| stdout.flush())
        {
            warn!("could not write event list: {err}");
        }
    }

    /// Forget everything recorded so far. Memory still held by the tracked
    /// program is not freed; releasing it later will show up as unresolved.
    pub fn reset(&self) {
        self.ledger.teardown();
    }

    /// [`Heap::allocate()`] taking ownership of `site`, so the ledger keeps
    /// it without a copy
    pub fn allocate_at(&self, size: usize, site: CallSite) -> *mut c_void {
        let ptr = self.heap.allocate(size, &site);
        self.ledger
            .with(|ledger| ledger.on_allocate(EventKind::Allocate, address_of(ptr), size, site));
        ptr
    }

    /// [`Heap::zero_allocate()`] taking ownership of `site`
    pub fn zero_allocate_at(&self, count: usize, size: usize, site: CallSite) -> *mut c_void {
        let ptr = self.heap.zero_allocate(count, size, &site);
        let total = count.saturating_mul(size);
        self.ledger.with(|ledger| {
            ledger.on_allocate(EventKind::ZeroAllocate, address_of(ptr), total, site)
        });
        ptr
    }

    /// [`Heap::resize()`] taking ownership of `site`
    ///
    /// # Safety
    ///
    /// - Same as [`Heap::resize()`]
    pub unsafe fn resize_at(&self, ptr: *mut c_void, size: usize, site: CallSite) -> *mut c_void {
        // SAFETY: Identical contract to caller
        let new_ptr = unsafe { self.heap.resize(ptr, size, &site) };
        let previous = address_of(ptr);
        self.ledger.with(|ledger| {
            self.check_resolved(EventKind::Resize, previous, ledger.lookup(previous), &site);
            ledger.on_resize(previous, address_of(new_ptr), size, site)
        });
        new_ptr
    }

    /// [`Heap::release()`] taking ownership of `site`
    ///
    /// # Safety
    ///
    /// - Same as [`Heap::release()`]
    pub unsafe fn release_at(&self, ptr: *mut c_void, site: CallSite) {
        // SAFETY: Identical contract to caller
        unsafe { self.heap.release(ptr, &site) };
        let address = address_of(ptr);
        self.ledger.with(|ledger| {
            self.check_resolved(EventKind::Release, address, ledger.lookup(address), &site);
            ledger.on_release(address, site)
        });
    }

    fn check_resolved(
        &self,
        kind: EventKind,
        address: Option<usize>,
        block: BlockId,
        site: &CallSite,
    ) {
        if !self.config.warn_unknown || !block.is_none() {
            return;
        }
        if let Some(address) = address {
            warn!(
                "{} of {address:#x} at {site}: address was never returned by a tracked call",
                kind.label()
            );
        }
    }
}

impl<H> Default for Tracked<H>
where
    H: Heap + Default,
{
    fn default() -> Self {
        Self::new(H::default())
    }
}

impl<H> Heap for Tracked<H>
where
    H: Heap,
{
    fn allocate(&self, size: usize, site: &CallSite) -> *mut c_void {
        self.allocate_at(size, site.duplicate())
    }

    fn zero_allocate(&self, count: usize, size: usize, site: &CallSite) -> *mut c_void {
        self.zero_allocate_at(count, size, site.duplicate())
    }

    unsafe fn resize(&self, ptr: *mut c_void, size: usize, site: &CallSite) -> *mut c_void {
        // SAFETY: Identical contract to caller
        unsafe { self.resize_at(ptr, size, site.duplicate()) }
    }

    unsafe fn release(&self, ptr: *mut c_void, site: &CallSite) {
        // SAFETY: Identical contract to caller
        unsafe { self.release_at(ptr, site.duplicate()) }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, ptr::null_mut};

    use log::{Level, LevelFilter, Log, Metadata, Record};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;
    use crate::{
        alloc::fake::FakeHeap,
        config::ColorChoice,
        ledger::{BlockState, Counts},
    };

    fn tracked(heap: FakeHeap) -> Tracked<FakeHeap> {
        Tracked::with_config(heap, Config::DEFAULT.with_color(ColorChoice::Never))
    }

    fn report_text<H: Heap>(tracker: &Tracked<H>) -> String {
        let mut out = Vec::new();
        tracker.write_report(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    /// allocate(16) -> A; release(A); allocate(80) -> B; zero_allocate(10, 4)
    /// -> C; resize(C, 0) -> D; release(D) if D is non-null
    fn scenario(tracker: &Tracked<FakeHeap>) -> *mut c_void {
        let site = CallSite::caller();
        let a = tracker.allocate(16, &site);
        unsafe { tracker.release(a, &site) };
        tracker.allocate(80, &site);
        let c = tracker.zero_allocate(10, 4, &site);
        let d = unsafe { tracker.resize(c, 0, &site) };
        if !d.is_null() {
            unsafe { tracker.release(d, &site) };
        }
        d
    }

    fn check_scenario(tracker: &Tracked<FakeHeap>, d: *mut c_void) {
        let expected_releases = if d.is_null() { 1 } else { 2 };
        tracker.with_ledger(|ledger| {
            let report = Report::analyze(ledger);
            assert_eq!(
                report.counts,
                Counts {
                    allocations: 3,
                    resizes: 1,
                    releases: expected_releases
                }
            );
            assert_eq!(report.leaks.len(), 1);
            assert_eq!(report.leaks.bytes, 80);
            assert_eq!(report.leaks.blocks[0].current_size(), Some(80));
            assert!(report.zero_sized.allocations.is_empty());
            assert_eq!(report.zero_sized.resizes.len(), 1);
            assert!(report.failed.is_empty());
            assert!(report.null_arguments.is_empty());
            assert!(report.unresolved.is_empty());
        });
        let text = report_text(tracker);
        assert!(text.contains("Blocks lost: 00001"));
        assert!(text.contains("Total memory lost: ~80B"));
        assert!(text.contains("Total zero-sized allocs/reallocs: 00000/00001"));
    }

    #[test]
    fn scenario_when_zero_resize_returns_an_address() {
        let tracker = tracked(FakeHeap::new());
        let d = scenario(&tracker);
        assert!(!d.is_null());
        check_scenario(&tracker, d);
    }

    #[test]
    fn scenario_when_zero_resize_returns_null() {
        let tracker = tracked(FakeHeap::new().zero_returns_null());
        let d = scenario(&tracker);
        assert!(d.is_null());
        check_scenario(&tracker, d);
    }

    #[test]
    fn results_pass_through_unchanged() {
        let site = CallSite::caller();
        let bare = FakeHeap::new().failing(64);
        let tracker = tracked(FakeHeap::new().failing(64));

        assert_eq!(tracker.allocate(8, &site), bare.allocate(8, &site));
        assert_eq!(tracker.allocate(64, &site), bare.allocate(64, &site));
        assert_eq!(
            tracker.zero_allocate(usize::MAX, 2, &site),
            bare.zero_allocate(usize::MAX, 2, &site)
        );
        assert_eq!(tracker.heap().calls(), bare.calls());
    }

    #[test]
    fn ledger_is_lazy_and_reset_starts_over() {
        let site = CallSite::caller();
        let tracker = tracked(FakeHeap::new());
        assert_eq!(tracker.ledger_state(), LedgerState::Absent);

        let ptr = tracker.allocate(32, &site);
        assert_eq!(tracker.ledger_state(), LedgerState::Live);

        tracker.reset();
        assert_eq!(tracker.ledger_state(), LedgerState::Absent);

        // The block outlived the ledger, so its release is unresolved
        unsafe { tracker.release(ptr, &site) };
        tracker.with_ledger(|ledger| {
            assert_eq!(ledger.counts().releases, 1);
            assert_eq!(ledger.counts().allocations, 0);
            assert_eq!(Report::analyze(ledger).unresolved.releases.len(), 1);
        });
    }

    #[test]
    fn reporting_on_a_fresh_tracker_finds_nothing() {
        let tracker = tracked(FakeHeap::new());
        let text = report_text(&tracker);
        assert!(text.contains("Total allocs/reallocs/frees: 00000/00000/00000"));
        assert_eq!(tracker.ledger_state(), LedgerState::Live);
    }

    #[test]
    fn failed_resize_keeps_the_block_at_its_address() {
        let site = CallSite::caller();
        let tracker = tracked(FakeHeap::new().failing(4096));
        let ptr = tracker.allocate(16, &site);
        let failed = unsafe { tracker.resize(ptr, 4096, &site) };
        assert!(failed.is_null());

        tracker.with_ledger(|ledger| {
            let block = ledger.lookup(address_of(ptr));
            assert_eq!(block.get(), 1);
            assert_eq!(ledger.state(block), BlockState::Live);
            let report = Report::analyze(ledger);
            assert_eq!(report.failed.resizes.len(), 1);
            assert_eq!(report.failed.resizes[0].block(), block);
        });

        unsafe { tracker.release(ptr, &site) };
        tracker.with_ledger(|ledger| assert!(Report::analyze(ledger).leaks.is_empty()));
    }

    #[test]
    fn null_arguments_are_counted_once_and_tolerated() {
        let site = CallSite::caller();
        let tracker = tracked(FakeHeap::new());
        unsafe { tracker.release(null_mut(), &site) };
        let fresh = unsafe { tracker.resize(null_mut(), 24, &site) };
        assert!(!fresh.is_null());

        tracker.with_ledger(|ledger| {
            let report = Report::analyze(ledger);
            assert_eq!(report.null_arguments.releases.len(), 1);
            assert_eq!(report.null_arguments.resizes.len(), 1);
            // Neither minted a block, so nothing can leak
            assert_eq!(ledger.block_count(), 0);
            assert!(report.leaks.is_empty());
        });
    }

    #[test]
    fn address_reuse_is_attributed_to_the_newest_block() {
        let site = CallSite::caller();
        let tracker = tracked(FakeHeap::new().reusing());
        let first = tracker.allocate(16, &site);
        unsafe { tracker.release(first, &site) };
        let second = tracker.allocate(16, &site);
        assert_eq!(first, second);

        tracker.with_ledger(|ledger| {
            let block = ledger.lookup(address_of(second));
            assert_eq!(block.get(), 2);
            assert_eq!(ledger.state(block), BlockState::Live);
            let leaks = Report::analyze(ledger).leaks;
            assert_eq!(leaks.len(), 1);
            assert_eq!(leaks.blocks[0].block(), block);
        });
    }

    #[test]
    fn counts_match_calls_for_random_sequences() {
        let site = CallSite::caller();
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for _ in 0..32 {
            let tracker = tracked(FakeHeap::new().failing(999).zero_returns_null());
            let mut live: Vec<*mut c_void> = Vec::new();
            let mut expected = Counts::default();

            for _ in 0..rng.gen_range(0..200) {
                let size = [0, 8, 64, 999][rng.gen_range(0..4)];
                match rng.gen_range(0..5) {
                    0 => {
                        let ptr = tracker.allocate(size, &site);
                        if !ptr.is_null() {
                            live.push(ptr);
                        }
                        expected.allocations += 1;
                    }
                    1 => {
                        let ptr = tracker.zero_allocate(2, size, &site);
                        if !ptr.is_null() {
                            live.push(ptr);
                        }
                        expected.allocations += 1;
                    }
                    2 if !live.is_empty() => {
                        let ptr = live.swap_remove(rng.gen_range(0..live.len()));
                        let resized = unsafe { tracker.resize(ptr, size, &site) };
                        if !resized.is_null() {
                            live.push(resized);
                        } else if size != 0 {
                            // A failed resize leaves the old block live
                            live.push(ptr);
                        }
                        expected.resizes += 1;
                    }
                    _ if !live.is_empty() => {
                        let ptr = live.swap_remove(rng.gen_range(0..live.len()));
                        unsafe { tracker.release(ptr, &site) };
                        expected.releases += 1;
                    }
                    _ => {
                        unsafe { tracker.release(null_mut(), &site) };
                        expected.releases += 1;
                    }
                }
            }

            tracker.with_ledger(|ledger| {
                assert_eq!(ledger.counts(), expected);
                let report = Report::analyze(ledger);
                assert_eq!(report.leaks.len(), live.len());
                assert!(report.unresolved.is_empty());
                assert!(report.repeated_releases.is_empty());
            });
        }
    }

    thread_local! {
        static WARNINGS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    /// Keeps warnings per thread, so parallel tests don't see each other's
    struct CaptureWarnings;

    impl Log for CaptureWarnings {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= Level::Warn
        }

        fn log(&self, record: &Record) {
            if self.enabled(record.metadata()) {
                WARNINGS.with(|warnings| warnings.borrow_mut().push(record.args().to_string()));
            }
        }

        fn flush(&self) {}
    }

    fn captured_warnings(f: impl FnOnce()) -> Vec<String> {
        static LOGGER: CaptureWarnings = CaptureWarnings;
        // Only fails if already installed, which is fine
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(LevelFilter::Warn);
        WARNINGS.with(|warnings| warnings.borrow_mut().clear());
        f();
        WARNINGS.with(|warnings| warnings.take())
    }

    #[test]
    fn unknown_addresses_are_warned_about() {
        let site = CallSite::new("warn.rs", 5);
        let tracker = tracked(FakeHeap::new());
        let warnings = captured_warnings(|| unsafe {
            tracker.release(0xbad as *mut c_void, &site);
            tracker.resize(0xbee as *mut c_void, 8, &site);
            // Null and known addresses stay quiet
            tracker.release(null_mut(), &site);
            let ptr = tracker.allocate(8, &site);
            tracker.release(ptr, &site);
        });
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].starts_with("FREE of 0xbad at warn.rs:5"));
        assert!(warnings[1].starts_with("REALLOC of 0xbee at warn.rs:5"));
    }

    #[test]
    fn unknown_address_warnings_can_be_silenced() {
        let site = CallSite::new("warn.rs", 6);
        let tracker = Tracked::with_config(
            FakeHeap::new(),
            Config::DEFAULT
                .with_color(ColorChoice::Never)
                .with_warn_unknown(false),
        );
        let warnings = captured_warnings(|| unsafe {
            tracker.release(0xbad as *mut c_void, &site);
        });
        assert!(warnings.is_empty());
        tracker.with_ledger(|ledger| {
            assert_eq!(Report::analyze(ledger).unresolved.releases.len(), 1);
        });
    }
}
