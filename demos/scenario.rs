//! Runs a short allocation scenario against the default tracker and prints
//! the report.
//!
//! ```text
//! cargo run --example scenario -- --misuse --events
//! RUST_LOG=warn cargo run --example scenario -- --misuse
//! ```

use std::ptr;

use allocheck::{chkd_calloc, chkd_free, chkd_malloc, chkd_realloc, global};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "scenario")]
#[command(about = "Demonstrates the allocheck report", long_about = None)]
struct Cli {
    /// Also free and realloc null, and request an impossible allocation
    #[arg(long, default_value_t = false)]
    misuse: bool,

    /// Print the raw event list after the report
    #[arg(long, default_value_t = false)]
    events: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let arr1 = chkd_malloc!(4 * 4);
    unsafe { chkd_free!(arr1) };

    // Never freed
    let _arr2 = chkd_malloc!(20 * 4);

    let arr3 = chkd_calloc!(10, 4);
    let arr4 = unsafe { chkd_realloc!(arr3, 0) };
    if !arr4.is_null() {
        unsafe { chkd_free!(arr4) };
    }

    if cli.misuse {
        unsafe {
            chkd_free!(ptr::null_mut());
            let fresh = chkd_realloc!(ptr::null_mut(), 24);
            chkd_free!(fresh);
        }
        // Nothing can satisfy this, so it comes back null
        let impossible = chkd_malloc!(usize::MAX / 2);
        assert!(impossible.is_null());
    }

    global::generate_report();
    if cli.events {
        global::list_all_events();
    }
    global::reset();
}
