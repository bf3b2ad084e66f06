//! Fixed-width human strings for byte counts, addresses and call sites.

/// Longest file name printed in full by [`format_site()`]
pub const SITE_NAME_WIDTH: usize = 20;

/// How much of an over-long file name survives elision
const SITE_NAME_KEPT: usize = 17;

/// Width of everything [`format_address()`] returns
pub const ADDRESS_WIDTH: usize = 18;

/// `(threshold, shift, unit)`, largest first. A size is shown in a unit once
/// it is strictly greater than the threshold, so at most 4 digits ever sit in
/// front of a unit.
const UNITS: [(u64, u32, &str); 5] = [
    (1 << 53, 50, "PB"),
    (1 << 43, 40, "TB"),
    (1 << 33, 30, "GB"),
    (1 << 23, 20, "MB"),
    (1 << 16, 10, "kB"),
];

/// Format a byte count with a binary-scaled unit chosen by magnitude. The
/// value is truncated, not rounded, so callers should present it as
/// approximate.
pub fn format_size(size: u64) -> String {
    for (threshold, shift, unit) in UNITS {
        if size > threshold {
            return format!("{}{unit}", size >> shift);
        }
    }
    format!("{size}B")
}

/// `file:line`, with file names longer than [`SITE_NAME_WIDTH`] bytes cut
/// down to their first few characters followed by `...`
pub fn format_site(file: &str, line: u32) -> String {
    if file.len() <= SITE_NAME_WIDTH {
        return format!("{file}:{line}");
    }
    let mut end = SITE_NAME_KEPT;
    while !file.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...:{line}", &file[..end])
}

/// Zero-padded hex address, or a right-aligned `(nil)`. Always
/// [`ADDRESS_WIDTH`] characters wide.
pub fn format_address(address: Option<usize>) -> String {
    match address {
        Some(address) => format!("{:#0width$x}", address, width = ADDRESS_WIDTH),
        None => format!("{:>width$}", "(nil)", width = ADDRESS_WIDTH),
    }
}
