//! Operator-facing bus diagnostics.
//!
//! Renders an address scan in the classic `i2cdetect` grid so it can be
//! dumped to the serial console at boot:
//!
//! ```text
//!      0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f
//! 00: -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- --
//! 30: -- -- -- -- -- -- -- -- -- -- -- -- 3c -- -- --
//! ```

use core::fmt::Write as _;

use crate::bus::{MAX_ADDRESS, ProbeResult};

const ROW_WIDTH: usize = 16;

/// Addresses that acknowledged, in scan order.
pub fn responders(results: impl IntoIterator<Item = ProbeResult>) -> heapless::Vec<u8, 128> {
    let mut out = heapless::Vec::new();
    for r in results.into_iter().filter(|r| r.present) {
        // 128 slots cover every 7-bit address.
        let _ = out.push(r.address);
    }
    out
}

/// Format a scan as a 16-column grid, one row per `0xN0` block.
///
/// Addresses missing from `results` print as absent.
pub fn format_scan_table(results: impl IntoIterator<Item = ProbeResult>) -> String {
    let mut present = [false; MAX_ADDRESS as usize + 1];
    for r in results {
        if let Some(slot) = present.get_mut(usize::from(r.address)) {
            *slot = r.present;
        }
    }

    let mut out = String::with_capacity(60 * 9);
    out.push_str("    ");
    for col in 0..ROW_WIDTH {
        let _ = write!(out, " {:x} ", col);
    }
    out.push('\n');

    for (row, cells) in present.chunks(ROW_WIDTH).enumerate() {
        let _ = write!(out, "{:02x}:", row * ROW_WIDTH);
        for (col, &hit) in cells.iter().enumerate() {
            if hit {
                let _ = write!(out, " {:02x}", row * ROW_WIDTH + col);
            } else {
                out.push_str(" --");
            }
        }
        out.push('\n');
    }
    out
}
