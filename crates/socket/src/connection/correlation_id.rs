//! Process-wide connection identifiers
//!
//! Identifiers are 13 characters over `0-9A-V`, five bits per character with
//! the most significant digit first, so they sort in creation order. The
//! counter behind them starts at the current time in 100 ns ticks since
//! 0001-01-01, which keeps identifiers from separate runs apart.

use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const ENCODE_32_CHARS: &[u8; 32] = b"0123456789ABCDEFGHIJKLMNOPQRSTUV";

/// Length of every identifier.
pub const ID_LEN: usize = 13;

// ticks between 0001-01-01 and the unix epoch
const UNIX_EPOCH_TICKS: u64 = 621_355_968_000_000_000;

static LAST_ID: Lazy<AtomicU64> = Lazy::new(|| AtomicU64::new(seed()));

fn seed() -> u64 {
    let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let ticks = u64::try_from(since_epoch.as_nanos() / 100).unwrap_or(u64::MAX - UNIX_EPOCH_TICKS);
    ticks.saturating_add(UNIX_EPOCH_TICKS)
}

/// Returns the next identifier. Safe to call from any thread.
pub fn next_id() -> String {
    let id = LAST_ID.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
    encode(id)
}

fn encode(id: u64) -> String {
    let mut buf = [0u8; ID_LEN];
    for (index, byte) in buf.iter_mut().enumerate() {
        let shift = 5 * (ID_LEN - 1 - index);
        #[allow(clippy::cast_possible_truncation, reason = "masked to five bits")]
        let digit = ((id >> shift) & 0x1F) as usize;
        *byte = ENCODE_32_CHARS[digit];
    }
    buf.iter().map(|&b| char::from(b)).collect()
}
