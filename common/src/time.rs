use std::time::{SystemTime, UNIX_EPOCH};

pub const SECOND_MS: u64 = 1_000;
pub const DAY_MS: u64 = 86_400 * SECOND_MS;

/// Wall-clock milliseconds since the Unix epoch.
///
/// Callers pass the value down explicitly so expiry and TTL logic can be
/// driven by a fixed clock in tests.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
