//! Wall-clock helpers.
//!
//! The latency triplet on an order record is measured in microseconds since
//! the Unix epoch. [`now_micros`] reads `CLOCK_REALTIME` directly on Linux
//! and macOS to keep the measurement overhead low; other platforms fall
//! back to `std::time::SystemTime`. Human-readable timestamps (transact
//! times, audit records, market ticks) come from `chrono`.

/// Current wall-clock time as microseconds since the Unix epoch.
#[inline]
pub fn now_micros() -> i64 {
    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: passing a valid pointer to a stack-allocated timespec.
        unsafe {
            libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts);
        }
        ts.tv_sec as i64 * 1_000_000 + ts.tv_nsec as i64 / 1_000
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before UNIX epoch")
            .as_micros() as i64
    }
}

/// Current UTC time formatted as ISO-8601 with second precision,
/// e.g. `2024-01-23T10:15:30Z`. Used for order transact times.
pub fn utc_now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Current UTC time with millisecond precision,
/// e.g. `2024-01-23T10:15:30.123Z`. Used for audit records.
pub fn utc_now_iso_millis() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Current Unix time in whole seconds. Used for persistence documents.
pub fn unix_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}
