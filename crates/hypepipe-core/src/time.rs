// crates/hypepipe-core/src/time.rs
// ============================================================================
// Module: HypePipe Time Model
// Description: Injectable clock seam for freshness, expiry, and latency.
// Purpose: Keep wall-clock reads behind one interface so tests stay deterministic.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Gateway components never read the clock directly: cache freshness, token
//! expiry, audit timestamps, and latency all flow through [`Clock`]. The
//! process uses [`SystemClock`]; tests substitute [`ManualClock`] to control
//! time explicitly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::time::Instant;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Clock Trait
// ============================================================================

/// Time source for gateway components.
pub trait Clock: Send + Sync {
    /// Returns monotonic milliseconds since an arbitrary process-local origin.
    fn monotonic_millis(&self) -> u64;

    /// Returns seconds since the unix epoch.
    fn unix_seconds(&self) -> i64;

    /// Returns the current wall-clock time as an RFC 3339 string.
    fn now_rfc3339(&self) -> String;
}

// ============================================================================
// SECTION: System Clock
// ============================================================================

/// Clock backed by the host's monotonic and wall clocks.
#[derive(Debug)]
pub struct SystemClock {
    /// Monotonic origin captured at construction.
    origin: Instant,
}

impl SystemClock {
    /// Creates a system clock with a fresh monotonic origin.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic_millis(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn unix_seconds(&self) -> i64 {
        let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        i64::try_from(since_epoch.as_secs()).unwrap_or(i64::MAX)
    }

    fn now_rfc3339(&self) -> String {
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    }
}

// ============================================================================
// SECTION: Manual Clock
// ============================================================================

/// Deterministic clock advanced explicitly by tests.
///
/// # Invariants
/// - Time never moves unless a mutator is called.
#[derive(Debug)]
pub struct ManualClock {
    /// Clock state guarded for cross-thread test use.
    state: Mutex<ManualState>,
}

/// Mutable state for the manual clock.
#[derive(Debug)]
struct ManualState {
    /// Monotonic milliseconds.
    monotonic_millis: u64,
    /// Seconds since the unix epoch.
    unix_seconds: i64,
    /// Fixed wall-clock representation.
    rfc3339: String,
}

impl ManualClock {
    /// Creates a manual clock at the given epoch second and wall-clock label.
    #[must_use]
    pub fn new(unix_seconds: i64, rfc3339: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(ManualState {
                monotonic_millis: 0,
                unix_seconds,
                rfc3339: rfc3339.into(),
            }),
        }
    }

    /// Advances monotonic time only.
    pub fn advance_millis(&self, delta: u64) {
        if let Ok(mut state) = self.state.lock() {
            state.monotonic_millis = state.monotonic_millis.saturating_add(delta);
        }
    }

    /// Advances monotonic and epoch time together.
    pub fn advance_seconds(&self, delta: i64) {
        if let Ok(mut state) = self.state.lock() {
            state.unix_seconds = state.unix_seconds.saturating_add(delta);
            let millis = delta.saturating_mul(1_000);
            state.monotonic_millis =
                state.monotonic_millis.saturating_add(u64::try_from(millis).unwrap_or(0));
        }
    }

    /// Replaces the wall-clock label.
    pub fn set_rfc3339(&self, value: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.rfc3339 = value.into();
        }
    }
}

impl Clock for ManualClock {
    fn monotonic_millis(&self) -> u64 {
        self.state.lock().map_or(0, |state| state.monotonic_millis)
    }

    fn unix_seconds(&self) -> i64 {
        self.state.lock().map_or(0, |state| state.unix_seconds)
    }

    fn now_rfc3339(&self) -> String {
        self.state.lock().map_or_else(|_| String::new(), |state| state.rfc3339.clone())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions use unwrap for clarity."
    )]

    use super::Clock;
    use super::ManualClock;
    use super::SystemClock;

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let clock = ManualClock::new(1_700_000_000, "2023-11-14T22:13:20Z");
        assert_eq!(clock.monotonic_millis(), 0);
        clock.advance_millis(250);
        assert_eq!(clock.monotonic_millis(), 250);
        assert_eq!(clock.unix_seconds(), 1_700_000_000);
        clock.advance_seconds(30);
        assert_eq!(clock.unix_seconds(), 1_700_000_030);
        assert_eq!(clock.monotonic_millis(), 30_250);
    }

    #[test]
    fn system_clock_monotonic_is_nondecreasing() {
        let clock = SystemClock::new();
        let first = clock.monotonic_millis();
        let second = clock.monotonic_millis();
        assert!(second >= first);
    }

    #[test]
    fn system_clock_formats_rfc3339() {
        let clock = SystemClock::new();
        let ts = clock.now_rfc3339();
        assert!(ts.contains('T'));
    }
}
