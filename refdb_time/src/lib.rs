//! Wall-clock time for the catalog store.
//!
//! Everything that needs "now" (refresh interval checks, refresh timestamps) goes through a
//! [`TimeProvider`] so tests can drive the clock with a [`MockProvider`].

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::time::Duration;

/// A UTC timestamp returned by a [`TimeProvider`]
///
/// Stored at millisecond precision on disk; the in-memory value keeps whatever precision the
/// clock source delivered.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct Time(DateTime<Utc>);

impl std::fmt::Debug for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::fmt::Display for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

impl Time {
    /// The Unix epoch, 1970-01-01T00:00:00Z
    pub const UNIX_EPOCH: Self = Self(DateTime::<Utc>::UNIX_EPOCH);

    /// Makes a new `Time` from the number of non-leap milliseconds since the Unix epoch.
    ///
    /// Returns `None` if out of range
    pub fn from_timestamp_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Self)
    }

    /// Makes a new `Time` from the provided [`DateTime<Utc>`]
    pub fn from_date_time(time: DateTime<Utc>) -> Self {
        Self(time)
    }

    /// Returns the number of non-leap milliseconds since the Unix epoch
    pub fn timestamp_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Returns an RFC 3339 date and time string such as `1996-12-19T16:39:57+00:00`.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Returns the duration since the provided time or None if it would be negative
    pub fn checked_duration_since(&self, other: Self) -> Option<Duration> {
        self.0.signed_duration_since(other.0).to_std().ok()
    }

    /// Adds the given [`Duration`], returning `None` on overflow
    pub fn checked_add(&self, duration: Duration) -> Option<Self> {
        let duration = chrono::Duration::from_std(duration).ok()?;
        Some(Self(self.0.checked_add_signed(duration)?))
    }

    /// Returns `Time` as a [`DateTime<Utc>`]
    pub fn date_time(&self) -> DateTime<Utc> {
        self.0
    }
}

pub trait TimeProvider: std::fmt::Debug + Send + Sync + 'static {
    /// Returns the current `Time`. No guarantees are made about monotonicity
    fn now(&self) -> Time;
}

/// A [`TimeProvider`] that uses [`Utc::now`] as a clock source
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProvider {}

impl SystemProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimeProvider for SystemProvider {
    fn now(&self) -> Time {
        Time(Utc::now())
    }
}

/// A [`TimeProvider`] that returns a fixed `Time` that can be set by [`MockProvider::set`]
#[derive(Debug)]
pub struct MockProvider {
    now: RwLock<Time>,
}

impl MockProvider {
    pub fn new(start: Time) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, time: Time) {
        *self.now.write() = time
    }

    /// Advance the clock, saturating at the maximum representable time
    pub fn inc(&self, duration: Duration) -> Time {
        let mut now = self.now.write();
        if let Some(next) = now.checked_add(duration) {
            *now = next;
        }
        *now
    }
}

impl TimeProvider for MockProvider {
    fn now(&self) -> Time {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_provider_is_settable() {
        let provider = MockProvider::new(Time::UNIX_EPOCH);
        assert_eq!(provider.now().timestamp_millis(), 0);

        provider.set(Time::from_timestamp_millis(12).unwrap());
        assert_eq!(provider.now().timestamp_millis(), 12);

        let t = provider.inc(Duration::from_secs(1));
        assert_eq!(t.timestamp_millis(), 1_012);
        assert_eq!(provider.now(), t);
    }

    #[test]
    fn millis_round_trip() {
        let t = Time::from_timestamp_millis(1_700_000_000_123).unwrap();
        assert_eq!(t.timestamp_millis(), 1_700_000_000_123);
        assert_eq!(t.to_rfc3339(), "2023-11-14T22:13:20.123+00:00");
        assert!(Time::from_timestamp_millis(i64::MAX).is_none());
    }

    #[test]
    fn duration_since() {
        let a = Time::from_timestamp_millis(5_000).unwrap();
        let b = Time::from_timestamp_millis(-465).unwrap();
        assert_eq!(
            a.checked_duration_since(b).unwrap(),
            Duration::from_millis(5_465)
        );
        assert!(b.checked_duration_since(a).is_none());
    }
}
