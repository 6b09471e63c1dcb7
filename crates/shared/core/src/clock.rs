//! Time source and local time fields
//!
//! Messages carry the local time (`f12`, HHMMSS) and date (`f13`, MMDD) of
//! the transaction. They are rendered from a [`Clock`] so tests can pin time.

use chrono::{FixedOffset, Offset, Utc};

use crate::values::Timestamp;

/// Port for time abstraction
pub trait Clock: Send + Sync {
    /// Get the current time according to this clock
    fn now(&self) -> Timestamp;

    /// Get the clock's name/identifier for debugging
    fn name(&self) -> &str {
        "Clock"
    }
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn name(&self) -> &str {
        "SystemClock"
    }
}

/// Frozen time, for deterministic tests
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }

    fn name(&self) -> &str {
        "FixedClock"
    }
}

/// `f12`/`f13` values for one instant in one timezone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTimeFields {
    /// HHMMSS
    pub time: String,
    /// MMDD
    pub date: String,
}

impl LocalTimeFields {
    /// Render the fields of `now` in `timezone`
    ///
    /// `timezone` is `UTC`, `Z` or an offset such as `-05:00` / `+0530`.
    /// Anything else is rendered in UTC.
    pub fn at(now: Timestamp, timezone: &str) -> Self {
        let local = now.with_timezone(&zone_offset(timezone));
        Self {
            time: local.format("%H%M%S").to_string(),
            date: local.format("%m%d").to_string(),
        }
    }

    /// Render the fields using a clock
    pub fn from_clock(clock: &dyn Clock, timezone: &str) -> Self {
        Self::at(clock.now(), timezone)
    }
}

/// Resolve a timezone designation to a fixed offset, UTC when unknown
pub fn zone_offset(timezone: &str) -> FixedOffset {
    parse_offset(timezone.trim()).unwrap_or_else(|| Utc.fix())
}

fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
