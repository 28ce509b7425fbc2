//! Wall-clock capture and the elapsed-time arithmetic used for the run summary.
//!
//! Instants are decomposed into hour, minute, second and a sub-second part, and
//! the elapsed time is the component-wise difference recombined into
//! milliseconds. This is only meaningful when both instants fall on the same
//! UTC day: across midnight the result goes negative and is reported as is.

use std::fmt;

use chrono::{Timelike, Utc};

use crate::error::BenchError;

const MILLIS_PER_HOUR: i64 = 3_600_000;
const MILLIS_PER_MINUTE: i64 = 60_000;
const MILLIS_PER_SECOND: i64 = 1_000;

/// A captured point in UTC wall-clock time with microsecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WallInstant {
    hour: u32,
    minute: u32,
    second: u32,
    micros: u32,
}

impl WallInstant {
    /// Capture the current UTC time of day.
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            hour: now.hour(),
            minute: now.minute(),
            second: now.second(),
            // A leap second shows up as nanosecond >= 1e9.
            micros: (now.nanosecond() / 1_000).min(999_999),
        }
    }

    /// Build an instant from its components.
    pub fn from_hms_micro(
        hour: u32,
        minute: u32,
        second: u32,
        micros: u32,
    ) -> Result<Self, BenchError> {
        if hour > 23 || minute > 59 || second > 59 || micros > 999_999 {
            return Err(BenchError::InvalidArgument(format!(
                "invalid time of day {}:{}:{}.{}",
                hour, minute, second, micros
            )));
        }
        Ok(Self {
            hour,
            minute,
            second,
            micros,
        })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn second(&self) -> u32 {
        self.second
    }

    pub fn micros(&self) -> u32 {
        self.micros
    }

    /// Fractional second truncated to three digits.
    pub fn millis(&self) -> u32 {
        self.micros / 1_000
    }
}

impl fmt::Display for WallInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}.{:06}",
            self.hour, self.minute, self.second, self.micros
        )
    }
}

/// Milliseconds from `start` to `end`, computed component by component.
///
/// Each component is subtracted independently, so a minute or second
/// borrow is absorbed by the signed terms. A day rollover is not handled.
pub fn elapsed_millis(start: &WallInstant, end: &WallInstant) -> i64 {
    let d_hour = end.hour as i64 - start.hour as i64;
    let d_minute = end.minute as i64 - start.minute as i64;
    let d_second = end.second as i64 - start.second as i64;
    let d_millis = end.millis() as i64 - start.millis() as i64;

    d_hour * MILLIS_PER_HOUR + d_minute * MILLIS_PER_MINUTE + d_second * MILLIS_PER_SECOND + d_millis
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32, us: u32) -> WallInstant {
        WallInstant::from_hms_micro(h, m, s, us).unwrap()
    }

    #[test]
    fn test_elapsed_simple() {
        assert_eq!(elapsed_millis(&at(10, 0, 0, 0), &at(10, 0, 1, 250_000)), 1250);
        assert_eq!(elapsed_millis(&at(1, 2, 3, 4), &at(1, 2, 3, 4)), 0);
    }

    #[test]
    fn test_elapsed_across_hour_boundary() {
        // Every component but the hour goes negative.
        let start = at(10, 59, 59, 900_000);
        let end = at(11, 0, 0, 100_000);
        assert_eq!(elapsed_millis(&start, &end), 200);
    }

    #[test]
    fn test_elapsed_truncates_to_millis() {
        let start = at(8, 0, 0, 999);
        let end = at(8, 0, 0, 1_999);
        assert_eq!(start.millis(), 0);
        assert_eq!(end.millis(), 1);
        assert_eq!(elapsed_millis(&start, &end), 1);
    }

    #[test]
    fn test_elapsed_is_antisymmetric() {
        let pairs = [
            (at(0, 0, 0, 0), at(23, 59, 59, 999_999)),
            (at(12, 30, 15, 500_000), at(12, 31, 14, 400_000)),
            (at(3, 4, 5, 6_000), at(3, 4, 5, 6_000)),
        ];
        for (a, b) in pairs.iter() {
            assert!(a <= b);
            assert!(elapsed_millis(a, b) >= 0);
            assert_eq!(elapsed_millis(a, b), -elapsed_millis(b, a));
        }
    }

    #[test]
    fn test_elapsed_day_rollover_goes_negative() {
        let start = at(23, 59, 59, 999_000);
        let end = at(0, 0, 0, 1_000);
        assert_eq!(elapsed_millis(&start, &end), -86_399_998);
    }

    #[test]
    fn test_invalid_components() {
        assert!(WallInstant::from_hms_micro(24, 0, 0, 0).is_err());
        assert!(WallInstant::from_hms_micro(0, 60, 0, 0).is_err());
        assert!(WallInstant::from_hms_micro(0, 0, 60, 0).is_err());
        assert!(WallInstant::from_hms_micro(0, 0, 0, 1_000_000).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(at(9, 5, 3, 250).to_string(), "09:05:03.000250");
    }

    #[test]
    fn test_now_is_well_formed() {
        let now = WallInstant::now();
        assert!(now.hour() < 24 && now.minute() < 60 && now.second() < 60);
        assert!(now.micros() < 1_000_000);
    }
}
