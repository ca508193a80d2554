//! Reservation pricing.
//!
//! `amount = max(1, ceil((end - start) / 1h)) × hourly_rate`
//!
//! The interval is not validated: an empty or inverted interval still
//! bills one hour.

use crate::types::Money;
use chrono::{DateTime, Utc};

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

/// Number of billable hours for `[start, end)`; always at least 1.
#[must_use]
pub fn billable_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let millis = (end - start).num_milliseconds();
    // ceil for positive spans; anything <= 0 falls to the floor below
    let hours = if millis > 0 {
        millis.div_euclid(MILLIS_PER_HOUR) + i64::from(millis.rem_euclid(MILLIS_PER_HOUR) != 0)
    } else {
        0
    };
    hours.max(1)
}

/// Price of `[start, end)` at `hourly_rate`.
#[must_use]
pub fn reservation_amount(start: DateTime<Utc>, end: DateTime<Utc>, hourly_rate: Money) -> Money {
    hourly_rate.times(billable_hours(start, end))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, h, m, 0).unwrap()
    }

    #[test]
    fn test_partial_hours_round_up() {
        // 09:00–11:30 → 3 billable hours
        assert_eq!(billable_hours(at(9, 0), at(11, 30)), 3);
        assert_eq!(
            reservation_amount(at(9, 0), at(11, 30), Money::from_major(50)),
            Money::from_major(150)
        );
    }

    #[test]
    fn test_exact_hours_do_not_round_up() {
        assert_eq!(billable_hours(at(9, 0), at(11, 0)), 2);
    }

    #[test]
    fn test_sub_hour_bills_one_hour() {
        assert_eq!(billable_hours(at(9, 0), at(9, 1)), 1);
    }

    #[test]
    fn test_empty_and_inverted_intervals_bill_one_hour() {
        assert_eq!(billable_hours(at(9, 0), at(9, 0)), 1);
        assert_eq!(billable_hours(at(11, 0), at(9, 0)), 1);
        assert_eq!(
            reservation_amount(at(11, 0), at(9, 0), Money::from_major(40)),
            Money::from_major(40)
        );
    }

    #[test]
    fn test_zero_rate_is_free() {
        assert_eq!(reservation_amount(at(9, 0), at(17, 0), Money::ZERO), Money::ZERO);
    }

    proptest! {
        #[test]
        fn prop_amount_matches_formula(
            minutes in -10_000i64..100_000,
            rate in 0i64..1_000_000,
        ) {
            let start = at(0, 0);
            let end = start + Duration::minutes(minutes);
            let expected_hours = if minutes <= 0 { 1 } else { ((minutes + 59) / 60).max(1) };

            prop_assert_eq!(billable_hours(start, end), expected_hours);
            prop_assert_eq!(
                reservation_amount(start, end, Money::from_minor(rate)),
                Money::from_minor(rate * expected_hours)
            );
        }
    }
}
