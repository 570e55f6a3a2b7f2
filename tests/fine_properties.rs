//! Property tests for the fine calculator

use chrono::{Duration, NaiveDate};
use circulation_server::fine::{compute_fine, DAILY_FINE_RATE};
use proptest::prelude::*;

fn any_date() -> impl Strategy<Value = NaiveDate> {
    // Roughly 1970..2100
    (0i64..47_000).prop_map(|d| {
        NaiveDate::from_ymd_opt(1970, 1, 1).unwrap() + Duration::days(d)
    })
}

proptest! {
    #[test]
    fn no_fine_on_or_before_due_date(due in any_date(), early in 0i64..2000) {
        let reference = due - Duration::days(early);
        prop_assert_eq!(compute_fine(due, reference), 0);
    }

    #[test]
    fn fine_is_days_late_times_rate(due in any_date(), late in 1i64..2000) {
        let reference = due + Duration::days(late);
        prop_assert_eq!(compute_fine(due, reference), late * DAILY_FINE_RATE);
    }

    #[test]
    fn fine_grows_by_exactly_one_rate_per_day(due in any_date(), late in 0i64..2000) {
        let reference = due + Duration::days(late);
        let next_day = reference + Duration::days(1);
        prop_assert_eq!(
            compute_fine(due, next_day) - compute_fine(due, reference),
            DAILY_FINE_RATE
        );
    }

    #[test]
    fn fine_is_deterministic(due in any_date(), offset in -2000i64..2000) {
        let reference = due + Duration::days(offset);
        prop_assert_eq!(compute_fine(due, reference), compute_fine(due, reference));
    }

    #[test]
    fn fine_is_never_negative(due in any_date(), offset in -2000i64..2000) {
        let reference = due + Duration::days(offset);
        prop_assert!(compute_fine(due, reference) >= 0);
    }
}
