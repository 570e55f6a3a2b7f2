//! Fine calculation for late returns.
//!
//! Both dates are taken at calendar-day granularity; partial days never
//! accrue a fine.

use chrono::NaiveDate;

/// Fine charged per full day past the due date, in currency units
pub const DAILY_FINE_RATE: i64 = 1000;

/// Compute the fine owed when a book due on `due_date` is assessed against
/// `reference_date` (the return date, or today for still-open records).
///
/// Returns 0 for on-time and early returns.
pub fn compute_fine(due_date: NaiveDate, reference_date: NaiveDate) -> i64 {
    let days_late = (reference_date - due_date).num_days();
    if days_late <= 0 {
        0
    } else {
        days_late * DAILY_FINE_RATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn on_time_return_has_no_fine() {
        let due = date(2024, 1, 1);
        assert_eq!(compute_fine(due, due), 0);
    }

    #[test]
    fn early_return_has_no_fine() {
        assert_eq!(compute_fine(date(2024, 1, 10), date(2024, 1, 3)), 0);
    }

    #[test]
    fn three_days_late_charges_three_times_the_rate() {
        assert_eq!(
            compute_fine(date(2024, 1, 1), date(2024, 1, 4)),
            3 * DAILY_FINE_RATE
        );
    }

    #[test]
    fn one_day_late_charges_one_day() {
        assert_eq!(
            compute_fine(date(2024, 2, 28), date(2024, 2, 29)),
            DAILY_FINE_RATE
        );
    }

    #[test]
    fn fine_spans_month_boundaries() {
        assert_eq!(
            compute_fine(date(2024, 1, 30), date(2024, 2, 2)),
            3 * DAILY_FINE_RATE
        );
    }
}
