//! Business-day calendar.
//!
//! Weekdays only. Holidays are not modelled here; the sync engine learns them
//! through the store's unavailable dates.

use chrono::{Datelike, Local, NaiveDate, Weekday};

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The `count` most recent business days ending at `end_date`, newest first.
///
/// Stops early at the start of the representable calendar.
pub fn business_days(count: usize, end_date: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut current = Some(end_date);
    while let Some(date) = current {
        if days.len() >= count {
            break;
        }
        if is_business_day(date) {
            days.push(date);
        }
        current = date.pred_opt();
    }
    days
}

pub fn business_days_until_today(count: usize) -> Vec<NaiveDate> {
    business_days(count, Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekend_is_not_business_day() {
        assert!(is_business_day(d(2024, 1, 19)));
        assert!(!is_business_day(d(2024, 1, 20)));
        assert!(!is_business_day(d(2024, 1, 21)));
    }

    #[test]
    fn friday_end_gives_monday_to_friday() {
        let days = business_days(5, d(2024, 1, 19));
        assert_eq!(
            days,
            vec![
                d(2024, 1, 19),
                d(2024, 1, 18),
                d(2024, 1, 17),
                d(2024, 1, 16),
                d(2024, 1, 15)
            ]
        );
    }

    #[test]
    fn sunday_end_skips_back_to_friday() {
        let days = business_days(2, d(2024, 1, 21));
        assert_eq!(days, vec![d(2024, 1, 19), d(2024, 1, 18)]);
    }

    #[test]
    fn window_crosses_weekend_and_month() {
        let days = business_days(3, d(2024, 2, 1));
        assert_eq!(days, vec![d(2024, 2, 1), d(2024, 1, 31), d(2024, 1, 30)]);

        let days = business_days(2, d(2024, 1, 22));
        assert_eq!(days, vec![d(2024, 1, 22), d(2024, 1, 19)]);
    }

    #[test]
    fn strictly_decreasing_and_exact_count() {
        let days = business_days(260, d(2024, 12, 31));
        assert_eq!(days.len(), 260);
        assert!(days.windows(2).all(|w| w[0] > w[1]));
        assert!(days.iter().all(|day| is_business_day(*day)));
    }

    #[test]
    fn zero_count_is_empty() {
        assert!(business_days(0, d(2024, 1, 19)).is_empty());
    }

    #[test]
    fn window_reaching_calendar_start_is_truncated() {
        let start = NaiveDate::MIN;
        let end = start + chrono::Duration::days(13);

        let days = business_days(1_000, end);

        assert!(days.len() < 1_000);
        assert!(days.iter().all(|d| *d >= start && is_business_day(*d)));
    }
}
