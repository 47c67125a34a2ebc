//! Canonical period keys for periodic tasks.

use chrono::{DateTime, Datelike, Utc};

use crate::domain::Period;

/// `YYYY-MM-DD` (daily), `YYYY-Www` (ISO week) or `YYYY-MM` (monthly).
pub fn period_key(period: Period, at: DateTime<Utc>) -> String {
    match period {
        Period::Daily => at.format("%Y-%m-%d").to_string(),
        Period::Weekly => {
            let week = at.iso_week();
            format!("{:04}-W{:02}", week.year(), week.week())
        }
        Period::Monthly => at.format("%Y-%m").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(Period::Daily, 2026, 3, 9, "2026-03-09")]
    #[case(Period::Monthly, 2026, 3, 9, "2026-03")]
    #[case(Period::Weekly, 2026, 3, 9, "2026-W11")]
    // ISO week-year differs from the calendar year around new year.
    #[case(Period::Weekly, 2027, 1, 1, "2026-W53")]
    #[case(Period::Weekly, 2024, 12, 30, "2025-W01")]
    fn canonical_keys(
        #[case] period: Period,
        #[case] y: i32,
        #[case] m: u32,
        #[case] d: u32,
        #[case] expected: &str,
    ) {
        let at = Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap();
        assert_eq!(period_key(period, at), expected);
    }
}
