//! Date policy for license renewal.
//!
//! The portal encodes "due for rollover" as a validity date sitting exactly
//! on day 20 of the current month. Eligible records get rewritten to day 20
//! of the following month.

use std::fmt;

use chrono::{Datelike, NaiveDate};

/// The validity date a run writes into eligible records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDate {
    pub day: u32,
    pub month: u32,
    pub year: i32,
}

impl fmt::Display for TargetDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{:02}/{}", self.day, self.month, self.year)
    }
}

/// Day 20 of the month following `today`, rolling the year over in December.
pub fn compute_target_date(today: NaiveDate) -> TargetDate {
    let (month, year) = if today.month() == 12 {
        (1, today.year() + 1)
    } else {
        (today.month() + 1, today.year())
    };
    TargetDate {
        day: 20,
        month,
        year,
    }
}

/// Whether a stored validity value marks the record as due for renewal.
///
/// The raw field value is `DD/MM/YYYY`, optionally followed by a time
/// component which is ignored. Anything that does not parse into exactly
/// three integer parts fails closed.
pub fn is_eligible_for_edit(raw: &str, today: NaiveDate) -> bool {
    let date_part = raw.split_whitespace().next().unwrap_or("").trim();
    if date_part.is_empty() {
        return false;
    }
    let parts: Vec<&str> = date_part.split('/').collect();
    if parts.len() != 3 {
        return false;
    }
    let day: u32 = match parts[0].parse() {
        Ok(value) => value,
        Err(_) => return false,
    };
    let month: u32 = match parts[1].parse() {
        Ok(value) => value,
        Err(_) => return false,
    };
    let year: i32 = match parts[2].parse() {
        Ok(value) => value,
        Err(_) => return false,
    };
    day == 20 && month == today.month() && year == today.year()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn target_date_is_day_twenty_of_next_month() {
        let target = compute_target_date(date(2024, 3, 10));
        assert_eq!(target, TargetDate { day: 20, month: 4, year: 2024 });
        assert_eq!(target.to_string(), "20/04/2024");
    }

    #[test]
    fn target_date_rolls_year_over_in_december() {
        let target = compute_target_date(date(2024, 12, 5));
        assert_eq!(target, TargetDate { day: 20, month: 1, year: 2025 });
        assert_eq!(target.to_string(), "20/01/2025");
    }

    #[test]
    fn eligible_when_stored_date_is_day_twenty_of_current_month() {
        let today = date(2024, 4, 15);
        assert!(is_eligible_for_edit("20/04/2024", today));
    }

    #[test]
    fn time_suffix_is_ignored() {
        let today = date(2024, 4, 15);
        assert!(is_eligible_for_edit("20/04/2024 10:00", today));
    }

    #[test]
    fn other_days_and_months_are_not_eligible() {
        let today = date(2024, 4, 15);
        assert!(!is_eligible_for_edit("21/04/2024", today));
        assert!(!is_eligible_for_edit("20/05/2024", today));
        assert!(!is_eligible_for_edit("20/04/2023", today));
    }

    #[test]
    fn malformed_values_fail_closed() {
        let today = date(2024, 4, 15);
        assert!(!is_eligible_for_edit("", today));
        assert!(!is_eligible_for_edit("   ", today));
        assert!(!is_eligible_for_edit("bad/date", today));
        assert!(!is_eligible_for_edit("20/04", today));
        assert!(!is_eligible_for_edit("20/04/2024/extra", today));
        assert!(!is_eligible_for_edit("aa/bb/cccc", today));
    }
}
