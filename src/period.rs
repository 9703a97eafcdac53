// 📅 Period Keys
// Month and quarter keys with calendar arithmetic for growth comparisons

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// MONTH KEY
// ============================================================================

/// A calendar month. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    /// Returns `None` unless `month` is in `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(MonthKey { year, month })
    }

    pub fn quarter(&self) -> QuarterKey {
        QuarterKey {
            year: self.year,
            quarter: (self.month - 1) / 3 + 1,
        }
    }

    /// Shift back by `n` months, crossing year boundaries.
    pub fn minus(&self, n: u32) -> MonthKey {
        MonthKey::from_index(self.index() - n as i64)
    }

    pub fn plus(&self, n: u32) -> MonthKey {
        MonthKey::from_index(self.index() + n as i64)
    }

    /// First day of the month, used as the x-axis value of trend charts
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    /// English month name ("January")
    pub fn month_name(&self) -> &'static str {
        month_name(self.month)
    }

    fn index(&self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    fn from_index(index: i64) -> MonthKey {
        MonthKey {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }
}

impl From<NaiveDate> for MonthKey {
    fn from(date: NaiveDate) -> Self {
        MonthKey {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

// ============================================================================
// QUARTER KEY
// ============================================================================

/// A calendar quarter, displayed as `2024Q1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuarterKey {
    pub year: i32,
    pub quarter: u32,
}

impl QuarterKey {
    pub fn new(year: i32, quarter: u32) -> Option<Self> {
        (1..=4).contains(&quarter).then_some(QuarterKey { year, quarter })
    }

    /// Shift back by `n` quarters. `minus(4)` is the same quarter last year.
    pub fn minus(&self, n: u32) -> QuarterKey {
        QuarterKey::from_index(self.index() - n as i64)
    }

    pub fn plus(&self, n: u32) -> QuarterKey {
        QuarterKey::from_index(self.index() + n as i64)
    }

    fn index(&self) -> i64 {
        self.year as i64 * 4 + (self.quarter as i64 - 1)
    }

    fn from_index(index: i64) -> QuarterKey {
        QuarterKey {
            year: index.div_euclid(4) as i32,
            quarter: index.rem_euclid(4) as u32 + 1,
        }
    }

    /// "Q2 2024", the heading form
    pub fn label(&self) -> String {
        format!("Q{} {}", self.quarter, self.year)
    }
}

impl fmt::Display for QuarterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

// ============================================================================
// MONTH NAMES
// ============================================================================

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.wrapping_sub(1) as usize)
        .copied()
        .unwrap_or("Unknown")
}

/// Parse a three-letter English month abbreviation ("JAN", "jan", "Jan").
pub fn parse_month_abbrev(s: &str) -> Option<u32> {
    if s.len() != 3 {
        return None;
    }
    // chrono's %b is case-insensitive and needs a full date to parse
    NaiveDate::parse_from_str(&format!("2000-{}-01", s), "%Y-%b-%d")
        .ok()
        .map(|d| d.month())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_quarter_mapping() {
        assert_eq!(MonthKey::new(2024, 1).unwrap().quarter(), QuarterKey::new(2024, 1).unwrap());
        assert_eq!(MonthKey::new(2024, 3).unwrap().quarter().quarter, 1);
        assert_eq!(MonthKey::new(2024, 4).unwrap().quarter().quarter, 2);
        assert_eq!(MonthKey::new(2024, 12).unwrap().quarter().quarter, 4);
    }

    #[test]
    fn test_month_minus_crosses_year() {
        let jan = MonthKey::new(2024, 1).unwrap();
        assert_eq!(jan.minus(1), MonthKey::new(2023, 12).unwrap());
        assert_eq!(jan.minus(12), MonthKey::new(2023, 1).unwrap());
        assert_eq!(jan.minus(0), jan);
        assert_eq!(MonthKey::new(2023, 12).unwrap().plus(1), jan);
    }

    #[test]
    fn test_quarter_minus_crosses_year() {
        let q1 = QuarterKey::new(2024, 1).unwrap();
        assert_eq!(q1.minus(1), QuarterKey::new(2023, 4).unwrap());
        assert_eq!(q1.minus(4), QuarterKey::new(2023, 1).unwrap());
        assert_eq!(QuarterKey::new(2024, 3).unwrap().minus(1).to_string(), "2024Q2");
        assert_eq!(QuarterKey::new(2023, 4).unwrap().plus(1), q1);
    }

    #[test]
    fn test_invalid_keys_rejected() {
        assert!(MonthKey::new(2024, 0).is_none());
        assert!(MonthKey::new(2024, 13).is_none());
        assert!(QuarterKey::new(2024, 5).is_none());
    }

    #[test]
    fn test_parse_month_abbrev() {
        assert_eq!(parse_month_abbrev("JAN"), Some(1));
        assert_eq!(parse_month_abbrev("sep"), Some(9));
        assert_eq!(parse_month_abbrev("Dec"), Some(12));
        assert_eq!(parse_month_abbrev("JANUARY"), None);
        assert_eq!(parse_month_abbrev("XYZ"), None);
    }

    #[test]
    fn test_display_forms() {
        let m = MonthKey::new(2024, 3).unwrap();
        assert_eq!(m.to_string(), "2024-03");
        assert_eq!(m.month_name(), "March");
        assert_eq!(m.quarter().label(), "Q1 2024");
        assert_eq!(m.first_day().to_string(), "2024-03-01");
    }
}
