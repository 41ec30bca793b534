//! Date handling for court documents and index series
//!
//! Dates cross the crate boundary as `DD/MM/YYYY` strings. Month/year-only
//! inputs (`MM/YYYY`) are normalised to the first day of the month, and ISO
//! `YYYY-MM-DD` is accepted as well.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CalcError, CalcResult};

/// Display/wire format used by courts and the SGS API
pub const BR_DATE_FORMAT: &str = "%d/%m/%Y";

/// Parse a date in `DD/MM/YYYY`, `MM/YYYY` or `YYYY-MM-DD` form
pub fn parse_br_date(input: &str) -> CalcResult<NaiveDate> {
    let s = input.trim();
    if s.is_empty() {
        return Err(CalcError::InvalidDate("empty date".to_string()));
    }

    if s.contains('/') {
        let parts: Vec<&str> = s.split('/').map(str::trim).collect();
        let (day, month, year) = match parts.as_slice() {
            [d, m, y] => (parse_field(d, s)?, parse_field(m, s)?, parse_field(y, s)?),
            [m, y] => (1, parse_field(m, s)?, parse_field(y, s)?),
            _ => return Err(CalcError::InvalidDate(format!("unrecognised date '{}'", s))),
        };
        return NaiveDate::from_ymd_opt(year as i32, month, day)
            .ok_or_else(|| CalcError::InvalidDate(format!("no such day '{}'", s)));
    }

    if s.contains('-') {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| CalcError::InvalidDate(format!("'{}': {}", s, e)));
    }

    Err(CalcError::InvalidDate(format!("unrecognised date '{}'", s)))
}

fn parse_field(field: &str, whole: &str) -> CalcResult<u32> {
    field
        .parse::<u32>()
        .map_err(|_| CalcError::InvalidDate(format!("non-numeric field in '{}'", whole)))
}

/// Normalise an optional date string to `DD/MM/YYYY`.
/// Blank or unparseable input yields `None`.
pub fn normalize_br_date(input: Option<&str>) -> Option<String> {
    let s = input?.trim();
    if s.is_empty() {
        return None;
    }
    parse_br_date(s).ok().map(format_br_date)
}

/// Format as `DD/MM/YYYY`
pub fn format_br_date(date: NaiveDate) -> String {
    date.format(BR_DATE_FORMAT).to_string()
}

/// Whole months between two dates, ignoring the day of month.
///
/// `(endYear - startYear) * 12 + (endMonth - startMonth)`: 31/01 to 01/02 counts
/// as one month. Negative when `start` is in a later month than `end`.
pub fn whole_months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    (end.year() - start.year()) * 12 + (end.month() as i32 - start.month() as i32)
}

/// Shift a date forward by whole months, clamping to the last day of the month
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

/// Parse an amount written the Brazilian way (`1.234,56`, `R$ 1.000`),
/// tolerating currency symbols. Dots are thousands separators, except that a
/// single dot followed by one or two digits (`1234.56`) is read as a decimal
/// point. Blank input is zero.
pub fn parse_br_number(input: &str) -> CalcResult<f64> {
    let s = input.trim();
    if s.is_empty() {
        return Ok(0.0);
    }

    let kept: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();

    let cleaned = if kept.contains(',') {
        kept.replace('.', "").replace(',', ".")
    } else {
        match kept.split_once('.') {
            Some((_, decimals))
                if !decimals.contains('.') && (1..=2).contains(&decimals.len()) =>
            {
                kept
            }
            _ => kept.replace('.', ""),
        }
    };

    cleaned
        .parse::<f64>()
        .map_err(|_| CalcError::Parse(format!("invalid amount '{}'", input)))
}

/// Calendar month key used to pair series that report different days in a month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }
}

impl From<NaiveDate> for YearMonth {
    fn from(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{}", self.month, self.year)
    }
}

/// Serde adapter for `NaiveDate` as `DD/MM/YYYY`
pub mod br_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_br_date(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_br_date(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_formats() {
        assert_eq!(parse_br_date("15/03/2022").unwrap(), d(2022, 3, 15));
        assert_eq!(parse_br_date(" 5/3/2022 ").unwrap(), d(2022, 3, 5));
        assert_eq!(parse_br_date("2022-03-15").unwrap(), d(2022, 3, 15));
    }

    #[test]
    fn test_month_year_assumes_day_one() {
        assert_eq!(parse_br_date("03/2022").unwrap(), d(2022, 3, 1));
        assert_eq!(normalize_br_date(Some("07/2019")).as_deref(), Some("01/07/2019"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_br_date("").is_err());
        assert!(parse_br_date("31/02/2022").is_err());
        assert!(parse_br_date("abc").is_err());
        assert!(parse_br_date("1/2/3/4").is_err());
        assert_eq!(normalize_br_date(Some("  ")), None);
        assert_eq!(normalize_br_date(None), None);
    }

    #[test]
    fn test_whole_months_ignores_day() {
        assert_eq!(whole_months_between(d(2020, 1, 1), d(2021, 1, 1)), 12);
        assert_eq!(whole_months_between(d(2020, 1, 31), d(2020, 2, 1)), 1);
        assert_eq!(whole_months_between(d(2020, 5, 10), d(2020, 5, 28)), 0);
        assert_eq!(whole_months_between(d(2021, 1, 1), d(2020, 1, 1)), -12);
    }

    #[test]
    fn test_add_months_clamps() {
        assert_eq!(add_months(d(2020, 1, 31), 1), d(2020, 2, 29));
        assert_eq!(add_months(d(2010, 6, 15), 120), d(2020, 6, 15));
    }

    #[test]
    fn test_parse_br_number() {
        assert_eq!(parse_br_number("1.234,56").unwrap(), 1234.56);
        assert_eq!(parse_br_number("R$ 10.000,00").unwrap(), 10000.0);
        assert_eq!(parse_br_number("5000.5").unwrap(), 5000.5);
        assert_eq!(parse_br_number("1234.56").unwrap(), 1234.56);
        assert_eq!(parse_br_number("").unwrap(), 0.0);
        assert!(parse_br_number("abc").is_err());
    }

    #[test]
    fn test_parse_br_number_without_cents() {
        assert_eq!(parse_br_number("1.000").unwrap(), 1000.0);
        assert_eq!(parse_br_number("R$ 15.750").unwrap(), 15750.0);
        assert_eq!(parse_br_number("1.234.567").unwrap(), 1_234_567.0);
        assert_eq!(parse_br_number("R$ 1.234.567,89").unwrap(), 1_234_567.89);
    }

    #[test]
    fn test_year_month_ordering_and_display() {
        let a = YearMonth::from(d(2020, 12, 31));
        let b = YearMonth::from(d(2021, 1, 1));
        assert!(a < b);
        assert_eq!(a.to_string(), "12/2020");
        assert_eq!(YearMonth::from(d(2021, 1, 15)), b);
    }
}
