use crate::errors::{DatasusError, DatasusResult};
use chrono::{Datelike, Local};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Mapping of month numbers to Portuguese month names
pub static MONTHS: Lazy<HashMap<u32, &'static str>> = Lazy::new(|| {
    let mut months = HashMap::new();
    months.insert(1, "Janeiro");
    months.insert(2, "Fevereiro");
    months.insert(3, "Março");
    months.insert(4, "Abril");
    months.insert(5, "Maio");
    months.insert(6, "Junho");
    months.insert(7, "Julho");
    months.insert(8, "Agosto");
    months.insert(9, "Setembro");
    months.insert(10, "Outubro");
    months.insert(11, "Novembro");
    months.insert(12, "Dezembro");
    months
});

/// Expands a two-digit year to four digits.
///
/// Years above the current two-digit year belong to the previous century.
/// Years of three or more digits are returned unchanged.
///
/// # Example
/// ```rust
/// use datasus::models::date_utils::zfill_year;
///
/// assert_eq!(zfill_year(96), 1996);
/// assert_eq!(zfill_year(5), 2005);
/// assert_eq!(zfill_year(2024), 2024);
/// ```
pub fn zfill_year(year: i32) -> i32 {
    if !(0..100).contains(&year) {
        return year;
    }
    let current_year = Local::now().year();
    let century = (current_year / 100) * 100;
    if year > current_year % 100 {
        century - 100 + year
    } else {
        century + year
    }
}

/// Parses the two- or four-digit year slice of a file name
pub fn year_from_digits(digits: &str) -> Option<i32> {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(zfill_year)
}

/// Converts month number to Portuguese month name
pub fn get_month(month: u32) -> DatasusResult<&'static str> {
    MONTHS
        .get(&month)
        .copied()
        .ok_or_else(|| DatasusError::validation("month", [month.to_string()]))
}

/// Normalizes a year filter to four-digit years, rejecting negative values
pub fn parse_years(years: &[i32]) -> DatasusResult<Vec<i32>> {
    let invalid: Vec<String> = years
        .iter()
        .filter(|y| !(0..=9999).contains(*y))
        .map(|y| y.to_string())
        .collect();
    if !invalid.is_empty() {
        return Err(DatasusError::validation("year", invalid));
    }
    Ok(years.iter().copied().map(zfill_year).collect())
}

/// Validates a month filter (1..=12)
pub fn parse_months(months: &[u32]) -> DatasusResult<Vec<u32>> {
    let invalid: Vec<String> = months
        .iter()
        .filter(|m| !MONTHS.contains_key(*m))
        .map(|m| m.to_string())
        .collect();
    if !invalid.is_empty() {
        return Err(DatasusError::validation("month", invalid));
    }
    Ok(months.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_months_mapping() {
        assert_eq!(MONTHS.get(&1), Some(&"Janeiro"));
        assert_eq!(MONTHS.get(&12), Some(&"Dezembro"));
        assert_eq!(MONTHS.get(&13), None);
    }

    #[test]
    fn test_zfill_year_centuries() {
        let current = Local::now().year() % 100;
        assert_eq!(zfill_year(current), 2000 + current);
        assert_eq!(zfill_year(99), 1999);
        assert_eq!(zfill_year(0), 2000);
        assert_eq!(zfill_year(1996), 1996);
    }

    #[test]
    fn test_year_from_digits() {
        assert_eq!(year_from_digits("96"), Some(1996));
        assert_eq!(year_from_digits("2021"), Some(2021));
        assert_eq!(year_from_digits("2a"), None);
        assert_eq!(year_from_digits(""), None);
    }

    #[test]
    fn test_get_month() {
        assert_eq!(get_month(3).unwrap(), "Março");
        assert!(get_month(0).is_err());
        assert!(get_month(13).is_err());
    }

    #[test]
    fn test_parse_filters() {
        assert_eq!(parse_years(&[96, 2001]).unwrap(), vec![1996, 2001]);
        assert!(parse_years(&[-1]).is_err());
        assert_eq!(parse_months(&[1, 12]).unwrap(), vec![1, 12]);
        match parse_months(&[13, 0]) {
            Err(DatasusError::Validation { values, .. }) => {
                assert_eq!(values, vec!["0".to_string(), "13".to_string()])
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
