use crate::error::{ConfigurationError, Result};
use chrono::{Days, NaiveDate};

/// Converts spreadsheet column letters to a zero-based index.
///
/// Each letter contributes `value * 26 + (letter - 'A' + 1)`, so `A` is 0,
/// `Z` is 25 and `AA` is 26. Lowercase letters are accepted.
pub fn column_index(letters: &str) -> Result<u32> {
    let trimmed = letters.trim();
    if trimmed.is_empty() {
        return Err(ConfigurationError::InvalidColumn(letters.to_string()));
    }

    let mut value: u32 = 0;
    for ch in trimmed.chars() {
        if !ch.is_ascii_alphabetic() {
            return Err(ConfigurationError::InvalidColumn(letters.to_string()));
        }
        let upper = ch.to_ascii_uppercase() as u8;
        value = value
            .checked_mul(26)
            .and_then(|v| v.checked_add((upper - b'A' + 1) as u32))
            .ok_or_else(|| ConfigurationError::InvalidColumn(letters.to_string()))?;
    }

    Ok(value - 1)
}

/// Converts a zero-based column index back to its letters (`0 -> "A"`, `26 -> "AA"`).
pub fn column_letters(index: u32) -> String {
    let mut col_index = index;
    let mut label = String::new();

    loop {
        let rem = (col_index % 26) as u8;
        label.push((b'A' + rem) as char);
        if col_index < 26 {
            break;
        }
        col_index = col_index / 26 - 1;
    }

    label.chars().rev().collect()
}

/// A1-style address for a 1-based row and zero-based column.
pub fn cell_address(row: u32, column: u32) -> String {
    format!("{}{}", column_letters(column), row)
}

/// Converts an Excel date serial to a calendar date.
///
/// Counts from 1900-01-01 after subtracting two days: one for 1-based day
/// numbering and one for the phantom 1900-02-29 Excel inherited from Lotus.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }

    let adjusted_days = serial.floor() as i64 - 2;
    if adjusted_days < 0 {
        return None;
    }

    NaiveDate::from_ymd_opt(1900, 1, 1)?.checked_add_days(Days::new(adjusted_days as u64))
}

/// Formats an Excel date serial as a period label such as `"Jan 2024"`.
pub fn serial_period_label(serial: f64) -> Option<String> {
    excel_serial_to_date(serial).map(|date| date.format("%b %Y").to_string())
}

/// Parses text that is purely numeric (surrounding whitespace allowed).
pub fn parse_numeric_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Sum of a value series, with missing entries counted as zero.
pub fn series_total(values: &[Option<f64>]) -> f64 {
    values.iter().flatten().sum()
}
