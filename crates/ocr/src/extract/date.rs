use regex::{Captures, Regex};
use tracing::debug;

use super::split_lines;
use crate::types::DateCandidate;

re!(re_numeric_year_last,
    r"\b([0-9]{1,2})[/.-]([0-9]{1,2})[/.-]([0-9]{4})\b");
re!(re_numeric_year_first,
    r"\b([0-9]{4})[/.-]([0-9]{1,2})[/.-]([0-9]{1,2})\b");
re!(re_day_month_name,
    r"(?i)\b([0-9]{1,2})(?:st|nd|rd|th)?[\s-]+(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?[\s,-]*([0-9]{4})\b");
re!(re_numeric_short_year,
    r"\b([0-9]{1,2})[/-]([0-9]{1,2})[/-]([0-9]{2})\b");
re!(re_month_name_day,
    r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+([0-9]{1,2})(?:st|nd|rd|th)?,?\s*([0-9]{4})\b");
re!(re_compact,
    r"\b([0-9]{8})\b");

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

#[derive(Debug, Clone, Copy)]
enum Family {
    NumericYearLast,
    NumericYearFirst,
    DayMonthName,
    NumericShortYear,
    MonthNameDay,
    Compact,
}

fn families() -> [(Family, &'static Regex); 6] {
    [
        (Family::NumericYearLast, re_numeric_year_last()),
        (Family::NumericYearFirst, re_numeric_year_first()),
        (Family::DayMonthName, re_day_month_name()),
        (Family::NumericShortYear, re_numeric_short_year()),
        (Family::MonthNameDay, re_month_name_day()),
        (Family::Compact, re_compact()),
    ]
}

/// Every valid date in the text, in line order and then pattern family order.
pub fn date_candidates(text: &str) -> Vec<DateCandidate> {
    let mut out = Vec::new();
    for (idx, line) in split_lines(text).into_iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        for (family, re) in families() {
            out.extend(re.captures_iter(line).filter_map(|c| interpret(family, &c, idx)));
        }
    }
    out
}

/// The first valid date as `YYYY-MM-DD`.
pub fn extract_date(text: &str) -> Option<String> {
    let found = date_candidates(text).into_iter().next()?;
    debug!(line = found.line, date = %found.to_iso(), "date selected");
    Some(found.to_iso())
}

fn interpret(family: Family, caps: &Captures<'_>, line: usize) -> Option<DateCandidate> {
    let num = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();
    match family {
        // Day first; month first only when that reading is out of range. Reading
        // US-style dates this way goes beyond a strict DD/MM/YYYY parser.
        Family::NumericYearLast => {
            let (a, b, year) = (num(1)?, num(2)?, num(3)? as i32);
            DateCandidate::new(year, b, a, line).or_else(|| DateCandidate::new(year, a, b, line))
        }
        Family::NumericYearFirst => DateCandidate::new(num(1)? as i32, num(2)?, num(3)?, line),
        Family::DayMonthName => {
            let month = month_from_name(caps.get(2)?.as_str())?;
            DateCandidate::new(num(3)? as i32, month, num(1)?, line)
        }
        // Month first; day first only when that reading is out of range.
        Family::NumericShortYear => {
            let (a, b, year) = (num(1)?, num(2)?, expand_year(num(3)?));
            DateCandidate::new(year, a, b, line).or_else(|| DateCandidate::new(year, b, a, line))
        }
        Family::MonthNameDay => {
            let month = month_from_name(caps.get(1)?.as_str())?;
            DateCandidate::new(num(3)? as i32, month, num(2)?, line)
        }
        // ASCII digits only, so byte slicing is safe.
        Family::Compact => {
            let digits = caps.get(1)?.as_str();
            DateCandidate::new(
                digits[..4].parse().ok()?,
                digits[4..6].parse().ok()?,
                digits[6..8].parse().ok()?,
                line,
            )
        }
    }
}

fn expand_year(y: u32) -> i32 {
    let y = y as i32;
    if y < 50 { 2000 + y } else { 1900 + y }
}

/// `1..=12` from the first three letters of an English month name.
fn month_from_name(name: &str) -> Option<u32> {
    let prefix = name.get(..3)?.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == prefix)
        .map(|i| i as u32 + 1)
}
