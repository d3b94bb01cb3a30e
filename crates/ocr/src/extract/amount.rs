use std::collections::BTreeMap;
use std::ops::Range;
use std::str::FromStr;

use regex::Regex;
use rust_decimal::Decimal;
use tally_core::Money;
use tracing::debug;

use super::split_lines;
use crate::types::{AmountCandidate, AmountPattern};

// Labeled and currency patterns accept `1,234.56`, `1.234,56`, `12,50` and `12.50`.
re!(re_total_label,
    r"(?i)total[:\s]*[$€£¥₹]?\s*([0-9]{1,3}(?:,[0-9]{3})+(?:\.[0-9]{2})?|[0-9]{1,3}(?:\.[0-9]{3})+,[0-9]{2}|[0-9]+(?:[.,][0-9]{1,2})?)");
re!(re_amount_label,
    r"(?i)amount[:\s]*[$€£¥₹]?\s*([0-9]{1,3}(?:,[0-9]{3})+(?:\.[0-9]{2})?|[0-9]{1,3}(?:\.[0-9]{3})+,[0-9]{2}|[0-9]+(?:[.,][0-9]{1,2})?)");
re!(re_currency_prefix,
    r"[$€£¥₹]\s*([0-9]{1,3}(?:,[0-9]{3})+(?:\.[0-9]{2})?|[0-9]{1,3}(?:\.[0-9]{3})+,[0-9]{2}|[0-9]+(?:[.,][0-9]{1,2})?)");
re!(re_currency_suffix,
    r"([0-9]+(?:[.,][0-9]{3})*[.,][0-9]{2})\s*[$€£¥₹]");
re!(re_two_decimal,
    r"(?:^|[^0-9.,])([0-9]+\.[0-9]{2})\b");
re!(re_comma_decimal,
    r"(?:^|[^0-9.,])([0-9]+,[0-9]{2})\b");
re!(re_grouped,
    r"(?:^|[^0-9.,])([0-9]{1,3}(?:[.,][0-9]{3})+[.,][0-9]{2})\b");
re!(re_standalone,
    r"\b([0-9]+\.[0-9]{2})\b");

// "total" / "amount" as a word of its own; OCR often glues digits on, so only
// letters count as a word boundary. "Subtotal" does not qualify.
re!(re_total_keyword,
    r"(?i)(?:^|[^a-z])(?:total|amount)(?:[^a-z]|$)");

fn patterns() -> [(AmountPattern, &'static Regex); 8] {
    [
        (AmountPattern::TotalLabel, re_total_label()),
        (AmountPattern::AmountLabel, re_amount_label()),
        (AmountPattern::CurrencyPrefix, re_currency_prefix()),
        (AmountPattern::CurrencySuffix, re_currency_suffix()),
        (AmountPattern::TwoDecimal, re_two_decimal()),
        (AmountPattern::CommaDecimal, re_comma_decimal()),
        (AmountPattern::Grouped, re_grouped()),
        (AmountPattern::Standalone, re_standalone()),
    ]
}

const MIN_AMOUNT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
const MAX_AMOUNT: Decimal = Decimal::from_parts(99_999_999, 0, 0, false, 2);

// ── Candidates ────────────────────────────────────────────────────────────────

/// Every plausible amount in the text, in line order and then pattern
/// priority. A span of text claimed by a higher-priority pattern is not
/// counted again by a lower one.
pub fn amount_candidates(text: &str) -> Vec<AmountCandidate> {
    let mut out = Vec::new();

    for (idx, line) in split_lines(text).into_iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let mut claimed: Vec<Range<usize>> = Vec::new();
        for (pattern, re) in patterns() {
            for caps in re.captures_iter(line) {
                let Some(m) = caps.get(1) else { continue };
                let span = m.range();
                if claimed.iter().any(|c| c.start < span.end && span.start < c.end) {
                    continue;
                }
                claimed.push(span);
                if let Some(value) = normalize_amount(m.as_str()) {
                    out.push(AmountCandidate {
                        value,
                        line: idx,
                        pattern,
                        literal: m.as_str().to_string(),
                    });
                }
            }
        }
    }

    out
}

// ── Disambiguation ────────────────────────────────────────────────────────────

/// The receipt total, chosen among all candidates:
/// a repeated value, else a value next to a "total"/"amount" line, else the
/// largest value.
pub fn extract_amount(text: &str) -> Option<Money> {
    let candidates = amount_candidates(text);
    if candidates.is_empty() {
        return None;
    }

    if let Some(value) = most_frequent(&candidates) {
        debug!(%value, rule = "frequency", "amount selected");
        return Some(value);
    }

    let lines = split_lines(text);
    if let Some(value) = near_total_line(&lines, &candidates) {
        debug!(%value, rule = "near_total", "amount selected");
        return Some(value);
    }

    let value = candidates.iter().map(|c| c.value).max()?;
    debug!(%value, rule = "largest", "amount selected");
    Some(value)
}

/// A value seen more than once. Equal counts go to the larger value.
fn most_frequent(candidates: &[AmountCandidate]) -> Option<Money> {
    let mut counts: BTreeMap<Money, usize> = BTreeMap::new();
    for c in candidates {
        *counts.entry(c.value).or_default() += 1;
    }
    counts
        .into_iter()
        .max_by_key(|&(value, count)| (count, value))
        .filter(|&(_, count)| count > 1)
        .map(|(value, _)| value)
}

/// Scan each keyword line and up to two lines either side, nearest line first;
/// at equal distance the following line goes before the preceding one.
fn near_total_line(lines: &[&str], candidates: &[AmountCandidate]) -> Option<Money> {
    const OFFSETS: [isize; 5] = [0, 1, -1, 2, -2];

    for (idx, _) in lines
        .iter()
        .enumerate()
        .filter(|(_, l)| re_total_keyword().is_match(l))
    {
        for offset in OFFSETS {
            let Some(line) = idx.checked_add_signed(offset).and_then(|i| lines.get(i)) else {
                continue;
            };
            if let Some(c) = candidates.iter().find(|c| appears_in(line, c)) {
                return Some(c.value);
            }
        }
    }
    None
}

/// Whether the candidate's literal, decimal or integer form occurs in `line`
/// as a whole number, so `1.00` does not match inside `11.00`.
fn appears_in(line: &str, candidate: &AmountCandidate) -> bool {
    let dec = candidate.value.as_decimal();
    let mut forms = vec![
        candidate.literal.clone(),
        candidate.value.to_plain_string(),
        dec.normalize().to_string(),
        candidate.value.to_plain_string().replace('.', ","),
    ];
    let whole = dec.trunc();
    if !whole.is_zero() {
        forms.push(whole.normalize().to_string());
    }
    forms.iter().any(|f| contains_number(line, f))
}

fn contains_number(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let mut after = haystack[start + needle.len()..].chars();
        let before_ok = !matches!(before, Some(c) if c.is_ascii_digit() || c == '.' || c == ',');
        let after_ok = match after.next() {
            Some(c) if c.is_ascii_digit() => false,
            Some('.') | Some(',') => !after.next().is_some_and(|c| c.is_ascii_digit()),
            _ => true,
        };
        before_ok && after_ok
    })
}

// ── Normalization ─────────────────────────────────────────────────────────────

/// Turn a matched literal into a money value.
///
/// With both `,` and `.` present the last one is the decimal point. With a
/// single kind of separator, groups of exactly three digits after a comma (or
/// after repeated periods) are thousands; otherwise the last separator is the
/// decimal point. Values outside `[0.01, 999999.99]` are rejected.
pub(crate) fn normalize_amount(literal: &str) -> Option<Money> {
    let s: String = literal.chars().filter(|c| !c.is_whitespace()).collect();
    let has_comma = s.contains(',');
    let has_dot = s.contains('.');
    let last_sep = s.rfind([',', '.']);

    let decimal_at = match (has_comma, has_dot) {
        (false, false) => None,
        (true, true) => last_sep,
        _ => {
            let sep_count = s.matches([',', '.']).count();
            let frac_len = last_sep.map_or(0, |p| s.len() - p - 1);
            if frac_len == 3 && (has_comma || sep_count > 1) {
                None
            } else {
                last_sep
            }
        }
    };

    let canonical: String = s
        .char_indices()
        .filter_map(|(i, c)| match c {
            '0'..='9' => Some(c),
            _ if Some(i) == decimal_at => Some('.'),
            _ => None,
        })
        .collect();

    let dec = Decimal::from_str(&canonical).ok()?;
    if dec < MIN_AMOUNT || dec > MAX_AMOUNT {
        return None;
    }
    Some(Money::from_decimal(dec))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
