use std::collections::HashSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tally_core::Money;

/// Additive heuristic score in `[0, 1]` for how much an extraction can be trusted.
///
/// Text shape contributes a little; each present field contributes more, with
/// a bonus when the value looks sensible; two or more fields add 0.1 each.
pub fn score_confidence(
    text: &str,
    amount: Option<Money>,
    merchant: Option<&str>,
    date: Option<&str>,
) -> f32 {
    let mut score = 0.0f32;

    if text.chars().count() > 50 {
        score += 0.15;
    }
    if text.chars().collect::<HashSet<_>>().len() > 20 {
        score += 0.10;
    }

    if let Some(amount) = amount {
        score += 0.30;
        let v = amount.as_decimal();
        if (Decimal::ONE..=Decimal::from(10_000)).contains(&v) {
            score += 0.15;
        } else if (Decimal::new(1, 2)..=Decimal::from(100_000)).contains(&v) {
            score += 0.10;
        }
    }

    let merchant_len = merchant.map_or(0, |m| m.chars().count());
    if merchant_len > 2 {
        score += 0.20;
        if merchant_len > 5 {
            score += 0.10;
        }
    }

    if let Some(date) = date {
        score += 0.15;
        if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok() {
            score += 0.10;
        }
    }

    let present = [amount.is_some(), merchant.is_some(), date.is_some()]
        .into_iter()
        .filter(|p| *p)
        .count();
    if present >= 2 {
        score += 0.1 * present as f32;
    }

    score.clamp(0.0, 1.0)
}
