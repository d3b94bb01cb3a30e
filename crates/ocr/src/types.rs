use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tally_core::{Category, DraftError, ExpenseDraft, Money};

/// Which recognition pattern produced an amount, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountPattern {
    TotalLabel,
    AmountLabel,
    CurrencyPrefix,
    CurrencySuffix,
    TwoDecimal,
    CommaDecimal,
    Grouped,
    Standalone,
}

/// A monetary value found on one line of the receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountCandidate {
    pub value: Money,
    /// Zero-based index of the source line.
    pub line: usize,
    pub pattern: AmountPattern,
    /// The matched text before normalization, e.g. `1.234,56`.
    pub literal: String,
}

/// A date found on one line. Month and day are range-checked only; `31` is
/// accepted for every month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateCandidate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub line: usize,
}

impl DateCandidate {
    pub fn new(year: i32, month: u32, day: u32, line: usize) -> Option<Self> {
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return None;
        }
        Some(Self { year, month, day, line })
    }

    pub fn to_iso(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MerchantPass {
    Indicator,
    Shape,
    Scored,
    Fallback,
}

/// A line considered a plausible business name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantCandidate {
    pub name: String,
    pub line: usize,
    pub pass: MerchantPass,
    /// length × letters / max(digits, 1)
    pub score: f32,
}

/// Structured output of one extraction call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub amount: Option<Money>,
    pub merchant: Option<String>,
    /// `YYYY-MM-DD`
    pub date: Option<String>,
    pub category: Category,
    pub raw_text: String,
    /// Heuristic reliability estimate in `[0, 1]`.
    pub confidence: f32,
    pub success: bool,
    pub error: Option<String>,
}

impl ExtractionResult {
    /// A failed result: every field at its safe default and zero confidence.
    pub fn failed(raw_text: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            amount: None,
            merchant: None,
            date: None,
            category: Category::Others,
            raw_text: raw_text.into(),
            confidence: 0.0,
            success: false,
            error: Some(error.into()),
        }
    }

    /// Whether the extraction is good enough to auto-suggest without human review.
    pub fn needs_review(&self) -> bool {
        !self.success || self.confidence < 0.7
    }

    /// Map a successful result onto the persisted expense shape. A missing or
    /// impossible date falls back to `fallback_date`.
    pub fn to_expense_draft(&self, fallback_date: NaiveDate) -> Result<ExpenseDraft, DraftError> {
        if !self.success {
            return Err(DraftError::NotSuccessful(
                self.error.clone().unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        let amount = self.amount.ok_or(DraftError::MissingAmount)?;
        let date = self
            .date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .unwrap_or(fallback_date);
        let description = self.merchant.as_deref().unwrap_or("Receipt");
        ExpenseDraft::spend(date, self.category, description, amount, Some(self.confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_result() -> ExtractionResult {
        ExtractionResult {
            amount: Some(Money::from_cents(1100)),
            merchant: Some("CORNER CAFE".into()),
            date: Some("2024-03-15".into()),
            category: Category::FoodAndDining,
            raw_text: "CORNER CAFE\n2024-03-15\nTotal 11.00".into(),
            confidence: 0.95,
            success: true,
            error: None,
        }
    }

    #[test]
    fn date_candidate_range_checks() {
        assert!(DateCandidate::new(2024, 13, 1, 0).is_none());
        assert!(DateCandidate::new(2024, 0, 1, 0).is_none());
        assert!(DateCandidate::new(2024, 1, 32, 0).is_none());
        assert!(DateCandidate::new(2024, 2, 31, 0).is_some());
    }

    #[test]
    fn date_candidate_iso() {
        let d = DateCandidate::new(2024, 3, 5, 2).unwrap();
        assert_eq!(d.to_iso(), "2024-03-05");
        assert_eq!(DateCandidate::new(2023, 2, 30, 0).unwrap().to_iso(), "2023-02-30");
    }

    #[test]
    fn failed_result_holds_safe_defaults() {
        let r = ExtractionResult::failed("", "no backend");
        assert!(!r.success);
        assert_eq!(r.amount, None);
        assert_eq!(r.merchant, None);
        assert_eq!(r.date, None);
        assert_eq!(r.category, Category::Others);
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.error.as_deref(), Some("no backend"));
        assert!(r.needs_review());
    }

    #[test]
    fn needs_review_threshold() {
        let high = ok_result();
        assert!(!high.needs_review());
        let low = ExtractionResult { confidence: 0.5, ..ok_result() };
        assert!(low.needs_review());
    }

    #[test]
    fn expense_draft_from_result() {
        let fallback = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let draft = ok_result().to_expense_draft(fallback).unwrap();
        assert_eq!(draft.date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(draft.amount.to_cents(), -1100);
        assert_eq!(draft.description, "CORNER CAFE");
        assert_eq!(draft.category, Category::FoodAndDining);
    }

    #[test]
    fn expense_draft_uses_fallback_for_impossible_date() {
        let fallback = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let r = ExtractionResult { date: Some("2024-02-31".into()), merchant: None, ..ok_result() };
        let draft = r.to_expense_draft(fallback).unwrap();
        assert_eq!(draft.date, fallback);
        assert_eq!(draft.description, "Receipt");
    }

    #[test]
    fn expense_draft_rejects_failed_and_amountless() {
        let fallback = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert!(matches!(
            ExtractionResult::failed("", "boom").to_expense_draft(fallback),
            Err(DraftError::NotSuccessful(_))
        ));
        let r = ExtractionResult { amount: None, ..ok_result() };
        assert_eq!(r.to_expense_draft(fallback), Err(DraftError::MissingAmount));
    }

    #[test]
    fn result_serializes_with_expected_fields() {
        let json = serde_json::to_value(ok_result()).unwrap();
        assert_eq!(json["category"], "Food & Dining");
        assert_eq!(json["date"], "2024-03-15");
        assert_eq!(json["success"], true);
        assert!(json["error"].is_null());
        assert!(json.get("raw_text").is_some());
    }
}
