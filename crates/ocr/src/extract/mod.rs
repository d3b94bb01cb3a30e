//! Heuristic field extraction over raw OCR text.
//!
//! Each extractor works line by line and never fails: a field with no
//! plausible candidate is simply absent.

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static regex::Regex {
            static R: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
            R.get_or_init(|| regex::Regex::new($pat).expect("invalid regex"))
        }
    };
}

pub mod amount;
pub mod category;
pub mod confidence;
pub mod date;
pub mod merchant;

pub use amount::{amount_candidates, extract_amount};
pub use category::KeywordTable;
pub use confidence::score_confidence;
pub use date::{date_candidates, extract_date};
pub use merchant::{extract_merchant, merchant_candidate};

use crate::types::ExtractionResult;

// ── Public extraction API ─────────────────────────────────────────────────────

/// Runs every field extractor over one text blob.
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    keywords: KeywordTable,
}

impl Extractor {
    pub fn new(keywords: KeywordTable) -> Self {
        Self { keywords }
    }

    /// Extract structured fields from raw OCR text. Always succeeds.
    pub fn extract(&self, ocr_text: &str) -> ExtractionResult {
        let amount = extract_amount(ocr_text);
        let date = extract_date(ocr_text);
        let merchant = extract_merchant(ocr_text);
        let category = self.keywords.classify(ocr_text, merchant.as_deref());
        let confidence =
            score_confidence(ocr_text, amount, merchant.as_deref(), date.as_deref());

        ExtractionResult {
            amount,
            merchant,
            date,
            category,
            raw_text: ocr_text.to_string(),
            confidence,
            success: true,
            error: None,
        }
    }
}

/// Lines as the extractors see them: trimmed, indices stable.
pub(crate) fn split_lines(text: &str) -> Vec<&str> {
    text.lines().map(str::trim).collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
