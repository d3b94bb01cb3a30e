use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::category::Category;
use super::money::Money;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("Extraction did not succeed: {0}")]
    NotSuccessful(String),
    #[error("No amount was found on the receipt")]
    MissingAmount,
    #[error("Spend amount must be positive, got {0}")]
    NonPositiveAmount(Money),
}

/// The shape a caller persists as an expense record. Spending is stored as a
/// negative amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseDraft {
    pub date: NaiveDate,
    pub category: Category,
    pub description: String,
    pub amount: Money,
    pub confidence: Option<f32>,
}

impl ExpenseDraft {
    /// Build a draft for money spent. `spent` is the positive receipt total.
    pub fn spend(
        date: NaiveDate,
        category: Category,
        description: &str,
        spent: Money,
        confidence: Option<f32>,
    ) -> Result<ExpenseDraft, DraftError> {
        if spent <= Money::zero() {
            return Err(DraftError::NonPositiveAmount(spent));
        }
        Ok(ExpenseDraft {
            date,
            category,
            description: description.trim().to_string(),
            amount: -spent,
            confidence,
        })
    }
}
