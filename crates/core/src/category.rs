use serde::{Deserialize, Serialize};
use std::fmt;

/// Spending category assigned to a receipt. Closed set: anything that does not
/// match lands in [`Category::Others`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Food & Dining")]
    FoodAndDining,
    #[serde(rename = "Transportation")]
    Transportation,
    #[serde(rename = "Shopping")]
    Shopping,
    #[serde(rename = "Entertainment")]
    Entertainment,
    #[serde(rename = "Healthcare")]
    Healthcare,
    #[serde(rename = "Bills & Utilities")]
    BillsAndUtilities,
    #[serde(rename = "Education")]
    Education,
    #[serde(rename = "Groceries")]
    Groceries,
    #[default]
    #[serde(rename = "Others")]
    Others,
}

impl Category {
    /// Every category in enumeration order. Classifier ties resolve to the
    /// earlier entry.
    pub const ALL: [Category; 9] = [
        Category::FoodAndDining,
        Category::Transportation,
        Category::Shopping,
        Category::Entertainment,
        Category::Healthcare,
        Category::BillsAndUtilities,
        Category::Education,
        Category::Groceries,
        Category::Others,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::FoodAndDining => "Food & Dining",
            Category::Transportation => "Transportation",
            Category::Shopping => "Shopping",
            Category::Entertainment => "Entertainment",
            Category::Healthcare => "Healthcare",
            Category::BillsAndUtilities => "Bills & Utilities",
            Category::Education => "Education",
            Category::Groceries => "Groceries",
            Category::Others => "Others",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("Unknown category: '{wanted}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn display_uses_labels() {
        assert_eq!(Category::FoodAndDining.to_string(), "Food & Dining");
        assert_eq!(Category::BillsAndUtilities.to_string(), "Bills & Utilities");
        assert_eq!(Category::Others.to_string(), "Others");
    }

    #[test]
    fn from_str_accepts_every_label() {
        for c in Category::ALL {
            assert_eq!(Category::from_str(c.label()).unwrap(), c);
        }
        assert_eq!(Category::from_str("groceries").unwrap(), Category::Groceries);
        assert!(Category::from_str("Pets").is_err());
    }

    #[test]
    fn default_is_others() {
        assert_eq!(Category::default(), Category::Others);
    }

    #[test]
    fn serde_uses_labels() {
        let json = serde_json::to_string(&Category::FoodAndDining).unwrap();
        assert_eq!(json, "\"Food & Dining\"");
        let back: Category = serde_json::from_str("\"Bills & Utilities\"").unwrap();
        assert_eq!(back, Category::BillsAndUtilities);
    }
}
