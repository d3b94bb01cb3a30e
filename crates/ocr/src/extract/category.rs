use tally_core::Category;
use tracing::debug;

use super::split_lines;

/// Built-in keywords per category. Order matters: the merchant check stops at
/// the first category with a hit, and text-score ties go to the earlier one.
const BUILTIN_KEYWORDS: &[(Category, &[&str])] = &[
    (Category::FoodAndDining, &[
        "restaurant", "cafe", "coffee", "food", "dining", "pizza", "burger", "subway",
        "mcdonalds", "kfc", "dominos", "taco bell", "starbucks", "wendy", "burger king",
        "chipotle", "panera", "dunkin", "mexico", "italian", "chinese", "indian",
        "sushi", "steak", "grill", "pub", "bar", "wine", "beer",
    ]),
    (Category::Transportation, &[
        "uber", "lyft", "taxi", "gas", "fuel", "parking", "metro", "bus", "train",
        "flight", "airline", "car", "vehicle", "auto", "petrol", "diesel", "toll",
        "rental", "uber eats", "doordash", "grubhub",
    ]),
    (Category::Shopping, &[
        "store", "shop", "mall", "amazon", "walmart", "target", "clothing", "fashion",
        "electronics", "best buy", "costco", "ikea", "home depot", "lowes", "macys",
        "nike", "adidas", "zara", "uniqlo", "h&m", "gap", "books", "toys", "gift",
    ]),
    (Category::Entertainment, &[
        "movie", "cinema", "theater", "netflix", "spotify", "game", "entertainment",
        "concert", "ticket", "disney", "hulu", "youtube", "prime video", "hbo",
        "playstation", "xbox", "nintendo", "steam", "apple music", "tidal",
    ]),
    (Category::Healthcare, &[
        "pharmacy", "drug", "medical", "doctor", "hospital", "clinic", "cvs", "walgreens",
        "cvs pharmacy", "rite aid", "dentist", "optometrist", "therapy", "prescription",
        "vitamin", "supplement", "insurance",
    ]),
    (Category::BillsAndUtilities, &[
        "electric", "water", "internet", "phone", "cable", "utility", "bill", "payment",
        "verizon", "at&t", "comcast", "xfinity", "spectrum", "duke energy", "pg&e",
        "rent", "mortgage", "subscription", "membership", "fee",
    ]),
    (Category::Education, &[
        "school", "university", "college", "book", "tuition", "education", "course",
        "student", "loan", "textbook", "software", "udemy", "coursera", "skillshare",
        "khan academy", "harvard", "mit", "stanford",
    ]),
    (Category::Groceries, &[
        "grocery", "market", "supermarket", "whole foods", "trader joe", "aldi", "kroger",
        "safeway", "publix", "winn-dixie", "food lion", "fresh market", "produce", "vegetable",
    ]),
];

/// Words that mark a line as part of the totals block; keywords there count double.
const TOTAL_MARKERS: [&str; 3] = ["total", "amount", "subtotal"];

/// Keywords shorter than this only count as whole words.
const PARTIAL_MIN_LEN: usize = 5;

/// Category keyword table plus the scoring that uses it.
#[derive(Debug, Clone)]
pub struct KeywordTable {
    entries: Vec<(Category, Vec<String>)>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self {
            entries: BUILTIN_KEYWORDS
                .iter()
                .map(|(cat, words)| (*cat, words.iter().map(|w| w.to_string()).collect()))
                .collect(),
        }
    }
}

impl KeywordTable {
    /// Append extra keywords to a category, after its built-in ones.
    pub fn extend<I, S>(&mut self, category: Category, keywords: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = keywords
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty());
        match self.entries.iter_mut().find(|(c, _)| *c == category) {
            Some((_, existing)) => existing.extend(words),
            None => self.entries.push((category, words.collect())),
        }
    }

    /// Merchant keywords first, then a scored pass over the whole text.
    pub fn classify(&self, text: &str, merchant: Option<&str>) -> Category {
        if let Some(cat) = merchant.and_then(|m| self.match_merchant(m)) {
            debug!(category = %cat, "category from merchant");
            return cat;
        }

        let mut best = (Category::Others, 0.0f32);
        for (cat, score) in self.score_text(text) {
            if score > best.1 {
                best = (cat, score);
            }
        }
        debug!(category = %best.0, score = best.1, "category from text");
        best.0
    }

    /// First category, in table order, with a keyword inside the merchant name.
    pub fn match_merchant(&self, merchant: &str) -> Option<Category> {
        let merchant = merchant.to_lowercase();
        if merchant.trim().is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(_, words)| words.iter().any(|w| merchant.contains(w.as_str())))
            .map(|(cat, _)| *cat)
    }

    /// Per-category keyword score over every line, in table order.
    ///
    /// A whole-word hit scores 1 (2 on a totals line); a keyword of five or
    /// more characters found only inside another word scores half that.
    pub fn score_text(&self, text: &str) -> Vec<(Category, f32)> {
        let lower = text.to_lowercase();
        let lines: Vec<&str> = split_lines(&lower).into_iter().filter(|l| !l.is_empty()).collect();

        self.entries
            .iter()
            .map(|(cat, words)| {
                let score = lines
                    .iter()
                    .map(|line| {
                        let weight = if TOTAL_MARKERS.iter().any(|m| line.contains(m)) { 2.0 } else { 1.0 };
                        words.iter().map(|w| weight * keyword_hit(line, w)).sum::<f32>()
                    })
                    .sum();
                (*cat, score)
            })
            .collect()
    }
}

fn keyword_hit(line: &str, keyword: &str) -> f32 {
    if contains_word(line, keyword) {
        1.0
    } else if keyword.chars().count() >= PARTIAL_MIN_LEN && line.contains(keyword) {
        0.5
    } else {
        0.0
    }
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.match_indices(word).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + word.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str, merchant: Option<&str>) -> Category {
        KeywordTable::default().classify(text, merchant)
    }

    #[test]
    fn merchant_keyword_wins() {
        assert_eq!(classify("STARBUCKS COFFEE\nTotal 5.50", Some("STARBUCKS COFFEE")), Category::FoodAndDining);
        assert_eq!(classify("", Some("Whole Foods Market")), Category::FoodAndDining);
        assert_eq!(classify("", Some("KROGER #512")), Category::Groceries);
    }

    #[test]
    fn body_text_scoring_without_merchant() {
        let text = "Thanks for your ride with Uber\nTrip fare 14.20\nTotal 14.20";
        assert_eq!(classify(text, None), Category::Transportation);
    }

    #[test]
    fn no_keywords_is_others() {
        assert_eq!(classify("XYZ 123\nqwerty", None), Category::Others);
        assert_eq!(classify("", None), Category::Others);
        assert_eq!(classify("XYZ 123", Some("XYZ")), Category::Others);
        assert_eq!(classify("ride", None), Category::Others);
    }

    #[test]
    fn totals_line_counts_double() {
        let text = "pizza night\nnetflix total 15.99";
        assert_eq!(classify(text, None), Category::Entertainment);
    }

    #[test]
    fn partial_match_scores_half() {
        let table = KeywordTable::default();
        let scores = table.score_text("hospitality suites");
        let health = scores.iter().find(|(c, _)| *c == Category::Healthcare).unwrap().1;
        assert_eq!(health, 0.5);
        assert_eq!(classify("hospitality suites", None), Category::Healthcare);
    }

    #[test]
    fn short_keywords_need_whole_words() {
        let scores = KeywordTable::default().score_text("barcode scanned");
        let food = scores.iter().find(|(c, _)| *c == Category::FoodAndDining).unwrap().1;
        assert_eq!(food, 0.0);
    }

    #[test]
    fn ties_go_to_earlier_category() {
        assert_eq!(classify("pizza\nuber", None), Category::FoodAndDining);
    }

    #[test]
    fn extended_keywords_are_used() {
        let mut table = KeywordTable::default();
        table.extend(Category::Groceries, ["Lidl", "  "]);
        assert_eq!(table.classify("LIDL\n3.20", Some("LIDL")), Category::Groceries);
        assert_eq!(KeywordTable::default().classify("LIDL\n3.20", Some("LIDL")), Category::Others);
    }

    #[test]
    fn whole_word_boundaries() {
        assert!(contains_word("ride with uber", "uber"));
        assert!(!contains_word("suberb", "uber"));
        assert!(contains_word("paid at h&m today", "h&m"));
    }
}
