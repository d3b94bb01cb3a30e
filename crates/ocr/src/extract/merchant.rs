use tracing::debug;

use super::split_lines;
use crate::types::{MerchantCandidate, MerchantPass};

re!(re_all_caps, r"^[A-Z][A-Z\s&]+$");
re!(re_title_case, r"^[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*$");
re!(re_corporate, r"^[A-Z][A-Za-z\s&.,-]+(?:Inc|LLC|Ltd|Corp)\.?$");

/// Business-type nouns and corporate suffixes that mark a header line.
const INDICATORS: &[&str] = &[
    "store", "shop", "mart", "center", "plaza", "mall", "outlet", "supermarket", "grocery",
    "restaurant", "cafe", "coffee", "corp", "inc", "llc", "ltd", "company", "enterprise",
];

pub fn extract_merchant(text: &str) -> Option<String> {
    merchant_candidate(text).map(|c| c.name)
}

/// The most likely business-name line. Three passes, first hit wins:
/// indicator words or header shapes in the first 15 lines, then the best
/// letter-heavy line in the first 10, then the first digit-free line in the
/// first 8.
pub fn merchant_candidate(text: &str) -> Option<MerchantCandidate> {
    let lines = split_lines(text);
    let found = indicator_pass(&lines)
        .or_else(|| scoring_pass(&lines))
        .or_else(|| fallback_pass(&lines))?;
    debug!(line = found.line, pass = ?found.pass, merchant = %found.name, "merchant selected");
    Some(found)
}

fn indicator_pass(lines: &[&str]) -> Option<MerchantCandidate> {
    for (idx, line) in lines.iter().enumerate().take(15) {
        let len = line.chars().count();
        if len <= 3 || len >= 60 {
            continue;
        }

        let lower = line.to_lowercase();
        if INDICATORS.iter().any(|w| lower.contains(w)) {
            let clean = line.trim_matches(|c: char| !c.is_alphanumeric());
            if clean.chars().count() > 2 {
                return Some(candidate(clean, idx, MerchantPass::Indicator));
            }
        }

        if [re_all_caps(), re_title_case(), re_corporate()]
            .iter()
            .any(|re| re.is_match(line))
        {
            return Some(candidate(line, idx, MerchantPass::Shape));
        }
    }
    None
}

fn scoring_pass(lines: &[&str]) -> Option<MerchantCandidate> {
    let mut best: Option<MerchantCandidate> = None;
    for (idx, line) in lines.iter().enumerate().take(10) {
        let len = line.chars().count();
        if len <= 5 || len >= 60 {
            continue;
        }
        let (letters, digits) = letter_digit_counts(line);
        if letters <= digits {
            continue;
        }
        let c = candidate(line, idx, MerchantPass::Scored);
        if best.as_ref().map_or(true, |b| c.score > b.score) {
            best = Some(c);
        }
    }
    best
}

fn fallback_pass(lines: &[&str]) -> Option<MerchantCandidate> {
    lines
        .iter()
        .enumerate()
        .take(8)
        .find(|(_, l)| {
            let len = l.chars().count();
            len > 5 && len < 50 && !l.chars().any(|c| c.is_ascii_digit())
        })
        .map(|(idx, l)| candidate(l, idx, MerchantPass::Fallback))
}

fn candidate(name: &str, line: usize, pass: MerchantPass) -> MerchantCandidate {
    MerchantCandidate {
        name: name.to_string(),
        line,
        pass,
        score: line_score(name),
    }
}

/// length × letters / max(digits, 1), counting ASCII letters and digits.
fn line_score(line: &str) -> f32 {
    let (letters, digits) = letter_digit_counts(line);
    line.chars().count() as f32 * (letters as f32 / digits.max(1) as f32)
}

fn letter_digit_counts(line: &str) -> (usize, usize) {
    line.chars().fold((0, 0), |(l, d), c| {
        if c.is_ascii_alphabetic() {
            (l + 1, d)
        } else if c.is_ascii_digit() {
            (l, d + 1)
        } else {
            (l, d)
        }
    })
}
