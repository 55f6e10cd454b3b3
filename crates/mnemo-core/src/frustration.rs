//! Frustration indexing — "amygdala" (spec §4.9).
//!
//! Scores memory content for how painful the underlying experience was, so
//! that the hybrid reranker (`repository::search`) can weight painful
//! memories higher in recall. Rule-based; no LLM call.

use crate::model::{FrustrationIndex, PainLevel};

/// Keyword → base score, English. Ported verbatim from the sentiment
/// analyzer this crate's frustration indexer replaces.
const FRUSTRATION_KEYWORDS: &[(&str, f64)] = &[
    ("nightmare", 1.0),
    ("impossible", 0.95),
    ("hate", 0.9),
    ("worst", 0.9),
    ("terrible", 0.9),
    ("hell", 0.9),
    ("disaster", 0.9),
    ("furious", 0.95),
    ("rage", 0.95),
    ("frustrated", 0.8),
    ("frustrating", 0.8),
    ("annoying", 0.7),
    ("annoyed", 0.7),
    ("stuck", 0.75),
    ("blocked", 0.7),
    ("waste", 0.7),
    ("wasted", 0.75),
    ("pain", 0.7),
    ("painful", 0.75),
    ("struggle", 0.7),
    ("struggling", 0.75),
    ("headache", 0.7),
    ("finally", 0.5),
    ("hours", 0.4),
    ("days", 0.5),
    ("weeks", 0.6),
    ("confusing", 0.5),
    ("confused", 0.5),
    ("unclear", 0.45),
    ("broken", 0.55),
    ("bug", 0.4),
    ("bugs", 0.45),
    ("issue", 0.35),
    ("problem", 0.4),
    ("error", 0.35),
    ("fail", 0.5),
    ("failed", 0.55),
    ("failure", 0.6),
    ("tricky", 0.3),
    ("weird", 0.3),
    ("strange", 0.3),
    ("unexpected", 0.35),
    ("workaround", 0.4),
    ("hack", 0.35),
    ("gotcha", 0.4),
];

/// Keyword → base score, Japanese. Matched against the original (non
/// lower-cased) content, since case-folding doesn't apply.
const FRUSTRATION_KEYWORDS_JA: &[(&str, f64)] = &[
    ("最悪", 1.0),
    ("地獄", 0.95),
    ("絶望", 0.95),
    ("クソ", 0.9),
    ("死ぬ", 0.85),
    ("殺す", 0.9),
    ("ハマった", 0.8),
    ("詰んだ", 0.85),
    ("つらい", 0.75),
    ("辛い", 0.75),
    ("イライラ", 0.8),
    ("困った", 0.6),
    ("困る", 0.55),
    ("面倒", 0.6),
    ("めんどくさい", 0.65),
    ("わからん", 0.5),
    ("分からない", 0.45),
    ("やっと", 0.5),
    ("時間かかった", 0.6),
    ("バグ", 0.4),
    ("エラー", 0.35),
    ("失敗", 0.5),
];

/// Indexes memory content for frustration/pain level. Stateless; holds no
/// fields, matching the original's de-facto stateless analyzer.
#[derive(Debug, Default)]
pub struct FrustrationIndexer;

impl FrustrationIndexer {
    pub fn new() -> Self {
        Self
    }

    /// Score `content`, optionally overridden by an explicit `is_painful`
    /// flag and/or an explicit `time_cost_hours` (spec §4.9).
    pub fn index(
        &self,
        content: &str,
        is_painful: Option<bool>,
        time_cost_hours: Option<f64>,
    ) -> FrustrationIndex {
        let result = analyze(content, is_painful);
        let final_hours = time_cost_hours.or(result.estimated_hours);
        let pain_level = PainLevel::from_score(result.frustration_score);
        let boost_factor = 1.0 + result.frustration_score * 2.0;

        FrustrationIndex {
            frustration_score: result.frustration_score,
            time_cost_hours: final_hours,
            pain_level,
            boost_factor,
            confidence: result.confidence,
        }
    }
}

struct SentimentResult {
    frustration_score: f64,
    confidence: f64,
    estimated_hours: Option<f64>,
}

fn analyze(content: &str, is_painful: Option<bool>) -> SentimentResult {
    let content_lower = content.to_lowercase();
    let mut scores: Vec<f64> = Vec::new();
    let mut indicator_count = 0usize;

    for (keyword, weight) in FRUSTRATION_KEYWORDS {
        if content_lower.contains(keyword) {
            scores.push(*weight);
            indicator_count += 1;
        }
    }

    for (keyword, weight) in FRUSTRATION_KEYWORDS_JA {
        if content.contains(keyword) {
            scores.push(*weight);
            indicator_count += 1;
        }
    }

    let exclamation_count = content.matches('!').count();
    if exclamation_count >= 3 {
        scores.push(0.6);
        indicator_count += 1;
    } else if exclamation_count >= 1 {
        scores.push(0.3);
        indicator_count += 1;
    }

    let caps_word_count = count_shouted_words(content);
    if caps_word_count >= 2 {
        scores.push(0.5);
        indicator_count += 1;
    }

    let estimated_hours = extract_time_spent(&content_lower);
    if let Some(hours) = estimated_hours {
        let time_score = (hours / 20.0).min(0.8);
        if time_score > 0.2 {
            scores.push(time_score);
            indicator_count += 1;
        }
    }

    let mut base_score = if scores.is_empty() {
        0.0
    } else {
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let indicator_boost = (indicator_count as f64 * 0.03).min(0.2);
        (mean + indicator_boost).min(1.0)
    };

    match is_painful {
        Some(true) => {
            base_score = base_score.max(0.7);
            indicator_count += 1;
        }
        Some(false) => {
            base_score = base_score.min(0.3);
            indicator_count += 1;
        }
        None => {}
    }

    let confidence = (0.3 + indicator_count as f64 * 0.15).min(1.0);

    SentimentResult {
        frustration_score: round3(base_score),
        confidence: round3(confidence),
        estimated_hours,
    }
}

/// Words of 3+ consecutive uppercase ASCII letters, treated as "shouting".
fn count_shouted_words(content: &str) -> usize {
    content
        .split(|c: char| !c.is_ascii_alphabetic())
        .filter(|word| word.len() >= 3 && word.chars().all(|c| c.is_ascii_uppercase()))
        .count()
}

/// Time-spent extraction (spec §4.9): scans every known unit pattern and
/// takes the *maximum* estimated hours across all matches, not the first.
fn extract_time_spent(content_lower: &str) -> Option<f64> {
    let mut max_hours: Option<f64> = None;
    let mut bump = |hours: f64| {
        max_hours = Some(max_hours.map_or(hours, |m: f64| m.max(hours)));
    };

    if let Some(n) = leading_number_before(content_lower, "hour") {
        bump(n);
    }
    if let Some(n) = leading_number_before(content_lower, "時間") {
        bump(n);
    }
    if let Some(n) = leading_number_before(content_lower, "day") {
        bump(n * 8.0);
    }
    if let Some(n) = leading_number_before(content_lower, "日") {
        bump(n * 8.0);
    }
    if contains_phrase(content_lower, "half a day") || contains_phrase(content_lower, "half day") {
        bump(4.0);
    }
    if content_lower.contains('半') && content_lower.contains('日') {
        bump(4.0);
    }
    if contains_phrase(content_lower, "all day") {
        bump(8.0);
    }
    if content_lower.contains("一日中") {
        bump(8.0);
    }
    if let Some(n) = leading_number_before(content_lower, "week") {
        bump(n * 40.0);
    }
    if let Some(n) = leading_number_before(content_lower, "週間") {
        bump(n * 40.0);
    } else if let Some(n) = leading_number_before(content_lower, "週") {
        bump(n * 40.0);
    }

    max_hours
}

fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    haystack.contains(phrase)
}

/// Finds the first occurrence of `unit` and walks backward over digits and
/// whitespace immediately preceding it, parsing the run of digits as the
/// count (e.g. "3 hours" against unit "hour" → `Some(3.0)`).
fn leading_number_before(content: &str, unit: &str) -> Option<f64> {
    let bytes = content.as_bytes();
    let mut search_from = 0usize;
    while let Some(rel) = content[search_from..].find(unit) {
        let unit_pos = search_from + rel;
        let mut i = unit_pos;
        while i > 0 && bytes[i - 1].is_ascii_whitespace() {
            i -= 1;
        }
        let digits_end = i;
        while i > 0 && bytes[i - 1].is_ascii_digit() {
            i -= 1;
        }
        if i < digits_end {
            if let Ok(n) = content[i..digits_end].parse::<f64>() {
                return Some(n);
            }
        }
        search_from = unit_pos + unit.len();
    }
    None
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calm_content_scores_zero() {
        let indexer = FrustrationIndexer::new();
        let idx = indexer.index("Updated the README with new install steps.", None, None);
        assert_eq!(idx.frustration_score, 0.0);
        assert_eq!(idx.pain_level, PainLevel::None);
    }

    #[test]
    fn frustrated_content_scores_high() {
        let indexer = FrustrationIndexer::new();
        let idx = indexer.index(
            "Spent 6 hours stuck on this nightmare of a bug, absolute disaster!!!",
            None,
            None,
        );
        assert!(idx.frustration_score > 0.6, "{}", idx.frustration_score);
        assert_eq!(idx.time_cost_hours, Some(6.0));
    }

    #[test]
    fn explicit_is_painful_floors_score_at_0_7() {
        let indexer = FrustrationIndexer::new();
        let idx = indexer.index("Fixed a typo.", Some(true), None);
        assert!(idx.frustration_score >= 0.7);
    }

    #[test]
    fn explicit_time_cost_overrides_detected_hours() {
        let indexer = FrustrationIndexer::new();
        let idx = indexer.index("Took 2 hours to track down.", None, Some(10.0));
        assert_eq!(idx.time_cost_hours, Some(10.0));
    }

    #[test]
    fn time_extraction_takes_maximum_across_all_matching_patterns() {
        let idx = FrustrationIndexer::new().index("Burned 3 hours yesterday, 2 days total really.", None, None);
        assert_eq!(idx.time_cost_hours, Some(16.0));
    }

    #[test]
    fn boost_factor_matches_linear_formula() {
        let indexer = FrustrationIndexer::new();
        let idx = indexer.index("bug", None, None);
        assert!((idx.boost_factor - (1.0 + 2.0 * idx.frustration_score)).abs() < 1e-9);
    }
}
