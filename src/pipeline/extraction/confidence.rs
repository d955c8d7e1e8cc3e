use std::sync::LazyLock;

use regex::Regex;

/// Hemogram vocabulary expected in a readable report, lowercase.
const REPORT_VOCABULARY: &[&str] = &[
    "hemograma",
    "hemoglobina",
    "hematócrito",
    "hematocrito",
    "eritrócitos",
    "eritrocitos",
    "leucócitos",
    "leucocitos",
    "neutrófilos",
    "neutrofilos",
    "linfócitos",
    "linfocitos",
    "monócitos",
    "monocitos",
    "eosinófilos",
    "eosinofilos",
    "basófilos",
    "basofilos",
    "plaquetas",
    "vcm",
    "hcm",
    "chcm",
    "rdw",
];

const VOCAB_BONUS_PER_TERM: f32 = 0.05;
const VOCAB_BONUS_CAP: f32 = 0.5;
const NUMBER_BONUS_PER_TOKEN: f32 = 0.01;
const NUMBER_BONUS_CAP: f32 = 0.3;

/// Punctuation that legitimately appears in lab reports.
const REPORT_PUNCTUATION: &str = ".,;:%/()-+*^³µμ<>=";

static NUMBER_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+(?:[.,]\d+)*").expect("valid regex")
});

/// Heuristic quality score for OCR output. Higher is better; 0 for empty text.
///
/// Rewards mostly alphanumeric text with few stray symbols, then adds
/// bonuses for hemogram vocabulary and numeric tokens.
pub fn score_ocr_text(text: &str) -> f32 {
    let total = text.chars().count();
    if text.trim().is_empty() {
        return 0.0;
    }

    let mut clean = 0usize;
    let mut weird = 0usize;
    for c in text.chars() {
        if c.is_alphanumeric() || c.is_whitespace() {
            clean += 1;
        } else if !REPORT_PUNCTUATION.contains(c) {
            weird += 1;
        }
    }
    let clean_ratio = clean as f32 / total as f32;
    let weird_ratio = weird as f32 / total as f32;
    let base = clean_ratio * (1.0 - weird_ratio);

    let lower = text.to_lowercase();
    let terms = REPORT_VOCABULARY
        .iter()
        .filter(|term| lower.contains(*term))
        .count();
    let vocab_bonus = (terms as f32 * VOCAB_BONUS_PER_TERM).min(VOCAB_BONUS_CAP);

    let numbers = NUMBER_TOKEN.find_iter(text).count();
    let number_bonus = (numbers as f32 * NUMBER_BONUS_PER_TOKEN).min(NUMBER_BONUS_CAP);

    base + vocab_bonus + number_bonus
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_scores_zero() {
        assert_eq!(score_ocr_text(""), 0.0);
        assert_eq!(score_ocr_text("   \n"), 0.0);
    }

    #[test]
    fn report_text_beats_garbage() {
        let good = "Hemoglobina 14,6 g/dL\nHematócrito 42,6 %\nPlaquetas 282.000 /µL";
        let garbage = "~|{ }@#¬ ¦§ ~~ }{ ¤¤ ¦ @@";
        assert!(score_ocr_text(good) > score_ocr_text(garbage));
    }

    #[test]
    fn vocabulary_bonus_is_capped() {
        let all_terms = REPORT_VOCABULARY.join(" ");
        let score = score_ocr_text(&all_terms);
        assert!(score <= 1.0 + VOCAB_BONUS_CAP + f32::EPSILON);
    }

    #[test]
    fn numbers_add_to_score() {
        let without = score_ocr_text("Leucocitos");
        let with = score_ocr_text("Leucocitos 6.970 100 %");
        assert!(with > without);
    }
}
