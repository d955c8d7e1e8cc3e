//! Text cleanup applied before pattern extraction.
//!
//! Two passes, in order: Unicode canonicalization, then fragmentation repair.
//! Both are idempotent and so is their composition.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Hemogram labels that OCR tends to emit letter by letter.
const FRAGMENTED_TERMS: &[&str] = &[
    "Hemograma",
    "Eritrócitos",
    "Hemácias",
    "Hemoglobina",
    "Hematócrito",
    "Leucócitos",
    "Neutrófilos",
    "Segmentados",
    "Bastonetes",
    "Eosinófilos",
    "Basófilos",
    "Linfócitos",
    "Monócitos",
    "Plaquetas",
    "CHCM",
    "HCM",
    "VCM",
    "RDW",
];

/// Zero-width and no-break characters NFKC leaves in place.
const INVISIBLE_CHARS: &[char] = &[
    '\u{00A0}', '\u{200B}', '\u{200C}', '\u{200D}', '\u{2060}', '\u{202F}', '\u{FEFF}',
];

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid regex"));

static TERM_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    FRAGMENTED_TERMS
        .iter()
        .map(|term| {
            let pattern = fragmented_term_pattern(term);
            (Regex::new(&pattern).expect("valid regex"), *term)
        })
        .collect()
});

/// Spacing repairs inside numbers and units, as (pattern, replacement).
static NUMBER_REPAIRS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        // decimal comma
        (r"(\d)[ \t]*,[ \t]*(\d)", "$1,$2"),
        // thousands dot
        (r"(\d)[ \t]*\.[ \t]*(\d{3})\b", "$1.$2"),
        (r"(\d)[ \t]+%", "$1%"),
        (r"/[ \t]*[μuU][ \t]*[lL]\b", "/μL"),
        (r"\b([mM][mM])[ \t]+3\b", "${1}3"),
        (r"(\d)[ \t]*\^[ \t]*(\d)", "$1^$2"),
    ]
    .into_iter()
    .map(|(p, r)| (Regex::new(p).expect("valid regex"), r))
    .collect()
});

/// Both passes, in the required order.
pub fn normalize_text(text: &str) -> String {
    repair_fragments(&canonicalize_unicode(text))
}

/// NFKC, invisible characters to spaces, whitespace runs collapsed to one space.
pub fn canonicalize_unicode(text: &str) -> String {
    let composed: String = text
        .nfkc()
        .map(|c| if INVISIBLE_CHARS.contains(&c) { ' ' } else { c })
        .collect();
    WHITESPACE_RUN.replace_all(&composed, " ").into_owned()
}

/// Rejoin letter-spaced medical labels and spaced-out numeric tokens.
pub fn repair_fragments(text: &str) -> String {
    let mut out = text.to_string();

    for (pattern, canonical) in TERM_PATTERNS.iter() {
        if let Cow::Owned(replaced) = pattern.replace_all(&out, |caps: &regex::Captures| {
            let found = &caps[0];
            if found.contains([' ', '\t']) {
                (*canonical).to_string()
            } else {
                found.to_string()
            }
        }) {
            out = replaced;
        }
    }

    for (pattern, replacement) in NUMBER_REPAIRS.iter() {
        out = replace_until_stable(pattern, &out, replacement);
    }

    out
}

/// Overlapping matches ("1 , 2 , 3") need repeated passes. Every change
/// shortens the text, so this terminates.
fn replace_until_stable(pattern: &Regex, text: &str, replacement: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = pattern.replace_all(&current, replacement);
        if next == current {
            return current;
        }
        current = next.into_owned();
    }
}

/// Case-insensitive pattern matching `term` with optional single spaces between
/// letters and accent-tolerant vowels, anchored on word boundaries.
fn fragmented_term_pattern(term: &str) -> String {
    let letters: Vec<String> = fold_accents(term).chars().map(letter_class).collect();
    format!(r"(?i)\b{}\b", letters.join("[ \t]?"))
}

fn letter_class(c: char) -> String {
    match c.to_ascii_lowercase() {
        'a' => "[aáàâã]".to_string(),
        'e' => "[eéèê]".to_string(),
        'i' => "[iíì]".to_string(),
        'o' => "[oóòôõ]".to_string(),
        'u' => "[uúü]".to_string(),
        'c' => "[cç]".to_string(),
        other => regex::escape(&other.to_string()),
    }
}

/// Strip diacritics: NFD, then drop combining marks.
pub fn fold_accents(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}
