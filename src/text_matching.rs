//! # Text Matching Module
//!
//! Fuzzy label comparison and value parsing for recognized report text.
//!
//! Labels are compared with a normalized Levenshtein similarity after
//! stripping units and punctuation. Values are parsed per kind: decimals,
//! integers and the three-level grade printed in the segmental table.

use lazy_static::lazy_static;
use regex::Regex;

/// Grade below the reference range.
pub const GRADE_UNDER: &str = "표준이하";
/// Grade within the reference range.
pub const GRADE_NORMAL: &str = "표준";
/// Grade above the reference range.
pub const GRADE_OVER: &str = "표준이상";

/// Minimum similarity for a token to be read as a grade.
const GRADE_SIMILARITY_THRESHOLD: f32 = 0.6;

lazy_static! {
    static ref DECIMAL_PATTERN: Regex =
        Regex::new(r"-?\d+(?:[.,]\d+)?").expect("Invalid decimal regex pattern");
    static ref INTEGER_PATTERN: Regex =
        Regex::new(r"\d{1,3}(?:,\d{3})+|\d+").expect("Invalid integer regex pattern");
    static ref UNIT_SUFFIX: Regex =
        Regex::new(r"\([^)]*\)?").expect("Invalid unit suffix regex pattern");
}

/// Calculate Levenshtein distance between two strings, counted in chars
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();

    let len1 = s1_chars.len();
    let len2 = s2_chars.len();

    let mut matrix = vec![vec![0; len2 + 1]; len1 + 1];

    #[allow(clippy::needless_range_loop)]
    for i in 0..=len1 {
        matrix[i][0] = i;
    }
    for j in 0..=len2 {
        matrix[0][j] = j;
    }

    for i in 1..=len1 {
        for j in 1..=len2 {
            let cost = if s1_chars[i - 1] == s2_chars[j - 1] {
                0
            } else {
                1
            };

            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[len1][len2]
}

/// Normalized similarity in `[0, 1]`: `1 - distance / longer length`.
///
/// Two empty strings are not similar.
pub fn similarity(a: &str, b: &str) -> f32 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    1.0 - levenshtein_distance(a, b) as f32 / longest as f32
}

/// Reduces a printed label to the characters that identify it.
///
/// Parenthesized units (also when the closing bracket was not recognized),
/// whitespace and punctuation are removed and Latin letters are lowercased.
///
/// # Examples
///
/// ```
/// use inbody_extract::text_matching::normalize_label;
///
/// assert_eq!(normalize_label("체지방량(kg)"), "체지방량");
/// assert_eq!(normalize_label(" Weight: "), "weight");
/// ```
pub fn normalize_label(text: &str) -> String {
    UNIT_SUFFIX
        .replace_all(text, "")
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Similarity between a recognized token and a label, both normalized.
pub fn label_similarity(text: &str, label: &str) -> f32 {
    similarity(&normalize_label(text), &normalize_label(label))
}

/// Replaces letters commonly misread for digits inside numeric tokens.
fn repair_digits(text: &str) -> String {
    text.split_whitespace()
        .map(|token| {
            if !token.chars().any(|c| c.is_ascii_digit()) {
                return token.to_string();
            }
            token
                .chars()
                .map(|c| match c {
                    'O' | 'o' => '0',
                    'l' | 'I' | '|' => '1',
                    other => other,
                })
                .collect()
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Splits precomposed Hangul syllables into their jamo so that a misread
/// vowel or final consonant costs one edit instead of a whole syllable.
fn decompose_hangul(text: &str) -> String {
    const SYLLABLE_BASE: u32 = 0xAC00;
    const SYLLABLE_COUNT: u32 = 11172;

    let mut out = String::with_capacity(text.len() * 3);
    for c in text.chars() {
        let code = c as u32;
        if !(SYLLABLE_BASE..SYLLABLE_BASE + SYLLABLE_COUNT).contains(&code) {
            out.push(c);
            continue;
        }
        let index = code - SYLLABLE_BASE;
        let jamo = [
            Some(0x1100 + index / 588),
            Some(0x1161 + (index % 588) / 28),
            (index % 28 > 0).then(|| 0x11A7 + index % 28),
        ];
        out.extend(jamo.into_iter().flatten().filter_map(char::from_u32));
    }
    out
}

/// Extracts a decimal value, using `.` as the separator.
///
/// A comma followed by exactly three digits is a thousands separator,
/// any other comma is a decimal separator.
///
/// # Examples
///
/// ```
/// use inbody_extract::text_matching::parse_decimal;
///
/// assert_eq!(parse_decimal("72,4kg").as_deref(), Some("72.4"));
/// assert_eq!(parse_decimal("1,523").as_deref(), Some("1523"));
/// assert_eq!(parse_decimal("kg"), None);
/// ```
pub fn parse_decimal(text: &str) -> Option<String> {
    let repaired = repair_digits(text);
    let found = DECIMAL_PATTERN.find(&repaired)?.as_str();

    if let Some((whole, fraction)) = found.split_once(',') {
        if fraction.len() == 3 {
            return Some(format!("{}{}", whole, fraction));
        }
        return Some(format!("{}.{}", whole, fraction));
    }
    Some(found.to_string())
}

/// Extracts an integer value, dropping thousands separators.
///
/// Returns `None` when the number carries a fractional part.
pub fn parse_integer(text: &str) -> Option<String> {
    let repaired = repair_digits(text);
    let found = INTEGER_PATTERN.find(&repaired)?;

    let rest = &repaired[found.end()..];
    let mut rest_chars = rest.chars();
    if let (Some('.'), Some(next)) = (rest_chars.next(), rest_chars.next()) {
        if next.is_ascii_digit() {
            return None;
        }
    }

    Some(found.as_str().replace(',', ""))
}

/// Maps a recognized token to one of the three grade labels.
///
/// English labels (`Under`, `Normal`, `Over`) are accepted. Returns `None`
/// when no grade is similar enough or two grades are equally similar.
pub fn parse_grade(text: &str) -> Option<&'static str> {
    let normalized = decompose_hangul(&normalize_label(text));
    if normalized.is_empty() {
        return None;
    }

    let labels = [
        (GRADE_UNDER, GRADE_UNDER),
        (GRADE_NORMAL, GRADE_NORMAL),
        (GRADE_OVER, GRADE_OVER),
        ("under", GRADE_UNDER),
        ("normal", GRADE_NORMAL),
        ("over", GRADE_OVER),
    ];

    let mut best: Option<(&'static str, f32)> = None;
    let mut tied = false;
    for (label, grade) in labels {
        let score = similarity(&normalized, &decompose_hangul(label));
        match best {
            Some((best_grade, best_score)) if score == best_score && best_grade != grade => {
                tied = true;
            }
            Some((_, best_score)) if score <= best_score => {}
            _ => {
                best = Some((grade, score));
                tied = false;
            }
        }
    }

    match best {
        Some((grade, score)) if score >= GRADE_SIMILARITY_THRESHOLD && !tied => Some(grade),
        _ => None,
    }
}

/// Whether the token is nothing but ASCII digits.
pub fn is_bare_integer(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("체지방량", "체지방률"), 1);
        assert_eq!(levenshtein_distance("", "abc"), 3);
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("체중", "체중"), 1.0);
        assert_eq!(similarity("체지방량", "체지방률"), 0.75);
        assert_eq!(similarity("", ""), 0.0);
        assert!(similarity("골격근량", "기초대사량") < 0.7);
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("체지방률(%)"), "체지방률");
        assert_eq!(normalize_label("기초대사량 (kcal"), "기초대사량");
        assert_eq!(normalize_label("BMI"), "bmi");
        assert_eq!(normalize_label("···"), "");
    }

    #[test]
    fn test_label_similarity_with_ocr_noise() {
        assert!(label_similarity("골격근랑", "골격근량") >= 0.7);
        assert!(label_similarity("체수분(L)", "체수분") == 1.0);
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("72.4").as_deref(), Some("72.4"));
        assert_eq!(parse_decimal("72,4kg").as_deref(), Some("72.4"));
        assert_eq!(parse_decimal("3O.5").as_deref(), Some("30.5"));
        assert_eq!(parse_decimal("0.85").as_deref(), Some("0.85"));
        assert_eq!(parse_decimal("표준"), None);
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("1,523").as_deref(), Some("1523"));
        assert_eq!(parse_integer("1523kcal").as_deref(), Some("1523"));
        assert_eq!(parse_integer("Level 9").as_deref(), Some("9"));
        assert_eq!(parse_integer("12.5"), None);
        assert_eq!(parse_integer("kcal"), None);
    }

    #[test]
    fn test_parse_grade() {
        assert_eq!(parse_grade("표준"), Some(GRADE_NORMAL));
        assert_eq!(parse_grade("표준이상"), Some(GRADE_OVER));
        assert_eq!(parse_grade("표준이샹"), Some(GRADE_OVER));
        assert_eq!(parse_grade("Under"), Some(GRADE_UNDER));
        assert_eq!(parse_grade("72.4"), None);
        assert_eq!(parse_grade("()"), None);
    }

    #[test]
    fn test_decompose_hangul() {
        assert_eq!(decompose_hangul("상").chars().count(), 3);
        assert_eq!(decompose_hangul("하").chars().count(), 2);
        assert_eq!(decompose_hangul("a1"), "a1");
    }

    #[test]
    fn test_is_bare_integer() {
        assert!(is_bare_integer("100"));
        assert!(!is_bare_integer("10.0"));
        assert!(!is_bare_integer(""));
    }
}
