//! Per-correction context windows for the model prompt.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use correction_core::morpheme::PROPER_NOUN_TAGS;
use correction_core::{Correction, MorphemeIndex, StateTag};

static CAPITALIZED_LATIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][a-z]+$").expect("static regex"));
static ACRONYM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Z]{2,}$").expect("static regex"));
static FOUR_DIGIT_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(19|20)\d{2}$").expect("static regex"));
static FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\S+\.[A-Za-z0-9]{1,4}$").expect("static regex"));

/// Honorific suffixes and administrative-unit suffixes that usually mark a
/// Korean name or place.
const NAME_SUFFIXES: &[char] = &['씨', '님', '군', '양'];
const ADMIN_SUFFIXES: &[char] = &['시', '도', '군', '구', '동', '읍', '면'];

#[derive(Clone, Debug)]
pub struct ContextConfig {
    /// Characters of context on each side of the original (default 50).
    pub window: usize,
    /// Extend to the enclosing sentence and run proper-noun detection.
    pub sentence_context: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window: 50,
            sentence_context: false,
        }
    }
}

/// Transient view of one correction plus its surroundings, as sent to the
/// model.
#[derive(Clone, Debug)]
pub struct CorrectionContext {
    pub index: usize,
    pub original: String,
    pub corrected: Vec<String>,
    pub help: Option<String>,
    pub context_before: String,
    pub context_after: String,
    pub full_context: String,
    pub sentence_context: Option<String>,
    pub is_likely_proper_noun: bool,
    /// Carried over from the state machine so resolved corrections are not
    /// re-sent to the model.
    pub current_tag: Option<StateTag>,
    pub current_value: Option<String>,
}

/// Extracts the context window around the first occurrence of the
/// correction's original. A missing occurrence yields empty context; that
/// is logged but not fatal.
pub fn extract_context(
    text: &str,
    index: usize,
    correction: &Correction,
    config: &ContextConfig,
    morphemes: Option<&MorphemeIndex>,
) -> CorrectionContext {
    let mut context = CorrectionContext {
        index,
        original: correction.original.clone(),
        corrected: correction.corrected.clone(),
        help: correction.help.clone(),
        context_before: String::new(),
        context_after: String::new(),
        full_context: correction.original.clone(),
        sentence_context: None,
        is_likely_proper_noun: false,
        current_tag: None,
        current_value: None,
    };

    let Some(byte_start) = text.find(&correction.original) else {
        debug!(
            "original {:?} not found in source; context is empty",
            correction.original
        );
        return context;
    };
    let chars: Vec<char> = text.chars().collect();
    let start = text[..byte_start].chars().count();
    let end = start + correction.original.chars().count();

    let before_from = start.saturating_sub(config.window);
    let after_to = (end + config.window).min(chars.len());
    let before: String = chars[before_from..start].iter().collect();
    let after: String = chars[end..after_to].iter().collect();
    context.context_before = before.trim().to_string();
    context.context_after = after.trim().to_string();
    context.full_context = chars[before_from..after_to]
        .iter()
        .collect::<String>()
        .trim()
        .to_string();

    if config.sentence_context {
        context.sentence_context = Some(enclosing_sentence(&chars, start, end));
        context.is_likely_proper_noun = is_likely_proper_noun(&correction.original, morphemes);
    }

    context
}

/// The sentence containing `[start, end)`, bounded by `.`, `!`, `?`, or a
/// newline on each side.
fn enclosing_sentence(chars: &[char], start: usize, end: usize) -> String {
    let is_boundary = |c: char| matches!(c, '.' | '!' | '?' | '\n');
    let sentence_start = chars[..start]
        .iter()
        .rposition(|&c| is_boundary(c))
        .map(|i| i + 1)
        .unwrap_or(0);
    let sentence_end = chars[end..]
        .iter()
        .position(|&c| is_boundary(c))
        .map(|i| end + i + 1)
        .unwrap_or(chars.len());
    chars[sentence_start..sentence_end]
        .iter()
        .collect::<String>()
        .trim()
        .to_string()
}

/// Morphological tags first, regex heuristics second.
pub fn is_likely_proper_noun(word: &str, morphemes: Option<&MorphemeIndex>) -> bool {
    if let Some(index) = morphemes {
        if index.is_tagged_any(word, PROPER_NOUN_TAGS) {
            return true;
        }
    }
    if CAPITALIZED_LATIN.is_match(word)
        || ACRONYM.is_match(word)
        || FOUR_DIGIT_YEAR.is_match(word)
        || FILENAME.is_match(word)
    {
        return true;
    }
    let char_count = word.chars().count();
    if char_count > 1 {
        if let Some(last) = word.chars().last() {
            if NAME_SUFFIXES.contains(&last) || ADMIN_SUFFIXES.contains(&last) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use correction_core::MorphemeToken;

    fn correction(original: &str, corrected: &[&str]) -> Correction {
        Correction {
            original: original.to_string(),
            corrected: corrected.iter().map(|s| s.to_string()).collect(),
            help: None,
        }
    }

    #[test]
    fn test_window_extraction() {
        let text = "가나다라 먹었따 마바사아";
        let config = ContextConfig {
            window: 3,
            sentence_context: false,
        };
        let ctx = extract_context(text, 0, &correction("먹었따", &["먹었다"]), &config, None);
        assert_eq!(ctx.context_before, "다라");
        assert_eq!(ctx.context_after, "마바");
        assert_eq!(ctx.full_context, "다라 먹었따 마바");
    }

    #[test]
    fn test_missing_original_yields_empty_context() {
        let ctx = extract_context(
            "전혀 다른 문장",
            0,
            &correction("먹었따", &["먹었다"]),
            &ContextConfig::default(),
            None,
        );
        assert!(ctx.context_before.is_empty());
        assert!(ctx.context_after.is_empty());
        assert_eq!(ctx.full_context, "먹었따");
    }

    #[test]
    fn test_sentence_context() {
        let text = "첫 문장이다. 나는 밥을 먹었따. 다음 문장이다.";
        let config = ContextConfig {
            window: 50,
            sentence_context: true,
        };
        let ctx = extract_context(text, 0, &correction("먹었따", &["먹었다"]), &config, None);
        assert_eq!(ctx.sentence_context.as_deref(), Some("나는 밥을 먹었따."));
    }

    #[test]
    fn test_proper_noun_by_morpheme_tag() {
        let index = MorphemeIndex::from_tokens(vec![MorphemeToken {
            content: "서울".to_string(),
            begin_offset: 0,
            tags: vec!["NNP".to_string()],
        }]);
        assert!(is_likely_proper_noun("서울", Some(&index)));
        assert!(!is_likely_proper_noun("밥", Some(&index)));
    }

    #[test]
    fn test_proper_noun_heuristics() {
        assert!(is_likely_proper_noun("Seoul", None));
        assert!(is_likely_proper_noun("NASA", None));
        assert!(is_likely_proper_noun("1987", None));
        assert!(is_likely_proper_noun("report.pdf", None));
        assert!(is_likely_proper_noun("김철수씨", None));
        assert!(is_likely_proper_noun("부산시", None));
        assert!(!is_likely_proper_noun("먹었다", None));
        // Bare suffix characters alone are not names
        assert!(!is_likely_proper_noun("시", None));
    }
}
