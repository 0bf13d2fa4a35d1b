//! Reconciles a model-chosen value against the valid option set.
//!
//! The model is told to answer with one of the offered strings, but in
//! practice it decorates them with whitespace or markdown, quotes them,
//! or paraphrases. Every non-exact decision is logged: silent mismatches
//! are the main source of "the AI picked something we didn't offer".

use log::{debug, warn};

/// Minimum Levenshtein similarity for a fuzzy match.
const SIMILARITY_THRESHOLD: f64 = 0.7;

/// Markdown and punctuation noise stripped from both sides before the
/// relaxed comparison.
const NOISE_CHARS: &[char] = &[
    '*', '`', '"', '\'', '#', '[', ']', '(', ')', '.', ',', ':', ';', '!', '?', '“', '”', '‘',
    '’',
];

/// Sentinel answers that all mean "keep the original".
const KEEP_ORIGINAL_SENTINELS: &[&str] = &[
    "original",
    "keep original",
    "keep-original",
    "keep",
    "exception",
    "원문",
    "원문 유지",
    "원문유지",
    "예외",
    "예외 처리",
];

/// Maps the model's `selected_value` onto a member of
/// `{original} ∪ corrected`. Falls back to `original` when nothing matches
/// closely enough.
pub fn reconcile_selection(raw: &str, original: &str, corrected: &[String]) -> String {
    let options: Vec<&str> = std::iter::once(original)
        .chain(corrected.iter().map(String::as_str))
        .collect();

    if options.contains(&raw) {
        return raw.to_string();
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() || KEEP_ORIGINAL_SENTINELS.contains(&trimmed.to_lowercase().as_str()) {
        debug!("sentinel {raw:?} reconciled to original {original:?}");
        return original.to_string();
    }

    let stripped = strip_noise(raw);
    for option in &options {
        if strip_noise(option) == stripped {
            debug!("{raw:?} reconciled to {option:?} after noise stripping");
            return option.to_string();
        }
    }

    if !stripped.is_empty() {
        for option in &options {
            let option_stripped = strip_noise(option);
            if option_stripped.is_empty() {
                continue;
            }
            if stripped.contains(&option_stripped) || option_stripped.contains(&stripped) {
                debug!("{raw:?} reconciled to {option:?} by containment");
                return option.to_string();
            }
        }
    }

    let mut best: Option<(&str, f64)> = None;
    for option in &options {
        let score = similarity(&stripped, &strip_noise(option));
        if score >= SIMILARITY_THRESHOLD && best.is_none_or(|(_, s)| score > s) {
            best = Some((option, score));
        }
    }
    if let Some((option, score)) = best {
        debug!("{raw:?} reconciled to {option:?} (similarity {score:.2})");
        return option.to_string();
    }

    warn!("{raw:?} matched no offered option; falling back to original {original:?}");
    original.to_string()
}

fn strip_noise(s: &str) -> String {
    s.trim()
        .trim_matches(|c: char| c.is_whitespace() || NOISE_CHARS.contains(&c))
        .to_string()
}

/// `1 - distance / max_len`, on characters.
fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / max_len as f64
}

fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut matrix = vec![vec![0; b_len + 1]; a_len + 1];
    for i in 0..=a_len {
        matrix[i][0] = i;
    }
    for j in 0..=b_len {
        matrix[0][j] = j;
    }
    for i in 1..=a_len {
        for j in 1..=b_len {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }
    matrix[a_len][b_len]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corrected(options: &[&str]) -> Vec<String> {
        options.iter().map(|s| s.to_string()).collect()
    }

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn test_exact_member_passes_through() {
        assert_eq!(
            reconcile_selection("돼요", "되요", &corrected(&["돼요"])),
            "돼요"
        );
        assert_eq!(reconcile_selection("되요", "되요", &corrected(&["돼요"])), "되요");
    }

    #[test]
    fn test_trailing_whitespace_is_stripped() {
        // Must match via stripping, not fall back to the original
        assert_eq!(
            reconcile_selection("돼요 ", "되요", &corrected(&["돼요"])),
            "돼요"
        );
    }

    #[test]
    fn test_markdown_noise_is_stripped() {
        assert_eq!(
            reconcile_selection("**먹었다**", "먹었따", &corrected(&["먹었다"])),
            "먹었다"
        );
        assert_eq!(
            reconcile_selection("\"먹었다\"", "먹었따", &corrected(&["먹었다"])),
            "먹었다"
        );
    }

    #[test]
    fn test_sentinels_mean_original() {
        let options = corrected(&["먹었다"]);
        assert_eq!(reconcile_selection("", "먹었따", &options), "먹었따");
        assert_eq!(reconcile_selection("keep original", "먹었따", &options), "먹었따");
        assert_eq!(reconcile_selection("원문 유지", "먹었따", &options), "먹었따");
    }

    #[test]
    fn test_containment() {
        assert_eq!(
            reconcile_selection("밥을 먹었다", "먹었따", &corrected(&["먹었다"])),
            "먹었다"
        );
    }

    #[test]
    fn test_levenshtein_close_match() {
        // One character off out of five clears the 0.7 threshold
        assert_eq!(
            reconcile_selection("abcde", "원본", &corrected(&["abcdf"])),
            "abcdf"
        );
    }

    #[test]
    fn test_no_close_match_falls_back_to_original() {
        init_logs();
        assert_eq!(
            reconcile_selection("전혀 다른 값", "먹었따", &corrected(&["먹었다"])),
            "먹었따"
        );
    }
}
