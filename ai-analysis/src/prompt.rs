//! Prompt assembly for a correction batch.

use std::fmt::Write;

use correction_core::MorphemeIndex;

use crate::context::CorrectionContext;

pub(crate) fn system_prompt() -> String {
    r#"You are reviewing corrections that a Korean grammar checker proposed for a document. For each numbered correction you are given the flagged text, the candidate replacements, and the surrounding context. Decide which option fits the context best. Choose the original text itself when the flag is a false positive (for example a proper noun, a technical term, or an intentional styling). If the word should be permanently ignored by the checker, mark it as exception-processed.

Respond with a JSON array only, no prose, one object per correction:

[
  {
    "correctionIndex": 0,
    "selectedValue": "먹었다",
    "confidence": 95,
    "reasoning": "past tense spelling of 먹다",
    "isExceptionProcessed": false
  }
]

"selectedValue" must be copied verbatim from the offered options (the original text counts as an option). "confidence" is 0-100. Keep "reasoning" to one short sentence."#
        .to_string()
}

pub(crate) fn user_prompt(
    batch: &[CorrectionContext],
    morphemes: Option<&MorphemeIndex>,
    include_morpheme_summary: bool,
) -> String {
    let mut prompt = String::new();
    for context in batch {
        let _ = writeln!(prompt, "Correction {}:", context.index);
        let _ = writeln!(prompt, "- original: {}", context.original);
        let _ = writeln!(prompt, "- options: {}", context.corrected.join(" | "));
        if let Some(help) = &context.help {
            let _ = writeln!(prompt, "- checker note: {help}");
        }
        let _ = writeln!(prompt, "- context: …{}…", context.full_context);
        if let Some(sentence) = &context.sentence_context {
            let _ = writeln!(prompt, "- sentence: {sentence}");
        }
        if context.is_likely_proper_noun {
            let _ = writeln!(prompt, "- note: likely a proper noun");
        }
        if include_morpheme_summary {
            if let Some(summary) = morphemes.and_then(|m| morpheme_summary(m, &context.original))
            {
                let _ = writeln!(prompt, "- morphemes: {summary}");
            }
        }
        prompt.push('\n');
    }
    prompt
}

fn morpheme_summary(index: &MorphemeIndex, original: &str) -> Option<String> {
    let mut parts: Vec<String> = index
        .tokens_for_text(original)
        .map(|token| format!("{}/{}", token.content, token.tags.join("+")))
        .collect();
    parts.dedup();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}
