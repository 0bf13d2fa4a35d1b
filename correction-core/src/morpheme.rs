//! Lookup structures over a backend morphological-analysis response.
//!
//! The extractor uses these to decide which of several overlapping
//! corrections sits on a real morpheme boundary, and the AI analyzer uses
//! the part-of-speech tags for proper-noun detection.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Part-of-speech tags that mark a morpheme as a likely proper noun:
/// proper noun, foreign word, hanja, number.
pub const PROPER_NOUN_TAGS: &[&str] = &["NNP", "SL", "SH", "SN"];

/// One unit of morphological analysis: exact text, character offset in the
/// source, and its part-of-speech codes in backend order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphemeToken {
    pub content: String,
    pub begin_offset: usize,
    pub tags: Vec<String>,
}

/// Wire shape of the backend morpheme analysis response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MorphemeResponse {
    #[serde(default)]
    pub sentences: Vec<MorphemeSentence>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MorphemeSentence {
    #[serde(default)]
    pub tokens: Vec<MorphemeWireToken>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MorphemeWireToken {
    #[serde(default)]
    pub morphemes: Vec<WireMorpheme>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WireMorpheme {
    #[serde(default)]
    pub text: WireSpan,
    #[serde(default)]
    pub tag: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSpan {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub begin_offset: usize,
    #[serde(default)]
    pub length: usize,
}

/// Morpheme tokens indexed two ways: by exact text and by begin offset.
///
/// Both indices answer the same question ("is there a morpheme with this
/// exact text near this position?"); the offset index is the cheaper and
/// preferred path, the text index the fallback.
#[derive(Clone, Debug, Default)]
pub struct MorphemeIndex {
    tokens: Vec<MorphemeToken>,
    by_text: HashMap<String, Vec<usize>>,
    by_offset: BTreeMap<usize, Vec<usize>>,
}

impl MorphemeIndex {
    pub fn from_tokens(tokens: Vec<MorphemeToken>) -> Self {
        let mut by_text: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_offset: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, token) in tokens.iter().enumerate() {
            by_text.entry(token.content.clone()).or_default().push(i);
            by_offset.entry(token.begin_offset).or_default().push(i);
        }
        Self {
            tokens,
            by_text,
            by_offset,
        }
    }

    /// Flattens a backend response into an index. Compound tags like
    /// `VV+EP` are split into their component codes.
    pub fn from_response(response: &MorphemeResponse) -> Self {
        let mut tokens = Vec::new();
        for sentence in &response.sentences {
            for wire_token in &sentence.tokens {
                for morpheme in &wire_token.morphemes {
                    if morpheme.text.content.is_empty() {
                        continue;
                    }
                    tokens.push(MorphemeToken {
                        content: morpheme.text.content.clone(),
                        begin_offset: morpheme.text.begin_offset,
                        tags: morpheme
                            .tag
                            .split('+')
                            .filter(|t| !t.is_empty())
                            .map(str::to_string)
                            .collect(),
                    });
                }
            }
        }
        Self::from_tokens(tokens)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens_for_text(&self, text: &str) -> impl Iterator<Item = &MorphemeToken> {
        self.by_text
            .get(text)
            .into_iter()
            .flatten()
            .map(|&i| &self.tokens[i])
    }

    /// Whether a morpheme with exactly this text begins within `radius`
    /// characters of `anchor`. Tries the offset index first, then the text
    /// index.
    pub fn has_exact_match_near(&self, text: &str, anchor: usize, radius: usize) -> bool {
        let low = anchor.saturating_sub(radius);
        let high = anchor + radius;
        let near_by_offset = self
            .by_offset
            .range(low..=high)
            .flat_map(|(_, indices)| indices)
            .any(|&i| self.tokens[i].content == text);
        if near_by_offset {
            return true;
        }
        self.tokens_for_text(text)
            .any(|token| token.begin_offset.abs_diff(anchor) <= radius)
    }

    /// Whether any morpheme with exactly this text carries one of `tags`.
    pub fn is_tagged_any(&self, text: &str, tags: &[&str]) -> bool {
        self.tokens_for_text(text)
            .any(|token| token.tags.iter().any(|t| tags.contains(&t.as_str())))
    }
}
