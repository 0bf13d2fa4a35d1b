//! Turns a raw spelling-check response into deduplicated [`Correction`]s.
//!
//! Backend blocks are validated into a tagged sum type at ingestion so the
//! rest of the pipeline never re-checks optional fields. Extraction never
//! fails for a single bad block; it degrades by skipping it.

use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::Correction;
use crate::morpheme::MorphemeIndex;

/// Known one-character confusions that are worth surfacing even though
/// single-character corrections are usually backend noise.
const SINGLE_CHAR_WHITELIST: &[(&str, &str)] = &[
    ("되", "돼"),
    ("돼", "되"),
    ("안", "않"),
    ("않", "안"),
    ("데", "대"),
    ("대", "데"),
    ("든", "던"),
    ("던", "든"),
    ("에", "의"),
    ("의", "에"),
    ("왠", "웬"),
    ("웬", "왠"),
];

#[derive(Clone, Debug)]
pub struct ExtractorConfig {
    /// Drop suggestions for one-character originals unless an exemption
    /// applies. Single-character corrections are disproportionately false
    /// positives.
    pub filter_single_char: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            filter_single_char: true,
        }
    }
}

/// Wire shape of the backend spelling-check response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    /// The whole revised document, as the backend would print it.
    #[serde(default)]
    pub revised: String,
    #[serde(default)]
    pub revised_sentences: Vec<RevisedSentence>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisedSentence {
    /// Kept raw; each block is validated individually into [`BlockParse`].
    #[serde(default)]
    pub revised_blocks: Vec<serde_json::Value>,
}

/// A revision block after validation.
#[derive(Clone, Debug)]
pub enum BlockParse {
    Parsed(ParsedBlock),
    Malformed(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct ParsedBlock {
    pub origin: OriginSpan,
    #[serde(default)]
    pub revised: String,
    #[serde(default)]
    pub revisions: Vec<Revision>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginSpan {
    pub content: String,
    #[serde(default)]
    pub begin_offset: usize,
    #[serde(default)]
    pub length: usize,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Revision {
    pub revised: String,
    #[serde(default)]
    pub comment: Option<String>,
}

impl BlockParse {
    pub fn from_value(value: &serde_json::Value) -> Self {
        match serde_json::from_value::<ParsedBlock>(value.clone()) {
            Ok(block) => BlockParse::Parsed(block),
            Err(e) => BlockParse::Malformed(e.to_string()),
        }
    }
}

/// Extracts deduplicated corrections from a spelling-check response.
///
/// `morphemes`, when available, guides overlap resolution; without it only
/// the longest-original and input-order rules apply.
pub fn extract_corrections(
    source_text: &str,
    response: &CheckResponse,
    morphemes: Option<&MorphemeIndex>,
    config: &ExtractorConfig,
) -> Vec<Correction> {
    // Cosmetic backend reformatting must not produce spurious diffs: if the
    // whole-document output matches the input modulo whitespace, there are
    // no errors.
    if normalize_whitespace(&response.revised) == normalize_whitespace(source_text) {
        return Vec::new();
    }

    let mut registry: IndexMap<String, Correction> = IndexMap::new();

    for sentence in &response.revised_sentences {
        for raw_block in &sentence.revised_blocks {
            let block = match BlockParse::from_value(raw_block) {
                BlockParse::Parsed(block) => block,
                BlockParse::Malformed(reason) => {
                    warn!("skipping malformed revision block: {reason}");
                    continue;
                }
            };
            process_block(source_text, &block, config, &mut registry);
        }
    }

    let corrections: Vec<Correction> = registry.into_values().collect();
    resolve_overlaps(source_text, corrections, morphemes)
}

fn process_block(
    source_text: &str,
    block: &ParsedBlock,
    config: &ExtractorConfig,
    registry: &mut IndexMap<String, Correction>,
) {
    let origin = block.origin.content.as_str();
    if origin.trim().is_empty() || origin == block.revised {
        return;
    }

    // Backends may silently normalize text, so a stale reported offset is
    // expected; fall back to a full-text search before giving up.
    if !occurs_at_char_offset(source_text, block.origin.begin_offset, origin)
        && !source_text.contains(origin)
    {
        debug!("origin {origin:?} not found in source text; skipping block");
        return;
    }

    let mut suggestions: Vec<String> = Vec::new();
    let mut help: Option<String> = None;
    for revision in &block.revisions {
        let suggestion = revision.revised.clone();
        if suggestions.contains(&suggestion) {
            continue;
        }
        if suggestion.trim() == origin.trim() || suggestion.contains('\u{FFFD}') {
            continue;
        }
        if suggestion.trim().is_empty() {
            continue;
        }
        if help.is_none() {
            help = revision.comment.clone().filter(|c| !c.trim().is_empty());
        }
        suggestions.push(suggestion);
    }

    if config.filter_single_char && origin.chars().count() == 1 {
        suggestions.retain(|s| single_char_exemption(origin, s));
    }

    if suggestions.is_empty() {
        return;
    }

    match registry.get_mut(origin) {
        Some(existing) => {
            let mut added = 0;
            for suggestion in suggestions {
                if !existing.corrected.contains(&suggestion) {
                    existing.corrected.push(suggestion);
                    added += 1;
                }
            }
            if existing.help.is_none() {
                existing.help = help;
            }
            debug!("dedup merge for {origin:?}: {added} new suggestion(s)");
        }
        None => {
            registry.insert(
                origin.to_string(),
                Correction {
                    original: origin.to_string(),
                    corrected: suggestions,
                    help,
                },
            );
        }
    }
}

/// Exemptions to the single-character noise filter.
fn single_char_exemption(origin: &str, suggestion: &str) -> bool {
    let origin_char = match origin.chars().next() {
        Some(c) => c,
        None => return false,
    };
    let non_ascii_suggestion = suggestion.chars().any(|c| !c.is_ascii());
    // ASCII alnum or punctuation corrected into a non-ASCII script is a real
    // script fix, not noise.
    if origin_char.is_ascii_alphanumeric() && non_ascii_suggestion {
        return true;
    }
    if origin_char.is_ascii_punctuation() && non_ascii_suggestion {
        return true;
    }
    if SINGLE_CHAR_WHITELIST.contains(&(origin, suggestion)) {
        return true;
    }
    suggestion.chars().count() > 1
}

/// One occurrence of a correction's original in the source, in character
/// offsets.
#[derive(Clone, Copy, Debug)]
struct Occurrence {
    correction: usize,
    start: usize,
    end: usize,
}

/// Resolves overlapping correction spans. For each maximal overlapping group
/// one survivor is kept: the candidate sitting on a morpheme boundary near
/// the group anchor, else the longest original, else the first in input
/// order. The other members are discarded outright.
fn resolve_overlaps(
    source_text: &str,
    corrections: Vec<Correction>,
    morphemes: Option<&MorphemeIndex>,
) -> Vec<Correction> {
    if corrections.len() < 2 {
        return corrections;
    }

    let mut occurrences: Vec<Occurrence> = Vec::new();
    for (i, correction) in corrections.iter().enumerate() {
        let len = correction.original.chars().count();
        for start in char_occurrences(source_text, &correction.original) {
            occurrences.push(Occurrence {
                correction: i,
                start,
                end: start + len,
            });
        }
    }
    occurrences.sort_by_key(|occ| (occ.start, occ.end));

    let mut discarded: Vec<bool> = vec![false; corrections.len()];
    let mut group: Vec<Occurrence> = Vec::new();
    let mut group_end = 0usize;
    for occ in occurrences {
        // Ranges that merely touch do not overlap.
        if group.is_empty() || occ.start < group_end {
            group_end = group_end.max(occ.end);
            group.push(occ);
        } else {
            settle_group(&group, &corrections, morphemes, &mut discarded);
            group_end = occ.end;
            group = vec![occ];
        }
    }
    settle_group(&group, &corrections, morphemes, &mut discarded);

    corrections
        .into_iter()
        .enumerate()
        .filter_map(|(i, c)| (!discarded[i]).then_some(c))
        .collect()
}

fn settle_group(
    group: &[Occurrence],
    corrections: &[Correction],
    morphemes: Option<&MorphemeIndex>,
    discarded: &mut [bool],
) {
    let mut members: Vec<usize> = group.iter().map(|occ| occ.correction).collect();
    members.sort_unstable();
    members.dedup();
    if members.len() < 2 {
        return;
    }

    let anchor = group[0].start;
    let survivor = select_survivor(&members, corrections, morphemes, anchor);
    for &member in &members {
        if member != survivor {
            debug!(
                "overlap at {anchor}: discarding {:?} in favor of {:?}",
                corrections[member].original, corrections[survivor].original
            );
            discarded[member] = true;
        }
    }
}

fn select_survivor(
    members: &[usize],
    corrections: &[Correction],
    morphemes: Option<&MorphemeIndex>,
    anchor: usize,
) -> usize {
    if let Some(index) = morphemes {
        let on_boundary: Vec<usize> = members
            .iter()
            .copied()
            .filter(|&i| index.has_exact_match_near(&corrections[i].original, anchor, 2))
            .collect();
        if !on_boundary.is_empty() {
            return longest_first(&on_boundary, corrections);
        }
    }
    longest_first(members, corrections)
}

fn longest_first(members: &[usize], corrections: &[Correction]) -> usize {
    // max_by_key keeps the last maximum, so iterate reversed to prefer the
    // earliest in input order on ties.
    members
        .iter()
        .rev()
        .copied()
        .max_by_key(|&i| corrections[i].original.chars().count())
        .unwrap_or(members[0])
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `needle` occurs at the given character offset of `haystack`.
fn occurs_at_char_offset(haystack: &str, offset: usize, needle: &str) -> bool {
    let mut chars = haystack.chars().skip(offset);
    needle.chars().all(|expected| chars.next() == Some(expected))
        && !needle.is_empty()
}

/// Character offsets of every occurrence of `needle` in `haystack`.
fn char_occurrences(haystack: &str, needle: &str) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    // Map byte offsets from match_indices back to character offsets.
    let byte_starts: Vec<usize> = haystack.char_indices().map(|(b, _)| b).collect();
    haystack
        .match_indices(needle)
        .map(|(byte_offset, _)| {
            byte_starts
                .binary_search(&byte_offset)
                .expect("match_indices returns char boundaries")
        })
        .collect()
}
