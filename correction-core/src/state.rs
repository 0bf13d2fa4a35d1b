//! Per-correction resolution state and the 4-state toggle cycle.
//!
//! One machine exists per analysis run. Toggling a correction also forces
//! every correction sharing its core word to the same state, so repeated
//! occurrences of a word (possibly with different particles) stay in sync.

use log::debug;

use crate::error::CoreError;
use crate::{AiAnalysisResult, Correction};

/// Trailing grammatical particles stripped (at most one) when computing a
/// correction's core word. Multi-character particles are listed first so
/// they win over their single-character prefixes.
const PARTICLES: &[&str] = &[
    "에서", "으로", "까지", "부터", "처럼", "같이", "보다", "마다", "조차", "마저", "라도",
    "나마", "이나", "거나", "은", "는", "이", "가", "을", "를", "에", "로", "와", "과", "도",
    "만",
];

/// Derived display state of one correction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StateTag {
    Error,
    Corrected,
    ExceptionProcessed,
    OriginalKept,
}

/// Resolution state of one correction index.
///
/// Invariant: `is_exception` and `is_original_kept` are mutually exclusive,
/// and when either is set, `value` equals the correction's original text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrectionState {
    pub value: String,
    pub is_exception: bool,
    pub is_original_kept: bool,
}

/// Owns the per-correction states for one analysis run.
pub struct CorrectionStateMachine {
    corrections: Vec<Correction>,
    states: Vec<CorrectionState>,
}

impl CorrectionStateMachine {
    /// Corrections whose original appears in `ignored_words` start in
    /// `original-kept`; all others start in `error`.
    pub fn new(corrections: Vec<Correction>, ignored_words: &[String]) -> Self {
        let states = corrections
            .iter()
            .map(|c| CorrectionState {
                value: c.original.clone(),
                is_exception: false,
                is_original_kept: ignored_words.contains(&c.original),
            })
            .collect();
        Self {
            corrections,
            states,
        }
    }

    pub fn corrections(&self) -> &[Correction] {
        &self.corrections
    }

    pub fn len(&self) -> usize {
        self.corrections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corrections.is_empty()
    }

    fn check_index(&self, index: usize) -> Result<(), CoreError> {
        if index >= self.corrections.len() {
            return Err(CoreError::InvalidCorrectionIndex {
                index,
                count: self.corrections.len(),
            });
        }
        Ok(())
    }

    pub fn value(&self, index: usize) -> Result<&str, CoreError> {
        self.check_index(index)?;
        Ok(&self.states[index].value)
    }

    /// Whether `candidate` is the currently chosen value for this
    /// correction. Exception and original-kept states hold the original
    /// text, so passing the original answers the "exception sentinel" case.
    pub fn is_selected(&self, index: usize, candidate: &str) -> Result<bool, CoreError> {
        self.check_index(index)?;
        Ok(self.states[index].value == candidate)
    }

    pub fn display_state(&self, index: usize) -> Result<StateTag, CoreError> {
        self.check_index(index)?;
        Ok(self.tag(index))
    }

    pub fn all_states(&self) -> Vec<StateTag> {
        (0..self.corrections.len()).map(|i| self.tag(i)).collect()
    }

    /// `(tag, value)` per correction, in index order. This is what the AI
    /// analyzer consumes to skip already-resolved corrections.
    pub fn snapshot(&self) -> Vec<(StateTag, String)> {
        (0..self.corrections.len())
            .map(|i| (self.tag(i), self.states[i].value.clone()))
            .collect()
    }

    fn tag(&self, index: usize) -> StateTag {
        let state = &self.states[index];
        if state.is_original_kept {
            StateTag::OriginalKept
        } else if state.is_exception {
            StateTag::ExceptionProcessed
        } else if state.value != self.corrections[index].original {
            StateTag::Corrected
        } else {
            StateTag::Error
        }
    }

    /// Forward toggle: error → suggestions in order → exception-processed →
    /// original-kept → error.
    pub fn toggle(&mut self, index: usize) -> Result<StateTag, CoreError> {
        self.check_index(index)?;
        let original = self.corrections[index].original.clone();
        match self.tag(index) {
            StateTag::OriginalKept => self.set_state(index, original, false, false),
            StateTag::ExceptionProcessed => self.set_state(index, original, false, true),
            StateTag::Error | StateTag::Corrected => {
                let suggestions = self.suggestions(index);
                let current = suggestions
                    .iter()
                    .position(|s| *s == self.states[index].value)
                    .unwrap_or(0);
                if current + 1 >= suggestions.len() {
                    self.set_state(index, original, true, false);
                } else {
                    self.set_state(index, suggestions[current + 1].clone(), false, false);
                }
            }
        }
        Ok(self.tag(index))
    }

    /// Backward toggle, the exact mirror of [`toggle`](Self::toggle).
    pub fn toggle_prev(&mut self, index: usize) -> Result<StateTag, CoreError> {
        self.check_index(index)?;
        let original = self.corrections[index].original.clone();
        match self.tag(index) {
            StateTag::Error => self.set_state(index, original, false, true),
            StateTag::OriginalKept => self.set_state(index, original, true, false),
            StateTag::ExceptionProcessed => {
                match self.corrections[index].corrected.last().cloned() {
                    Some(last) => self.set_state(index, last, false, false),
                    None => self.set_state(index, original, false, false),
                }
            }
            StateTag::Corrected => {
                let suggestions = self.suggestions(index);
                let current = suggestions
                    .iter()
                    .position(|s| *s == self.states[index].value)
                    .unwrap_or(0);
                let previous = suggestions[current.saturating_sub(1)].clone();
                self.set_state(index, previous, false, false);
            }
        }
        Ok(self.tag(index))
    }

    /// `[original, ...corrected]`, the forward-toggle order.
    fn suggestions(&self, index: usize) -> Vec<String> {
        let correction = &self.corrections[index];
        std::iter::once(correction.original.clone())
            .chain(correction.corrected.iter().cloned())
            .collect()
    }

    /// Sets one correction's state and forces every other correction with
    /// the same core word to the identical triple.
    fn set_state(&mut self, index: usize, value: String, is_exception: bool, is_original_kept: bool) {
        self.states[index] = CorrectionState {
            value,
            is_exception,
            is_original_kept,
        };
        let core = core_word(&self.corrections[index].original);
        for j in 0..self.corrections.len() {
            if j == index {
                continue;
            }
            if core_word(&self.corrections[j].original) == core {
                // Same word with a different particle keeps the same value
                // triple, but the value must stay its own original when the
                // flags say "keep original".
                let value = if is_exception || is_original_kept {
                    self.corrections[j].original.clone()
                } else {
                    self.states[index].value.clone()
                };
                debug!(
                    "syncing correction {j} to state of {index} (core word {core:?})"
                );
                self.states[j] = CorrectionState {
                    value,
                    is_exception,
                    is_original_kept,
                };
            }
        }
    }

    /// Applies an AI analysis pass as initial selections. Results with an
    /// out-of-range index are ignored.
    pub fn apply_ai_results(&mut self, results: &[AiAnalysisResult]) {
        for result in results {
            if result.correction_index >= self.corrections.len() {
                debug!(
                    "ignoring AI result for out-of-range index {}",
                    result.correction_index
                );
                continue;
            }
            let index = result.correction_index;
            let original = &self.corrections[index].original;
            let keep = result.is_exception_processed || result.is_original_kept;
            let value = if keep {
                original.clone()
            } else {
                result.selected_value.clone()
            };
            self.states[index] = CorrectionState {
                value,
                is_exception: result.is_exception_processed,
                is_original_kept: result.is_original_kept && !result.is_exception_processed,
            };
        }
    }

    /// Produces the final text plus the words the user marked as
    /// exceptions (used to seed future ignore-lists).
    ///
    /// Replacement is global and literal: every occurrence of the original
    /// is replaced, in reverse correction-index order.
    pub fn apply_corrections(&self, text: &str) -> (String, Vec<String>) {
        let mut working = text.to_string();
        let mut exception_words = Vec::new();
        for index in (0..self.corrections.len()).rev() {
            let correction = &self.corrections[index];
            let state = &self.states[index];
            if state.is_exception {
                if !exception_words.contains(&correction.original) {
                    exception_words.push(correction.original.clone());
                }
                continue;
            }
            if state.is_original_kept || state.value == correction.original {
                continue;
            }
            working = working.replace(&correction.original, &state.value);
        }
        (working, exception_words)
    }
}

/// Strips a parenthesized suffix and then at most one trailing particle,
/// e.g. `"단어(word)"` → `"단어"`, `"사과를"` → `"사과"`.
pub fn core_word(original: &str) -> String {
    let mut word = original.trim();
    if word.ends_with(')') {
        if let Some(open) = word.find('(') {
            word = word[..open].trim_end();
        }
    }
    for particle in PARTICLES {
        if let Some(stem) = word.strip_suffix(particle) {
            if !stem.is_empty() {
                word = stem;
                break;
            }
        }
    }
    word.trim().to_string()
}
