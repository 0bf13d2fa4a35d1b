//! The AI analysis orchestrator.
//!
//! Splits corrections into those the user already resolved (passed through
//! untouched) and those worth asking the model about, batches the latter,
//! and reconciles whatever comes back. Batches run strictly one at a time
//! with a fixed delay between them; a failed batch only costs its own
//! corrections, which are later gap-filled with defaults.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{info, warn};

use backend_client::{ChatMessage, ChatModel};
use correction_core::{AiAnalysisResult, Correction, MorphemeIndex, StateTag};

use crate::context::{ContextConfig, CorrectionContext, extract_context};
use crate::error::AnalysisError;
use crate::prompt::{system_prompt, user_prompt};
use crate::reconcile::reconcile_selection;
use crate::recover::{RawAiItem, parse_items};

const BYPASS_REASONING: &str = "user-selected resolution kept";
const DEFAULT_REASONING: &str = "default selection (no model result)";

/// Progress callback: `(batch_index, total_batches, message)`, invoked once
/// per dispatched batch.
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize, &str) + Send + Sync);

#[derive(Clone, Debug)]
pub struct AnalysisConfig {
    pub context: ContextConfig,
    /// Delay between consecutive batches; the rate limiter.
    pub batch_delay: Duration,
    pub max_tokens: u32,
    /// Attach a morpheme summary per correction when an index is available.
    pub include_morpheme_summary: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            context: ContextConfig::default(),
            batch_delay: Duration::from_millis(1500),
            max_tokens: 1024,
            include_morpheme_summary: true,
        }
    }
}

/// Inputs of one analysis run.
pub struct AnalysisRequest<'a> {
    pub text: &'a str,
    pub corrections: &'a [Correction],
    /// `(tag, value)` per correction index, from the state machine.
    /// Corrections already resolved by the user bypass the model.
    pub current_states: Option<&'a [(StateTag, String)]>,
    pub morphemes: Option<&'a MorphemeIndex>,
}

pub struct AiAnalyzer<'a> {
    model: &'a dyn ChatModel,
    config: AnalysisConfig,
}

impl<'a> AiAnalyzer<'a> {
    pub fn new(model: &'a dyn ChatModel, config: AnalysisConfig) -> Self {
        Self { model, config }
    }

    /// Runs the full analysis. Always yields one result per correction
    /// index, sorted by index; model failures degrade to defaults, never to
    /// an error. `cancel` is checked between batches.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest<'_>,
        cancel: Option<&AtomicBool>,
        progress: Option<ProgressFn<'_>>,
    ) -> Vec<AiAnalysisResult> {
        let mut results: Vec<AiAnalysisResult> = Vec::new();
        let mut pending: Vec<CorrectionContext> = Vec::new();

        for (index, correction) in request.corrections.iter().enumerate() {
            let current = request.current_states.and_then(|states| states.get(index));
            match current {
                Some((StateTag::OriginalKept, _)) => {
                    results.push(bypass_result(index, correction, false));
                }
                Some((StateTag::ExceptionProcessed, _)) => {
                    results.push(bypass_result(index, correction, true));
                }
                _ => {
                    let mut context = extract_context(
                        request.text,
                        index,
                        correction,
                        &self.config.context,
                        request.morphemes,
                    );
                    if let Some((tag, value)) = current {
                        context.current_tag = Some(*tag);
                        context.current_value = Some(value.clone());
                    }
                    pending.push(context);
                }
            }
        }

        if !pending.is_empty() {
            let with_morphemes =
                self.config.include_morpheme_summary && request.morphemes.is_some();
            let size = batch_size(&pending, with_morphemes);
            let batches: Vec<&[CorrectionContext]> = pending.chunks(size).collect();
            let total = batches.len();
            let mut seen: HashSet<usize> =
                results.iter().map(|r| r.correction_index).collect();

            for (batch_index, batch) in batches.iter().enumerate() {
                if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                    info!("analysis cancelled before batch {}/{total}", batch_index + 1);
                    break;
                }
                if batch_index > 0 {
                    tokio::time::sleep(self.config.batch_delay).await;
                }
                if let Some(report) = progress {
                    report(
                        batch_index + 1,
                        total,
                        &format!("analyzing batch {}/{total}", batch_index + 1),
                    );
                }
                match self.run_batch(request, batch, batch_index).await {
                    Ok(items) => {
                        for item in items {
                            if let Some(result) =
                                reconcile_item(item, request.corrections, &mut seen)
                            {
                                results.push(result);
                            }
                        }
                    }
                    Err(e) => {
                        // The failed batch's corrections will be gap-filled.
                        warn!("{e}");
                    }
                }
            }
        }

        fill_gaps(&mut results, request.corrections);
        results.sort_by_key(|r| r.correction_index);
        results
    }

    async fn run_batch(
        &self,
        request: &AnalysisRequest<'_>,
        batch: &[CorrectionContext],
        batch_index: usize,
    ) -> Result<Vec<RawAiItem>, AnalysisError> {
        let messages = [
            ChatMessage::system(system_prompt()),
            ChatMessage::user(user_prompt(
                batch,
                request.morphemes,
                self.config.include_morpheme_summary,
            )),
        ];
        let raw = self
            .model
            .chat(&messages, self.config.max_tokens)
            .await
            .map_err(|source| AnalysisError::BatchFailure {
                batch: batch_index,
                source,
            })?;
        parse_items(&raw)
    }
}

/// A correction the user already resolved: converted directly, never sent
/// to the model.
fn bypass_result(index: usize, correction: &Correction, is_exception: bool) -> AiAnalysisResult {
    AiAnalysisResult {
        correction_index: index,
        selected_value: correction.original.clone(),
        confidence: 100,
        reasoning: BYPASS_REASONING.to_string(),
        is_exception_processed: is_exception,
        is_original_kept: !is_exception,
    }
}

fn reconcile_item(
    item: RawAiItem,
    corrections: &[Correction],
    seen: &mut HashSet<usize>,
) -> Option<AiAnalysisResult> {
    let Some(correction) = corrections.get(item.correction_index) else {
        warn!("model answered for unknown correction index {}", item.correction_index);
        return None;
    };
    if !seen.insert(item.correction_index) {
        warn!("duplicate model result for index {}; keeping the first", item.correction_index);
        return None;
    }
    let selected = if item.is_exception_processed {
        correction.original.clone()
    } else {
        reconcile_selection(&item.selected_value, &correction.original, &correction.corrected)
    };
    let is_original_kept = !item.is_exception_processed
        && (item.is_original_kept || selected == correction.original);
    Some(AiAnalysisResult {
        correction_index: item.correction_index,
        selected_value: selected,
        confidence: item.confidence.clamp(0.0, 100.0).round() as u8,
        reasoning: item.reasoning,
        is_exception_processed: item.is_exception_processed,
        is_original_kept,
    })
}

/// Mean-context-length batch sizing, bounded so the expected response stays
/// under safe token limits (truncation is the dominant failure mode).
fn batch_size(contexts: &[CorrectionContext], with_morphemes: bool) -> usize {
    let total: usize = contexts
        .iter()
        .map(|c| c.full_context.chars().count())
        .sum();
    let mean = total as f64 / contexts.len() as f64;
    let mut size = if mean < 50.0 {
        8
    } else if mean < 100.0 {
        6
    } else if mean < 200.0 {
        4
    } else {
        3
    };
    if with_morphemes {
        size = (size - 1).max(3);
    }
    size.min(8)
}

/// Any correction index with no result at all gets a default: the first
/// suggestion if present, else the original, at confidence 50.
fn fill_gaps(results: &mut Vec<AiAnalysisResult>, corrections: &[Correction]) {
    let have: HashSet<usize> = results.iter().map(|r| r.correction_index).collect();
    for (index, correction) in corrections.iter().enumerate() {
        if have.contains(&index) {
            continue;
        }
        let selected = correction
            .corrected
            .first()
            .cloned()
            .unwrap_or_else(|| correction.original.clone());
        results.push(AiAnalysisResult {
            correction_index: index,
            selected_value: selected,
            confidence: 50,
            reasoning: DEFAULT_REASONING.to_string(),
            is_exception_processed: false,
            is_original_kept: false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use backend_client::ClientError;

    /// Scripted model: answers are popped front to back.
    struct FakeModel {
        responses: Mutex<Vec<Result<String, ClientError>>>,
        calls: AtomicUsize,
    }

    impl FakeModel {
        fn new(responses: Vec<Result<String, ClientError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatModel for FakeModel {
        async fn chat(&self, _: &[ChatMessage], _: u32) -> Result<String, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Err(ClientError::BackendUnreachable("script exhausted".to_string()))
            } else {
                responses.remove(0)
            }
        }

        async fn fetch_models(&self) -> Result<Vec<String>, ClientError> {
            Ok(vec!["fake".to_string()])
        }
    }

    fn correction(original: &str, corrected: &[&str]) -> Correction {
        Correction {
            original: original.to_string(),
            corrected: corrected.iter().map(|s| s.to_string()).collect(),
            help: None,
        }
    }

    fn quick_config() -> AnalysisConfig {
        AnalysisConfig {
            batch_delay: Duration::ZERO,
            ..AnalysisConfig::default()
        }
    }

    fn request<'a>(text: &'a str, corrections: &'a [Correction]) -> AnalysisRequest<'a> {
        AnalysisRequest {
            text,
            corrections,
            current_states: None,
            morphemes: None,
        }
    }

    #[tokio::test]
    async fn test_full_run() {
        let corrections = vec![correction("먹었따", &["먹었다"]), correction("안", &["않"])];
        let model = FakeModel::new(vec![Ok(r#"[
            {"correctionIndex": 0, "selectedValue": "먹었다", "confidence": 95, "reasoning": "spelling"},
            {"correctionIndex": 1, "selectedValue": "않 ", "confidence": 80, "reasoning": "negation"}
        ]"#
        .to_string())]);
        let analyzer = AiAnalyzer::new(&model, quick_config());
        let results = analyzer
            .analyze(&request("나는 밥을 먹었따. 안 돼.", &corrections), None, None)
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].selected_value, "먹었다");
        // Reconciled through whitespace stripping
        assert_eq!(results[1].selected_value, "않");
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_resolved_corrections_bypass_model() {
        let corrections = vec![correction("안", &["않"]), correction("먹었따", &["먹었다"])];
        let states = vec![
            (StateTag::OriginalKept, "안".to_string()),
            (StateTag::ExceptionProcessed, "먹었따".to_string()),
        ];
        let model = FakeModel::new(vec![]);
        let analyzer = AiAnalyzer::new(&model, quick_config());
        let results = analyzer
            .analyze(
                &AnalysisRequest {
                    text: "안 먹었따",
                    corrections: &corrections,
                    current_states: Some(&states),
                    morphemes: None,
                },
                None,
                None,
            )
            .await;
        assert_eq!(model.call_count(), 0);
        assert_eq!(results[0].confidence, 100);
        assert!(results[0].is_original_kept);
        assert!(results[1].is_exception_processed);
    }

    #[tokio::test]
    async fn test_truncated_batch_is_gap_filled() {
        let corrections = vec![correction("먹었따", &["먹었다"]), correction("갔따", &["갔다"])];
        // Response cut off mid-object: index 0 survives, index 1 is filled
        let model = FakeModel::new(vec![Ok(
            r#"[{"correctionIndex": 0, "selectedValue": "먹었다", "confidence": 95, "reasoning": "ok"}, {"correctionIndex": 1, "selec"#
                .to_string(),
        )]);
        let analyzer = AiAnalyzer::new(&model, quick_config());
        let results = analyzer
            .analyze(&request("먹었따 갔따", &corrections), None, None)
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].confidence, 95);
        assert_eq!(results[1].selected_value, "갔다");
        assert_eq!(results[1].confidence, 50);
        assert_eq!(results[1].reasoning, DEFAULT_REASONING);
    }

    #[tokio::test]
    async fn test_failed_batch_falls_back_to_defaults() {
        let corrections = vec![correction("먹었따", &["먹었다"])];
        let model = FakeModel::new(vec![Err(ClientError::BackendUnreachable(
            "down".to_string(),
        ))]);
        let analyzer = AiAnalyzer::new(&model, quick_config());
        let results = analyzer
            .analyze(&request("먹었따", &corrections), None, None)
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].selected_value, "먹었다");
        assert_eq!(results[0].confidence, 50);
    }

    #[tokio::test]
    async fn test_multiple_batches_and_progress() {
        // 9 short contexts at batch size 8 make two batches
        let corrections: Vec<Correction> = (0..9)
            .map(|i| correction(&format!("단어{i}"), &[&format!("단어 {i}")]))
            .collect();
        let text = (0..9).map(|i| format!("단어{i}")).collect::<Vec<_>>().join(" ");
        let batch_one: Vec<String> = (0..8)
            .map(|i| {
                format!(
                    r#"{{"correctionIndex": {i}, "selectedValue": "단어 {i}", "confidence": 90, "reasoning": "spacing"}}"#
                )
            })
            .collect();
        let model = FakeModel::new(vec![
            Ok(format!("[{}]", batch_one.join(","))),
            Ok(r#"[{"correctionIndex": 8, "selectedValue": "단어 8", "confidence": 90, "reasoning": "spacing"}]"#.to_string()),
        ]);
        let analyzer = AiAnalyzer::new(&model, quick_config());
        let progress_calls = Mutex::new(Vec::new());
        let progress = |batch: usize, total: usize, _message: &str| {
            progress_calls.lock().unwrap().push((batch, total));
        };
        let results = analyzer
            .analyze(&request(&text, &corrections), None, Some(&progress))
            .await;
        assert_eq!(model.call_count(), 2);
        assert_eq!(*progress_calls.lock().unwrap(), vec![(1, 2), (2, 2)]);
        assert_eq!(results.len(), 9);
        assert!(results.iter().all(|r| r.confidence == 90));
    }

    #[tokio::test]
    async fn test_cancellation_between_batches() {
        let corrections = vec![correction("먹었따", &["먹었다"])];
        let model = FakeModel::new(vec![]);
        let analyzer = AiAnalyzer::new(&model, quick_config());
        let cancel = AtomicBool::new(true);
        let results = analyzer
            .analyze(&request("먹었따", &corrections), Some(&cancel), None)
            .await;
        // Cancelled before the first batch: nothing dispatched, defaults only
        assert_eq!(model.call_count(), 0);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].confidence, 50);
    }

    #[tokio::test]
    async fn test_model_choosing_original_marks_original_kept() {
        let corrections = vec![correction("서울", &["서울시"])];
        let model = FakeModel::new(vec![Ok(
            r#"[{"correctionIndex": 0, "selectedValue": "서울", "confidence": 88, "reasoning": "proper noun"}]"#
                .to_string(),
        )]);
        let analyzer = AiAnalyzer::new(&model, quick_config());
        let results = analyzer
            .analyze(&request("서울에 간다", &corrections), None, None)
            .await;
        assert!(results[0].is_original_kept);
        assert!(!results[0].is_exception_processed);
    }

    #[test]
    fn test_batch_size_mapping() {
        let context = |len: usize| CorrectionContext {
            index: 0,
            original: String::new(),
            corrected: Vec::new(),
            help: None,
            context_before: String::new(),
            context_after: String::new(),
            full_context: "가".repeat(len),
            sentence_context: None,
            is_likely_proper_noun: false,
            current_tag: None,
            current_value: None,
        };
        assert_eq!(batch_size(&[context(10)], false), 8);
        assert_eq!(batch_size(&[context(60)], false), 6);
        assert_eq!(batch_size(&[context(150)], false), 4);
        assert_eq!(batch_size(&[context(300)], false), 3);
        // Morpheme context costs one slot, floored at 3
        assert_eq!(batch_size(&[context(10)], true), 7);
        assert_eq!(batch_size(&[context(300)], true), 3);
        // Mixed lengths use the mean
        assert_eq!(batch_size(&[context(10), context(90)], false), 6);
    }
}
