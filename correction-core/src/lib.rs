pub mod error;
pub mod extract;
pub mod morpheme;
pub mod state;

pub use error::CoreError;
pub use extract::{CheckResponse, ExtractorConfig, extract_corrections};
pub use morpheme::{MorphemeIndex, MorphemeResponse, MorphemeToken};
pub use state::{CorrectionState, CorrectionStateMachine, StateTag};

/// One distinct flagged substring of the source text plus its ordered
/// replacement suggestions.
///
/// Identity is by `original` text content, not by position: repeated
/// occurrences of the same word across the document share one `Correction`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Correction {
    pub original: String,
    /// Ordered suggestions; the order is the forward-toggle order.
    /// Never contains `original`, duplicates, or empty strings.
    pub corrected: Vec<String>,
    /// Human-readable explanation from the backend, when it gave one.
    pub help: Option<String>,
}

/// The model's verdict for one correction, already reconciled against the
/// valid option set (`selected_value` is always `original` or a member of
/// `corrected`).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysisResult {
    pub correction_index: usize,
    pub selected_value: String,
    /// 0-100.
    pub confidence: u8,
    pub reasoning: String,
    pub is_exception_processed: bool,
    pub is_original_kept: bool,
}
