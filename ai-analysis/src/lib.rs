pub mod analyze;
pub mod context;
pub mod error;
pub mod prompt;
pub mod reconcile;
pub mod recover;

pub use analyze::{AiAnalyzer, AnalysisConfig, AnalysisRequest};
pub use context::{ContextConfig, CorrectionContext, extract_context};
pub use error::AnalysisError;
pub use reconcile::reconcile_selection;
pub use recover::{RawAiItem, parse_items};
