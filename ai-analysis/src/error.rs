use backend_client::ClientError;

/// Failure modes of an AI analysis run. Both kinds are caught per batch by
/// the orchestrator and logged; the affected corrections fall back to
/// gap-filled defaults instead of blocking the run.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The model's text could not be parsed even after the full recovery
    /// ladder.
    #[error("AI response parse failure: {0}")]
    ResponseParse(String),

    /// One batch's round trip to the model failed.
    #[error("AI batch {batch} failed: {source}")]
    BatchFailure {
        batch: usize,
        #[source]
        source: ClientError,
    },
}
