/// Errors from the synchronous pipeline core.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A caller passed an out-of-range correction index to the state machine.
    /// This is a programmer error, not a user-facing condition.
    #[error("correction index {index} out of range ({count} corrections)")]
    InvalidCorrectionIndex { index: usize, count: usize },
}
