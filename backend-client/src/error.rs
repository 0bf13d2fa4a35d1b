/// Transport-level error kinds shared by the grammar and chat clients.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network failure or timeout. Retried per the transport policy and
    /// surfaced only after retries exhaust.
    #[error("backend unreachable: {0}")]
    BackendUnreachable(String),

    /// The backend answered, but not in the shape we expect.
    #[error("malformed backend response: {0}")]
    MalformedBackendResponse(String),

    /// Fatal precondition, raised before any network call.
    #[error("no API key configured")]
    NoApiKeyConfigured,

    /// Fatal precondition, raised before any network call.
    #[error("no model configured")]
    NoModelConfigured,
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::MalformedBackendResponse(e.to_string())
        } else {
            ClientError::BackendUnreachable(e.to_string())
        }
    }
}
