#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Image not ready: {0}")]
    ImageNotReady(String),

    #[error("No candidate images selected")]
    EmptyCandidateList,

    #[error("Question must not be empty")]
    EmptyQuestion,

    #[error("File too large: {0} bytes")]
    FileTooLarge(u64),

    #[error("Invalid MIME type: {0}")]
    InvalidMimeType(String),

    #[error("Failed to read file: {0}")]
    FileRead(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("A {0} comparison is already in progress")]
    Busy(&'static str),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Message shown to the user, preferring service-provided detail.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Transport(_) | AppError::Internal(_) => {
                "An error occurred while computing similarity, please retry".to_string()
            }
            other => other.to_string(),
        }
    }
}
