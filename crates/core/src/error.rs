/// Result alias that carries the custom [`LipsyncError`] type.
pub type Result<T> = std::result::Result<T, LipsyncError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum LipsyncError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON in a config, cue or scene document.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    /// A cue failed strict validation.
    #[error("cue #{index} is invalid: {reason}")]
    InvalidCue { index: usize, reason: String },
}

impl LipsyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for LipsyncError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for LipsyncError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
