use thiserror::Error;

/// A single chord token could not be parsed. Callers skip the token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse chord '{token}': {reason}")]
pub struct ChordParseError {
    pub token: String,
    pub reason: String,
}

impl ChordParseError {
    pub fn new(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that reject a whole analysis request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("capture is {seconds:.2}s, need at least {minimum:.1}s")]
    InputTooShort { seconds: f32, minimum: f32 },

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("invalid pitch-class profile: {0}")]
    InvalidProfile(String),

    #[error("invalid analysis parameters: {0}")]
    InvalidParams(String),

    #[error("failed to build frame worker pool: {0}")]
    WorkerPool(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
