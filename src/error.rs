// src/error.rs

/// Reasons a submission operation is rejected before it reaches the store
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmissionError {
    #[error("value must be between 0 and 100, got {0}")]
    ValueOutOfRange(f64),

    #[error("quality must be between 0 and 100, got {0}")]
    QualityOutOfRange(f64),

    #[error("name is {0} characters, the limit is {max}", max = crate::types::MAX_NAME_LEN)]
    NameTooLong(usize),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("submission {0} not found")]
    NotFound(i64),

    #[error("{requester} may not delete submission {id}")]
    NotPermitted { id: i64, requester: String },
}
