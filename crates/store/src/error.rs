use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("fingerprint not found")]
    NotFound,

    #[error("invalid rating character: {0:?}")]
    InvalidRating(char),

    #[error("corrupt fingerprint bytes (expected 16, got {0})")]
    InvalidFingerprintLen(usize),

    #[error("invalid utf-8 in stored value: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

impl StoreError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        StoreError::Backend(err.to_string())
    }
}
