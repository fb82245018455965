use thiserror::Error;

/// Error taxonomy for the upstream client.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// HTTP 5xx, network failure, malformed JSON on a page fetch that
    /// exhausted its retries. Callers abandon the current refresh pass
    /// for the affected tag; the next cycle retries from scratch.
    #[error("upstream request failed after retries: {0}")]
    Transient(String),

    /// The post has no usable image URL. Permanent: the post id is marked
    /// processed and never retried.
    #[error("post has no usable image url")]
    Permanent,

    /// More than two tags passed to a search — a caller/programmer error,
    /// not a transient upstream condition.
    #[error("at most 2 tags are supported in a single search, got {0}")]
    InvalidArgument(usize),

    #[error("failed to decode fetched image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("failed to fetch image bytes: {0}")]
    ImageFetch(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl UpstreamError {
    pub fn is_transient(&self) -> bool {
        matches!(self, UpstreamError::Transient(_))
    }
}
